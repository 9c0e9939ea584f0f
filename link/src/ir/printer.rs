// print modules in the same textual form the parser reads
use super::*;
use std::fmt;

pub struct ValueDisplay<'a> {
    module: &'a Module,
    value: &'a Value,
}

impl<'a> fmt::Display for ValueDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.value {
            Value::Local(name) => write!(f, "%{}", name),
            Value::Global(id) => write!(f, "@{}", self.module.name_of(*id)),
            Value::Int(v) => write!(f, "{}", v),
            Value::Register(name) => write!(f, "${}", name),
            Value::Label(name) => write!(f, "{}", name),
        }
    }
}

pub struct SymbolDisplay<'a> {
    module: &'a Module,
    id: SymbolId,
}

impl Module {
    pub fn display_value<'a>(&'a self, value: &'a Value) -> ValueDisplay<'a> {
        ValueDisplay {
            module: self,
            value,
        }
    }

    pub fn display_symbol(&self, id: SymbolId) -> SymbolDisplay<'_> {
        SymbolDisplay { module: self, id }
    }

    fn write_instruction(&self, f: &mut fmt::Formatter, inst: &Instruction) -> fmt::Result {
        write!(f, "  ")?;
        if let Some(r) = &inst.result {
            write!(f, "%{} = ", r)?;
        }
        write!(f, "{}", inst.opcode.name())?;
        if inst.opcode.has_type() {
            write!(f, " {}", inst.ty)?;
        }
        for (i, op) in inst.operands.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}", sep, self.display_value(op))?;
        }
        writeln!(f)
    }
}

impl<'a> fmt::Display for SymbolDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = self.module.symbol(self.id);
        let internal = if symbol.linkage.is_external() {
            ""
        } else {
            "internal "
        };
        match &symbol.kind {
            SymbolKind::Global(g) => {
                let kw = if g.constant { "constant" } else { "global" };
                match &g.init {
                    Some(v) => writeln!(
                        f,
                        "@{} = {}{} {} {}",
                        symbol.name,
                        internal,
                        kw,
                        g.ty,
                        self.module.display_value(v)
                    ),
                    None => writeln!(f, "@{} = external {} {}", symbol.name, kw, g.ty),
                }
            }
            SymbolKind::Function(func) => match &func.blocks {
                None => {
                    let params = func.signature.params.iter().map(|t| t.name()).collect::<Vec<_>>();
                    writeln!(
                        f,
                        "declare {}{} @{}({})",
                        internal,
                        func.signature.ret,
                        symbol.name,
                        params.join(", ")
                    )
                }
                Some(blocks) => {
                    let params = func
                        .signature
                        .params
                        .iter()
                        .zip(func.params.iter())
                        .map(|(t, n)| format!("{} %{}", t, n))
                        .collect::<Vec<_>>();
                    writeln!(
                        f,
                        "define {}{} @{}({}) {{",
                        internal,
                        func.signature.ret,
                        symbol.name,
                        params.join(", ")
                    )?;
                    for block in blocks.iter() {
                        writeln!(f, "{}:", block.label)?;
                        for inst in block.instructions.iter() {
                            self.module.write_instruction(f, inst)?;
                        }
                    }
                    writeln!(f, "}}")
                }
            },
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "; module {}", self.name())?;
        if !self.target.data_layout.is_empty() {
            writeln!(f, "target datalayout = \"{}\"", self.target.data_layout)?;
        }
        if !self.target.triple.is_empty() {
            writeln!(f, "target triple = \"{}\"", self.target.triple)?;
        }
        let mut last_was_body = true;
        for (id, symbol) in self.symbols() {
            let is_body = symbol.is_function() && !symbol.is_declaration();
            if is_body || last_was_body {
                writeln!(f)?;
            }
            write!(f, "{}", self.display_symbol(id))?;
            last_was_body = is_body;
        }
        Ok(())
    }
}
