use super::*;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Local(String),
    Global(SymbolId),
    Int(i64),
    /// Architectural register, addressed relative to the state structure.
    Register(String),
    Label(String),
}

impl Value {
    pub fn local(name: &str) -> Self {
        Self::Local(name.to_string())
    }

    pub fn register(name: &str) -> Self {
        Self::Register(name.to_string())
    }

    pub fn as_global(&self) -> Option<SymbolId> {
        match self {
            Self::Global(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    Load,
    Store,
    Call,
    Ret,
    Br,
    Addr,
}

impl Opcode {
    pub fn parse(s: &str) -> Option<Self> {
        use Opcode::*;
        match s {
            "add" => Some(Add),
            "sub" => Some(Sub),
            "mul" => Some(Mul),
            "and" => Some(And),
            "or" => Some(Or),
            "xor" => Some(Xor),
            "shl" => Some(Shl),
            "lshr" => Some(LShr),
            "load" => Some(Load),
            "store" => Some(Store),
            "call" => Some(Call),
            "ret" => Some(Ret),
            "br" => Some(Br),
            "addr" => Some(Addr),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        use Opcode::*;
        match self {
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            And => "and",
            Or => "or",
            Xor => "xor",
            Shl => "shl",
            LShr => "lshr",
            Load => "load",
            Store => "store",
            Call => "call",
            Ret => "ret",
            Br => "br",
            Addr => "addr",
        }
    }

    pub fn is_binary(&self) -> bool {
        use Opcode::*;
        matches!(self, Add | Sub | Mul | And | Or | Xor | Shl | LShr)
    }

    /// No side effects: the instruction can be dropped when its result is
    /// unused.
    pub fn is_pure(&self) -> bool {
        self.is_binary() || matches!(self, Opcode::Load | Opcode::Addr)
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, Opcode::Ret | Opcode::Br)
    }

    pub fn has_type(&self) -> bool {
        *self != Opcode::Br
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub result: Option<String>,
    pub opcode: Opcode,
    pub ty: Type,
    pub operands: Vec<Value>,
}

impl Instruction {
    pub fn new(result: Option<&str>, opcode: Opcode, ty: Type, operands: Vec<Value>) -> Self {
        Self {
            result: result.map(|r| r.to_string()),
            opcode,
            ty,
            operands,
        }
    }

    pub fn call(result: Option<&str>, ret: Type, callee: SymbolId, args: Vec<Value>) -> Self {
        let mut operands = vec![Value::Global(callee)];
        operands.extend(args);
        Self::new(result, Opcode::Call, ret, operands)
    }

    pub fn callee(&self) -> Option<SymbolId> {
        if self.opcode == Opcode::Call {
            self.operands.first().and_then(Value::as_global)
        } else {
            None
        }
    }

    pub fn symbols(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.operands.iter().filter_map(Value::as_global)
    }

    pub fn remap_symbols(&mut self, f: &impl Fn(SymbolId) -> SymbolId) {
        for op in self.operands.iter_mut() {
            if let Value::Global(id) = op {
                *id = f(*id);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub label: String,
    pub instructions: Vec<Instruction>,
}

impl Block {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            instructions: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub signature: Signature,
    /// Parameter names, empty for declarations.
    pub params: Vec<String>,
    /// `None` for a declaration.
    pub blocks: Option<Vec<Block>>,
}

impl Function {
    pub fn declare(signature: Signature) -> Self {
        Self {
            signature,
            params: vec![],
            blocks: None,
        }
    }

    pub fn define(signature: Signature, params: Vec<String>, blocks: Vec<Block>) -> Self {
        Self {
            signature,
            params,
            blocks: Some(blocks),
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_none()
    }

    pub fn entry(&self) -> Option<&Block> {
        self.blocks.as_ref().and_then(|b| b.first())
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks
            .iter()
            .flat_map(|blocks| blocks.iter())
            .flat_map(|b| b.instructions.iter())
    }

    pub fn remap_symbols(&mut self, f: &impl Fn(SymbolId) -> SymbolId) {
        if let Some(blocks) = self.blocks.as_mut() {
            for block in blocks.iter_mut() {
                for inst in block.instructions.iter_mut() {
                    inst.remap_symbols(f);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVariable {
    pub ty: Type,
    pub constant: bool,
    /// `None` for an external declaration.
    pub init: Option<Value>,
}

impl GlobalVariable {
    pub fn new(ty: Type, constant: bool, init: Option<Value>) -> Self {
        Self { ty, constant, init }
    }

    pub fn is_declaration(&self) -> bool {
        self.init.is_none()
    }

    pub fn remap_symbols(&mut self, f: &impl Fn(SymbolId) -> SymbolId) {
        if let Some(Value::Global(id)) = self.init.as_mut() {
            *id = f(*id);
        }
    }
}
