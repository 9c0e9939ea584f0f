use super::*;
use object::{Architecture, Endianness};
use std::fmt;

/// Index of a symbol inside the module that created it. References between
/// symbols are ids, so renaming a symbol never breaks a reference to it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub(crate) usize);

impl SymbolId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Linkage {
    #[default]
    External,
    Internal,
}

impl Linkage {
    pub fn is_external(&self) -> bool {
        *self == Linkage::External
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Function(Function),
    Global(GlobalVariable),
}

impl SymbolKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Function(_) => "function",
            Self::Global(_) => "global variable",
        }
    }

    pub fn is_declaration(&self) -> bool {
        match self {
            Self::Function(f) => f.is_declaration(),
            Self::Global(g) => g.is_declaration(),
        }
    }

    pub fn remap_symbols(&mut self, f: &impl Fn(SymbolId) -> SymbolId) {
        match self {
            Self::Function(func) => func.remap_symbols(f),
            Self::Global(g) => g.remap_symbols(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub(crate) name: String,
    pub linkage: Linkage,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, SymbolKind::Function(_))
    }

    pub fn is_declaration(&self) -> bool {
        self.kind.is_declaration()
    }

    pub fn as_function(&self) -> Option<&Function> {
        match &self.kind {
            SymbolKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_global(&self) -> Option<&GlobalVariable> {
        match &self.kind {
            SymbolKind::Global(g) => Some(g),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetMetadata {
    pub data_layout: String,
    pub triple: String,
}

impl TargetMetadata {
    pub fn new(data_layout: &str, triple: &str) -> Self {
        Self {
            data_layout: data_layout.to_string(),
            triple: triple.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data_layout.is_empty() && self.triple.is_empty()
    }

    pub fn architecture(&self) -> Architecture {
        let arch = self.triple.split('-').next().unwrap_or("");
        match arch {
            "x86_64" | "amd64" => Architecture::X86_64,
            "i386" | "i486" | "i586" | "i686" | "x86" => Architecture::I386,
            "aarch64" | "aarch64_be" | "arm64" => Architecture::Aarch64,
            "riscv64" => Architecture::Riscv64,
            "riscv32" => Architecture::Riscv32,
            _ if arch.starts_with("arm") => Architecture::Arm,
            _ => Architecture::Unknown,
        }
    }

    pub fn endianness(&self) -> Endianness {
        if self.data_layout.split('-').any(|spec| spec == "E") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModuleError {
    DuplicateSymbol(String),
    UnknownSymbol(String),
}
impl std::error::Error for ModuleError {}
impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::DuplicateSymbol(name) => write!(f, "symbol @{} already defined", name),
            Self::UnknownSymbol(name) => write!(f, "unknown symbol @{}", name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    pub target: TargetMetadata,
    symbols: Vec<Symbol>,
    names: im::OrdMap<String, SymbolId>,
}

impl Module {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            target: TargetMetadata::default(),
            symbols: vec![],
            names: im::OrdMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn add_symbol(
        &mut self,
        name: &str,
        linkage: Linkage,
        kind: SymbolKind,
    ) -> Result<SymbolId, ModuleError> {
        if self.names.contains_key(name) {
            return Err(ModuleError::DuplicateSymbol(name.to_string()));
        }
        let id = SymbolId(self.symbols.len());
        self.symbols.push(Symbol {
            name: name.to_string(),
            linkage,
            kind,
        });
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn add_function(&mut self, name: &str, function: Function) -> Result<SymbolId, ModuleError> {
        self.add_symbol(name, Linkage::External, SymbolKind::Function(function))
    }

    pub fn add_global(
        &mut self,
        name: &str,
        global: GlobalVariable,
    ) -> Result<SymbolId, ModuleError> {
        self.add_symbol(name, Linkage::External, SymbolKind::Global(global))
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.names.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.lookup(name).map(|id| self.symbol(id))
    }

    /// Ids are only meaningful for the module that handed them out.
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0]
    }

    pub fn name_of(&self, id: SymbolId) -> &str {
        &self.symbols[id.0].name
    }

    pub fn function(&self, id: SymbolId) -> Option<&Function> {
        self.symbol(id).as_function()
    }

    pub fn function_mut(&mut self, id: SymbolId) -> Option<&mut Function> {
        match &mut self.symbol_mut(id).kind {
            SymbolKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn rename(&mut self, id: SymbolId, new_name: &str) -> Result<(), ModuleError> {
        if self.names.contains_key(new_name) {
            return Err(ModuleError::DuplicateSymbol(new_name.to_string()));
        }
        let old = std::mem::replace(&mut self.symbols[id.0].name, new_name.to_string());
        self.names.remove(&old);
        self.names.insert(new_name.to_string(), id);
        log::debug!("rename: @{} -> @{}", old, new_name);
        Ok(())
    }

    /// `base` if it is free, otherwise the first free `base.N`.
    pub fn unique_name(&self, base: &str) -> String {
        if !self.names.contains_key(base) {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}.{}", base, n);
            if !self.names.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols.iter().enumerate().map(|(i, s)| (SymbolId(i), s))
    }

    pub fn symbol_table(&self) -> im::OrdMap<String, SymbolId> {
        self.names.clone()
    }

    pub(crate) fn replace_kind(&mut self, id: SymbolId, kind: SymbolKind) -> SymbolKind {
        std::mem::replace(&mut self.symbols[id.0].kind, kind)
    }

    pub(crate) fn into_symbols(self) -> Vec<Symbol> {
        self.symbols
    }

    /// Every symbol referring to `target`, through an initializer or an
    /// instruction operand.
    pub fn users(&self, target: SymbolId) -> Vec<SymbolId> {
        self.symbols()
            .filter(|(_, s)| match &s.kind {
                SymbolKind::Global(g) => g.init.as_ref().and_then(Value::as_global) == Some(target),
                SymbolKind::Function(f) => f.instructions().any(|i| i.symbols().any(|id| id == target)),
            })
            .map(|(id, _)| id)
            .collect()
    }

    pub fn dump(&self) {
        use itertools::Itertools;
        eprintln!(
            "Module: {}, triple: {:?}, symbols: {}",
            self.name,
            self.target.triple,
            self.len()
        );
        for (name, id) in self.names.iter().sorted_by_key(|(_, id)| **id) {
            let s = self.symbol(*id);
            let def = if s.is_declaration() { "declare" } else { "define" };
            eprintln!(" {:>4} {:?} {} {}: @{}", id.0, s.linkage, def, s.kind.kind_name(), name);
        }
    }
}
