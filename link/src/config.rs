use std::collections::HashSet;

/// Names starting with this prefix are selectors: globals binding an
/// instruction mnemonic to the function implementing its semantics.
pub const SELECTOR_PREFIX: &str = "SELECTOR_";

/// Appended to a base selector displaced by a patch.
pub const ORIGINAL_SUFFIX: &str = "_original";

#[derive(Eq, Hash, PartialEq, Debug, Clone)]
pub enum DebugFlag {
    Symbols,
    Classification,
    Disassemble,
}

#[derive(Debug, Clone, Default)]
pub struct LinkConfig {
    pub debug: HashSet<DebugFlag>,
}

impl LinkConfig {
    pub fn new() -> Self {
        Self {
            debug: HashSet::new(),
        }
    }

    pub fn debug_add(&mut self, f: &DebugFlag) {
        self.debug.insert(f.clone());
    }

    pub fn is_debug(&self, f: &DebugFlag) -> bool {
        self.debug.contains(f)
    }
}
