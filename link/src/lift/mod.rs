//! Turn raw instruction bytes into IR functions, using the selectors of a
//! semantics module to find each instruction's implementation.
pub(crate) mod decoder;
pub(crate) mod disassemble;
pub(crate) mod lifter;
pub(crate) mod optimize;
pub(crate) mod semantics;

pub use decoder::*;
pub use disassemble::*;
pub use lifter::*;
pub use optimize::*;
pub use semantics::*;

use crate::ir::{ModuleError, ParseError};
use std::fmt;

#[derive(Debug)]
pub enum LiftError {
    UnsupportedArchitecture(String),
    Capstone(capstone::Error),
    DecodeFailed(u64),
    MissingSelector {
        mnemonic: String,
        selectors: Vec<String>,
    },
    BadSelector(String),
    OperandMismatch {
        selector: String,
        expected: usize,
        found: usize,
    },
    Semantics(ParseError),
    Module(ModuleError),
}

impl std::error::Error for LiftError {}
impl fmt::Display for LiftError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnsupportedArchitecture(arch) => write!(f, "unsupported architecture: {}", arch),
            Self::Capstone(e) => write!(f, "capstone: {}", e),
            Self::DecodeFailed(addr) => write!(f, "failed to decode instruction at {:#x}", addr),
            Self::MissingSelector {
                mnemonic,
                selectors,
            } => write!(
                f,
                "no semantics for {}, tried {}",
                mnemonic,
                selectors.join(", ")
            ),
            Self::BadSelector(name) => write!(f, "{} does not point to a semantic function", name),
            Self::OperandMismatch {
                selector,
                expected,
                found,
            } => write!(
                f,
                "{} takes {} operands, instruction has {}",
                selector, expected, found
            ),
            Self::Semantics(e) => write!(f, "invalid semantics module: {}", e),
            Self::Module(e) => write!(f, "{}", e),
        }
    }
}
