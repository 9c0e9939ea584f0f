mod config;
pub mod container;
mod error;
pub mod hotpatch;
pub mod ir;
pub mod lift;

pub use config::{DebugFlag, LinkConfig, ORIGINAL_SUFFIX, SELECTOR_PREFIX};
pub use error::{HotpatchError, LinkError};
pub use hotpatch::{hotpatch, hotpatch_with, HotpatchReport, HotpatchStage};
pub use ir::{parse_module, Linkage, Module, ModuleError, ParseError, SymbolId, TargetMetadata};
pub use lift::{load_semantics, load_semantics_file, optimize, LiftError, Lifter};
