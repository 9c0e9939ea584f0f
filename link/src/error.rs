use crate::hotpatch::HotpatchStage;
use crate::ir::{ModuleError, ParseError, TargetMetadata};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum LinkError {
    TargetMismatch {
        base: TargetMetadata,
        patch: TargetMetadata,
    },
    KindMismatch {
        name: String,
        base: &'static str,
        patch: &'static str,
    },
    TypeMismatch {
        name: String,
        base: String,
        patch: String,
    },
    /// The base module refused a planned rename or addition.
    Module(ModuleError),
}
impl std::error::Error for LinkError {}
impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::TargetMismatch { base, patch } => write!(
                f,
                "LinkError: target mismatch, base {:?}/{:?}, patch {:?}/{:?}",
                base.triple, base.data_layout, patch.triple, patch.data_layout
            ),
            Self::KindMismatch { name, base, patch } => write!(
                f,
                "LinkError: @{} is a {} in the base module but a {} in the patch",
                name, base, patch
            ),
            Self::TypeMismatch { name, base, patch } => write!(
                f,
                "LinkError: @{} has type {} in the base module but {} in the patch",
                name, base, patch
            ),
            Self::Module(e) => write!(f, "LinkError: {}", e),
        }
    }
}

#[derive(Debug)]
pub enum HotpatchError {
    NotFound(PathBuf),
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, ParseError),
    Rename(ModuleError),
    Link(LinkError),
}

impl HotpatchError {
    pub fn stage(&self) -> HotpatchStage {
        match self {
            Self::NotFound(_) | Self::Io(..) | Self::Parse(..) => HotpatchStage::Loading,
            Self::Rename(_) => HotpatchStage::Resolving,
            Self::Link(_) => HotpatchStage::Linking,
        }
    }
}

impl std::error::Error for HotpatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Io(_, e) => Some(e),
            Self::Parse(_, e) => Some(e),
            Self::Rename(e) => Some(e),
            Self::Link(e) => Some(e),
        }
    }
}

impl fmt::Display for HotpatchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "Hotpatch file not found: {}", path.display()),
            Self::Io(path, e) => write!(f, "Failed to read hotpatch {}: {}", path.display(), e),
            Self::Parse(path, e) => write!(
                f,
                "Failed to parse hotpatch module {}: {}",
                path.display(),
                e
            ),
            Self::Rename(e) => write!(f, "Failed to rename base selector: {}", e),
            Self::Link(e) => write!(f, "Failed to link hotpatch module: {}", e),
        }
    }
}

impl From<LinkError> for HotpatchError {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn failed_rename_reports_resolving() {
        let e = HotpatchError::Rename(ModuleError::DuplicateSymbol("SELECTOR_NOP_original".into()));
        assert_eq!(e.stage(), HotpatchStage::Resolving);
        assert!(std::error::Error::source(&e).is_some());
        assert_eq!(
            e.to_string(),
            "Failed to rename base selector: symbol @SELECTOR_NOP_original already defined"
        );
    }

    #[test]
    fn module_error_in_link() {
        let e: HotpatchError = LinkError::Module(ModuleError::DuplicateSymbol("x.1".into())).into();
        assert_eq!(e.stage(), HotpatchStage::Linking);
        assert!(e.to_string().ends_with("LinkError: symbol @x.1 already defined"), "{}", e);
    }
}
