//! Override named semantics in a base module with definitions from a patch.
//!
//! A hotpatch runs four steps against the base module:
//!
//! 1. load the patch module (IR text or an object container),
//! 2. force the patch's target metadata to the base's,
//! 3. rename base selectors the patch redefines to `<name>_original`,
//! 4. link the patch in with patch definitions winning collisions.
pub(crate) mod conform;
pub(crate) mod linker;
pub(crate) mod loader;
pub(crate) mod resolve;

pub use conform::*;
pub use linker::*;
pub use loader::*;
pub use resolve::*;

use crate::config::{DebugFlag, LinkConfig};
use crate::ir::Module;
use crate::HotpatchError;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HotpatchStage {
    Idle,
    Loading,
    Conforming,
    Resolving,
    Linking,
    Done,
    Failed,
}

struct Progress {
    stage: HotpatchStage,
}

impl Progress {
    fn new() -> Self {
        Self {
            stage: HotpatchStage::Idle,
        }
    }

    fn enter(&mut self, next: HotpatchStage) {
        log::debug!("hotpatch: {:?} -> {:?}", self.stage, next);
        self.stage = next;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HotpatchReport {
    pub source: PathBuf,
    pub renamed: Vec<Rename>,
    pub link: LinkSummary,
}

impl fmt::Display for HotpatchReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for r in self.renamed.iter() {
            writeln!(f, "Hotpatching: {} (previous definition at {})", r.name, r.renamed)?;
        }
        write!(
            f,
            "Hotpatch {}: {} selector(s) replaced, {} overridden, {} added",
            self.source.display(),
            self.renamed.len(),
            self.link.overridden.len(),
            self.link.added.len()
        )
    }
}

/// Apply the patch at `path` to `base`.
///
/// A missing or malformed patch fails before `base` is touched. A link
/// failure does not: selectors renamed to `<name>_original` stay renamed, and
/// the base module is left neither patched nor in its original state. Nothing
/// is rolled back.
pub fn hotpatch(base: &mut Module, path: &Path) -> Result<HotpatchReport, HotpatchError> {
    hotpatch_with(base, path, &LinkConfig::new())
}

pub fn hotpatch_with(
    base: &mut Module,
    path: &Path,
    config: &LinkConfig,
) -> Result<HotpatchReport, HotpatchError> {
    let mut progress = Progress::new();
    let result = apply(base, path, config, &mut progress);
    match &result {
        Ok(report) => {
            progress.enter(HotpatchStage::Done);
            log::info!("{}", report);
        }
        Err(e) => {
            log::error!("hotpatch failed while {:?}: {}", progress.stage, e);
            progress.enter(HotpatchStage::Failed);
        }
    }
    result
}

fn apply(
    base: &mut Module,
    path: &Path,
    config: &LinkConfig,
    progress: &mut Progress,
) -> Result<HotpatchReport, HotpatchError> {
    progress.enter(HotpatchStage::Loading);
    let mut patch = load_patch(path)?;

    progress.enter(HotpatchStage::Conforming);
    conform_target(&mut patch, &base.target);

    progress.enter(HotpatchStage::Resolving);
    let classified = classify(&patch);
    if config.is_debug(&DebugFlag::Classification) {
        for c in classified.iter() {
            eprintln!(" C: {:?} {:?} {}", c.kind, c.policy, c.name);
        }
    }
    let renamed = resolve_collisions(base, &classified).map_err(HotpatchError::Rename)?;

    progress.enter(HotpatchStage::Linking);
    if config.is_debug(&DebugFlag::Symbols) {
        patch.dump();
    }
    let link = link_override(base, patch)?;
    if config.is_debug(&DebugFlag::Symbols) {
        base.dump();
    }

    Ok(HotpatchReport {
        source: path.to_path_buf(),
        renamed,
        link,
    })
}
