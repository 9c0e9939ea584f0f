use crate::ir::{Module, TargetMetadata};

/// Overwrite the patch's target metadata with the base module's. No
/// compatibility check is made here; a patch built for another architecture
/// is the caller's problem.
pub fn conform_target(patch: &mut Module, base: &TargetMetadata) {
    if patch.target != *base {
        log::debug!(
            "conform {}: {:?}/{:?} -> {:?}/{:?}",
            patch.name(),
            patch.target.triple,
            patch.target.data_layout,
            base.triple,
            base.data_layout
        );
    }
    patch.target = base.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn forces_base_target() {
        let base = TargetMetadata::new("e-m:e-i64:64", "x86_64-pc-linux-gnu");
        let pairs = [
            TargetMetadata::default(),
            TargetMetadata::new("E-p:32:32", "mips-unknown-linux"),
            base.clone(),
        ];
        for t in pairs {
            let mut patch = Module::new("patch");
            patch.target = t;
            conform_target(&mut patch, &base);
            assert_eq!(patch.target, base);
        }
    }
}
