use crate::config::{ORIGINAL_SUFFIX, SELECTOR_PREFIX};
use crate::ir::{Module, ModuleError, SymbolId};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClassKind {
    Selector,
    Plain,
}

/// What the linker does with a patch symbol whose name is already taken in
/// the base module.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LinkPolicy {
    /// Move the base symbol aside to `<name>_original` before linking.
    RenameBase,
    /// Patch definition replaces the base definition in place.
    Override,
    /// Module-private; gets a fresh name instead of colliding.
    Private,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub name: String,
    pub kind: ClassKind,
    pub policy: LinkPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rename {
    pub id: SymbolId,
    pub name: String,
    pub renamed: String,
}

/// Classify every patch symbol. Only external definitions carrying the
/// selector prefix are selectors; a selector declaration just binds to the
/// base symbol.
pub fn classify(patch: &Module) -> Vec<Classified> {
    patch
        .symbols()
        .map(|(_, s)| {
            let kind = if s.linkage.is_external()
                && !s.is_declaration()
                && s.name().starts_with(SELECTOR_PREFIX)
            {
                ClassKind::Selector
            } else {
                ClassKind::Plain
            };
            let policy = match kind {
                ClassKind::Selector => LinkPolicy::RenameBase,
                ClassKind::Plain if s.linkage.is_external() => LinkPolicy::Override,
                ClassKind::Plain => LinkPolicy::Private,
            };
            Classified {
                name: s.name().to_string(),
                kind,
                policy,
            }
        })
        .collect()
}

/// Rename base symbols displaced by patch selectors. Names missing from the
/// base are new selectors and are left alone. Renames made before a failure
/// stay in place.
pub fn resolve_collisions(
    base: &mut Module,
    classified: &[Classified],
) -> Result<Vec<Rename>, ModuleError> {
    let mut renames = vec![];
    for c in classified.iter().filter(|c| c.policy == LinkPolicy::RenameBase) {
        let id = match base.lookup(&c.name) {
            Some(id) => id,
            None => {
                log::debug!("new selector: {}", c.name);
                continue;
            }
        };

        let mut renamed = format!("{}{}", c.name, ORIGINAL_SUFFIX);
        if base.lookup(&renamed).is_some() {
            let unique = base.unique_name(&renamed);
            log::warn!("{} already exists, renaming {} to {}", renamed, c.name, unique);
            renamed = unique;
        }

        base.rename(id, &renamed)?;
        log::info!("Hotpatching: {}", c.name);
        renames.push(Rename {
            id,
            name: c.name.clone(),
            renamed,
        });
    }
    Ok(renames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::parse_module;
    use test_log::test;

    const BASE: &str = r#"
declare ptr @sem_cpuid(ptr, ptr)
@SELECTOR_CPUID = constant ptr @sem_cpuid
@SELECTOR_NOP = constant ptr @sem_cpuid
"#;

    #[test]
    fn classification() {
        let patch = parse_module(
            "p",
            r#"
declare ptr @new_cpuid(ptr, ptr)
@SELECTOR_CPUID = constant ptr @new_cpuid
@SELECTOR_NOP = external constant ptr
@helper = internal global i64 0
"#,
        )
        .unwrap();
        let c = classify(&patch);
        let policies = c.iter().map(|c| (c.name.as_str(), c.policy)).collect::<Vec<_>>();
        assert_eq!(
            policies,
            vec![
                ("new_cpuid", LinkPolicy::Override),
                ("SELECTOR_CPUID", LinkPolicy::RenameBase),
                ("SELECTOR_NOP", LinkPolicy::Override),
                ("helper", LinkPolicy::Private),
            ]
        );
        assert_eq!(c[1].kind, ClassKind::Selector);
    }

    #[test]
    fn absent_selector_is_not_renamed() {
        let mut base = parse_module("base", BASE).unwrap();
        let before = base.symbol_table();
        let c = vec![Classified {
            name: "SELECTOR_RDTSC".into(),
            kind: ClassKind::Selector,
            policy: LinkPolicy::RenameBase,
        }];
        assert!(resolve_collisions(&mut base, &c).unwrap().is_empty());
        assert_eq!(before, base.symbol_table());
    }

    #[test]
    fn renames_colliding_selector() {
        let mut base = parse_module("base", BASE).unwrap();
        let id = base.lookup("SELECTOR_CPUID").unwrap();
        let c = vec![Classified {
            name: "SELECTOR_CPUID".into(),
            kind: ClassKind::Selector,
            policy: LinkPolicy::RenameBase,
        }];
        let renames = resolve_collisions(&mut base, &c).unwrap();
        assert_eq!(renames.len(), 1);
        assert_eq!(renames[0].renamed, "SELECTOR_CPUID_original");
        assert_eq!(base.lookup("SELECTOR_CPUID"), None);
        assert_eq!(base.lookup("SELECTOR_CPUID_original"), Some(id));
    }

    #[test]
    fn second_rename_gets_unique_suffix() {
        let mut base = parse_module("base", BASE).unwrap();
        let c = vec![Classified {
            name: "SELECTOR_CPUID".into(),
            kind: ClassKind::Selector,
            policy: LinkPolicy::RenameBase,
        }];
        resolve_collisions(&mut base, &c).unwrap();

        // a later patch put a new SELECTOR_CPUID in place
        let f = base.lookup("sem_cpuid").unwrap();
        base.add_global(
            "SELECTOR_CPUID",
            crate::ir::GlobalVariable::new(crate::ir::Type::Ptr, true, Some(crate::ir::Value::Global(f))),
        )
        .unwrap();
        let renames = resolve_collisions(&mut base, &c).unwrap();
        assert_eq!(renames[0].renamed, "SELECTOR_CPUID_original.1");
        assert!(base.lookup("SELECTOR_CPUID_original").is_some());
    }
}
