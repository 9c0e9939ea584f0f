use crate::ir::{Linkage, Module, ModuleError, Symbol, SymbolId, SymbolKind};
use crate::LinkError;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkSummary {
    /// Base definitions replaced by patch definitions.
    pub overridden: Vec<String>,
    /// Patch declarations resolved against existing base symbols.
    pub bound: Vec<String>,
    pub added: Vec<String>,
    /// Symbols that had to move to a fresh name, as (old, new).
    pub uniqued: Vec<(String, String)>,
}

enum Action {
    Override(SymbolId),
    Bind(SymbolId),
    Add(String),
}

struct Plan {
    actions: Vec<Action>,
    mapping: Vec<SymbolId>,
    base_renames: Vec<(SymbolId, String)>,
}

fn check_compatible(name: &str, base: &Symbol, patch: &Symbol) -> Result<(), LinkError> {
    match (&base.kind, &patch.kind) {
        (SymbolKind::Function(b), SymbolKind::Function(p)) => {
            if b.signature != p.signature {
                return Err(LinkError::TypeMismatch {
                    name: name.to_string(),
                    base: b.signature.to_string(),
                    patch: p.signature.to_string(),
                });
            }
        }
        (SymbolKind::Global(b), SymbolKind::Global(p)) => {
            if b.ty != p.ty {
                return Err(LinkError::TypeMismatch {
                    name: name.to_string(),
                    base: b.ty.to_string(),
                    patch: p.ty.to_string(),
                });
            }
        }
        (b, p) => {
            return Err(LinkError::KindMismatch {
                name: name.to_string(),
                base: b.kind_name(),
                patch: p.kind_name(),
            })
        }
    }
    Ok(())
}

fn fresh_name(base: &Module, reserved: &HashSet<String>, name: &str) -> String {
    let mut n = 1;
    let mut candidate = name.to_string();
    while base.lookup(&candidate).is_some() || reserved.contains(&candidate) {
        candidate = format!("{}.{}", name, n);
        n += 1;
    }
    candidate
}

fn plan(base: &Module, patch: &Module) -> Result<Plan, LinkError> {
    let mut plan = Plan {
        actions: vec![],
        mapping: vec![],
        base_renames: vec![],
    };
    // external patch names keep their own name, so no fresh name may take one
    let mut reserved: HashSet<String> = patch
        .symbols()
        .filter(|(_, s)| s.linkage.is_external())
        .map(|(_, s)| s.name().to_string())
        .collect();
    let mut next_id = base.len();

    for (_, ps) in patch.symbols() {
        let existing = base.lookup(ps.name());
        let action = match existing {
            _ if ps.linkage == Linkage::Internal => {
                Action::Add(fresh_name(base, &reserved, ps.name()))
            }
            Some(bid) if base.symbol(bid).linkage == Linkage::Internal => {
                let moved = fresh_name(base, &reserved, ps.name());
                reserved.insert(moved.clone());
                plan.base_renames.push((bid, moved));
                Action::Add(ps.name().to_string())
            }
            Some(bid) => {
                check_compatible(ps.name(), base.symbol(bid), ps)?;
                if ps.is_declaration() {
                    Action::Bind(bid)
                } else {
                    Action::Override(bid)
                }
            }
            None => Action::Add(ps.name().to_string()),
        };

        match &action {
            Action::Override(bid) | Action::Bind(bid) => plan.mapping.push(*bid),
            Action::Add(name) => {
                reserved.insert(name.clone());
                plan.mapping.push(SymbolId(next_id));
                next_id += 1;
            }
        }
        plan.actions.push(action);
    }
    Ok(plan)
}

/// Merge `patch` into `base`, patch definitions winning every name collision.
/// The whole merge is checked before `base` is touched, so on a planning error
/// `base` is exactly as the caller left it. Errors while applying the plan
/// mean the plan and the base disagree; they are returned, never skipped.
/// The patch module is consumed either way.
pub fn link_override(base: &mut Module, patch: Module) -> Result<LinkSummary, LinkError> {
    if base.target != patch.target {
        return Err(LinkError::TargetMismatch {
            base: base.target.clone(),
            patch: patch.target.clone(),
        });
    }

    let plan = plan(base, &patch)?;
    let mut summary = LinkSummary::default();

    for (bid, moved) in plan.base_renames {
        let old = base.name_of(bid).to_string();
        base.rename(bid, &moved).map_err(LinkError::Module)?;
        summary.uniqued.push((old, moved));
    }

    let mapping = plan.mapping;
    let remap = |id: SymbolId| mapping[id.0];
    let symbols = patch.into_symbols();

    for (i, (symbol, action)) in symbols.into_iter().zip(plan.actions).enumerate() {
        let Symbol {
            name,
            linkage,
            mut kind,
        } = symbol;
        kind.remap_symbols(&remap);
        match action {
            Action::Override(bid) => {
                log::debug!("override: @{}", name);
                base.replace_kind(bid, kind);
                summary.overridden.push(name);
            }
            Action::Bind(_) => {
                log::debug!("bind: @{}", name);
                summary.bound.push(name);
            }
            Action::Add(new_name) => {
                log::debug!("add: @{}", new_name);
                let id = base
                    .add_symbol(&new_name, linkage, kind)
                    .map_err(LinkError::Module)?;
                if id != mapping[i] {
                    log::error!("add @{}: planned {:?}, got {:?}", new_name, mapping[i], id);
                    return Err(LinkError::Module(ModuleError::UnknownSymbol(new_name)));
                }
                if new_name != name {
                    summary.uniqued.push((name, new_name.clone()));
                }
                summary.added.push(new_name);
            }
        }
    }

    log::debug!(
        "linked: {} overridden, {} bound, {} added",
        summary.overridden.len(),
        summary.bound.len(),
        summary.added.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{parse_module, TargetMetadata, Value};
    use test_log::test;

    const BASE: &str = r#"
@counter = global i64 7
@table = internal global i64 1
declare ptr @sync(ptr)
define ptr @step(ptr %m) {
entry:
  %r = call ptr @sync, %m
  ret ptr %r
}
define ptr @caller(ptr %m) {
entry:
  %r = call ptr @step, %m
  ret ptr %r
}
"#;

    fn base() -> Module {
        parse_module("base", BASE).unwrap()
    }

    #[test]
    fn override_replaces_in_place() {
        let mut base = base();
        let step = base.lookup("step").unwrap();
        let patch = parse_module(
            "patch",
            "define ptr @step(ptr %m) {\nentry:\n  ret ptr %m\n}\n",
        )
        .unwrap();
        let summary = link_override(&mut base, patch).unwrap();
        assert_eq!(summary.overridden, vec!["step"]);
        assert_eq!(base.lookup("step"), Some(step));
        assert_eq!(base.function(step).unwrap().instructions().count(), 1);

        // the caller still reaches the same, now patched, slot
        let caller = base.lookup("caller").unwrap();
        assert_eq!(base.users(step), vec![caller]);
    }

    #[test]
    fn declarations_bind_to_base() {
        let mut base = base();
        let sync = base.lookup("sync").unwrap();
        let counter = base.lookup("counter").unwrap();
        let patch = parse_module(
            "patch",
            r#"
declare ptr @sync(ptr)
@counter = external global i64
define ptr @fresh(ptr %m) {
entry:
  %r = call ptr @sync, %m
  %c = load i64 @counter
  ret ptr %r
}
"#,
        )
        .unwrap();
        let summary = link_override(&mut base, patch).unwrap();
        assert_eq!(summary.bound, vec!["sync", "counter"]);
        assert_eq!(summary.added, vec!["fresh"]);
        assert_eq!(
            base.get("counter").unwrap().as_global().unwrap().init,
            Some(Value::Int(7))
        );

        let fresh = base.lookup("fresh").unwrap();
        let callees = base
            .function(fresh)
            .unwrap()
            .instructions()
            .flat_map(|i| i.symbols())
            .collect::<Vec<_>>();
        assert_eq!(callees, vec![sync, counter]);
    }

    #[test]
    fn internal_symbols_never_override() {
        let mut base = base();
        let table = base.lookup("table").unwrap();
        let patch = parse_module(
            "patch",
            "@counter = internal global i64 3\n@table = global i64 9\n",
        )
        .unwrap();
        let summary = link_override(&mut base, patch).unwrap();

        // patch internal gets a fresh name, base counter untouched
        assert_eq!(base.get("counter").unwrap().as_global().unwrap().init, Some(Value::Int(7)));
        assert_eq!(base.get("counter.1").unwrap().as_global().unwrap().init, Some(Value::Int(3)));
        // base internal moves aside for the incoming external
        assert_eq!(base.lookup("table.1"), Some(table));
        assert_eq!(base.get("table").unwrap().as_global().unwrap().init, Some(Value::Int(9)));
        assert_eq!(
            summary.uniqued,
            vec![
                ("table".to_string(), "table.1".to_string()),
                ("counter".to_string(), "counter.1".to_string())
            ]
        );
    }

    fn load_target(base: &Module, f: SymbolId) -> SymbolId {
        base.function(f)
            .unwrap()
            .instructions()
            .find_map(|i| i.symbols().next())
            .unwrap()
    }

    #[test]
    fn uniqued_internal_skips_patch_external_names() {
        let mut base = parse_module("base", "@x = global i64 1\n").unwrap();
        let patch = parse_module(
            "patch",
            r#"
@x = internal global i64 2
@x.1 = global i64 3
define i64 @rd() {
entry:
  %v = load i64 @x.1
  ret i64 %v
}
"#,
        )
        .unwrap();
        let summary = link_override(&mut base, patch).unwrap();
        assert_eq!(summary.added, vec!["x.2", "x.1", "rd"]);
        assert_eq!(summary.uniqued, vec![("x".to_string(), "x.2".to_string())]);

        let init = |name: &str| base.get(name).unwrap().as_global().unwrap().init.clone();
        assert_eq!(init("x"), Some(Value::Int(1)));
        assert_eq!(init("x.1"), Some(Value::Int(3)));
        assert_eq!(init("x.2"), Some(Value::Int(2)));

        // the load still reads the external x.1
        let rd = base.lookup("rd").unwrap();
        assert_eq!(load_target(&base, rd), base.lookup("x.1").unwrap());
        assert!(base.to_string().contains("%v = load i64 @x.1"));
    }

    #[test]
    fn displaced_base_internal_skips_patch_external_names() {
        let mut base = parse_module("base", "@t = internal global i64 1\n").unwrap();
        let t = base.lookup("t").unwrap();
        let patch = parse_module("patch", "@t = global i64 2\n@t.1 = global i64 3\n").unwrap();
        let summary = link_override(&mut base, patch).unwrap();
        assert_eq!(summary.uniqued, vec![("t".to_string(), "t.2".to_string())]);
        assert_eq!(base.lookup("t.2"), Some(t));

        let init = |name: &str| base.get(name).unwrap().as_global().unwrap().init.clone();
        assert_eq!(init("t"), Some(Value::Int(2)));
        assert_eq!(init("t.1"), Some(Value::Int(3)));
        assert_eq!(init("t.2"), Some(Value::Int(1)));
    }

    #[test]
    fn type_mismatch_leaves_base_untouched() {
        let mut base = base();
        let before = base.to_string();
        let patch = parse_module(
            "patch",
            "@fresh = global i64 1\ndefine i64 @step(i64 %x) {\nentry:\n  ret i64 %x\n}\n",
        )
        .unwrap();
        let err = link_override(&mut base, patch).unwrap_err();
        assert!(matches!(err, LinkError::TypeMismatch { ref name, .. } if name == "step"));
        assert_eq!(before, base.to_string());
    }

    #[test]
    fn kind_mismatch() {
        let mut base = base();
        let patch = parse_module("patch", "@step = global i64 1\n").unwrap();
        let err = link_override(&mut base, patch).unwrap_err();
        assert_eq!(
            err,
            LinkError::KindMismatch {
                name: "step".into(),
                base: "function",
                patch: "global variable"
            }
        );
    }

    #[test]
    fn refuses_mismatched_targets() {
        let mut base = base();
        base.target = TargetMetadata::new("e", "x86_64-pc-linux-gnu");
        let patch = parse_module("patch", "@x = global i64 1\n").unwrap();
        let err = link_override(&mut base, patch).unwrap_err();
        assert!(matches!(err, LinkError::TargetMismatch { .. }));
        assert_eq!(base.lookup("x"), None);
    }
}
