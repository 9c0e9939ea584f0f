use hotlink::hotpatch::conform_target;
use hotlink::ir::*;
use hotlink::lift::OptimizeStats;
use hotlink::*;
use std::path::{Path, PathBuf};
use test_log::test;

const BASE: &str = r#"
target datalayout = "e-m:e-i64:64-n8:16:32:64-S128"
target triple = "x86_64-pc-linux-gnu"

declare ptr @__hotlink_sync_hyper_call(ptr, ptr)
@state_size = constant i64 256

define ptr @CPUID(ptr %memory, ptr %state) {
entry:
  %m = call ptr @__hotlink_sync_hyper_call, %memory, %state
  ret ptr %m
}

define ptr @NOP(ptr %memory, ptr %state) {
entry:
  ret ptr %memory
}

define ptr @FLAGS(ptr %memory, ptr %state) {
entry:
  ret ptr %memory
}

@SELECTOR_CPUID = constant ptr @CPUID
@SELECTOR_NOP = constant ptr @NOP
"#;

// replaces CPUID with a body that never leaves to the runtime
const PATCH: &str = r#"
declare ptr @__hotlink_cpuid(ptr, ptr)

define internal ptr @CPUID(ptr %memory, ptr %state) {
entry:
  %m = call ptr @__hotlink_cpuid, %memory, %state
  ret ptr %m
}

@SELECTOR_CPUID = constant ptr @CPUID
"#;

fn base() -> Module {
    parse_module("base", BASE).unwrap()
}

fn temp_path(filename: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("hotlink-test-{}", std::process::id()));
    std::fs::create_dir_all(&p).unwrap();
    p.push(filename);
    p
}

fn write_patch(filename: &str, text: &str) -> PathBuf {
    let path = temp_path(filename);
    std::fs::write(&path, text).unwrap();
    path
}

fn selector_target(m: &Module, name: &str) -> SymbolId {
    m.get(name)
        .and_then(|s| s.as_global())
        .and_then(|g| g.init.as_ref())
        .and_then(|v| v.as_global())
        .unwrap()
}

fn called(m: &Module, f: SymbolId) -> Vec<String> {
    m.function(f)
        .unwrap()
        .instructions()
        .filter_map(|i| i.callee())
        .map(|c| m.name_of(c).to_string())
        .collect()
}

#[test]
fn selector_override() {
    let mut m = base();
    let old_cpuid = selector_target(&m, "SELECTOR_CPUID");
    let path = write_patch("override.lir", PATCH);

    let report = hotpatch(&mut m, &path).unwrap();
    assert_eq!(report.renamed.len(), 1);
    let printed = report.to_string();
    assert!(
        printed.starts_with("Hotpatching: SELECTOR_CPUID (previous definition at SELECTOR_CPUID_original)\n"),
        "{}",
        printed
    );
    assert!(printed.ends_with("1 selector(s) replaced, 0 overridden, 3 added"), "{}", printed);
    assert_eq!(report.renamed[0].renamed, "SELECTOR_CPUID_original");

    // the previous binding survives under the _original name
    assert_eq!(selector_target(&m, "SELECTOR_CPUID_original"), old_cpuid);
    assert_eq!(called(&m, old_cpuid), vec!["__hotlink_sync_hyper_call"]);

    let new_cpuid = selector_target(&m, "SELECTOR_CPUID");
    assert_ne!(new_cpuid, old_cpuid);
    assert_eq!(m.name_of(new_cpuid), "CPUID.1");
    assert_eq!(called(&m, new_cpuid), vec!["__hotlink_cpuid"]);

    // untouched selectors keep their binding
    assert_eq!(m.name_of(selector_target(&m, "SELECTOR_NOP")), "NOP");
    assert_eq!(m.lookup("SELECTOR_NOP_original"), None);
    parse_module("again", &m.to_string()).unwrap();
}

#[test]
fn missing_patch_leaves_base_unchanged() {
    let mut m = base();
    let before = m.to_string();
    let table = m.symbol_table();
    let path = temp_path("does-not-exist.lir");

    let err = hotpatch(&mut m, &path).unwrap_err();
    assert!(matches!(err, HotpatchError::NotFound(ref p) if *p == path));
    assert_eq!(err.stage(), HotpatchStage::Loading);
    assert_eq!(m.symbol_table(), table);
    assert_eq!(m.to_string(), before);
}

#[test]
fn malformed_patch_leaves_base_unchanged() {
    let mut m = base();
    let before = m.to_string();
    let path = write_patch("malformed.lir", "@SELECTOR_CPUID = constant ptr @nowhere\n");
    let err = hotpatch(&mut m, &path).unwrap_err();
    assert!(matches!(err, HotpatchError::Parse(..)), "{}", err);
    assert_eq!(m.to_string(), before);
}

#[test]
fn link_failure_keeps_renames() {
    let mut m = base();
    let old_cpuid = selector_target(&m, "SELECTOR_CPUID");
    // the selector is valid, @state_size collides with an incompatible type
    let text = format!("{}\n@state_size = constant ptr @CPUID\n", PATCH);
    let path = write_patch("incompatible.lir", &text);

    let err = hotpatch(&mut m, &path).unwrap_err();
    assert_eq!(err.stage(), HotpatchStage::Linking);
    match err {
        HotpatchError::Link(LinkError::TypeMismatch { ref name, .. }) => {
            assert_eq!(name, "state_size")
        }
        ref e => panic!("unexpected: {}", e),
    }

    // the rename already happened and is not rolled back
    assert_eq!(m.lookup("SELECTOR_CPUID"), None);
    assert_eq!(selector_target(&m, "SELECTOR_CPUID_original"), old_cpuid);
    // nothing from the patch got in
    assert_eq!(m.lookup("CPUID.1"), None);
    assert_eq!(m.lookup("__hotlink_cpuid"), None);
}

#[test]
fn resolver_without_collisions_renames_nothing() {
    let mut m = base();
    let table = m.symbol_table();
    let patch = parse_module(
        "p",
        "declare ptr @X(ptr, ptr)\n@SELECTOR_UD2 = constant ptr @X\n",
    )
    .unwrap();
    let renamed = hotpatch::resolve_collisions(&mut m, &hotpatch::classify(&patch)).unwrap();
    assert!(renamed.is_empty());
    assert_eq!(m.symbol_table(), table);
}

#[test]
fn conformance_forced() {
    let m = base();
    for (layout, triple) in [
        ("", ""),
        ("E-m:e-i64:64", "aarch64_be-unknown-linux-gnu"),
        ("e-m:w-i64:64", "x86_64-pc-windows-msvc"),
    ] {
        let mut patch = parse_module("p", "@x = global i64 1\n").unwrap();
        patch.target = TargetMetadata::new(layout, triple);
        conform_target(&mut patch, &m.target);
        assert_eq!(patch.target, m.target);
    }
}

#[test]
fn plain_symbols_replaced_in_place() {
    let mut m = base();
    let flags = m.lookup("FLAGS").unwrap();
    let path = write_patch(
        "plain.lir",
        r#"
declare ptr @__hotlink_flags(ptr, ptr)
define ptr @FLAGS(ptr %memory, ptr %state) {
entry:
  %m = call ptr @__hotlink_flags, %memory, %state
  ret ptr %m
}
"#,
    );
    let report = hotpatch(&mut m, &path).unwrap();
    assert!(report.renamed.is_empty());
    assert_eq!(report.link.overridden, vec!["FLAGS"]);
    assert_eq!(m.lookup("FLAGS"), Some(flags));
    assert_eq!(m.lookup("FLAGS_original"), None);
    assert_eq!(called(&m, flags), vec!["__hotlink_flags"]);
}

#[test]
fn rename_keeps_references() {
    let mut m = base();
    let cpuid = m.lookup("CPUID").unwrap();
    m.rename(cpuid, "CPUID_impl").unwrap();
    assert_eq!(selector_target(&m, "SELECTOR_CPUID"), cpuid);
    assert!(m
        .to_string()
        .contains("@SELECTOR_CPUID = constant ptr @CPUID_impl"));
    assert_eq!(m.lookup("CPUID"), None);
}

#[test]
fn printed_module_reparses() {
    let m = base();
    let again = parse_module("base", &m.to_string()).unwrap();
    assert_eq!(again.symbol_table(), m.symbol_table());
    assert_eq!(again.target, m.target);
}

#[test]
fn container_patch() {
    let mut m = base();
    let mut patch = parse_module("override", PATCH).unwrap();
    patch.target = m.target.clone();
    let buf = container::write_container(&patch).unwrap();
    let path = temp_path("override.o");
    std::fs::write(&path, buf).unwrap();

    hotpatch(&mut m, &path).unwrap();
    assert_eq!(m.name_of(selector_target(&m, "SELECTOR_CPUID")), "CPUID.1");
}

#[test]
fn internal_collision_is_uniqued() {
    let mut m = base();
    let nop = m.lookup("NOP").unwrap();
    let path = write_patch(
        "internal.lir",
        "define internal ptr @NOP(ptr %memory, ptr %state) {\nentry:\n  ret ptr %state\n}\n",
    );
    let report = hotpatch(&mut m, &path).unwrap();
    assert_eq!(report.link.uniqued, vec![("NOP".to_string(), "NOP.1".to_string())]);
    assert!(report.link.overridden.is_empty());
    assert_eq!(m.lookup("NOP"), Some(nop));
    assert_eq!(m.get("NOP.1").unwrap().linkage, Linkage::Internal);
    assert_eq!(selector_target(&m, "SELECTOR_NOP"), nop);
}

#[test]
fn double_patch_uniques_original() {
    let mut m = base();
    let path = write_patch("twice.lir", PATCH);
    hotpatch(&mut m, &path).unwrap();
    let first = selector_target(&m, "SELECTOR_CPUID");
    let report = hotpatch(&mut m, &path).unwrap();
    assert_eq!(report.renamed[0].renamed, "SELECTOR_CPUID_original.1");
    assert_eq!(selector_target(&m, "SELECTOR_CPUID_original.1"), first);
}

const MOV_RCX_1337: [u8; 7] = [0x48, 0xc7, 0xc1, 0x39, 0x05, 0x00, 0x00];
const CPUID: [u8; 2] = [0x0f, 0xa2];

#[test]
fn lift_mov() {
    let mut m = load_semantics("linux", "amd64").unwrap();
    let lifter = Lifter::new(&m.target).unwrap();
    let id = lifter.lift(&mut m, "lifted_mov", 0x1000, &MOV_RCX_1337).unwrap();
    let call = m
        .function(id)
        .unwrap()
        .instructions()
        .find(|i| i.opcode == Opcode::Call)
        .cloned()
        .unwrap();
    assert_eq!(m.name_of(call.callee().unwrap()), "MOV_RI");
    assert_eq!(call.operands[3], Value::register("rcx"));
    assert_eq!(call.operands[4], Value::Int(1337));

    let stats = optimize(&mut m, &[id]);
    assert_eq!(stats, OptimizeStats { inlined: 1, removed: 0 });
    let f = m.function(id).unwrap();
    assert!(f.instructions().all(|i| i.opcode != Opcode::Call));
    let printed = m.display_symbol(id).to_string();
    assert!(printed.contains("store i64 1337, $rcx"), "{}", printed);
    assert!(printed.contains("store i64 %next_pc, $rip"), "{}", printed);
}

#[test]
fn lift_cpuid_after_hotpatch() {
    let mut m = load_semantics("linux", "amd64").unwrap();
    let lifter = Lifter::new(&m.target).unwrap();
    let before = lifter.lift(&mut m, "lifted_cpuid", 0x2000, &CPUID).unwrap();
    assert_eq!(called(&m, before), vec!["CPUID"]);

    let path = write_patch("lift.lir", PATCH);
    hotpatch(&mut m, &path).unwrap();
    let after = lifter.lift(&mut m, "lifted_cpuid.patched", 0x2000, &CPUID).unwrap();
    assert_eq!(called(&m, after), vec!["CPUID.1"]);

    // the earlier lift keeps calling the unpatched semantics
    assert_eq!(called(&m, before), vec!["CPUID"]);

    optimize(&mut m, &[before, after]);
    assert_eq!(called(&m, before), vec!["__hotlink_sync_hyper_call"]);
    assert_eq!(called(&m, after), vec!["__hotlink_cpuid"]);
}

#[test]
fn config_debug_flags() {
    let mut config = LinkConfig::new();
    config.debug_add(&DebugFlag::Symbols);
    config.debug_add(&DebugFlag::Classification);
    let mut m = base();
    let path = write_patch("verbose.lir", PATCH);
    let report = hotpatch_with(&mut m, Path::new(&path), &config).unwrap();
    assert_eq!(report.source, path);
}
