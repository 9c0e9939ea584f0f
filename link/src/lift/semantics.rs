use super::LiftError;
use crate::ir::{parse_module, Module};
use std::error::Error;
use std::path::Path;

const X86_64_LINUX: &str = include_str!("../../semantics/x86_64-linux.lir");

fn builtin(os: &str, arch: &str) -> Option<(&'static str, &'static str)> {
    match (os, arch) {
        ("linux", "amd64") | ("linux", "x86_64") => Some(("x86_64-linux", X86_64_LINUX)),
        _ => None,
    }
}

/// The built-in semantics module for `os`/`arch`.
pub fn load_semantics(os: &str, arch: &str) -> Result<Module, LiftError> {
    let (name, text) = builtin(os, arch)
        .ok_or_else(|| LiftError::UnsupportedArchitecture(format!("{}/{}", os, arch)))?;
    let module = parse_module(name, text).map_err(LiftError::Semantics)?;
    log::debug!("semantics {}: {} symbols", name, module.len());
    Ok(module)
}

/// Semantics from a `.lir` file, named after the file stem.
pub fn load_semantics_file(path: &Path) -> Result<Module, Box<dyn Error>> {
    let text = std::fs::read_to_string(path)?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("semantics");
    let module = parse_module(name, &text)?;
    if module.target.is_empty() {
        log::warn!("{}: semantics without target metadata", path.display());
    }
    Ok(module)
}
