use crate::container;
use crate::ir::{parse_module, Module, ParseError};
use crate::HotpatchError;
use std::fs;
use std::path::Path;

/// Read a patch module from `path`, either IR text or an object container
/// carrying IR text. The returned module is owned by the caller.
pub fn load_patch(path: &Path) -> Result<Module, HotpatchError> {
    if !path.exists() {
        return Err(HotpatchError::NotFound(path.to_path_buf()));
    }
    let buf = fs::read(path).map_err(|e| HotpatchError::Io(path.to_path_buf(), e))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "patch".to_string());
    log::debug!("load patch: {}, size: {}", path.display(), buf.len());
    parse_patch(&name, &buf).map_err(|e| HotpatchError::Parse(path.to_path_buf(), e))
}

pub fn parse_patch(name: &str, buf: &[u8]) -> Result<Module, ParseError> {
    let text = if container::is_container(buf) {
        container::read_container(buf)?
    } else {
        std::str::from_utf8(buf)
            .map_err(|e| ParseError::new(0, format!("patch is not UTF-8 text: {}", e)))?
    };
    parse_module(name, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn missing_file() {
        let path = Path::new("/nonexistent/hotlink/patch.lir");
        match load_patch(path) {
            Err(HotpatchError::NotFound(p)) => assert_eq!(p, path),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn binary_garbage() {
        let err = parse_patch("p", &[0xff, 0xfe, 0x00, 0x01]).unwrap_err();
        assert!(err.message.contains("UTF-8"), "{}", err);
    }

    #[test]
    fn text_without_target() {
        let m = parse_patch("p", b"@SELECTOR_NOP = constant i64 0\n").unwrap();
        assert!(m.target.is_empty());
        assert_eq!(m.name(), "p");
    }
}
