// pack IR text into a relocatable object, and read it back
use crate::ir::{Module, ParseError};
use object::write;
use object::{Architecture, BinaryFormat, Object, ObjectSection, SectionKind};
use std::error::Error;

pub const CONTAINER_SECTION: &str = ".hotlink.ir";

pub fn is_container(buf: &[u8]) -> bool {
    buf.starts_with(&object::elf::ELFMAG)
}

/// Write `module` as an ELF relocatable for its own target, with the printed
/// IR in a dedicated section.
pub fn write_container(module: &Module) -> Result<Vec<u8>, Box<dyn Error>> {
    let arch = module.target.architecture();
    if arch == Architecture::Unknown {
        return Err(format!(
            "no object architecture for target triple {:?}",
            module.target.triple
        )
        .into());
    }
    let mut obj = write::Object::new(BinaryFormat::Elf, arch, module.target.endianness());
    let section = obj.add_section(
        vec![],
        CONTAINER_SECTION.as_bytes().to_vec(),
        SectionKind::Other,
    );
    let text = module.to_string();
    obj.append_section_data(section, text.as_bytes(), 1);
    log::debug!(
        "container: {}, {:?}, {} bytes of IR",
        module.name(),
        arch,
        text.len()
    );
    Ok(obj.write()?)
}

pub fn read_container(buf: &[u8]) -> Result<&str, ParseError> {
    let file = object::File::parse(buf)
        .map_err(|e| ParseError::new(0, format!("invalid object container: {}", e)))?;
    let section = file.section_by_name(CONTAINER_SECTION).ok_or_else(|| {
        ParseError::new(0, format!("object has no {} section", CONTAINER_SECTION))
    })?;
    let data = section
        .data()
        .map_err(|e| ParseError::new(0, format!("unreadable {}: {}", CONTAINER_SECTION, e)))?;
    log::debug!(
        "container: {:?}, {} bytes of IR",
        file.architecture(),
        data.len()
    );
    std::str::from_utf8(data)
        .map_err(|e| ParseError::new(0, format!("{} is not UTF-8: {}", CONTAINER_SECTION, e)))
}
