use super::*;

pub fn print_bytes(buf: &[u8], base: u64) {
    use pretty_hex::*;
    let cfg = HexConfig {
        title: false,
        ascii: false,
        width: 16,
        group: 4,
        chunk: 1,
        ..HexConfig::default()
    };
    eprintln!("{:#08x}: {}", base, config_hex(&buf.to_vec(), cfg));
}

pub fn print_instruction(inst: &DecodedInstruction) {
    print_bytes(&inst.bytes, inst.address);
    eprintln!(
        "  {:#06x} {}\t\t{}",
        inst.address, inst.mnemonic, inst.op_str
    );
    for (i, op) in inst.operands.iter().enumerate() {
        eprintln!("    op{}: {:?}", i, op);
    }
}
