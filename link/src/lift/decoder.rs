use super::*;
use capstone::arch::x86::X86OperandType;
use capstone::arch::ArchOperand;
use capstone::prelude::*;
use object::Architecture;

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedOperand {
    Register(String),
    Immediate(i64),
    Memory {
        base: Option<String>,
        index: Option<String>,
        scale: i32,
        disp: i64,
    },
}

impl DecodedOperand {
    /// One letter per operand kind, used to pick an operand-specific selector.
    pub fn form(&self) -> char {
        match self {
            Self::Register(_) => 'R',
            Self::Immediate(_) => 'I',
            Self::Memory { .. } => 'M',
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecodedInstruction {
    pub address: u64,
    pub bytes: Vec<u8>,
    pub mnemonic: String,
    pub op_str: String,
    pub operands: Vec<DecodedOperand>,
}

impl DecodedInstruction {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn next_address(&self) -> u64 {
        self.address + self.bytes.len() as u64
    }

    pub fn form(&self) -> String {
        self.operands.iter().map(DecodedOperand::form).collect()
    }
}

pub struct Decoder {
    cs: Capstone,
    architecture: Architecture,
}

impl Decoder {
    pub fn new(architecture: Architecture) -> Result<Self, LiftError> {
        let cs = match architecture {
            Architecture::X86_64 => Capstone::new()
                .x86()
                .mode(arch::x86::ArchMode::Mode64)
                .syntax(arch::x86::ArchSyntax::Intel)
                .detail(true)
                .build(),
            Architecture::I386 => Capstone::new()
                .x86()
                .mode(arch::x86::ArchMode::Mode32)
                .syntax(arch::x86::ArchSyntax::Intel)
                .detail(true)
                .build(),
            _ => {
                return Err(LiftError::UnsupportedArchitecture(format!(
                    "{:?}",
                    architecture
                )))
            }
        }
        .map_err(LiftError::Capstone)?;
        Ok(Self { cs, architecture })
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    /// Register holding the program counter.
    pub fn pc_register(&self) -> &'static str {
        match self.architecture {
            Architecture::I386 => "eip",
            _ => "rip",
        }
    }

    fn register(&self, reg: RegId) -> Option<String> {
        if reg.0 == 0 {
            None
        } else {
            self.cs.reg_name(reg)
        }
    }

    /// Decode the first instruction in `bytes`, located at `address`.
    pub fn decode(&self, address: u64, bytes: &[u8]) -> Result<DecodedInstruction, LiftError> {
        let insns = self
            .cs
            .disasm_count(bytes, address, 1)
            .map_err(LiftError::Capstone)?;
        let insn = insns
            .as_ref()
            .first()
            .ok_or(LiftError::DecodeFailed(address))?;
        let detail = self.cs.insn_detail(insn).map_err(LiftError::Capstone)?;

        let mut operands = vec![];
        for op in detail.arch_detail().operands() {
            let op = match op {
                ArchOperand::X86Operand(op) => op,
                _ => continue,
            };
            let decoded = match op.op_type {
                X86OperandType::Reg(reg) => match self.register(reg) {
                    Some(name) => DecodedOperand::Register(name),
                    None => return Err(LiftError::DecodeFailed(address)),
                },
                X86OperandType::Imm(imm) => DecodedOperand::Immediate(imm),
                X86OperandType::Mem(mem) => DecodedOperand::Memory {
                    base: self.register(mem.base()),
                    index: self.register(mem.index()),
                    scale: mem.scale(),
                    disp: mem.disp(),
                },
                _ => continue,
            };
            operands.push(decoded);
        }

        let decoded = DecodedInstruction {
            address: insn.address(),
            bytes: insn.bytes().to_vec(),
            mnemonic: insn.mnemonic().unwrap_or("").to_string(),
            op_str: insn.op_str().unwrap_or("").to_string(),
            operands,
        };
        log::debug!(
            "decode {:#x}: {} {} {:?}",
            decoded.address,
            decoded.mnemonic,
            decoded.op_str,
            decoded.operands
        );
        Ok(decoded)
    }
}
