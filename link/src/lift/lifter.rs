use super::*;
use crate::config::{DebugFlag, LinkConfig, SELECTOR_PREFIX};
use crate::ir::*;

/// Lifts single instructions into functions of the form
/// `ptr @name(ptr %state, i64 %pc, ptr %memory)`.
///
/// Semantic functions take `(ptr %memory, ptr %state, operands...)` and
/// return the new memory pointer. Register operands are passed as register
/// references, immediates as constants, memory operands as computed
/// addresses.
pub struct Lifter {
    decoder: Decoder,
    config: LinkConfig,
}

impl Lifter {
    pub fn new(target: &TargetMetadata) -> Result<Self, LiftError> {
        Self::with_config(target, LinkConfig::new())
    }

    pub fn with_config(target: &TargetMetadata, config: LinkConfig) -> Result<Self, LiftError> {
        Ok(Self {
            decoder: Decoder::new(target.architecture())?,
            config,
        })
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Selector names to try for `inst`, most specific first.
    pub fn selectors(inst: &DecodedInstruction) -> Vec<String> {
        let base = format!("{}{}", SELECTOR_PREFIX, inst.mnemonic.to_uppercase());
        if inst.operands.is_empty() {
            vec![base]
        } else {
            vec![format!("{}_{}", base, inst.form()), base]
        }
    }

    /// Find the semantic function bound to the first selector present.
    pub fn resolve(
        module: &Module,
        inst: &DecodedInstruction,
    ) -> Result<(String, SymbolId), LiftError> {
        let selectors = Self::selectors(inst);
        let (name, id) = selectors
            .iter()
            .find_map(|s| module.lookup(s).map(|id| (s.clone(), id)))
            .ok_or_else(|| LiftError::MissingSelector {
                mnemonic: inst.mnemonic.clone(),
                selectors: selectors.clone(),
            })?;

        let target = module
            .symbol(id)
            .as_global()
            .and_then(|g| g.init.as_ref())
            .and_then(Value::as_global);
        match target {
            Some(f) if module.function(f).is_some() => Ok((name, f)),
            _ => Err(LiftError::BadSelector(name)),
        }
    }

    pub fn lift(
        &self,
        module: &mut Module,
        name: &str,
        address: u64,
        bytes: &[u8],
    ) -> Result<SymbolId, LiftError> {
        let inst = self.decoder.decode(address, bytes)?;
        if self.config.is_debug(&DebugFlag::Disassemble) {
            print_instruction(&inst);
        }

        let (selector, semantics) = Self::resolve(module, &inst)?;
        let sig = match module.function(semantics) {
            Some(f) => f.signature.clone(),
            None => return Err(LiftError::BadSelector(selector)),
        };
        if sig.ret != Type::Ptr || sig.params.len() < 2 {
            return Err(LiftError::BadSelector(selector));
        }
        let expected = sig.params.len() - 2;
        if expected != inst.operands.len() {
            return Err(LiftError::OperandMismatch {
                selector,
                expected,
                found: inst.operands.len(),
            });
        }
        log::debug!(
            "lift {:#x} {} via {} -> @{}",
            address,
            inst.mnemonic,
            selector,
            module.name_of(semantics)
        );

        let mut block = Block::new("entry");
        let mut args = vec![Value::local("memory"), Value::local("state")];
        for (i, op) in inst.operands.iter().enumerate() {
            match op {
                DecodedOperand::Register(r) => args.push(Value::register(r)),
                DecodedOperand::Immediate(v) => args.push(Value::Int(*v)),
                DecodedOperand::Memory {
                    base,
                    index,
                    scale,
                    disp,
                } => {
                    let result = format!("addr{}", i);
                    let reg = |r: &Option<String>| match r {
                        Some(r) => Value::register(r),
                        None => Value::Int(0),
                    };
                    block.instructions.push(Instruction::new(
                        Some(result.as_str()),
                        Opcode::Addr,
                        Type::Ptr,
                        vec![reg(base), reg(index), Value::Int(*scale as i64), Value::Int(*disp)],
                    ));
                    args.push(Value::Local(result));
                }
            }
        }

        block.instructions.push(Instruction::new(
            Some("next_pc"),
            Opcode::Add,
            Type::I64,
            vec![Value::local("pc"), Value::Int(inst.len() as i64)],
        ));
        block.instructions.push(Instruction::new(
            None,
            Opcode::Store,
            Type::I64,
            vec![
                Value::local("next_pc"),
                Value::register(self.decoder.pc_register()),
            ],
        ));
        block
            .instructions
            .push(Instruction::call(Some("memory.1"), Type::Ptr, semantics, args));
        block.instructions.push(Instruction::new(
            None,
            Opcode::Ret,
            Type::Ptr,
            vec![Value::local("memory.1")],
        ));

        let function = Function::define(
            Signature::new(Type::Ptr, vec![Type::Ptr, Type::I64, Type::Ptr]),
            vec!["state".into(), "pc".into(), "memory".into()],
            vec![block],
        );
        module.add_function(name, function).map_err(LiftError::Module)
    }
}
