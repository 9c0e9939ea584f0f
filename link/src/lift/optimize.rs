use crate::ir::*;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub inlined: usize,
    pub removed: usize,
}

// callees are inlined only if straight-line: one block ending in ret
fn inlinable(module: &Module, caller: SymbolId, callee: SymbolId) -> Option<Function> {
    if caller == callee {
        return None;
    }
    let f = module.function(callee)?;
    match f.blocks.as_deref() {
        Some([block]) => {
            let (last, body) = block.instructions.split_last()?;
            if last.opcode == Opcode::Ret && body.iter().all(|i| !i.opcode.is_terminator()) {
                Some(f.clone())
            } else {
                None
            }
        }
        _ => None,
    }
}

fn locals(f: &Function) -> HashSet<String> {
    f.params
        .iter()
        .cloned()
        .chain(f.instructions().filter_map(|i| i.result.clone()))
        .collect()
}

fn resolve(subst: &HashMap<String, Value>, value: &Value) -> Value {
    let mut v = value;
    let mut seen = 0;
    while let Value::Local(name) = v {
        match subst.get(name) {
            Some(next) if seen <= subst.len() => {
                v = next;
                seen += 1;
            }
            _ => break,
        }
    }
    v.clone()
}

/// Expand one call site. Returns the instructions replacing the call and the
/// value the call's result now stands for.
fn expand(
    call: &Instruction,
    callee: &Function,
    suffix: &str,
) -> (Vec<Instruction>, Option<Value>) {
    let mut map: HashMap<&str, Value> = HashMap::new();
    for (param, arg) in callee.params.iter().zip(call.operands.iter().skip(1)) {
        map.insert(param.as_str(), arg.clone());
    }
    let renamed = |name: &str| format!("{}{}", name, suffix);
    for inst in callee.instructions() {
        if let Some(r) = &inst.result {
            map.insert(r.as_str(), Value::Local(renamed(r.as_str())));
        }
    }
    let subst = |v: &Value| match v {
        Value::Local(name) => map.get(name.as_str()).cloned().unwrap_or_else(|| v.clone()),
        _ => v.clone(),
    };

    let mut out = vec![];
    let mut ret = None;
    for inst in callee.instructions() {
        if inst.opcode == Opcode::Ret {
            ret = inst.operands.first().map(&subst);
            break;
        }
        out.push(Instruction {
            result: inst.result.as_deref().map(renamed),
            opcode: inst.opcode,
            ty: inst.ty,
            operands: inst.operands.iter().map(&subst).collect(),
        });
    }
    (out, ret)
}

fn inline_round(module: &Module, id: SymbolId, f: &mut Function, next: &mut usize) -> usize {
    let mut inlined = 0;
    let mut taken = locals(f);
    let mut subst: HashMap<String, Value> = HashMap::new();
    let blocks = match f.blocks.as_mut() {
        Some(b) => b,
        None => return 0,
    };

    for block in blocks.iter_mut() {
        let mut out = Vec::with_capacity(block.instructions.len());
        for inst in block.instructions.drain(..) {
            let callee = inst
                .callee()
                .and_then(|c| inlinable(module, id, c).map(|f| (c, f)));
            let (callee_id, callee) = match callee {
                Some(c) => c,
                None => {
                    out.push(inst);
                    continue;
                }
            };

            // pick a suffix that no existing local already carries
            let names = locals(&callee);
            let suffix = loop {
                let s = format!(".i{}", next);
                *next += 1;
                if names.iter().all(|n| !taken.contains(&format!("{}{}", n, s))) {
                    break s;
                }
            };

            let (body, ret) = expand(&inst, &callee, &suffix);
            log::debug!(
                "inline @{} into @{}: {} instructions",
                module.name_of(callee_id),
                module.name_of(id),
                body.len()
            );
            taken.extend(body.iter().filter_map(|i| i.result.clone()));
            out.extend(body);
            if let (Some(r), Some(v)) = (inst.result, ret) {
                subst.insert(r, v);
            }
            inlined += 1;
        }
        block.instructions = out;
    }

    if !subst.is_empty() {
        for inst in blocks.iter_mut().flat_map(|b| b.instructions.iter_mut()) {
            for op in inst.operands.iter_mut() {
                *op = resolve(&subst, op);
            }
        }
    }
    inlined
}

fn eliminate_dead(f: &mut Function) -> usize {
    let blocks = match f.blocks.as_mut() {
        Some(b) => b,
        None => return 0,
    };
    let mut removed = 0;
    loop {
        let used: HashSet<String> = blocks
            .iter()
            .flat_map(|b| b.instructions.iter())
            .flat_map(|i| i.operands.iter())
            .filter_map(|v| match v {
                Value::Local(name) => Some(name.clone()),
                _ => None,
            })
            .collect();
        let before: usize = blocks.iter().map(|b| b.instructions.len()).sum();
        for block in blocks.iter_mut() {
            block.instructions.retain(|i| match &i.result {
                Some(r) if i.opcode.is_pure() => used.contains(r),
                _ => true,
            });
        }
        let after: usize = blocks.iter().map(|b| b.instructions.len()).sum();
        if after == before {
            return removed;
        }
        removed += before - after;
    }
}

/// Inline straight-line callees into each of `functions`, then drop pure
/// instructions whose results are never used.
pub fn optimize(module: &mut Module, functions: &[SymbolId]) -> OptimizeStats {
    let mut stats = OptimizeStats::default();
    for &id in functions {
        let mut f = match module.function(id) {
            Some(f) if !f.is_declaration() => f.clone(),
            _ => continue,
        };
        let mut next = 0;
        // nested callees get inlined on later rounds; bounded for recursion
        for _ in 0..16 {
            let n = inline_round(module, id, &mut f, &mut next);
            if n == 0 {
                break;
            }
            stats.inlined += n;
        }
        stats.removed += eliminate_dead(&mut f);
        if let Some(slot) = module.function_mut(id) {
            *slot = f;
        }
    }
    log::debug!(
        "optimize: {} calls inlined, {} instructions removed",
        stats.inlined,
        stats.removed
    );
    stats
}
