//! IR verifier - checks structural invariants of the IR
//!
//! Catches bugs in lowering and in passes before they turn into mysterious
//! downstream failures. The two invariants every pass depends on:
//!
//! - use-def symmetry: `I.operand(k) == V` exactly when `V`'s use-set
//!   contains `(I, k)`
//! - terminator invariant: every block of a defined function ends with
//!   exactly one terminator, in last position

use crate::instruction::Opcode;
use crate::module::Module;
use crate::value::{Use, ValueId, ValueKind};

/// Result of IR verification
#[derive(Debug)]
pub struct VerifyResult {
    pub errors: Vec<String>,
}

impl VerifyResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Verify an entire IR module
pub fn verify_module(module: &Module) -> VerifyResult {
    let mut errors = Vec::new();

    let mut seen_names = std::collections::HashSet::new();
    for &func in module.functions() {
        if let Some(name) = module.value(func).name.as_deref() {
            if !seen_names.insert(name.to_string()) {
                errors.push(format!("duplicate function name '{name}'"));
            }
        }
    }

    for &func in module.functions() {
        verify_function(module, func, &mut errors);
    }

    verify_use_sets(module, &mut errors);

    VerifyResult { errors }
}

fn verify_function(module: &Module, func: ValueId, errors: &mut Vec<String>) {
    let name = module.value(func).name.clone().unwrap_or_default();
    if module.is_declaration(func) {
        if !module.function_blocks(func).is_empty() {
            errors.push(format!("declaration '{name}' has a body"));
        }
        return;
    }

    if module.entry_block(func).is_none() {
        errors.push(format!("function '{name}' has no entry block"));
    }

    for &block in module.function_blocks(func) {
        if module.block_function(block) != func {
            errors.push(format!(
                "block in '{name}' has a stale function back-reference"
            ));
        }

        let instructions = module.block_instructions(block);
        match instructions.last() {
            None => errors.push(format!("empty block in '{name}'")),
            Some(&last) => {
                if !module.opcode_of(last).is_terminator() {
                    errors.push(format!("block in '{name}' does not end in a terminator"));
                }
            }
        }
        for &inst in instructions.iter().rev().skip(1) {
            if module.opcode_of(inst).is_terminator() {
                errors.push(format!(
                    "terminator in the middle of a block in '{name}'"
                ));
            }
        }

        for &inst in instructions {
            verify_instruction(module, func, block, inst, errors);
        }
    }
}

fn verify_instruction(
    module: &Module,
    func: ValueId,
    block: ValueId,
    inst: ValueId,
    errors: &mut Vec<String>,
) {
    let name = module.value(func).name.clone().unwrap_or_default();
    let data = module.instruction(inst);

    if data.block != Some(block) {
        errors.push(format!(
            "instruction in '{name}' has a stale block back-reference"
        ));
    }

    for (k, &op) in data.operands.iter().enumerate() {
        let edge = Use {
            user: inst,
            index: k as u32,
        };
        if !module.value(op).uses().contains(&edge) {
            errors.push(format!(
                "use-def symmetry broken in '{name}': operand {k} of {} has no back-edge",
                data.opcode
            ));
        }
    }

    match data.opcode {
        Opcode::Phi => {
            if data.operands.len() % 2 != 0 {
                errors.push(format!("phi in '{name}' has an unpaired operand list"));
            } else {
                for pair in data.operands.chunks(2) {
                    if !module.value(pair[1]).is_block() {
                        errors.push(format!(
                            "phi in '{name}' pairs a value with a non-block"
                        ));
                    }
                }
            }
        }
        Opcode::Call => {
            if data.operands.is_empty() || !module.value(data.operands[0]).is_function() {
                errors.push(format!("call in '{name}' has no function callee"));
            }
        }
        _ => {}
    }
}

/// The reverse direction of use-def symmetry, over the whole arena
fn verify_use_sets(module: &Module, errors: &mut Vec<String>) {
    for (raw, slot) in module.values.iter().enumerate() {
        let Some(data) = slot else { continue };
        let id = ValueId(raw as u32);
        for &Use { user, index } in data.uses.iter() {
            let Some(user_data) = module.values[user.index()].as_ref() else {
                errors.push(format!("value has a use from a removed user (slot {raw})"));
                continue;
            };
            match &user_data.kind {
                ValueKind::Instruction(inst) => {
                    if inst.operands.get(index as usize) != Some(&id) {
                        errors.push(format!(
                            "use-def symmetry broken: stale back-edge at operand {index} (slot {raw})"
                        ));
                    }
                }
                _ => errors.push(format!("non-instruction user recorded in a use-set (slot {raw})")),
            }
        }
    }
}
