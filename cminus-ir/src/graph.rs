//! Use-def bookkeeping and structural mutation
//!
//! Every edit of the graph goes through these methods so both directions of
//! the use-def relation stay consistent: a user's operand list and the
//! operand's use-set are updated together, always. Deleting a value requires
//! an empty use-set; that precondition is a debug assertion because a
//! violation is a bug in a pass, not a user-facing error.

use crate::instruction::Opcode;
use crate::module::Module;
use crate::types::TypeId;
use crate::value::{InstructionData, Use, ValueData, ValueId, ValueKind};
use std::collections::HashSet;

impl Module {
    /// Create a detached instruction; operand back-edges are registered
    /// immediately
    pub fn create_instruction(
        &mut self,
        opcode: Opcode,
        ty: TypeId,
        operands: &[ValueId],
    ) -> ValueId {
        let inst = self.alloc(ValueData::new(
            ty,
            None,
            ValueKind::Instruction(InstructionData {
                opcode,
                operands: Vec::new(),
                block: None,
            }),
        ));
        for &op in operands {
            self.add_operand(inst, op);
        }
        inst
    }

    /// Attach a detached instruction at the end of a block
    pub fn insert_at_end(&mut self, block: ValueId, inst: ValueId) {
        debug_assert!(
            !self.is_terminated(block),
            "inserting an instruction after a terminator"
        );
        {
            let data = self.instruction_mut(inst);
            debug_assert!(data.block.is_none(), "instruction is already attached");
            data.block = Some(block);
        }
        self.block_instructions_mut(block).push(inst);
    }

    /// Append `value` to `user`'s operand list and register the back-edge
    pub fn add_operand(&mut self, user: ValueId, value: ValueId) {
        let index = self.instruction(user).operands.len() as u32;
        self.instruction_mut(user).operands.push(value);
        self.value_mut(value).uses.insert(Use { user, index });
    }

    /// Remove the operand at `index`, shifting the back-edges of every
    /// following operand down by one. Returns the removed value.
    pub fn remove_operand(&mut self, user: ValueId, index: usize) -> ValueId {
        let operands = self.instruction(user).operands.clone();
        let removed = operands[index];

        let had = self.value_mut(removed).uses.remove(&Use {
            user,
            index: index as u32,
        });
        debug_assert!(had, "use-def symmetry broken: back-edge missing on removal");

        for (j, &op) in operands.iter().enumerate().skip(index + 1) {
            let uses = &mut self.value_mut(op).uses;
            let had = uses.remove(&Use {
                user,
                index: j as u32,
            });
            debug_assert!(had, "use-def symmetry broken: back-edge missing on shift");
            uses.insert(Use {
                user,
                index: (j - 1) as u32,
            });
        }

        self.instruction_mut(user).operands.remove(index);
        removed
    }

    /// Rewire every use of `old` to point at `new`; `old` ends up unused
    pub fn replace_all_uses_with(&mut self, old: ValueId, new: ValueId) {
        debug_assert_ne!(old, new, "replace_all_uses_with on the same value");
        let uses: Vec<Use> = self.value(old).uses.iter().copied().collect();
        for u in uses {
            self.instruction_mut(u.user).operands[u.index as usize] = new;
            self.value_mut(new).uses.insert(u);
        }
        self.value_mut(old).uses.clear();
    }

    /// Append a (value, predecessor block) pair to a phi
    pub fn add_phi_incoming(&mut self, phi: ValueId, value: ValueId, pred: ValueId) {
        debug_assert_eq!(self.opcode_of(phi), Opcode::Phi, "add_phi_incoming on non-phi");
        self.add_operand(phi, value);
        self.add_operand(phi, pred);
    }

    /// Remove exactly the pair whose predecessor is `pred`; no-op if absent
    pub fn remove_phi_incoming(&mut self, phi: ValueId, pred: ValueId) {
        debug_assert_eq!(self.opcode_of(phi), Opcode::Phi, "remove_phi_incoming on non-phi");
        let operands = &self.instruction(phi).operands;
        let pos = (0..operands.len() / 2).find(|&i| operands[2 * i + 1] == pred);
        if let Some(i) = pos {
            // second removal picks up the block operand shifted into place
            self.remove_operand(phi, 2 * i);
            self.remove_operand(phi, 2 * i);
        }
    }

    /// Drop every operand edge of an instruction, leaving it with an empty
    /// operand list but keeping it in place
    fn sever_operands(&mut self, inst: ValueId) {
        let operands = std::mem::take(&mut self.instruction_mut(inst).operands);
        for (i, op) in operands.into_iter().enumerate() {
            let had = self.value_mut(op).uses.remove(&Use {
                user: inst,
                index: i as u32,
            });
            debug_assert!(had, "use-def symmetry broken: back-edge missing on sever");
        }
    }

    /// Remove an instruction: sever its operand edges, detach it from its
    /// block, and release the arena slot. The instruction must be unused.
    pub fn remove_instruction(&mut self, inst: ValueId) {
        debug_assert!(
            self.value(inst).uses.is_empty(),
            "removing an instruction while it still has uses"
        );
        self.sever_operands(inst);
        if let Some(block) = self.instruction(inst).block {
            self.block_instructions_mut(block).retain(|&i| i != inst);
        }
        self.free(inst);
    }

    /// Remove a batch of instructions that may reference each other
    ///
    /// All operand edges in the batch are severed before anything is freed,
    /// so the removal order inside the batch does not matter. After
    /// severing, each instruction must be unused.
    pub fn remove_instructions(&mut self, insts: &[ValueId]) {
        for &inst in insts {
            self.sever_operands(inst);
        }
        for &inst in insts {
            self.remove_instruction(inst);
        }
    }

    /// Remove a batch of blocks from one function
    ///
    /// The batch is severed before any slot is freed, so blocks in the batch
    /// may reference each other freely; phis in surviving successors lose
    /// their incoming pairs for the removed blocks first. Every block in the
    /// batch must have all of its predecessors inside the batch.
    pub fn remove_blocks(&mut self, func: ValueId, blocks: &[ValueId]) {
        let condemned: HashSet<ValueId> = blocks.iter().copied().collect();

        for &block in blocks {
            for succ in self.successors(block) {
                if condemned.contains(&succ) {
                    continue;
                }
                let phis: Vec<ValueId> = self
                    .block_instructions(succ)
                    .iter()
                    .copied()
                    .filter(|&i| self.opcode_of(i) == Opcode::Phi)
                    .collect();
                for phi in phis {
                    self.remove_phi_incoming(phi, block);
                }
            }
        }

        for &block in blocks {
            for inst in self.block_instructions(block).to_vec() {
                self.sever_operands(inst);
            }
        }

        for &block in blocks {
            for inst in self.block_instructions(block).to_vec() {
                debug_assert!(
                    self.value(inst).uses.is_empty(),
                    "instruction in removed block still used from a surviving block"
                );
                self.free(inst);
            }
            debug_assert!(
                self.value(block).uses.is_empty(),
                "removed block is still referenced"
            );
            match &mut self.value_mut(func).kind {
                ValueKind::Function(data) => data.blocks.retain(|&b| b != block),
                _ => panic!("remove_blocks target is not a function"),
            }
            self.free(block);
        }
    }

    /// Remove a single unreachable block
    pub fn remove_block(&mut self, block: ValueId) {
        let func = self.block_function(block);
        self.remove_blocks(func, &[block]);
    }

    /// Remove a function and everything it owns. The function value itself
    /// must be unused (no remaining calls or references).
    pub fn remove_function(&mut self, func: ValueId) {
        debug_assert!(
            self.value(func).uses.is_empty(),
            "removing function while it still has uses"
        );
        let (blocks, params) = {
            let data = self
                .value(func)
                .as_function()
                .expect("remove_function on non-function");
            (data.blocks.clone(), data.params.clone())
        };
        for &block in &blocks {
            for inst in self.block_instructions(block).to_vec() {
                self.sever_operands(inst);
            }
        }
        for &block in &blocks {
            for inst in self.block_instructions(block).to_vec() {
                self.free(inst);
            }
            self.free(block);
        }
        for arg in params {
            debug_assert!(
                self.value(arg).uses.is_empty(),
                "argument of removed function still used outside it"
            );
            self.free(arg);
        }
        self.functions.retain(|&f| f != func);
        self.free(func);
    }

    /// Remove an unused global variable
    pub fn remove_global(&mut self, global: ValueId) {
        debug_assert!(
            self.value(global).is_global(),
            "remove_global on non-global"
        );
        debug_assert!(
            self.value(global).uses.is_empty(),
            "removing global while it still has uses"
        );
        self.globals.retain(|&g| g != global);
        self.free(global);
    }

    /// Structural clone: a new instruction of the same kind and type whose
    /// operands reference the same values (no deep copy), appended to
    /// `target`. A call with no arguments clones with no arguments; the
    /// callee stays operand 0.
    pub fn clone_instruction(&mut self, inst: ValueId, target: ValueId) -> ValueId {
        let data = self.instruction(inst);
        let (opcode, operands) = (data.opcode, data.operands.clone());
        let ty = self.ty_of(inst);
        let clone = self.create_instruction(opcode, ty, &operands);
        self.insert_at_end(target, clone);
        clone
    }

    // ---- internal helpers ----

    fn instruction_mut(&mut self, inst: ValueId) -> &mut InstructionData {
        match &mut self.value_mut(inst).kind {
            ValueKind::Instruction(data) => data,
            _ => panic!("value is not an instruction"),
        }
    }

    fn block_instructions_mut(&mut self, block: ValueId) -> &mut Vec<ValueId> {
        match &mut self.value_mut(block).kind {
            ValueKind::Block(data) => &mut data.instructions,
            _ => panic!("value is not a basic block"),
        }
    }

    fn free(&mut self, id: ValueId) {
        self.values[id.index()] = None;
    }
}
