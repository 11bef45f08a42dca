//! Dead code elimination
//!
//! Mark-sweep over the use-def graph, run to a fixed point: each round
//! prunes unreachable blocks, marks live instructions and sweeps the rest,
//! and the loop repeats until a round changes nothing. Afterwards unused
//! non-entry functions and unused globals are pruned. Every round only
//! removes elements, so the fixed point always converges.
//!
//! An instruction is critical (never swept) if it is a terminator, a store
//! or a phi; a call is critical unless its callee is statically known and
//! proven pure; anything else is critical only while its use-set is
//! non-empty. Liveness propagates backward from the critical set along
//! same-function operands.

use super::{Pass, PurityOracle};
use crate::instruction::Opcode;
use crate::module::Module;
use crate::value::ValueId;
use log::{info, trace};
use std::collections::{HashSet, VecDeque};

/// The program entry point, exempt from function pruning
const ENTRY_FUNCTION: &str = "main";

pub struct DeadCodeElimination<'p> {
    purity: &'p dyn PurityOracle,
    eliminated: usize,
}

impl<'p> DeadCodeElimination<'p> {
    /// The purity analysis must cover every function in the module and is
    /// treated as valid for the whole pass
    pub fn new(purity: &'p dyn PurityOracle) -> Self {
        Self {
            purity,
            eliminated: 0,
        }
    }

    /// Number of instructions swept so far
    pub fn eliminated(&self) -> usize {
        self.eliminated
    }

    /// Remove blocks with no predecessors (other than the entry block).
    ///
    /// A round condemns the closure of blocks whose predecessors are all
    /// condemned themselves, so a straight-line unreachable chain disappears
    /// at once and no condemned instruction outlives a reference from a
    /// block condemned in the same round. Unreachable cycles keep non-empty
    /// predecessor sets and are left alone.
    fn prune_unreachable_blocks(&mut self, module: &mut Module, func: ValueId) -> bool {
        let blocks = module.function_blocks(func).to_vec();
        let Some(&entry) = blocks.first() else {
            return false;
        };

        let mut condemned: HashSet<ValueId> = HashSet::new();
        loop {
            let mut grew = false;
            for &block in &blocks {
                if block == entry || condemned.contains(&block) {
                    continue;
                }
                let preds = module.predecessors(block);
                if preds.iter().all(|p| condemned.contains(p)) {
                    condemned.insert(block);
                    grew = true;
                }
            }
            if !grew {
                break;
            }
        }

        if condemned.is_empty() {
            return false;
        }
        let batch: Vec<ValueId> = blocks
            .iter()
            .copied()
            .filter(|b| condemned.contains(b))
            .collect();
        trace!("pruning {} unreachable block(s)", batch.len());
        module.remove_blocks(func, &batch);
        true
    }

    fn is_critical(&self, module: &Module, inst: ValueId) -> bool {
        match module.opcode_of(inst) {
            Opcode::Ret | Opcode::Br | Opcode::Store | Opcode::Phi => true,
            Opcode::Call => {
                let callee = module.call_callee(inst);
                !module.value(callee).is_function() || !self.purity.is_pure(callee)
            }
            _ => !module.value(inst).uses().is_empty(),
        }
    }

    /// Seed the critical set, then propagate liveness backward along
    /// operands that are instructions of the same function
    fn mark(&self, module: &Module, func: ValueId) -> HashSet<ValueId> {
        let mut marked = HashSet::new();
        let mut work_list = VecDeque::new();

        for &block in module.function_blocks(func) {
            for &inst in module.block_instructions(block) {
                if self.is_critical(module, inst) && marked.insert(inst) {
                    work_list.push_back(inst);
                }
            }
        }

        while let Some(inst) = work_list.pop_front() {
            for &op in module.operands_of(inst) {
                if !module.value(op).is_instruction() {
                    continue;
                }
                if module.parent_function(op) != Some(func) {
                    continue;
                }
                if marked.insert(op) {
                    work_list.push_back(op);
                }
            }
        }

        marked
    }

    /// Remove every unmarked instruction, severing its operand edges first
    /// so downstream use-sets stay accurate
    fn sweep(&mut self, module: &mut Module, func: ValueId, marked: &HashSet<ValueId>) -> bool {
        let mut dead = Vec::new();
        for &block in module.function_blocks(func) {
            for &inst in module.block_instructions(block) {
                if !marked.contains(&inst) {
                    dead.push(inst);
                }
            }
        }
        for &inst in &dead {
            trace!("sweeping dead '{}' instruction", module.opcode_of(inst));
        }
        // batch removal: a dead pure call may still be referenced by another
        // dead instruction until the whole set is severed
        module.remove_instructions(&dead);
        self.eliminated += dead.len();
        !dead.is_empty()
    }

    /// Remove unused non-entry functions and unused globals. Repeats until
    /// stable: unlinking one dead function can unreference another.
    fn prune_module_items(&mut self, module: &mut Module) -> bool {
        let mut changed = false;
        for func in module.functions().to_vec() {
            if module.value(func).name.as_deref() == Some(ENTRY_FUNCTION) {
                continue;
            }
            if module.value(func).uses().is_empty() {
                trace!(
                    "removing unused function '{}'",
                    module.value(func).name.as_deref().unwrap_or("?")
                );
                module.remove_function(func);
                changed = true;
            }
        }
        for global in module.globals().to_vec() {
            if module.value(global).uses().is_empty() {
                trace!(
                    "removing unused global '{}'",
                    module.value(global).name.as_deref().unwrap_or("?")
                );
                module.remove_global(global);
                changed = true;
            }
        }
        changed
    }
}

impl Pass for DeadCodeElimination<'_> {
    fn name(&self) -> &'static str {
        "dead-code"
    }

    fn run(&mut self, module: &mut Module) {
        loop {
            let mut changed = false;
            for func in module.functions().to_vec() {
                if module.is_declaration(func) {
                    continue;
                }
                // block pruning must precede marking: instructions in
                // unreachable blocks must not keep operands alive
                changed |= self.prune_unreachable_blocks(module, func);
                let marked = self.mark(module, func);
                changed |= self.sweep(module, func, &marked);
            }
            if !changed {
                break;
            }
        }
        while self.prune_module_items(module) {}
        info!("dead code pass eliminated {} instructions", self.eliminated);
    }
}
