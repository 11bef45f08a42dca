//! Module, Function and Basic Block containers
//!
//! The module owns the type table and the value arena and is the root
//! lifetime scope for everything the IR refers to. Functions own an ordered
//! block list (first block is the entry), blocks own an ordered instruction
//! list. Predecessor/successor edges are not stored; they are derived from
//! terminator operands and block use-sets, so they can never go stale.

use crate::instruction::Opcode;
use crate::types::{TypeId, TypeTable};
use crate::value::{
    BlockData, FunctionData, InstructionData, Use, ValueData, ValueId, ValueKind,
};

/// IR Module - a complete compilation unit
#[derive(Debug)]
pub struct Module {
    name: String,
    types: TypeTable,
    /// Value arena; removed values leave a tombstone so stale handles are
    /// caught instead of silently resolving to a reused slot
    pub(crate) values: Vec<Option<ValueData>>,
    pub(crate) functions: Vec<ValueId>,
    pub(crate) globals: Vec<ValueId>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: TypeTable::new(),
            values: Vec::new(),
            functions: Vec::new(),
            globals: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    pub(crate) fn alloc(&mut self, data: ValueData) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(Some(data));
        id
    }

    /// Look up a value; using a removed value is an IR consistency bug
    pub fn value(&self, id: ValueId) -> &ValueData {
        self.values[id.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("use of removed value v{}", id.0))
    }

    pub(crate) fn value_mut(&mut self, id: ValueId) -> &mut ValueData {
        self.values[id.index()]
            .as_mut()
            .unwrap_or_else(|| panic!("use of removed value v{}", id.0))
    }

    pub fn ty_of(&self, id: ValueId) -> TypeId {
        self.value(id).ty
    }

    // ---- constants ----

    pub fn const_int(&mut self, v: i32) -> ValueId {
        let ty = self.types.int32_ty();
        self.alloc(ValueData::new(ty, None, ValueKind::ConstInt(v)))
    }

    pub fn const_float(&mut self, v: f32) -> ValueId {
        let ty = self.types.float_ty();
        self.alloc(ValueData::new(ty, None, ValueKind::ConstFloat(v)))
    }

    /// Zero of any type; used for scalar and aggregate initializers
    pub fn const_zero(&mut self, ty: TypeId) -> ValueId {
        self.alloc(ValueData::new(ty, None, ValueKind::ConstZero))
    }

    // ---- globals ----

    /// Create a global variable; the value itself has pointer type, the
    /// pointee type and initializer are fixed at creation
    pub fn add_global(&mut self, name: &str, pointee: TypeId, initializer: ValueId) -> ValueId {
        let ty = self.types.pointer_to(pointee);
        let id = self.alloc(ValueData::new(
            ty,
            Some(name.to_string()),
            ValueKind::Global { initializer },
        ));
        self.globals.push(id);
        id
    }

    pub fn globals(&self) -> &[ValueId] {
        &self.globals
    }

    pub fn global_initializer(&self, global: ValueId) -> ValueId {
        match &self.value(global).kind {
            ValueKind::Global { initializer } => *initializer,
            _ => panic!("value is not a global"),
        }
    }

    // ---- functions ----

    /// Create a function along with its argument values. `is_declaration`
    /// marks an external function that will never get a body.
    pub fn add_function(
        &mut self,
        name: &str,
        ret: TypeId,
        params: &[TypeId],
        is_declaration: bool,
    ) -> ValueId {
        let fn_ty = self.types.function_of(ret, params.to_vec());
        let func = self.alloc(ValueData::new(
            fn_ty,
            Some(name.to_string()),
            ValueKind::Function(FunctionData {
                params: Vec::new(),
                blocks: Vec::new(),
                is_declaration,
            }),
        ));
        let mut args = Vec::with_capacity(params.len());
        for (index, &ty) in params.iter().enumerate() {
            let arg = self.alloc(ValueData::new(
                ty,
                Some(format!("arg{index}")),
                ValueKind::Argument {
                    function: func,
                    index: index as u32,
                },
            ));
            args.push(arg);
        }
        match &mut self.value_mut(func).kind {
            ValueKind::Function(data) => data.params = args,
            _ => unreachable!(),
        }
        self.functions.push(func);
        func
    }

    pub fn functions(&self) -> &[ValueId] {
        &self.functions
    }

    pub fn get_function(&self, name: &str) -> Option<ValueId> {
        self.functions
            .iter()
            .copied()
            .find(|&f| self.value(f).name.as_deref() == Some(name))
    }

    fn function_data(&self, func: ValueId) -> &FunctionData {
        self.value(func)
            .as_function()
            .unwrap_or_else(|| panic!("value v{} is not a function", func.0))
    }

    pub fn function_params(&self, func: ValueId) -> &[ValueId] {
        &self.function_data(func).params
    }

    pub fn function_blocks(&self, func: ValueId) -> &[ValueId] {
        &self.function_data(func).blocks
    }

    pub fn is_declaration(&self, func: ValueId) -> bool {
        self.function_data(func).is_declaration
    }

    pub fn entry_block(&self, func: ValueId) -> Option<ValueId> {
        self.function_data(func).blocks.first().copied()
    }

    pub fn function_return_type(&self, func: ValueId) -> TypeId {
        self.types
            .return_type(self.ty_of(func))
            .expect("function value carries a function type")
    }

    // ---- blocks ----

    /// Create a basic block and append it to the function's block list
    pub fn append_block(&mut self, func: ValueId) -> ValueId {
        let ty = self.types.void_ty();
        let block = self.alloc(ValueData::new(
            ty,
            None,
            ValueKind::Block(BlockData {
                function: func,
                instructions: Vec::new(),
            }),
        ));
        match &mut self.value_mut(func).kind {
            ValueKind::Function(data) => data.blocks.push(block),
            _ => panic!("append_block target v{} is not a function", func.0),
        }
        block
    }

    fn block_data(&self, block: ValueId) -> &BlockData {
        self.value(block)
            .as_block()
            .unwrap_or_else(|| panic!("value v{} is not a basic block", block.0))
    }

    pub fn block_instructions(&self, block: ValueId) -> &[ValueId] {
        &self.block_data(block).instructions
    }

    pub fn block_function(&self, block: ValueId) -> ValueId {
        self.block_data(block).function
    }

    pub fn terminator(&self, block: ValueId) -> Option<ValueId> {
        let last = *self.block_data(block).instructions.last()?;
        self.instruction(last)
            .opcode
            .is_terminator()
            .then_some(last)
    }

    pub fn is_terminated(&self, block: ValueId) -> bool {
        self.terminator(block).is_some()
    }

    /// Successor blocks, read off the terminator's block operands
    pub fn successors(&self, block: ValueId) -> Vec<ValueId> {
        let Some(term) = self.terminator(block) else {
            return Vec::new();
        };
        self.instruction(term)
            .operands
            .iter()
            .copied()
            .filter(|&op| self.value(op).is_block())
            .collect()
    }

    /// Predecessor blocks, read off the uses of this block value that come
    /// from terminators (phi references do not create CFG edges). Sorted for
    /// deterministic iteration.
    pub fn predecessors(&self, block: ValueId) -> Vec<ValueId> {
        let mut preds: Vec<ValueId> = self
            .value(block)
            .uses()
            .iter()
            .filter_map(|u: &Use| {
                let inst = self.value(u.user).as_instruction()?;
                if inst.opcode.is_terminator() {
                    inst.block
                } else {
                    None
                }
            })
            .collect();
        preds.sort();
        preds.dedup();
        preds
    }

    // ---- instructions ----

    pub fn instruction(&self, inst: ValueId) -> &InstructionData {
        self.value(inst)
            .as_instruction()
            .unwrap_or_else(|| panic!("value v{} is not an instruction", inst.0))
    }

    pub fn opcode_of(&self, inst: ValueId) -> Opcode {
        self.instruction(inst).opcode
    }

    pub fn operands_of(&self, inst: ValueId) -> &[ValueId] {
        &self.instruction(inst).operands
    }

    pub fn operand(&self, inst: ValueId, index: usize) -> ValueId {
        self.instruction(inst).operands[index]
    }

    pub fn parent_block(&self, inst: ValueId) -> Option<ValueId> {
        self.instruction(inst).block
    }

    /// Function an instruction belongs to, through its parent block
    pub fn parent_function(&self, inst: ValueId) -> Option<ValueId> {
        self.parent_block(inst).map(|b| self.block_function(b))
    }

    /// Callee of a call instruction (operand 0 by convention)
    pub fn call_callee(&self, call: ValueId) -> ValueId {
        let data = self.instruction(call);
        debug_assert_eq!(data.opcode, Opcode::Call, "call_callee on non-call");
        data.operands[0]
    }

    /// Arguments of a call instruction, without the callee
    pub fn call_args(&self, call: ValueId) -> &[ValueId] {
        let data = self.instruction(call);
        debug_assert_eq!(data.opcode, Opcode::Call, "call_args on non-call");
        &data.operands[1..]
    }

    /// The (value, predecessor block) pairs of a phi
    pub fn phi_incoming(&self, phi: ValueId) -> Vec<(ValueId, ValueId)> {
        let data = self.instruction(phi);
        debug_assert_eq!(data.opcode, Opcode::Phi, "phi_incoming on non-phi");
        debug_assert_eq!(data.operands.len() % 2, 0, "phi operand list not paired");
        data.operands
            .chunks(2)
            .map(|pair| (pair[0], pair[1]))
            .collect()
    }
}
