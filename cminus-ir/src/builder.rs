//! IR Builder
//!
//! Owns the module under construction plus one insertion point, and provides
//! `build_*` methods that compute result types per opcode, create the
//! instruction and append it to the current block. Misuse (no insertion
//! point, operand type mismatches) is a programming error and asserts.

use crate::instruction::Opcode;
use crate::module::Module;
use crate::types::TypeId;
use crate::value::ValueId;

/// Builder for constructing IR
pub struct IrBuilder {
    pub module: Module,
    insert_block: Option<ValueId>,
}

impl IrBuilder {
    pub fn new(module: Module) -> Self {
        Self {
            module,
            insert_block: None,
        }
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    pub fn append_block(&mut self, func: ValueId) -> ValueId {
        self.module.append_block(func)
    }

    pub fn set_insert_point(&mut self, block: ValueId) {
        self.insert_block = Some(block);
    }

    pub fn insert_block(&self) -> Option<ValueId> {
        self.insert_block
    }

    /// Whether the current block already ends in a terminator
    pub fn is_terminated(&self) -> bool {
        self.insert_block
            .is_some_and(|b| self.module.is_terminated(b))
    }

    fn block(&self) -> ValueId {
        self.insert_block.expect("no insertion point set")
    }

    fn insert(&mut self, opcode: Opcode, ty: TypeId, operands: &[ValueId]) -> ValueId {
        let block = self.block();
        let inst = self.module.create_instruction(opcode, ty, operands);
        self.module.insert_at_end(block, inst);
        inst
    }

    /// Integer or float arithmetic; both operands must share the result type
    pub fn build_binary(&mut self, op: Opcode, lhs: ValueId, rhs: ValueId) -> ValueId {
        debug_assert!(op.is_binary(), "build_binary with non-arithmetic opcode");
        debug_assert_eq!(
            self.module.ty_of(lhs),
            self.module.ty_of(rhs),
            "arithmetic on mixed operand types"
        );
        let ty = if op.is_int_binary() {
            self.module.types().int32_ty()
        } else {
            self.module.types().float_ty()
        };
        self.insert(op, ty, &[lhs, rhs])
    }

    /// Integer or float comparison; always produces i1
    pub fn build_cmp(&mut self, op: Opcode, lhs: ValueId, rhs: ValueId) -> ValueId {
        debug_assert!(op.is_cmp(), "build_cmp with non-compare opcode");
        debug_assert_eq!(
            self.module.ty_of(lhs),
            self.module.ty_of(rhs),
            "comparison on mixed operand types"
        );
        let ty = self.module.types().int1_ty();
        self.insert(op, ty, &[lhs, rhs])
    }

    /// Stack allocation; the result is a pointer to the allocated type
    pub fn build_alloca(&mut self, allocated: TypeId) -> ValueId {
        let ty = self.module.types_mut().pointer_to(allocated);
        self.insert(Opcode::Alloca, ty, &[])
    }

    pub fn build_load(&mut self, ptr: ValueId) -> ValueId {
        let ty = self
            .module
            .types()
            .pointee(self.module.ty_of(ptr))
            .expect("load from a non-pointer");
        self.insert(Opcode::Load, ty, &[ptr])
    }

    pub fn build_store(&mut self, value: ValueId, ptr: ValueId) -> ValueId {
        debug_assert_eq!(
            self.module.types().pointee(self.module.ty_of(ptr)),
            Some(self.module.ty_of(value)),
            "store value type does not match pointee type"
        );
        let ty = self.module.types().void_ty();
        self.insert(Opcode::Store, ty, &[value, ptr])
    }

    /// Element address computation. The first index steps through the
    /// pointer, each further index steps into an array layer; the result is
    /// a pointer to the type reached.
    pub fn build_gep(&mut self, ptr: ValueId, indices: &[ValueId]) -> ValueId {
        debug_assert!(!indices.is_empty(), "getelementptr needs at least one index");
        let mut cur = self
            .module
            .types()
            .pointee(self.module.ty_of(ptr))
            .expect("getelementptr base is not a pointer");
        for _ in &indices[1..] {
            cur = self
                .module
                .types()
                .array_elem(cur)
                .expect("getelementptr index walks a non-array type");
        }
        let ty = self.module.types_mut().pointer_to(cur);
        let mut operands = vec![ptr];
        operands.extend_from_slice(indices);
        self.insert(Opcode::GetElementPtr, ty, &operands)
    }

    /// Call; the callee becomes operand 0, arguments follow
    pub fn build_call(&mut self, callee: ValueId, args: &[ValueId]) -> ValueId {
        let fn_ty = self.module.ty_of(callee);
        debug_assert_eq!(
            self.module.types().param_types(fn_ty).map(<[TypeId]>::len),
            Some(args.len()),
            "call argument count does not match callee arity"
        );
        let ty = self
            .module
            .types()
            .return_type(fn_ty)
            .expect("call target is not of function type");
        let mut operands = vec![callee];
        operands.extend_from_slice(args);
        self.insert(Opcode::Call, ty, &operands)
    }

    /// Empty phi; incoming pairs are added with
    /// [`Module::add_phi_incoming`]
    pub fn build_phi(&mut self, ty: TypeId) -> ValueId {
        self.insert(Opcode::Phi, ty, &[])
    }

    pub fn build_ret(&mut self, value: Option<ValueId>) -> ValueId {
        let ty = self.module.types().void_ty();
        match value {
            Some(v) => self.insert(Opcode::Ret, ty, &[v]),
            None => self.insert(Opcode::Ret, ty, &[]),
        }
    }

    pub fn build_br(&mut self, target: ValueId) -> ValueId {
        debug_assert!(self.module.value(target).is_block(), "branch to non-block");
        let ty = self.module.types().void_ty();
        self.insert(Opcode::Br, ty, &[target])
    }

    pub fn build_cond_br(
        &mut self,
        cond: ValueId,
        then_block: ValueId,
        else_block: ValueId,
    ) -> ValueId {
        debug_assert_eq!(
            self.module.ty_of(cond),
            self.module.types().int1_ty(),
            "conditional branch condition must be i1"
        );
        let ty = self.module.types().void_ty();
        self.insert(Opcode::Br, ty, &[cond, then_block, else_block])
    }

    pub fn build_zext(&mut self, value: ValueId, to: TypeId) -> ValueId {
        self.insert(Opcode::ZExt, to, &[value])
    }

    pub fn build_fptosi(&mut self, value: ValueId, to: TypeId) -> ValueId {
        debug_assert!(
            self.module.types().is_float(self.module.ty_of(value)),
            "fptosi on non-float operand"
        );
        self.insert(Opcode::FpToSi, to, &[value])
    }

    pub fn build_sitofp(&mut self, value: ValueId, to: TypeId) -> ValueId {
        debug_assert!(
            self.module.types().is_integer(self.module.ty_of(value)),
            "sitofp on non-integer operand"
        );
        self.insert(Opcode::SiToFp, to, &[value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder_with_entry() -> (IrBuilder, ValueId) {
        let mut module = Module::new("test");
        let i32_ty = module.types().int32_ty();
        let func = module.add_function("f", i32_ty, &[], false);
        let mut builder = IrBuilder::new(module);
        let entry = builder.append_block(func);
        builder.set_insert_point(entry);
        (builder, entry)
    }

    #[test]
    fn test_result_types() {
        let (mut builder, _) = builder_with_entry();
        let i32_ty = builder.module.types().int32_ty();
        let i1_ty = builder.module.types().int1_ty();
        let float_ty = builder.module.types().float_ty();

        let a = builder.module.const_int(1);
        let b = builder.module.const_int(2);
        let add = builder.build_binary(Opcode::Add, a, b);
        assert_eq!(builder.module.ty_of(add), i32_ty);

        let cmp = builder.build_cmp(Opcode::Lt, a, b);
        assert_eq!(builder.module.ty_of(cmp), i1_ty);

        let slot = builder.build_alloca(float_ty);
        assert_eq!(
            builder.module.types().pointee(builder.module.ty_of(slot)),
            Some(float_ty)
        );

        let loaded = builder.build_load(slot);
        assert_eq!(builder.module.ty_of(loaded), float_ty);
    }

    #[test]
    fn test_gep_walks_array_types() {
        let (mut builder, _) = builder_with_entry();
        let i32_ty = builder.module.types().int32_ty();
        let arr_ty = builder.module.types_mut().array_of(i32_ty, 8);

        let slot = builder.build_alloca(arr_ty);
        let zero = builder.module.const_int(0);
        let idx = builder.module.const_int(3);

        // pointer-to-array with two indices lands on the element
        let elem = builder.build_gep(slot, &[zero, idx]);
        assert_eq!(
            builder.module.types().pointee(builder.module.ty_of(elem)),
            Some(i32_ty)
        );

        // plain element pointer with a single index keeps its type
        let next = builder.build_gep(elem, &[idx]);
        assert_eq!(builder.module.ty_of(next), builder.module.ty_of(elem));
    }

    #[test]
    fn test_terminated_query() {
        let (mut builder, _) = builder_with_entry();
        assert!(!builder.is_terminated());
        let zero = builder.module.const_int(0);
        builder.build_ret(Some(zero));
        assert!(builder.is_terminated());
    }

    #[test]
    fn test_call_result_type() {
        let mut module = Module::new("test");
        let i32_ty = module.types().int32_ty();
        let float_ty = module.types().float_ty();
        let callee = module.add_function("g", float_ty, &[i32_ty], true);
        let func = module.add_function("f", i32_ty, &[], false);
        let mut builder = IrBuilder::new(module);
        let entry = builder.append_block(func);
        builder.set_insert_point(entry);

        let arg = builder.module.const_int(5);
        let call = builder.build_call(callee, &[arg]);
        assert_eq!(builder.module.ty_of(call), float_ty);
        assert_eq!(builder.module.call_callee(call), callee);
        assert_eq!(builder.module.call_args(call), &[arg]);
    }
}
