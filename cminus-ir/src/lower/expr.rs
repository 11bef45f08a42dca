//! Expression lowering: numeric promotion, array decay and call coercion
//!
//! Bindings hold addresses, so every r-value use decides between three
//! shapes: scalars load, local arrays decay to an element pointer through a
//! zero-index address computation, and array parameters (pointer-to-pointer
//! slots) load to recover the element pointer. The same three-way split
//! shows up again inside indexed references.

use super::{Lowerer, LowerError};
use crate::instruction::Opcode;
use crate::types::TypeKind;
use crate::value::ValueId;
use cminus_ast::{BinaryOp, Expression, ExpressionKind, Number, VarRef};

impl Lowerer {
    /// Lower an expression to its r-value
    pub(crate) fn lower_expression(&mut self, expr: &Expression) -> Result<ValueId, LowerError> {
        match &expr.kind {
            ExpressionKind::Num(Number::Int(v)) => Ok(self.builder.module.const_int(*v)),
            ExpressionKind::Num(Number::Float(v)) => Ok(self.builder.module.const_float(*v)),
            ExpressionKind::Var(var) => {
                let addr = self.lower_var_address(var)?;
                Ok(self.load_or_decay(addr))
            }
            ExpressionKind::Assign { target, value } => self.lower_assign(target, value),
            ExpressionKind::Binary { op, left, right } => {
                let lhs = self.lower_expression(left)?;
                let rhs = self.lower_expression(right)?;
                if op.is_relational() {
                    Ok(self.lower_relational(*op, lhs, rhs))
                } else {
                    Ok(self.lower_arithmetic(*op, lhs, rhs))
                }
            }
            ExpressionKind::Call { callee, arguments } => {
                self.lower_call(callee, arguments, expr.span)
            }
        }
    }

    /// The value is stored first converted to the target's pointee type;
    /// the assignment yields the stored value
    fn lower_assign(
        &mut self,
        target: &VarRef,
        value: &Expression,
    ) -> Result<ValueId, LowerError> {
        let mut val = self.lower_expression(value)?;
        let addr = self.lower_var_address(target)?;
        let pointee = self
            .builder
            .module
            .types()
            .pointee(self.builder.module.ty_of(addr))
            .expect("assignment target is always an address");
        if pointee != self.builder.module.ty_of(val) {
            val = if self
                .builder
                .module
                .types()
                .is_integer(self.builder.module.ty_of(val))
            {
                let float = self.builder.module.types().float_ty();
                self.builder.build_sitofp(val, float)
            } else {
                let int = self.builder.module.types().int32_ty();
                self.builder.build_fptosi(val, int)
            };
        }
        self.builder.build_store(val, addr);
        Ok(val)
    }

    /// If the operand types differ, the integer side is promoted to float.
    /// Returns the adjusted operands and whether the operation is integral.
    fn promote(&mut self, lhs: ValueId, rhs: ValueId) -> (ValueId, ValueId, bool) {
        let lt = self.builder.module.ty_of(lhs);
        let rt = self.builder.module.ty_of(rhs);
        if lt == rt {
            return (lhs, rhs, self.builder.module.types().is_integer(lt));
        }
        let float = self.builder.module.types().float_ty();
        if self.builder.module.types().is_integer(lt) {
            let lhs = self.builder.build_sitofp(lhs, float);
            (lhs, rhs, false)
        } else {
            let rhs = self.builder.build_sitofp(rhs, float);
            (lhs, rhs, false)
        }
    }

    fn lower_arithmetic(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let (lhs, rhs, is_int) = self.promote(lhs, rhs);
        let opcode = match (op, is_int) {
            (BinaryOp::Add, true) => Opcode::Add,
            (BinaryOp::Sub, true) => Opcode::Sub,
            (BinaryOp::Mul, true) => Opcode::Mul,
            (BinaryOp::Div, true) => Opcode::SDiv,
            (BinaryOp::Add, false) => Opcode::FAdd,
            (BinaryOp::Sub, false) => Opcode::FSub,
            (BinaryOp::Mul, false) => Opcode::FMul,
            (BinaryOp::Div, false) => Opcode::FDiv,
            _ => unreachable!("relational operator in arithmetic lowering"),
        };
        self.builder.build_binary(opcode, lhs, rhs)
    }

    /// Comparisons produce i1 and surface as 0/1 zero-extended to i32
    fn lower_relational(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let (lhs, rhs, is_int) = self.promote(lhs, rhs);
        let opcode = match (op, is_int) {
            (BinaryOp::Lt, true) => Opcode::Lt,
            (BinaryOp::Le, true) => Opcode::Le,
            (BinaryOp::Gt, true) => Opcode::Gt,
            (BinaryOp::Ge, true) => Opcode::Ge,
            (BinaryOp::Eq, true) => Opcode::Eq,
            (BinaryOp::Ne, true) => Opcode::Ne,
            (BinaryOp::Lt, false) => Opcode::FLt,
            (BinaryOp::Le, false) => Opcode::FLe,
            (BinaryOp::Gt, false) => Opcode::FGt,
            (BinaryOp::Ge, false) => Opcode::FGe,
            (BinaryOp::Eq, false) => Opcode::FEq,
            (BinaryOp::Ne, false) => Opcode::FNe,
            _ => unreachable!("arithmetic operator in relational lowering"),
        };
        let cmp = self.builder.build_cmp(opcode, lhs, rhs);
        let int = self.builder.module.types().int32_ty();
        self.builder.build_zext(cmp, int)
    }

    fn lower_call(
        &mut self,
        callee: &str,
        arguments: &[Expression],
        span: cminus_common::SourceSpan,
    ) -> Result<ValueId, LowerError> {
        let func = self
            .scope
            .find(callee)
            .ok_or_else(|| LowerError::UndeclaredFunction {
                name: callee.to_string(),
                span,
            })?;
        if !self.builder.module.value(func).is_function() {
            return Err(LowerError::NotAFunction {
                name: callee.to_string(),
                span,
            });
        }

        let fn_ty = self.builder.module.ty_of(func);
        let param_tys = self
            .builder
            .module
            .types()
            .param_types(fn_ty)
            .expect("function value carries a function type")
            .to_vec();
        if param_tys.len() != arguments.len() {
            return Err(LowerError::ArityMismatch {
                name: callee.to_string(),
                expected: param_tys.len(),
                found: arguments.len(),
                span,
            });
        }

        // coerce each argument to the formal's declared type; pointer-typed
        // arguments (decayed arrays) are passed unchanged
        let mut args = Vec::with_capacity(arguments.len());
        for (arg, &param_ty) in arguments.iter().zip(&param_tys) {
            let mut v = self.lower_expression(arg)?;
            let vt = self.builder.module.ty_of(v);
            if !self.builder.module.types().is_pointer(vt) && vt != param_ty {
                v = if self.builder.module.types().is_integer(vt) {
                    let float = self.builder.module.types().float_ty();
                    self.builder.build_sitofp(v, float)
                } else {
                    let int = self.builder.module.types().int32_ty();
                    self.builder.build_fptosi(v, int)
                };
            }
            args.push(v);
        }

        Ok(self.builder.build_call(func, &args))
    }

    /// R-value of a bound address: scalars load, local arrays decay to an
    /// element pointer, array parameters load the stored element pointer
    fn load_or_decay(&mut self, addr: ValueId) -> ValueId {
        let pointee = self
            .builder
            .module
            .types()
            .pointee(self.builder.module.ty_of(addr))
            .expect("variable bindings are always addresses");
        match self.builder.module.types().kind(pointee) {
            TypeKind::Array { .. } => {
                let zero = self.builder.module.const_int(0);
                self.builder.build_gep(addr, &[zero, zero])
            }
            // scalars and array-parameter slots both load; for the latter
            // the loaded value is the decayed element pointer
            _ => self.builder.build_load(addr),
        }
    }

    /// Address of a variable reference. Bare names yield the bound address;
    /// indexed references bounds-check the index and compute the element
    /// address, dereferencing array parameters first.
    pub(crate) fn lower_var_address(&mut self, var: &VarRef) -> Result<ValueId, LowerError> {
        let base = self
            .scope
            .find(&var.name)
            .ok_or_else(|| LowerError::UnresolvedIdentifier {
                name: var.name.clone(),
                span: var.span,
            })?;
        if self.builder.module.value(base).is_function() {
            return Err(LowerError::NotAVariable {
                name: var.name.clone(),
                span: var.span,
            });
        }

        let Some(index_expr) = &var.index else {
            return Ok(base);
        };

        let mut index = self.lower_expression(index_expr)?;
        if self
            .builder
            .module
            .types()
            .is_float(self.builder.module.ty_of(index))
        {
            let int = self.builder.module.types().int32_ty();
            index = self.builder.build_fptosi(index, int);
        }

        // runtime bounds check: a negative index traps through the runtime
        // handler, then control rejoins the address computation
        let zero = self.builder.module.const_int(0);
        let in_bounds = self.builder.build_cmp(Opcode::Ge, index, zero);

        let func = self.function();
        let cont_block = self.builder.append_block(func);
        let ok_block = self.builder.append_block(func);
        let trap_block = self.builder.append_block(func);

        self.builder.build_cond_br(in_bounds, ok_block, trap_block);

        self.builder.set_insert_point(ok_block);
        self.builder.build_br(cont_block);

        self.builder.set_insert_point(trap_block);
        let handler = self
            .scope
            .find("neg_idx_except")
            .expect("trap handler is registered before lowering");
        self.builder.build_call(handler, &[]);
        self.builder.build_br(cont_block);

        self.builder.set_insert_point(cont_block);

        let pointee = self
            .builder
            .module
            .types()
            .pointee(self.builder.module.ty_of(base))
            .expect("variable bindings are always addresses");
        match self.builder.module.types().kind(pointee) {
            // array parameter: the slot holds a pointer, dereference it
            // before indexing
            TypeKind::Pointer(_) => {
                let base_ptr = self.builder.build_load(base);
                Ok(self.builder.build_gep(base_ptr, &[index]))
            }
            TypeKind::Array { .. } => Ok(self.builder.build_gep(base, &[zero, index])),
            _ => Err(LowerError::NotAnArray {
                name: var.name.clone(),
                span: var.span,
            }),
        }
    }
}
