//! Statement lowering: blocks, conditionals, loops and returns

use super::{Lowerer, LowerError};
use crate::instruction::Opcode;
use crate::value::ValueId;
use cminus_ast::{Block, Statement, StatementKind, VarDeclaration};

impl Lowerer {
    /// Lower a compound statement in its own scope frame. Statements after
    /// the insertion block is terminated are unreachable and skipped.
    pub(crate) fn lower_block(&mut self, block: &Block) -> Result<(), LowerError> {
        self.scope.enter();
        for decl in &block.declarations {
            self.lower_local(decl);
        }
        for stmt in &block.statements {
            self.lower_statement(stmt)?;
            if self.builder.is_terminated() {
                break;
            }
        }
        self.scope.exit();
        Ok(())
    }

    /// A local declaration allocates a stack slot and binds the name to its
    /// address
    fn lower_local(&mut self, decl: &VarDeclaration) {
        let ty = self.storage_type(decl);
        let slot = self.builder.build_alloca(ty);
        self.scope.push(&decl.name, slot);
    }

    pub(crate) fn lower_statement(&mut self, stmt: &Statement) -> Result<(), LowerError> {
        match &stmt.kind {
            StatementKind::Expression(Some(expr)) => {
                self.lower_expression(expr)?;
                Ok(())
            }
            StatementKind::Expression(None) => Ok(()),
            StatementKind::Compound(block) => self.lower_block(block),
            StatementKind::If {
                condition,
                then_stmt,
                else_stmt,
            } => self.lower_if(condition, then_stmt, else_stmt.as_deref()),
            StatementKind::While { condition, body } => self.lower_while(condition, body),
            StatementKind::Return(value) => self.lower_return(value.as_ref()),
        }
    }

    fn lower_if(
        &mut self,
        condition: &cminus_ast::Expression,
        then_stmt: &Statement,
        else_stmt: Option<&Statement>,
    ) -> Result<(), LowerError> {
        let cond = self.lower_expression(condition)?;
        let test = self.coerce_condition(cond, false);

        let func = self.function();
        let then_block = self.builder.append_block(func);
        let cont_block = self.builder.append_block(func);

        match else_stmt {
            None => {
                // without an else arm the false path is the continuation
                self.builder.build_cond_br(test, then_block, cont_block);
                self.builder.set_insert_point(then_block);
                self.lower_statement(then_stmt)?;
                if !self.builder.is_terminated() {
                    self.builder.build_br(cont_block);
                }
            }
            Some(else_stmt) => {
                let else_block = self.builder.append_block(func);
                self.builder.build_cond_br(test, then_block, else_block);

                self.builder.set_insert_point(then_block);
                self.lower_statement(then_stmt)?;
                if !self.builder.is_terminated() {
                    self.builder.build_br(cont_block);
                }

                self.builder.set_insert_point(else_block);
                self.lower_statement(else_stmt)?;
                if !self.builder.is_terminated() {
                    self.builder.build_br(cont_block);
                }
            }
        }

        self.builder.set_insert_point(cont_block);
        Ok(())
    }

    fn lower_while(
        &mut self,
        condition: &cminus_ast::Expression,
        body: &Statement,
    ) -> Result<(), LowerError> {
        let func = self.function();
        let cond_block = self.builder.append_block(func);
        let body_block = self.builder.append_block(func);
        let exit_block = self.builder.append_block(func);

        self.builder.build_br(cond_block);

        self.builder.set_insert_point(cond_block);
        let cond = self.lower_expression(condition)?;
        // loops test strictly-greater-than-zero, unlike conditionals
        let test = self.coerce_condition(cond, true);
        self.builder.build_cond_br(test, body_block, exit_block);

        self.builder.set_insert_point(body_block);
        self.lower_statement(body)?;
        if !self.builder.is_terminated() {
            self.builder.build_br(cond_block);
        }

        self.builder.set_insert_point(exit_block);
        Ok(())
    }

    fn lower_return(
        &mut self,
        value: Option<&cminus_ast::Expression>,
    ) -> Result<(), LowerError> {
        match value {
            None => {
                self.builder.build_ret(None);
            }
            Some(expr) => {
                let mut v = self.lower_expression(expr)?;
                let declared = self.builder.module.function_return_type(self.function());
                if self.builder.module.ty_of(v) != declared {
                    v = if self.builder.module.types().is_integer(declared) {
                        let int = self.builder.module.types().int32_ty();
                        self.builder.build_fptosi(v, int)
                    } else {
                        let float = self.builder.module.types().float_ty();
                        self.builder.build_sitofp(v, float)
                    };
                }
                self.builder.build_ret(Some(v));
            }
        }
        Ok(())
    }

    /// Turn an arbitrary scalar into an i1 test. Conditionals compare
    /// not-equal against zero; loops compare strictly greater than zero.
    fn coerce_condition(&mut self, value: ValueId, loop_test: bool) -> ValueId {
        let ty = self.builder.module.ty_of(value);
        let types = self.builder.module.types();
        if ty == types.int1_ty() {
            return value;
        }
        if types.is_float(ty) {
            let zero = self.builder.module.const_float(0.0);
            let op = if loop_test { Opcode::FGt } else { Opcode::FNe };
            self.builder.build_cmp(op, value, zero)
        } else {
            let zero = self.builder.module.const_int(0);
            let op = if loop_test { Opcode::Gt } else { Opcode::Ne };
            self.builder.build_cmp(op, value, zero)
        }
    }
}
