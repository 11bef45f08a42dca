// End-to-end tests driving AST lowering and dead code elimination together

#[cfg(test)]
mod tests {
    use crate::instruction::Opcode;
    use crate::lower::{lower_program, LowerError};
    use crate::module::Module;
    use crate::passes::{DeadCodeElimination, Pass, PuritySet};
    use crate::value::{ValueId, ValueKind};
    use crate::verify::verify_module;
    use cminus_ast::{
        BinaryOp, Block, Expression, ExpressionKind, FunctionDefinition, NodeIdGenerator, Number,
        Parameter, Program, Statement, StatementKind, TopLevelItem, TypeSpec, VarDeclaration,
        VarRef,
    };
    use cminus_common::SourceSpan;

    /// Small convenience layer over the AST constructors
    struct Ast {
        gen: NodeIdGenerator,
    }

    impl Ast {
        fn new() -> Self {
            Self {
                gen: NodeIdGenerator::new(),
            }
        }

        fn expr(&mut self, kind: ExpressionKind) -> Expression {
            Expression::new(self.gen.next(), kind, SourceSpan::dummy())
        }

        fn int(&mut self, v: i32) -> Expression {
            self.expr(ExpressionKind::Num(Number::Int(v)))
        }

        fn float(&mut self, v: f32) -> Expression {
            self.expr(ExpressionKind::Num(Number::Float(v)))
        }

        fn var_ref(&mut self, name: &str) -> VarRef {
            VarRef {
                name: name.to_string(),
                index: None,
                span: SourceSpan::dummy(),
            }
        }

        fn indexed_ref(&mut self, name: &str, index: Expression) -> VarRef {
            VarRef {
                name: name.to_string(),
                index: Some(Box::new(index)),
                span: SourceSpan::dummy(),
            }
        }

        fn var(&mut self, name: &str) -> Expression {
            let r = self.var_ref(name);
            self.expr(ExpressionKind::Var(r))
        }

        fn assign(&mut self, target: VarRef, value: Expression) -> Expression {
            self.expr(ExpressionKind::Assign {
                target,
                value: Box::new(value),
            })
        }

        fn binary(&mut self, op: BinaryOp, left: Expression, right: Expression) -> Expression {
            self.expr(ExpressionKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            })
        }

        fn call(&mut self, callee: &str, arguments: Vec<Expression>) -> Expression {
            self.expr(ExpressionKind::Call {
                callee: callee.to_string(),
                arguments,
            })
        }

        fn stmt(&mut self, kind: StatementKind) -> Statement {
            Statement {
                node_id: self.gen.next(),
                kind,
                span: SourceSpan::dummy(),
            }
        }

        fn expr_stmt(&mut self, expr: Expression) -> Statement {
            self.stmt(StatementKind::Expression(Some(expr)))
        }

        fn decl(&mut self, name: &str, ty: TypeSpec, array_len: Option<u32>) -> VarDeclaration {
            VarDeclaration {
                node_id: self.gen.next(),
                name: name.to_string(),
                ty,
                array_len,
                span: SourceSpan::dummy(),
            }
        }

        fn param(&mut self, name: &str, ty: TypeSpec, is_array: bool) -> Parameter {
            Parameter {
                node_id: self.gen.next(),
                name: name.to_string(),
                ty,
                is_array,
                span: SourceSpan::dummy(),
            }
        }

        fn function(
            &mut self,
            name: &str,
            return_type: TypeSpec,
            params: Vec<Parameter>,
            body: Block,
        ) -> FunctionDefinition {
            FunctionDefinition {
                node_id: self.gen.next(),
                name: name.to_string(),
                return_type,
                params,
                body,
                span: SourceSpan::dummy(),
            }
        }
    }

    fn block(declarations: Vec<VarDeclaration>, statements: Vec<Statement>) -> Block {
        Block {
            declarations,
            statements,
        }
    }

    fn opcodes_of(module: &Module, block: ValueId) -> Vec<Opcode> {
        module
            .block_instructions(block)
            .iter()
            .map(|&i| module.opcode_of(i))
            .collect()
    }

    fn run_dce(module: &mut Module) -> usize {
        let purity = PuritySet::new();
        let mut pass = DeadCodeElimination::new(&purity);
        pass.run(module);
        pass.eliminated()
    }

    // Scenario A: a global `int x;` plus `x = 1 + 2;` inside main
    #[test]
    fn test_global_store_of_integer_sum() {
        let mut ast = Ast::new();
        let x = ast.decl("x", TypeSpec::Int, None);
        let one = ast.int(1);
        let two = ast.int(2);
        let sum = ast.binary(BinaryOp::Add, one, two);
        let target = ast.var_ref("x");
        let assign = ast.assign(target, sum);
        let assign = ast.expr_stmt(assign);
        let main = ast.function("main", TypeSpec::Int, vec![], block(vec![], vec![assign]));
        let program = Program {
            items: vec![TopLevelItem::Variable(x), TopLevelItem::Function(main)],
        };

        let module = lower_program(&program).unwrap();
        assert!(verify_module(&module).is_ok());

        let global = module
            .globals()
            .iter()
            .copied()
            .find(|&g| module.value(g).name.as_deref() == Some("x"))
            .unwrap();
        let i32_ty = module.types().int32_ty();
        assert_eq!(module.types().pointee(module.ty_of(global)), Some(i32_ty));
        assert!(matches!(
            module.value(module.global_initializer(global)).kind,
            ValueKind::ConstZero
        ));

        let main_fn = module.get_function("main").unwrap();
        let entry = module.entry_block(main_fn).unwrap();
        assert_eq!(
            opcodes_of(&module, entry),
            vec![Opcode::Add, Opcode::Store, Opcode::Ret]
        );

        let store = module.block_instructions(entry)[1];
        assert_eq!(module.operand(store, 1), global);
        let add = module.block_instructions(entry)[0];
        assert_eq!(module.operand(store, 0), add);
    }

    // Scenario B: `if (0) { y = 1; }` with no else branches directly to the
    // continuation on the false path. The store stays: stores are
    // unconditionally critical, so DCE leaves the conditional shape alone.
    #[test]
    fn test_if_without_else_shape() {
        let mut ast = Ast::new();
        let y = ast.decl("y", TypeSpec::Int, None);
        let zero = ast.int(0);
        let one = ast.int(1);
        let target = ast.var_ref("y");
        let store = ast.assign(target, one);
        let store = ast.expr_stmt(store);
        let then_body = ast.stmt(StatementKind::Compound(block(vec![], vec![store])));
        let if_stmt = ast.stmt(StatementKind::If {
            condition: zero,
            then_stmt: Box::new(then_body),
            else_stmt: None,
        });
        let main = ast.function("main", TypeSpec::Int, vec![], block(vec![], vec![if_stmt]));
        let program = Program {
            items: vec![TopLevelItem::Variable(y), TopLevelItem::Function(main)],
        };

        let mut module = lower_program(&program).unwrap();
        let main_fn = module.get_function("main").unwrap();
        let blocks = module.function_blocks(main_fn).to_vec();
        assert_eq!(blocks.len(), 3);
        let (entry, then_block, cont) = (blocks[0], blocks[1], blocks[2]);

        let branch = module.terminator(entry).unwrap();
        assert_eq!(module.opcode_of(branch), Opcode::Br);
        assert_eq!(module.operand(branch, 1), then_block);
        assert_eq!(module.operand(branch, 2), cont);
        assert_eq!(module.successors(entry), vec![then_block, cont]);

        run_dce(&mut module);
        assert!(verify_module(&module).is_ok());
        assert_eq!(module.function_blocks(main_fn).len(), 3);
        assert!(opcodes_of(&module, then_block).contains(&Opcode::Store));
    }

    // Scenario C: `while (i - 5) { i = i + 1; }` lowers to condition, body
    // and exit blocks, with a strictly-greater-than-zero loop test
    #[test]
    fn test_while_loop_shape() {
        let mut ast = Ast::new();
        let i_decl = ast.decl("i", TypeSpec::Int, None);
        let i1 = ast.var("i");
        let five = ast.int(5);
        let cond = ast.binary(BinaryOp::Sub, i1, five);
        let i2 = ast.var("i");
        let one = ast.int(1);
        let inc = ast.binary(BinaryOp::Add, i2, one);
        let target = ast.var_ref("i");
        let assign = ast.assign(target, inc);
        let body = ast.expr_stmt(assign);
        let while_stmt = ast.stmt(StatementKind::While {
            condition: cond,
            body: Box::new(body),
        });
        let main = ast.function(
            "main",
            TypeSpec::Int,
            vec![],
            block(vec![i_decl], vec![while_stmt]),
        );
        let program = Program {
            items: vec![TopLevelItem::Function(main)],
        };

        let module = lower_program(&program).unwrap();
        assert!(verify_module(&module).is_ok());

        let main_fn = module.get_function("main").unwrap();
        let blocks = module.function_blocks(main_fn).to_vec();
        assert_eq!(blocks.len(), 4);
        let (entry, cond_block, body_block, exit) = (blocks[0], blocks[1], blocks[2], blocks[3]);

        assert_eq!(module.successors(entry), vec![cond_block]);
        assert_eq!(
            opcodes_of(&module, cond_block),
            vec![Opcode::Load, Opcode::Sub, Opcode::Gt, Opcode::Br]
        );
        let branch = module.terminator(cond_block).unwrap();
        assert_eq!(module.operand(branch, 1), body_block);
        assert_eq!(module.operand(branch, 2), exit);

        // the body branches back to the condition block
        let back_edge = module.terminator(body_block).unwrap();
        assert_eq!(module.operand(back_edge, 0), cond_block);
        let mut preds = module.predecessors(cond_block);
        preds.sort();
        let mut expected = vec![entry, body_block];
        expected.sort();
        assert_eq!(preds, expected);
    }

    // Scenario E: indexing an array parameter dereferences the slot first
    // (one extra load); a locally declared array is indexed directly
    #[test]
    fn test_array_parameter_needs_extra_load() {
        let mut ast = Ast::new();
        let a = ast.param("a", TypeSpec::Int, true);
        let i = ast.param("i", TypeSpec::Int, false);
        let idx = ast.var("i");
        let elem_ref = ast.indexed_ref("a", idx);
        let elem = ast.expr(ExpressionKind::Var(elem_ref));
        let ret = ast.stmt(StatementKind::Return(Some(elem)));
        let from_param = ast.function("from_param", TypeSpec::Int, vec![a, i], block(vec![], vec![ret]));

        let b_decl = ast.decl("b", TypeSpec::Int, Some(10));
        let j = ast.param("j", TypeSpec::Int, false);
        let idx2 = ast.var("j");
        let elem_ref2 = ast.indexed_ref("b", idx2);
        let elem2 = ast.expr(ExpressionKind::Var(elem_ref2));
        let ret2 = ast.stmt(StatementKind::Return(Some(elem2)));
        let from_local =
            ast.function("from_local", TypeSpec::Int, vec![j], block(vec![b_decl], vec![ret2]));

        let program = Program {
            items: vec![
                TopLevelItem::Function(from_param),
                TopLevelItem::Function(from_local),
            ],
        };
        let module = lower_program(&program).unwrap();
        assert!(verify_module(&module).is_ok());

        let count_loads = |module: &Module, name: &str| {
            let func = module.get_function(name).unwrap();
            module
                .function_blocks(func)
                .iter()
                .flat_map(|&b| module.block_instructions(b))
                .filter(|&&inst| module.opcode_of(inst) == Opcode::Load)
                .count()
        };
        // parameter version: index load + slot dereference + element load
        assert_eq!(count_loads(&module, "from_param"), 3);
        // local version: index load + element load
        assert_eq!(count_loads(&module, "from_local"), 2);

        // the parameter gep starts from the dereferenced slot, the local
        // gep starts from the alloca itself
        let gep_base_kind = |module: &Module, name: &str| {
            let func = module.get_function(name).unwrap();
            let gep = module
                .function_blocks(func)
                .iter()
                .flat_map(|&b| module.block_instructions(b))
                .copied()
                .find(|&i| module.opcode_of(i) == Opcode::GetElementPtr)
                .unwrap();
            module.opcode_of(module.operand(gep, 0))
        };
        assert_eq!(gep_base_kind(&module, "from_param"), Opcode::Load);
        assert_eq!(gep_base_kind(&module, "from_local"), Opcode::Alloca);
    }

    #[test]
    fn test_index_bounds_check_wiring() {
        let mut ast = Ast::new();
        let a = ast.param("a", TypeSpec::Float, true);
        let idx = ast.int(2);
        let elem_ref = ast.indexed_ref("a", idx);
        let elem = ast.expr(ExpressionKind::Var(elem_ref));
        let ret = ast.stmt(StatementKind::Return(Some(elem)));
        let f = ast.function("f", TypeSpec::Float, vec![a], block(vec![], vec![ret]));
        let program = Program {
            items: vec![TopLevelItem::Function(f)],
        };

        let module = lower_program(&program).unwrap();
        let func = module.get_function("f").unwrap();
        let blocks = module.function_blocks(func).to_vec();
        // entry + continuation + in-bounds + trap
        assert_eq!(blocks.len(), 4);
        let (entry, cont, ok_block, trap) = (blocks[0], blocks[1], blocks[2], blocks[3]);

        let check = module.terminator(entry).unwrap();
        assert_eq!(module.opcode_of(module.operand(check, 0)), Opcode::Ge);
        assert_eq!(module.operand(check, 1), ok_block);
        assert_eq!(module.operand(check, 2), trap);

        // the trap path calls the handler and rejoins
        let trap_ops = opcodes_of(&module, trap);
        assert_eq!(trap_ops, vec![Opcode::Call, Opcode::Br]);
        let handler_call = module.block_instructions(trap)[0];
        let handler = module.call_callee(handler_call);
        assert_eq!(
            module.value(handler).name.as_deref(),
            Some("neg_idx_except")
        );
        assert_eq!(module.successors(trap), vec![cont]);
        assert_eq!(module.successors(ok_block), vec![cont]);
    }

    #[test]
    fn test_mixed_arithmetic_promotes_integer_side() {
        let mut ast = Ast::new();
        let one = ast.int(1);
        let half = ast.float(2.5);
        let sum = ast.binary(BinaryOp::Add, one, half);
        let ret = ast.stmt(StatementKind::Return(Some(sum)));
        let f = ast.function("f", TypeSpec::Float, vec![], block(vec![], vec![ret]));
        let program = Program {
            items: vec![TopLevelItem::Function(f)],
        };

        let module = lower_program(&program).unwrap();
        let func = module.get_function("f").unwrap();
        let entry = module.entry_block(func).unwrap();
        assert_eq!(
            opcodes_of(&module, entry),
            vec![Opcode::SiToFp, Opcode::FAdd, Opcode::Ret]
        );
    }

    #[test]
    fn test_integer_comparison_zero_extends() {
        let mut ast = Ast::new();
        let one = ast.int(1);
        let two = ast.int(2);
        let cmp = ast.binary(BinaryOp::Lt, one, two);
        let ret = ast.stmt(StatementKind::Return(Some(cmp)));
        let f = ast.function("f", TypeSpec::Int, vec![], block(vec![], vec![ret]));
        let program = Program {
            items: vec![TopLevelItem::Function(f)],
        };

        let module = lower_program(&program).unwrap();
        let func = module.get_function("f").unwrap();
        let entry = module.entry_block(func).unwrap();
        assert_eq!(
            opcodes_of(&module, entry),
            vec![Opcode::Lt, Opcode::ZExt, Opcode::Ret]
        );
        let zext = module.block_instructions(entry)[1];
        assert_eq!(module.ty_of(zext), module.types().int32_ty());
    }

    #[test]
    fn test_float_comparison_after_promotion() {
        let mut ast = Ast::new();
        let one = ast.int(1);
        let half = ast.float(0.5);
        let cmp = ast.binary(BinaryOp::Ne, one, half);
        let ret = ast.stmt(StatementKind::Return(Some(cmp)));
        let f = ast.function("f", TypeSpec::Int, vec![], block(vec![], vec![ret]));
        let program = Program {
            items: vec![TopLevelItem::Function(f)],
        };

        let module = lower_program(&program).unwrap();
        let func = module.get_function("f").unwrap();
        let entry = module.entry_block(func).unwrap();
        assert_eq!(
            opcodes_of(&module, entry),
            vec![Opcode::SiToFp, Opcode::FNe, Opcode::ZExt, Opcode::Ret]
        );
    }

    #[test]
    fn test_return_conversion_to_declared_type() {
        let mut ast = Ast::new();
        let half = ast.float(0.5);
        let ret = ast.stmt(StatementKind::Return(Some(half)));
        let f = ast.function("f", TypeSpec::Int, vec![], block(vec![], vec![ret]));
        let program = Program {
            items: vec![TopLevelItem::Function(f)],
        };

        let module = lower_program(&program).unwrap();
        let func = module.get_function("f").unwrap();
        let entry = module.entry_block(func).unwrap();
        assert_eq!(opcodes_of(&module, entry), vec![Opcode::FpToSi, Opcode::Ret]);
    }

    #[test]
    fn test_call_arguments_coerced_to_formals() {
        let mut ast = Ast::new();
        let half = ast.float(1.5);
        let call = ast.call("output", vec![half]);
        let call = ast.expr_stmt(call);
        let main = ast.function("main", TypeSpec::Void, vec![], block(vec![], vec![call]));
        let program = Program {
            items: vec![TopLevelItem::Function(main)],
        };

        let module = lower_program(&program).unwrap();
        let func = module.get_function("main").unwrap();
        let entry = module.entry_block(func).unwrap();
        assert_eq!(
            opcodes_of(&module, entry),
            vec![Opcode::FpToSi, Opcode::Call, Opcode::Ret]
        );
    }

    #[test]
    fn test_whole_array_argument_decays() {
        let mut ast = Ast::new();
        let a = ast.param("a", TypeSpec::Int, true);
        let body = block(vec![], vec![]);
        let callee = ast.function("takes_array", TypeSpec::Void, vec![a], body);

        let b_decl = ast.decl("b", TypeSpec::Int, Some(4));
        let arg = ast.var("b");
        let call = ast.call("takes_array", vec![arg]);
        let call = ast.expr_stmt(call);
        let main = ast.function("main", TypeSpec::Void, vec![], block(vec![b_decl], vec![call]));
        let program = Program {
            items: vec![
                TopLevelItem::Function(callee),
                TopLevelItem::Function(main),
            ],
        };

        let module = lower_program(&program).unwrap();
        let func = module.get_function("main").unwrap();
        let entry = module.entry_block(func).unwrap();
        // the array r-value decays through a zero-index gep and is passed
        // unchanged
        assert_eq!(
            opcodes_of(&module, entry),
            vec![Opcode::Alloca, Opcode::GetElementPtr, Opcode::Call, Opcode::Ret]
        );
        let gep = module.block_instructions(entry)[1];
        let i32_ty = module.types().int32_ty();
        assert_eq!(module.types().pointee(module.ty_of(gep)), Some(i32_ty));
    }

    #[test]
    fn test_implicit_returns() {
        let mut ast = Ast::new();
        let void_fn = ast.function("v", TypeSpec::Void, vec![], block(vec![], vec![]));
        let int_fn = ast.function("i", TypeSpec::Int, vec![], block(vec![], vec![]));
        let float_fn = ast.function("g", TypeSpec::Float, vec![], block(vec![], vec![]));
        let program = Program {
            items: vec![
                TopLevelItem::Function(void_fn),
                TopLevelItem::Function(int_fn),
                TopLevelItem::Function(float_fn),
            ],
        };

        let module = lower_program(&program).unwrap();
        for (name, operand_count) in [("v", 0), ("i", 1), ("g", 1)] {
            let func = module.get_function(name).unwrap();
            let entry = module.entry_block(func).unwrap();
            let ret = module.terminator(entry).unwrap();
            assert_eq!(module.opcode_of(ret), Opcode::Ret);
            assert_eq!(module.operands_of(ret).len(), operand_count);
        }
    }

    #[test]
    fn test_unresolved_identifier_is_reported() {
        let mut ast = Ast::new();
        let missing = ast.var("missing");
        let ret = ast.stmt(StatementKind::Return(Some(missing)));
        let main = ast.function("main", TypeSpec::Int, vec![], block(vec![], vec![ret]));
        let program = Program {
            items: vec![TopLevelItem::Function(main)],
        };

        let err = lower_program(&program).unwrap_err();
        assert!(matches!(
            err,
            LowerError::UnresolvedIdentifier { ref name, .. } if name == "missing"
        ));
    }

    #[test]
    fn test_undeclared_function_is_reported() {
        let mut ast = Ast::new();
        let call = ast.call("nowhere", vec![]);
        let call = ast.expr_stmt(call);
        let main = ast.function("main", TypeSpec::Void, vec![], block(vec![], vec![call]));
        let program = Program {
            items: vec![TopLevelItem::Function(main)],
        };

        let err = lower_program(&program).unwrap_err();
        assert!(matches!(err, LowerError::UndeclaredFunction { .. }));
    }

    #[test]
    fn test_arity_mismatch_is_reported() {
        let mut ast = Ast::new();
        let one = ast.int(1);
        let two = ast.int(2);
        let call = ast.call("output", vec![one, two]);
        let call = ast.expr_stmt(call);
        let main = ast.function("main", TypeSpec::Void, vec![], block(vec![], vec![call]));
        let program = Program {
            items: vec![TopLevelItem::Function(main)],
        };

        let err = lower_program(&program).unwrap_err();
        assert!(matches!(
            err,
            LowerError::ArityMismatch {
                expected: 1,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_indexing_a_scalar_is_reported() {
        let mut ast = Ast::new();
        let x = ast.decl("x", TypeSpec::Int, None);
        let idx = ast.int(0);
        let elem_ref = ast.indexed_ref("x", idx);
        let elem = ast.expr(ExpressionKind::Var(elem_ref));
        let ret = ast.stmt(StatementKind::Return(Some(elem)));
        let main = ast.function("main", TypeSpec::Int, vec![], block(vec![], vec![ret]));
        let program = Program {
            items: vec![TopLevelItem::Variable(x), TopLevelItem::Function(main)],
        };

        let err = lower_program(&program).unwrap_err();
        assert!(matches!(err, LowerError::NotAnArray { ref name, .. } if name == "x"));
    }

    // Lowered output feeds straight into DCE: the builtins that end up
    // unused disappear, `main` survives
    #[test]
    fn test_lower_then_dce_prunes_unused_builtins() {
        let mut ast = Ast::new();
        let one = ast.int(1);
        let call = ast.call("output", vec![one]);
        let call = ast.expr_stmt(call);
        let main = ast.function("main", TypeSpec::Void, vec![], block(vec![], vec![call]));
        let program = Program {
            items: vec![TopLevelItem::Function(main)],
        };

        let mut module = lower_program(&program).unwrap();
        run_dce(&mut module);
        assert!(verify_module(&module).is_ok());

        assert!(module.get_function("main").is_some());
        assert!(module.get_function("output").is_some());
        assert!(module.get_function("input").is_none());
        assert!(module.get_function("neg_idx_except").is_none());
    }
}
