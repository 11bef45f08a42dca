//! AST to IR lowering
//!
//! Walks the AST and emits instructions into a current insertion point,
//! maintaining a lexical scope stack. Names are always bound to storage
//! addresses (pointer-typed values), never to loaded values; expression
//! lowering decides when to load or decay. Control flow synthesizes the
//! extra basic blocks for branches and loops.
//!
//! Everything the lowering needs is carried by the [`Lowerer`]: the builder
//! with its insertion point, the scope stack and the function being lowered.
//! Semantic problems the type checker did not rule out (unresolved names,
//! bad arity, indexing a scalar) surface as [`LowerError`]s tagged with the
//! offending node's span.

mod expr;
mod stmt;

use crate::builder::IrBuilder;
use crate::module::Module;
use crate::types::TypeId;
use crate::value::ValueId;
use cminus_ast::{FunctionDefinition, Program, TopLevelItem, TypeSpec, VarDeclaration};
use cminus_common::{CompilerError, SourceSpan};
use log::debug;
use std::collections::HashMap;
use thiserror::Error;

/// Semantic errors detected during lowering
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LowerError {
    #[error("undefined reference to '{name}'")]
    UnresolvedIdentifier { name: String, span: SourceSpan },

    #[error("call to undeclared function '{name}'")]
    UndeclaredFunction { name: String, span: SourceSpan },

    #[error("'{name}' is not a function")]
    NotAFunction { name: String, span: SourceSpan },

    #[error("'{name}' is a function, not a variable")]
    NotAVariable { name: String, span: SourceSpan },

    #[error("wrong number of arguments to '{name}': expected {expected}, found {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        span: SourceSpan,
    },

    #[error("'{name}' is not an array")]
    NotAnArray { name: String, span: SourceSpan },
}

impl LowerError {
    /// Span of the AST node the error points at
    pub fn span(&self) -> SourceSpan {
        match self {
            LowerError::UnresolvedIdentifier { span, .. }
            | LowerError::UndeclaredFunction { span, .. }
            | LowerError::NotAFunction { span, .. }
            | LowerError::NotAVariable { span, .. }
            | LowerError::ArityMismatch { span, .. }
            | LowerError::NotAnArray { span, .. } => *span,
        }
    }
}

impl From<LowerError> for CompilerError {
    fn from(err: LowerError) -> Self {
        CompilerError::lower_error(err.to_string(), err.span())
    }
}

/// The lexical symbol table: a stack of name-to-value frames
///
/// Lives only during lowering; it is not part of the IR.
#[derive(Debug, Default)]
pub(crate) struct Scope {
    frames: Vec<HashMap<String, ValueId>>,
}

impl Scope {
    fn new() -> Self {
        Self { frames: Vec::new() }
    }

    fn enter(&mut self) {
        self.frames.push(HashMap::new());
    }

    fn exit(&mut self) {
        self.frames.pop().expect("scope exit without matching enter");
    }

    /// Bind a name in the innermost frame
    fn push(&mut self, name: &str, value: ValueId) {
        self.frames
            .last_mut()
            .expect("binding a name with no open scope")
            .insert(name.to_string(), value);
    }

    /// Innermost-to-outermost lookup
    fn find(&self, name: &str) -> Option<ValueId> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).copied())
    }
}

/// Lower a program to an IR module
pub fn lower_program(program: &Program) -> Result<Module, LowerError> {
    Lowerer::new().run(program)
}

/// Lowering context: builder, scope stack and current function
pub(crate) struct Lowerer {
    pub(crate) builder: IrBuilder,
    pub(crate) scope: Scope,
    pub(crate) current_function: Option<ValueId>,
}

impl Lowerer {
    fn new() -> Self {
        Self {
            builder: IrBuilder::new(Module::new("cminus")),
            scope: Scope::new(),
            current_function: None,
        }
    }

    fn run(mut self, program: &Program) -> Result<Module, LowerError> {
        self.scope.enter();
        self.declare_builtins();
        for item in &program.items {
            match item {
                TopLevelItem::Variable(decl) => self.lower_global(decl),
                TopLevelItem::Function(fdef) => self.lower_function(fdef)?,
            }
        }
        self.scope.exit();
        Ok(self.builder.into_module())
    }

    /// The runtime interface every program can call: `input`, `output`,
    /// `output_float` and the negative-index trap handler
    fn declare_builtins(&mut self) {
        let module = &mut self.builder.module;
        let void = module.types().void_ty();
        let int = module.types().int32_ty();
        let float = module.types().float_ty();

        let builtins = [
            ("input", int, Vec::new()),
            ("output", void, vec![int]),
            ("output_float", void, vec![float]),
            ("neg_idx_except", void, Vec::new()),
        ];
        for (name, ret, params) in builtins {
            let func = module.add_function(name, ret, &params, true);
            self.scope.push(name, func);
        }
    }

    pub(crate) fn scalar_type(&self, spec: TypeSpec) -> TypeId {
        let types = self.builder.module.types();
        match spec {
            TypeSpec::Void => types.void_ty(),
            TypeSpec::Int => types.int32_ty(),
            TypeSpec::Float => types.float_ty(),
        }
    }

    /// Storage type of a declaration: the scalar itself, or an array of it
    pub(crate) fn storage_type(&mut self, decl: &VarDeclaration) -> TypeId {
        let scalar = self.scalar_type(decl.ty);
        match decl.array_len {
            Some(len) => self.builder.module.types_mut().array_of(scalar, len),
            None => scalar,
        }
    }

    /// A top-level declaration becomes a zero-initialized global slot
    fn lower_global(&mut self, decl: &VarDeclaration) {
        debug!("lowering global '{}'", decl.name);
        let ty = self.storage_type(decl);
        let zero = self.builder.module.const_zero(ty);
        let global = self.builder.module.add_global(&decl.name, ty, zero);
        self.scope.push(&decl.name, global);
    }

    fn lower_function(&mut self, fdef: &FunctionDefinition) -> Result<(), LowerError> {
        debug!("lowering function '{}'", fdef.name);
        let ret = self.scalar_type(fdef.return_type);
        let param_tys: Vec<TypeId> = fdef
            .params
            .iter()
            .map(|p| {
                let scalar = self.scalar_type(p.ty);
                if p.is_array {
                    self.builder.module.types_mut().pointer_to(scalar)
                } else {
                    scalar
                }
            })
            .collect();

        let func = self
            .builder
            .module
            .add_function(&fdef.name, ret, &param_tys, false);
        self.scope.push(&fdef.name, func);
        self.current_function = Some(func);

        let entry = self.builder.append_block(func);
        self.builder.set_insert_point(entry);
        self.scope.enter();

        // spill every incoming argument into a named stack slot; array
        // parameters get a pointer-to-pointer slot
        let args = self.builder.module.function_params(func).to_vec();
        for ((param, &ty), arg) in fdef.params.iter().zip(&param_tys).zip(args) {
            let slot = self.builder.build_alloca(ty);
            self.scope.push(&param.name, slot);
            self.builder.build_store(arg, slot);
        }

        self.lower_block(&fdef.body)?;

        if !self.builder.is_terminated() {
            self.emit_implicit_return(ret);
        }

        self.scope.exit();
        self.current_function = None;
        Ok(())
    }

    /// Control fell off the end of the body: return zero of the declared
    /// type, or void
    fn emit_implicit_return(&mut self, ret: TypeId) {
        let types = self.builder.module.types();
        if types.is_void(ret) {
            self.builder.build_ret(None);
        } else if types.is_float(ret) {
            let zero = self.builder.module.const_float(0.0);
            self.builder.build_ret(Some(zero));
        } else {
            let zero = self.builder.module.const_int(0);
            self.builder.build_ret(Some(zero));
        }
    }

    pub(crate) fn function(&self) -> ValueId {
        self.current_function
            .expect("lowering a statement outside of a function")
    }
}
