//! IR Instruction Catalog
//!
//! A closed set of operation kinds. Every instruction is a user of its
//! operands and is owned by exactly one basic block; the kind fixes the
//! result type rule, the operand arity and the side-effect classification.
//!
//! Operand conventions:
//! - `Ret`: zero operands (void return) or one (the returned value)
//! - `Br`: one operand (unconditional target block) or three
//!   (condition, true block, false block)
//! - `Store`: value then pointer
//! - `Call`: the callee is operand 0, arguments follow
//! - `Phi`: (value, predecessor block) pairs, flattened
//! - `GetElementPtr`: pointer then one or more indices

use std::fmt;

/// Operation kind of an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Terminators
    Ret,
    Br,
    // Integer arithmetic
    Add,
    Sub,
    Mul,
    SDiv,
    // Float arithmetic
    FAdd,
    FSub,
    FMul,
    FDiv,
    // Memory
    Alloca,
    Load,
    Store,
    // Integer compares (produce i1)
    Ge,
    Gt,
    Le,
    Lt,
    Eq,
    Ne,
    // Float compares (produce i1)
    FGe,
    FGt,
    FLe,
    FLt,
    FEq,
    FNe,
    // Other
    Phi,
    Call,
    GetElementPtr,
    // Conversions
    ZExt,
    FpToSi,
    SiToFp,
}

impl Opcode {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Ret => "ret",
            Opcode::Br => "br",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::SDiv => "sdiv",
            Opcode::FAdd => "fadd",
            Opcode::FSub => "fsub",
            Opcode::FMul => "fmul",
            Opcode::FDiv => "fdiv",
            Opcode::Alloca => "alloca",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::Ge => "ge",
            Opcode::Gt => "gt",
            Opcode::Le => "le",
            Opcode::Lt => "lt",
            Opcode::Eq => "eq",
            Opcode::Ne => "ne",
            Opcode::FGe => "fge",
            Opcode::FGt => "fgt",
            Opcode::FLe => "fle",
            Opcode::FLt => "flt",
            Opcode::FEq => "feq",
            Opcode::FNe => "fne",
            Opcode::Phi => "phi",
            Opcode::Call => "call",
            Opcode::GetElementPtr => "getelementptr",
            Opcode::ZExt => "zext",
            Opcode::FpToSi => "fptosi",
            Opcode::SiToFp => "sitofp",
        }
    }

    /// Terminators end a basic block; a well-formed block has exactly one,
    /// in last position
    pub fn is_terminator(&self) -> bool {
        matches!(self, Opcode::Ret | Opcode::Br)
    }

    pub fn is_int_binary(&self) -> bool {
        matches!(self, Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::SDiv)
    }

    pub fn is_float_binary(&self) -> bool {
        matches!(
            self,
            Opcode::FAdd | Opcode::FSub | Opcode::FMul | Opcode::FDiv
        )
    }

    pub fn is_binary(&self) -> bool {
        self.is_int_binary() || self.is_float_binary()
    }

    pub fn is_int_cmp(&self) -> bool {
        matches!(
            self,
            Opcode::Ge | Opcode::Gt | Opcode::Le | Opcode::Lt | Opcode::Eq | Opcode::Ne
        )
    }

    pub fn is_float_cmp(&self) -> bool {
        matches!(
            self,
            Opcode::FGe | Opcode::FGt | Opcode::FLe | Opcode::FLt | Opcode::FEq | Opcode::FNe
        )
    }

    pub fn is_cmp(&self) -> bool {
        self.is_int_cmp() || self.is_float_cmp()
    }

    pub fn is_conversion(&self) -> bool {
        matches!(self, Opcode::ZExt | Opcode::FpToSi | Opcode::SiToFp)
    }

    /// Side-effect classification of the catalog
    ///
    /// Pure kinds (arithmetic, compares, conversions, load, getelementptr,
    /// phi) only read; the rest observable-write, transfer control or
    /// allocate. Note that dead-code elimination uses its own liveness rule,
    /// not this predicate alone: an unused `alloca` is removable even though
    /// it is classified effectful here.
    pub fn has_side_effect(&self) -> bool {
        matches!(self, Opcode::Ret | Opcode::Br | Opcode::Store | Opcode::Call | Opcode::Alloca)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}
