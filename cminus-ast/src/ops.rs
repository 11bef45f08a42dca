//! Operators appearing in cminus expressions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators
///
/// Covers the additive, multiplicative and relational productions of the
/// grammar; the distinction lowering cares about is arithmetic vs.
/// relational, queryable via [`BinaryOp::is_relational`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,

    // Relational (produce an int 0/1 result)
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl BinaryOp {
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op_str = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
        };
        write!(f, "{op_str}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relational_classification() {
        assert!(BinaryOp::Le.is_relational());
        assert!(BinaryOp::Ne.is_relational());
        assert!(!BinaryOp::Add.is_relational());
        assert!(!BinaryOp::Div.is_relational());
    }

    #[test]
    fn test_display() {
        assert_eq!(BinaryOp::Ge.to_string(), ">=");
        assert_eq!(BinaryOp::Mul.to_string(), "*");
    }
}
