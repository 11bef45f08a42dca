//! Expression AST nodes for cminus

use crate::ops::BinaryOp;
use crate::NodeId;
use cminus_common::SourceSpan;
use serde::{Deserialize, Serialize};

/// AST Expression nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub node_id: NodeId,
    pub kind: ExpressionKind,
    pub span: SourceSpan,
}

/// A numeric literal; cminus has 32-bit integers and 32-bit floats
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Number {
    Int(i32),
    Float(f32),
}

/// A reference to a named variable, optionally indexed (`x` or `a[i]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarRef {
    pub name: String,
    pub index: Option<Box<Expression>>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionKind {
    /// Numeric literal
    Num(Number),

    /// Variable or array-element reference
    Var(VarRef),

    /// Assignment (`var = expr`); yields the stored value
    Assign {
        target: VarRef,
        value: Box<Expression>,
    },

    /// Binary operation, arithmetic or relational
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// Function call; the callee is always a plain identifier in cminus
    Call {
        callee: String,
        arguments: Vec<Expression>,
    },
}

impl Expression {
    pub fn new(node_id: NodeId, kind: ExpressionKind, span: SourceSpan) -> Self {
        Self {
            node_id,
            kind,
            span,
        }
    }
}
