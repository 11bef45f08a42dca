//! Error handling for the cminus compiler
//!
//! This module defines the compiler-wide error type. Stage-specific errors
//! (for example lowering errors) live next to their stage and convert into
//! `CompilerError` at the phase boundary.

use crate::source_loc::SourceSpan;
use thiserror::Error;

/// Main compiler error type that encompasses all phases of compilation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompilerError {
    #[error("Lowering error at {span}: {message}")]
    Lower { span: SourceSpan, message: String },

    #[error("Internal compiler error: {message}")]
    Internal { message: String },
}

impl CompilerError {
    /// Create a lowering error
    pub fn lower_error(message: String, span: SourceSpan) -> Self {
        CompilerError::Lower { span, message }
    }

    /// Create an internal error
    pub fn internal_error(message: String) -> Self {
        CompilerError::Internal { message }
    }
}
