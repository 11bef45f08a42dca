//! Cminus Compiler - Intermediate Representation
//!
//! The middle tier of the compiler: an in-memory IR with full use-def
//! tracking, the AST-to-IR lowering stage, and the optimization passes that
//! rewrite the IR in place.
//!
//! ## Architecture
//!
//! - `types` - canonical, interned type table
//! - `value` - the value arena: constants, globals, functions, arguments,
//!   blocks and instructions, each with a use-set
//! - `instruction` - the opcode catalog
//! - `module` - Module/Function/BasicBlock containers and CFG queries
//! - `graph` - use-def mutation: operands, RAUW, removal, cloning
//! - `builder` - insertion-point instruction builder
//! - `lower` - AST-to-IR lowering with a lexical scope stack
//! - `passes` - the pass interface and dead code elimination
//! - `print` - textual IR rendering for diagnostics
//! - `verify` - structural invariant checker
//!
//! Ownership is a strict tree (Module -> Function -> BasicBlock ->
//! Instruction); the use-def edges are the one non-tree relation and are
//! maintained as a side table inside the arena, so every structural mutation
//! goes through [`Module`] and keeps both directions consistent.

pub mod builder;
pub mod graph;
pub mod instruction;
pub mod lower;
pub mod module;
pub mod passes;
pub mod print;
pub mod types;
pub mod value;
pub mod verify;

mod lowering_tests;

pub use builder::IrBuilder;
pub use instruction::Opcode;
pub use lower::{lower_program, LowerError};
pub use module::Module;
pub use passes::{DeadCodeElimination, Pass, PurityOracle, PuritySet};
pub use print::{print_function, print_module};
pub use types::{TypeId, TypeKind, TypeTable};
pub use value::{Use, ValueData, ValueId, ValueKind};
pub use verify::{verify_module, VerifyResult};
