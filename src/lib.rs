//! This crate provides the core logic for the Varphi language: a parser for
//! transition-table programs, a possibly nondeterministic single-tape Turing
//! machine runtime, terminal run modes, and a Debug Adapter Protocol session
//! for IDE debugging.

pub mod dap;
pub mod machine;
pub mod parser;
pub mod programs;
pub mod runner;
pub mod tape;
pub mod types;

/// Re-exports the `Rule` enum from the parser module, used by the `pest` grammar.
pub use crate::parser::Rule;
/// Re-exports the debug adapter session from the dap module.
pub use dap::DebugSession;
/// Re-exports the machine runtime from the machine module.
pub use machine::{ArmOutcome, ExecutionResult, Machine, Selector, UniformSelector};
/// Re-exports the compilation entry points from the parser module.
pub use parser::{compile, compile_file, parse};
/// Re-exports the tape and head from the tape module.
pub use tape::{Head, Tape};
/// Re-exports the core program and error types from the types module.
pub use types::{
    ArmingViolation, Direction, Instruction, Program, ProgramBuilder, StateId, Symbol,
    SyntaxError, VarphiError,
};
