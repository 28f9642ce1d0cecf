//! This module defines the core data structures and types used throughout the Varphi
//! interpreter, including the program representation, instructions, and error types.

use std::collections::HashMap;
use thiserror::Error;

/// A single cell value on the tape of a Varphi machine.
///
/// The Varphi alphabet has exactly two symbols, rendered `0` and `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// The blank symbol, rendered `0`.
    Blank,
    /// The tally symbol, rendered `1`.
    Tally,
}

impl Symbol {
    /// Returns the wire character for this symbol (`'0'` or `'1'`).
    pub fn as_char(self) -> char {
        match self {
            Symbol::Blank => '0',
            Symbol::Tally => '1',
        }
    }
}

/// Represents the possible directions a machine head can move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Move the head one cell to the left.
    Left,
    /// Move the head one cell to the right.
    Right,
}

/// An opaque handle identifying a state of a program.
///
/// State identifiers are indices into the program's name table, allocated by
/// [`ProgramBuilder`] in order of first appearance in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId(pub(crate) u32);

/// A single transition of the machine: the state to enter, the symbol to
/// write, the direction to move, and the 1-based source line the five-tuple
/// came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// The state the machine transitions to.
    pub next: StateId,
    /// The symbol written to the current cell.
    pub write: Symbol,
    /// The direction the head moves after writing.
    pub movement: Direction,
    /// 1-based source line of the rule that produced this instruction.
    pub line: u32,
}

/// A compiled Varphi program: an immutable transition table.
///
/// Nondeterministic alternatives for the same `(state, symbol)` key are kept
/// in source order so that enumeration is stable. A key with no entry means
/// "no rule, halt" — per-key lists are never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// State names, indexed by [`StateId`].
    pub states: Vec<String>,
    /// The transition table.
    pub rules: HashMap<(StateId, Symbol), Vec<Instruction>>,
    /// The state of the first rule in the source, if any.
    pub initial: Option<StateId>,
}

impl Program {
    /// Returns the name of a state.
    pub fn state_name(&self, id: StateId) -> &str {
        &self.states[id.0 as usize]
    }

    /// Returns the candidate instructions for `(state, symbol)`, or `None`
    /// if the machine halts on that configuration.
    pub fn instructions(&self, state: StateId, symbol: Symbol) -> Option<&[Instruction]> {
        self.rules.get(&(state, symbol)).map(Vec::as_slice)
    }

    /// True if the program has no rules at all.
    pub fn is_empty(&self) -> bool {
        self.initial.is_none()
    }
}

/// Incrementally constructs a [`Program`] from parsed rule lines.
///
/// The builder interns state names on first occurrence, records the source
/// state of the first rule as the initial state, and deduplicates equal
/// instructions under the same key while preserving insertion order. It is
/// purely constructive: unused states and unreachable rules are not rejected.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    states: Vec<String>,
    ids: HashMap<String, StateId>,
    rules: HashMap<(StateId, Symbol), Vec<Instruction>>,
    initial: Option<StateId>,
}

impl ProgramBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a state name, allocating a fresh [`StateId`] on first sight.
    pub fn intern(&mut self, name: &str) -> StateId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = StateId(self.states.len() as u32);
        self.states.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    /// Adds one five-tuple rule. `line` is its 1-based source line.
    pub fn add_rule(
        &mut self,
        state: &str,
        read: Symbol,
        next: &str,
        write: Symbol,
        movement: Direction,
        line: u32,
    ) {
        let state = self.intern(state);
        let next = self.intern(next);

        if self.initial.is_none() {
            self.initial = Some(state);
        }

        let instruction = Instruction {
            next,
            write,
            movement,
            line,
        };
        let entries = self.rules.entry((state, read)).or_default();
        // First occurrence wins; duplicates are dropped.
        if !entries.contains(&instruction) {
            entries.push(instruction);
        }
    }

    /// Finishes construction and returns the immutable program.
    pub fn finish(self) -> Program {
        Program {
            states: self.states,
            rules: self.rules,
            initial: self.initial,
        }
    }
}

/// A syntax error in a Varphi source file, with the offending line and a
/// caret marking the column.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct SyntaxError {
    /// 1-based line of the error.
    pub line: usize,
    /// 1-based column of the error.
    pub column: usize,
    /// Parser description of what went wrong.
    pub message: String,
    /// The source line the error occurred on.
    pub excerpt: String,
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pointer = " ".repeat(self.column.saturating_sub(1));
        write!(
            f,
            "Syntax error at line {}:{} - {}\n    {}\n    {}^",
            self.line, self.column, self.message, self.excerpt, pointer
        )
    }
}

/// Violations of the two-phase stepping protocol. These indicate a bug in
/// the driver, not in the program under execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArmingViolation {
    /// `arm_next` was called while an instruction was already armed.
    #[error("attempted to determine the next instruction when one is already armed")]
    AlreadyArmed,
    /// `commit` was called with no armed instruction.
    #[error("attempted to execute the next instruction when none is armed")]
    NotArmed,
}

/// Represents the errors that can occur while compiling or running a Varphi
/// program.
#[derive(Debug, Error)]
pub enum VarphiError {
    /// The source program is malformed.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    /// The input tape contained no tally.
    #[error("Error: Input tape must contain at least one tally (1).")]
    NoTally,
    /// The input tape contained a byte other than `0`, `1`, or a newline.
    #[error("Error: Invalid tape character (ASCII {0}).")]
    InvalidTapeCharacter(u32),
    /// An input tape was supplied to a program with no rules.
    #[error("Error: Input provided to an empty Turing machine.")]
    EmptyProgram,
    /// The two-phase stepping protocol was misused.
    #[error("Arming violation: {0}")]
    Arming(#[from] ArmingViolation),
    /// A debug adapter request was malformed or arrived out of order.
    #[error("{0}")]
    Protocol(String),
    /// A program file could not be read.
    #[error("File error: {0}")]
    File(String),
    /// An I/O failure on the input or output streams.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A malformed JSON payload on the debug adapter wire.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(builder: &mut ProgramBuilder, line: u32) {
        builder.add_rule("q0", Symbol::Tally, "q1", Symbol::Blank, Direction::Right, line);
    }

    #[test]
    fn test_intern_is_stable() {
        let mut builder = ProgramBuilder::new();
        let a = builder.intern("q0");
        let b = builder.intern("q1");
        assert_eq!(builder.intern("q0"), a);
        assert_eq!(builder.intern("q1"), b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_initial_state_is_first_rule_source() {
        let mut builder = ProgramBuilder::new();
        builder.add_rule("qa", Symbol::Blank, "qb", Symbol::Tally, Direction::Left, 1);
        builder.add_rule("qc", Symbol::Tally, "qa", Symbol::Tally, Direction::Right, 2);
        let program = builder.finish();
        assert_eq!(program.state_name(program.initial.unwrap()), "qa");
    }

    #[test]
    fn test_duplicate_rules_are_dropped() {
        let mut builder = ProgramBuilder::new();
        rule(&mut builder, 1);
        rule(&mut builder, 1);
        let program = builder.finish();
        let q0 = StateId(0);
        assert_eq!(program.instructions(q0, Symbol::Tally).unwrap().len(), 1);
    }

    #[test]
    fn test_same_key_different_lines_are_kept_in_order() {
        let mut builder = ProgramBuilder::new();
        builder.add_rule("q0", Symbol::Tally, "qa", Symbol::Blank, Direction::Right, 1);
        builder.add_rule("q0", Symbol::Tally, "qb", Symbol::Blank, Direction::Right, 2);
        let program = builder.finish();
        let candidates = program.instructions(StateId(0), Symbol::Tally).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].line, 1);
        assert_eq!(candidates[1].line, 2);
    }

    #[test]
    fn test_empty_program_has_no_initial_state() {
        let program = ProgramBuilder::new().finish();
        assert!(program.is_empty());
        assert_eq!(program.initial, None);
    }

    #[test]
    fn test_absent_key_means_halt() {
        let mut builder = ProgramBuilder::new();
        rule(&mut builder, 1);
        let program = builder.finish();
        assert!(program.instructions(StateId(0), Symbol::Blank).is_none());
    }

    #[test]
    fn test_syntax_error_display_points_at_column() {
        let error = SyntaxError {
            line: 2,
            column: 3,
            message: "expected tape_symbol".to_string(),
            excerpt: "q0 x q1 0 R".to_string(),
        };
        let rendered = error.to_string();
        assert!(rendered.starts_with("Syntax error at line 2:3 - expected tape_symbol"));
        assert!(rendered.contains("\n    q0 x q1 0 R\n      ^"));
    }
}
