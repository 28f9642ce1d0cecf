//! This module provides the parser for Varphi programs, utilizing the `pest`
//! crate. It defines functions to parse source text into five-tuple rule
//! records and to compile those records into a [`Program`].

use crate::types::{Direction, Program, ProgramBuilder, Symbol, SyntaxError, VarphiError};
use pest::error::LineColLocation;
use pest::iterators::Pair;
use pest::Parser as PestParser;
use pest_derive::Parser as PestParser;
use std::fs;
use std::path::Path;

/// Derives a `PestParser` for the Varphi grammar defined in `grammar.pest`.
#[derive(PestParser)]
#[grammar = "grammar.pest"]
pub struct VarphiParser;

/// One parsed five-tuple line, before state interning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRule {
    /// The state the rule fires in.
    pub state: String,
    /// The symbol that must be under the head.
    pub read: Symbol,
    /// The state the machine transitions to.
    pub next: String,
    /// The symbol written to the current cell.
    pub write: Symbol,
    /// The direction the head moves.
    pub movement: Direction,
    /// 1-based source line of the rule.
    pub line: u32,
}

/// Parses Varphi source text into its rule lines, in source order.
///
/// The empty program (including one containing only whitespace and comments)
/// is valid and yields no rules. Parsing stops at the first syntactic error.
pub fn parse(source: &str) -> Result<Vec<SourceRule>, VarphiError> {
    let root = VarphiParser::parse(Rule::program, source)
        .map_err(|e| VarphiError::Syntax(syntax_error(e)))? //
        .next()
        .unwrap();

    Ok(root
        .into_inner()
        .filter(|pair| pair.as_rule() == Rule::line)
        .map(parse_line)
        .collect())
}

/// Compiles Varphi source text into an executable [`Program`].
///
/// This is the main entry point for compilation: it parses the source and
/// feeds every rule to a [`ProgramBuilder`], which interns states, resolves
/// forward references, and deduplicates instructions.
pub fn compile(source: &str) -> Result<Program, VarphiError> {
    let mut builder = ProgramBuilder::new();
    for rule in parse(source)? {
        builder.add_rule(
            &rule.state,
            rule.read,
            &rule.next,
            rule.write,
            rule.movement,
            rule.line,
        );
    }
    Ok(builder.finish())
}

/// Loads and compiles a Varphi program from a `.var` source file.
pub fn compile_file(path: &Path) -> Result<Program, VarphiError> {
    let source = fs::read_to_string(path).map_err(|e| {
        VarphiError::File(format!("Failed to read file {}: {}", path.display(), e))
    })?;
    compile(&source)
}

/// Extracts the five tokens of a `Rule::line` pair.
fn parse_line(pair: Pair<Rule>) -> SourceRule {
    let line = pair.as_span().start_pos().line_col().0 as u32;
    let mut pairs = pair.into_inner();

    let state = pairs.next().unwrap().as_str().to_string();
    let read = parse_symbol(pairs.next().unwrap());
    let next = pairs.next().unwrap().as_str().to_string();
    let write = parse_symbol(pairs.next().unwrap());
    let movement = parse_direction(pairs.next().unwrap());

    SourceRule {
        state,
        read,
        next,
        write,
        movement,
        line,
    }
}

/// Parses a `Rule::tape_symbol` pair.
fn parse_symbol(pair: Pair<Rule>) -> Symbol {
    match pair.as_str() {
        "1" => Symbol::Tally,
        _ => Symbol::Blank,
    }
}

/// Parses a `Rule::direction` pair.
fn parse_direction(pair: Pair<Rule>) -> Direction {
    match pair.as_str() {
        "L" => Direction::Left,
        _ => Direction::Right,
    }
}

/// Converts a pest parse failure into a [`SyntaxError`] carrying the
/// position, the parser's message, and the offending source line.
fn syntax_error(error: pest::error::Error<Rule>) -> SyntaxError {
    let (line, column) = match error.line_col {
        LineColLocation::Pos((line, column)) => (line, column),
        LineColLocation::Span((line, column), _) => (line, column),
    };
    SyntaxError {
        line,
        column,
        message: error.variant.message().into_owned(),
        excerpt: error.line().to_string(),
    }
}
