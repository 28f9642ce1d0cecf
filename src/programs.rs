//! Bundled demo programs, embedded at build time and compiled on first use.

use crate::parser::compile;
use crate::types::Program;

/// A bundled demo program: its name and source text.
#[derive(Debug, Clone, Copy)]
pub struct ProgramInfo {
    pub name: &'static str,
    pub source: &'static str,
}

const PROGRAM_TEXTS: [ProgramInfo; 6] = [
    ProgramInfo {
        name: "add1",
        source: include_str!("../demos/add1.var"),
    },
    ProgramInfo {
        name: "add",
        source: include_str!("../demos/add.var"),
    },
    ProgramInfo {
        name: "mult2",
        source: include_str!("../demos/mult2.var"),
    },
    ProgramInfo {
        name: "subtract",
        source: include_str!("../demos/subtract.var"),
    },
    ProgramInfo {
        name: "rock_paper_scissors",
        source: include_str!("../demos/rock_paper_scissors.var"),
    },
    ProgramInfo {
        name: "coin_flip",
        source: include_str!("../demos/coin_flip.var"),
    },
];

lazy_static::lazy_static! {
    /// The demo programs, compiled once on first access. A bundled program
    /// that fails to compile is reported and skipped.
    pub static ref PROGRAMS: Vec<(&'static str, Program)> = PROGRAM_TEXTS
        .iter()
        .filter_map(|info| match compile(info.source) {
            Ok(program) => Some((info.name, program)),
            Err(e) => {
                eprintln!("Failed to compile bundled program {}: {}", info.name, e);
                None
            }
        })
        .collect();
}

/// Returns the source text of a bundled demo program.
pub fn source(name: &str) -> Option<&'static str> {
    PROGRAM_TEXTS
        .iter()
        .find(|info| info.name == name)
        .map(|info| info.source)
}

/// Returns a compiled copy of a bundled demo program.
pub fn demo(name: &str) -> Option<Program> {
    PROGRAMS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, program)| program.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_bundled_programs_compile() {
        assert_eq!(PROGRAMS.len(), PROGRAM_TEXTS.len());
    }

    #[test]
    fn test_demo_lookup() {
        assert!(demo("add1").is_some());
        assert!(demo("no_such_program").is_none());
        assert!(source("coin_flip").unwrap().contains("qStart"));
    }

    #[test]
    fn test_coin_flip_is_nondeterministic() {
        let program = demo("coin_flip").unwrap();
        let start = program.initial.unwrap();
        let candidates = program
            .instructions(start, crate::types::Symbol::Tally)
            .unwrap();
        assert_eq!(candidates.len(), 2);
    }
}
