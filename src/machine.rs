//! This module defines the [`Machine`] struct, which simulates a possibly
//! nondeterministic single-tape Turing machine over a compiled [`Program`].
//! It provides the plain `step` used by the runners and the two-phase
//! `arm_next`/`commit` pair used by the debug adapter.

use crate::tape::{Head, Tape};
use crate::types::{ArmingViolation, Direction, Instruction, Program, StateId, VarphiError};
use rand::rngs::ThreadRng;
use rand::Rng;

/// The outcome of one execution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The machine performed a transition and can continue.
    Continue,
    /// No rule matches the current (state, symbol); the machine has halted.
    /// Halt is terminal: further steps report it again.
    Halted,
}

/// The outcome of arming the next instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// The instruction that will execute on the next [`Machine::commit`].
    Armed(Instruction),
    /// No rule matches; nothing was armed.
    Halted,
}

/// Chooses among nondeterministic alternatives.
///
/// The machine consults its selector only when a (state, symbol) key has more
/// than one instruction. The runtime default is uniform random choice; tests
/// inject deterministic implementations.
pub trait Selector {
    /// Returns an index in `0..candidates`. `candidates` is at least 2.
    fn select(&mut self, candidates: usize) -> usize;
}

/// Uniform random selection, the runtime default.
#[derive(Debug, Default)]
pub struct UniformSelector {
    rng: ThreadRng,
}

impl Selector for UniformSelector {
    fn select(&mut self, candidates: usize) -> usize {
        self.rng.gen_range(0..candidates)
    }
}

/// Always picks the given index, clamped to the candidate list. Useful for
/// exercising nondeterministic programs deterministically.
#[derive(Debug, Clone, Copy)]
pub struct FixedSelector(pub usize);

impl Selector for FixedSelector {
    fn select(&mut self, candidates: usize) -> usize {
        self.0.min(candidates - 1)
    }
}

/// A Turing machine: a program together with its mutable run state.
///
/// A machine is constructed with a fresh tape per run. The program is
/// immutable; the tape, head, and current state mutate in place. After
/// halting the machine is inert but its tape remains readable for output.
pub struct Machine {
    program: Program,
    tape: Tape,
    head: Head,
    state: StateId,
    armed: Option<Instruction>,
    selector: Box<dyn Selector>,
}

impl Machine {
    /// Creates a machine over `program` with the given input tape, using
    /// uniform random choice for nondeterministic rules.
    ///
    /// Fails with [`VarphiError::EmptyProgram`] if the program has no rules:
    /// an empty machine accepts no input.
    pub fn new(program: Program, tape: Tape) -> Result<Self, VarphiError> {
        Self::with_selector(program, tape, Box::<UniformSelector>::default())
    }

    /// Creates a machine with an explicit [`Selector`].
    pub fn with_selector(
        program: Program,
        tape: Tape,
        selector: Box<dyn Selector>,
    ) -> Result<Self, VarphiError> {
        let state = program.initial.ok_or(VarphiError::EmptyProgram)?;
        Ok(Self {
            program,
            tape,
            head: Head::new(),
            state,
            armed: None,
            selector,
        })
    }

    /// The current state.
    pub fn state(&self) -> StateId {
        self.state
    }

    /// The name of the current state.
    pub fn state_name(&self) -> &str {
        self.program.state_name(self.state)
    }

    /// The machine's tape.
    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    /// The head's current cell index.
    pub fn head_index(&self) -> i64 {
        self.head.index()
    }

    /// Selects an instruction for the current (state, symbol), or `None` if
    /// no rule matches.
    fn select_instruction(&mut self) -> Option<Instruction> {
        let symbol = self.head.read(&mut self.tape);
        let candidates = self.program.instructions(self.state, symbol)?;
        let chosen = if candidates.len() == 1 {
            candidates[0]
        } else {
            candidates[self.selector.select(candidates.len())]
        };
        Some(chosen)
    }

    /// Applies an instruction: enter the next state, write, then move.
    fn apply(&mut self, instruction: Instruction) {
        self.state = instruction.next;
        self.head.write(&mut self.tape, instruction.write);
        match instruction.movement {
            Direction::Left => self.head.left(),
            Direction::Right => self.head.right(),
        }
    }

    /// Executes one transition.
    ///
    /// Reads the symbol under the head, picks a matching instruction, and
    /// applies it. Returns [`ExecutionResult::Halted`] when no rule matches.
    pub fn step(&mut self) -> ExecutionResult {
        match self.select_instruction() {
            Some(instruction) => {
                self.apply(instruction);
                ExecutionResult::Continue
            }
            None => ExecutionResult::Halted,
        }
    }

    /// Determines the next instruction without executing it.
    ///
    /// The chosen instruction is stored until [`Machine::commit`] applies it,
    /// letting a debugger report the source line about to execute before any
    /// state mutates. Arming twice without an intervening commit is a driver
    /// bug and fails with [`ArmingViolation::AlreadyArmed`].
    pub fn arm_next(&mut self) -> Result<ArmOutcome, ArmingViolation> {
        if self.armed.is_some() {
            return Err(ArmingViolation::AlreadyArmed);
        }
        match self.select_instruction() {
            Some(instruction) => {
                self.armed = Some(instruction);
                Ok(ArmOutcome::Armed(instruction))
            }
            None => Ok(ArmOutcome::Halted),
        }
    }

    /// Applies the armed instruction and clears it.
    ///
    /// One `arm_next`/`commit` pair is observationally identical to one
    /// [`Machine::step`] making the same choice.
    pub fn commit(&mut self) -> Result<(), ArmingViolation> {
        let instruction = self.armed.take().ok_or(ArmingViolation::NotArmed)?;
        self.apply(instruction);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::compile;
    use crate::types::Symbol;

    const INCREMENT: &str = "q0 1 q0 1 R\nq0 0 qf 1 L";
    const COIN_FLIP: &str = "qStart 1 qHeads 0 R\nqStart 1 qTails 0 R";

    fn machine(source: &str, tape: &str) -> Machine {
        let cells = tape
            .chars()
            .map(|c| if c == '1' { Symbol::Tally } else { Symbol::Blank })
            .collect();
        Machine::new(compile(source).unwrap(), Tape::from_cells(cells)).unwrap()
    }

    fn run_to_halt(machine: &mut Machine) -> usize {
        let mut steps = 0;
        while machine.step() == ExecutionResult::Continue {
            steps += 1;
        }
        steps
    }

    #[test]
    fn test_empty_program_rejects_input() {
        let program = compile("").unwrap();
        let result = Machine::new(program, Tape::new());
        assert!(matches!(result, Err(VarphiError::EmptyProgram)));
    }

    #[test]
    fn test_deterministic_run_increments_tally_count() {
        let mut m = machine(INCREMENT, "11");
        run_to_halt(&mut m);
        assert_eq!(m.tape().render(), "111");
        assert_eq!(m.state_name(), "qf");
    }

    #[test]
    fn test_halt_is_terminal() {
        let mut m = machine(INCREMENT, "1");
        run_to_halt(&mut m);
        assert_eq!(m.step(), ExecutionResult::Halted);
        assert_eq!(m.step(), ExecutionResult::Halted);
    }

    #[test]
    fn test_arm_then_commit_matches_plain_step() {
        let mut stepped = machine(INCREMENT, "11");
        let mut armed = machine(INCREMENT, "11");

        loop {
            match armed.arm_next().unwrap() {
                ArmOutcome::Armed(_) => armed.commit().unwrap(),
                ArmOutcome::Halted => break,
            }
        }
        run_to_halt(&mut stepped);

        assert_eq!(armed.tape().render(), stepped.tape().render());
        assert_eq!(armed.state(), stepped.state());
        assert_eq!(armed.head_index(), stepped.head_index());
    }

    #[test]
    fn test_arm_reports_upcoming_line_without_mutating() {
        let mut m = machine(INCREMENT, "1");
        let outcome = m.arm_next().unwrap();
        match outcome {
            ArmOutcome::Armed(instruction) => assert_eq!(instruction.line, 1),
            ArmOutcome::Halted => panic!("machine should not halt on first arm"),
        }
        // Nothing has executed yet.
        assert_eq!(m.state_name(), "q0");
        assert_eq!(m.head_index(), 0);
    }

    #[test]
    fn test_double_arm_is_a_violation() {
        let mut m = machine(INCREMENT, "1");
        m.arm_next().unwrap();
        assert_eq!(m.arm_next(), Err(ArmingViolation::AlreadyArmed));
    }

    #[test]
    fn test_commit_without_arm_is_a_violation() {
        let mut m = machine(INCREMENT, "1");
        assert_eq!(m.commit(), Err(ArmingViolation::NotArmed));
    }

    #[test]
    fn test_arm_on_halted_machine_arms_nothing() {
        let mut m = machine(INCREMENT, "1");
        run_to_halt(&mut m);
        assert_eq!(m.arm_next(), Ok(ArmOutcome::Halted));
        // Halt did not arm, so arming again reports halt, not a violation.
        assert_eq!(m.arm_next(), Ok(ArmOutcome::Halted));
    }

    #[test]
    fn test_fixed_selector_resolves_nondeterminism() {
        let program = compile(COIN_FLIP).unwrap();

        let mut heads = Machine::with_selector(
            program.clone(),
            Tape::from_cells(vec![Symbol::Tally]),
            Box::new(FixedSelector(0)),
        )
        .unwrap();
        heads.step();
        assert_eq!(heads.state_name(), "qHeads");

        let mut tails = Machine::with_selector(
            program,
            Tape::from_cells(vec![Symbol::Tally]),
            Box::new(FixedSelector(1)),
        )
        .unwrap();
        tails.step();
        assert_eq!(tails.state_name(), "qTails");
    }

    #[test]
    fn test_fixed_selector_makes_full_runs_deterministic() {
        let program = compile(crate::programs::source("coin_flip").unwrap()).unwrap();
        let mut m = Machine::with_selector(
            program,
            Tape::from_cells(vec![Symbol::Tally]),
            Box::new(FixedSelector(0)),
        )
        .unwrap();
        run_to_halt(&mut m);
        assert_eq!(m.tape().render().trim_matches('0'), "1");
    }

    #[test]
    fn test_random_selection_stays_within_candidates() {
        // Either branch blanks the cell and moves right; the run must halt
        // after the single possible step whatever the selector chose.
        let mut m = machine(COIN_FLIP, "1");
        assert_eq!(m.step(), ExecutionResult::Continue);
        assert!(m.state_name() == "qHeads" || m.state_name() == "qTails");
        assert_eq!(m.step(), ExecutionResult::Halted);
    }

    #[test]
    fn test_head_moves_left_into_negative_indices() {
        let mut m = machine("q0 1 qf 0 L", "1");
        m.step();
        assert_eq!(m.head_index(), -1);
        assert_eq!(m.tape().render(), "0");
    }
}
