//! This module provides the terminal run modes: the plain runner plus the
//! complexity, prompting, and stepwise variants. All of them read an input
//! tape from a byte stream, drive a [`Machine`] to halt, and print the
//! resulting tape.

use crate::machine::{ExecutionResult, Machine};
use crate::tape::Tape;
use crate::types::{Program, Symbol, VarphiError};
use std::io::{self, Read, Write};

/// Reads one byte, retrying on interruption. `None` means end of input.
fn read_byte<R: Read>(input: &mut R) -> Result<Option<u8>, VarphiError> {
    let mut buf = [0u8; 1];
    loop {
        match input.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Reads an input tape from a byte stream.
///
/// Leading `0` bytes are skipped; the returned tape starts (cell 0) at the
/// first `1`. Reading stops at the first `\n` or `\r` byte, so a `\r\n`
/// terminator leaves the `\n` behind for the next read. A terminator or end
/// of input before any tally is [`VarphiError::NoTally`]; any byte other
/// than `0`, `1`, or a terminator is [`VarphiError::InvalidTapeCharacter`].
pub fn read_tape<R: Read>(input: &mut R) -> Result<Tape, VarphiError> {
    // Skip leading blanks until the first tally.
    loop {
        match read_byte(input)? {
            Some(b'1') => break,
            Some(b'0') => continue,
            Some(b'\n') | Some(b'\r') | None => return Err(VarphiError::NoTally),
            Some(other) => return Err(VarphiError::InvalidTapeCharacter(other as u32)),
        }
    }

    let mut cells = vec![Symbol::Tally];
    loop {
        match read_byte(input)? {
            Some(b'0') => cells.push(Symbol::Blank),
            Some(b'1') => cells.push(Symbol::Tally),
            Some(b'\n') | Some(b'\r') | None => break,
            Some(other) => return Err(VarphiError::InvalidTapeCharacter(other as u32)),
        }
    }
    Ok(Tape::from_cells(cells))
}

/// Runs `program` on a tape read from `input` and prints the halt tape.
pub fn run<R: Read, W: Write>(
    program: &Program,
    mut input: R,
    mut output: W,
) -> Result<(), VarphiError> {
    let tape = read_tape(&mut input)?;
    let mut machine = Machine::new(program.clone(), tape)?;
    while machine.step() == ExecutionResult::Continue {}
    writeln!(output, "{}", machine.tape().render())?;
    Ok(())
}

/// Runs like [`run`], additionally reporting the number of steps taken and
/// the number of tape cells touched.
pub fn run_with_complexity<R: Read, W: Write>(
    program: &Program,
    mut input: R,
    mut output: W,
) -> Result<(), VarphiError> {
    let tape = read_tape(&mut input)?;
    let mut machine = Machine::new(program.clone(), tape)?;
    let mut steps = 0u64;
    while machine.step() == ExecutionResult::Continue {
        steps += 1;
    }
    writeln!(output, "Output Tape: {}", machine.tape().render())?;
    writeln!(output, "Number of Steps: {steps}")?;
    writeln!(
        output,
        "Number of Tape Cells Accessed: {}",
        machine.tape().cells_touched()
    )?;
    Ok(())
}

/// Runs like [`run`], prompting for the input tape and labeling the output.
pub fn run_with_prompts<R: Read, W: Write>(
    program: &Program,
    mut input: R,
    mut output: W,
) -> Result<(), VarphiError> {
    write!(output, "Input Tape: ")?;
    output.flush()?;
    let tape = read_tape(&mut input)?;
    let mut machine = Machine::new(program.clone(), tape)?;
    while machine.step() == ExecutionResult::Continue {}
    writeln!(output, "Output Tape: {}", machine.tape().render())?;
    Ok(())
}

/// Runs step by step in the terminal, pausing for a byte of input before
/// each transition and printing the state and head-annotated tape.
///
/// At end of input the pauses stop and the machine runs to halt. The final
/// report matches [`run_with_complexity`].
pub fn run_stepwise<R: Read, W: Write>(
    program: &Program,
    mut input: R,
    mut output: W,
) -> Result<(), VarphiError> {
    write!(output, "Input Tape: ")?;
    output.flush()?;
    let tape = read_tape(&mut input)?;
    let mut machine = Machine::new(program.clone(), tape)?;
    let mut steps = 0u64;
    loop {
        writeln!(output, "State:  {}", machine.state_name())?;
        writeln!(
            output,
            "Tape:  {}",
            machine.tape().render_with_head(machine.head_index())
        )?;
        writeln!(output, "Press ENTER to step...")?;
        read_byte(&mut input)?;
        if machine.step() == ExecutionResult::Halted {
            break;
        }
        steps += 1;
    }
    writeln!(output, "Output Tape: {}", machine.tape().render())?;
    writeln!(output, "Number of Steps: {steps}")?;
    writeln!(
        output,
        "Number of Tape Cells Accessed: {}",
        machine.tape().cells_touched()
    )?;
    Ok(())
}
