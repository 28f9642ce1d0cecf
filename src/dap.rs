//! This module implements the Debug Adapter Protocol session for Varphi
//! programs: a framed JSON request/response/event loop on a pair of byte
//! streams, driving a [`Machine`] with breakpoints, stepping, and variable
//! inspection.
//!
//! Wire format: each message is `Content-Length: N\r\n\r\n` followed by `N`
//! bytes of JSON. Requests are dispatched by `command`; the session emits
//! responses and events with the same framing, in strict program order.

use crate::machine::{ArmOutcome, ExecutionResult, Machine};
use crate::tape::Tape;
use crate::types::{Program, Symbol, VarphiError};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::io::{BufRead, Write};

/// Builds a tape from a launch-argument string of `0`s and `1`s.
///
/// Leading and trailing `0`s are stripped; the remainder must start with a
/// `1` and contain only tape characters.
pub fn tape_from_string(string: &str) -> Result<Tape, VarphiError> {
    let trimmed = string.trim_matches('0');
    if !trimmed.starts_with('1') {
        return Err(VarphiError::NoTally);
    }
    let mut cells = Vec::with_capacity(trimmed.len());
    for character in trimmed.chars() {
        match character {
            '0' => cells.push(Symbol::Blank),
            '1' => cells.push(Symbol::Tally),
            other => return Err(VarphiError::InvalidTapeCharacter(other as u32)),
        }
    }
    Ok(Tape::from_cells(cells))
}

/// An outgoing response. Responses echo the request's `seq` as
/// `request_seq`; no outgoing `seq` counter is kept.
#[derive(Debug, Serialize)]
struct Response<'a> {
    #[serde(rename = "type")]
    ty: &'a str,
    request_seq: i64,
    success: bool,
    command: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
}

/// An outgoing event.
#[derive(Debug, Serialize)]
struct Event<'a> {
    #[serde(rename = "type")]
    ty: &'a str,
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
}

/// A Debug Adapter Protocol session over a compiled [`Program`].
///
/// The session is single-threaded and blocks on `input`; a machine is
/// constructed at `launch` and driven with the two-phase `arm_next`/`commit`
/// stepping so that the line about to execute can be reported before any
/// state mutates.
pub struct DebugSession<R: BufRead, W: Write> {
    input: R,
    output: W,
    program: Program,
    machine: Option<Machine>,
    no_debug: bool,
    breakpoints: HashSet<u32>,
    source_path: Option<String>,
    current_line: i64,
    disconnected: bool,
}

impl<R: BufRead, W: Write> DebugSession<R, W> {
    /// Creates a session that will read requests from `input` and write
    /// responses and events to `output`.
    pub fn new(program: Program, input: R, output: W) -> Self {
        Self {
            input,
            output,
            program,
            machine: None,
            no_debug: false,
            breakpoints: HashSet::new(),
            source_path: None,
            current_line: -1,
            disconnected: false,
        }
    }

    /// Serves requests until `disconnect` or an error.
    ///
    /// Every error — protocol violations, tape errors, end of input — is
    /// reported to the client as `exited{0}`, an `output` event on the
    /// `stderr` category, and `terminated`, and is then returned so the
    /// process can exit nonzero.
    pub fn run(&mut self) -> Result<(), VarphiError> {
        match self.serve() {
            Ok(()) => Ok(()),
            Err(error) => {
                let _ = self.emit_crash(&error);
                Err(error)
            }
        }
    }

    fn serve(&mut self) -> Result<(), VarphiError> {
        while !self.disconnected {
            let body = self.read_message()?.ok_or_else(|| {
                VarphiError::Protocol(
                    "Error: Unexpected end of input from debug adapter client.".to_string(),
                )
            })?;
            let message: Value = serde_json::from_slice(&body)?;
            if message["type"] == "request" {
                self.handle_request(&message)?;
            }
        }
        Ok(())
    }

    /// Reads one framed message body. `None` means end of input.
    fn read_message(&mut self) -> Result<Option<Vec<u8>>, VarphiError> {
        let mut header = String::new();
        let mut content_length: Option<usize> = None;

        loop {
            header.clear();
            if self.input.read_line(&mut header)? == 0 {
                return Ok(None);
            }
            let line = header.trim_end_matches(&['\r', '\n'][..]);
            if line.is_empty() {
                break;
            }
            if let Some(rest) = line.strip_prefix("Content-Length:") {
                let length = rest.trim().parse::<usize>().map_err(|_| {
                    VarphiError::Protocol("Error: Malformed Content-Length header.".to_string())
                })?;
                content_length = Some(length);
            }
            // Other headers are ignored.
        }

        let length = content_length.ok_or_else(|| {
            VarphiError::Protocol("Error: Missing Content-Length header.".to_string())
        })?;
        let mut body = vec![0u8; length];
        self.input.read_exact(&mut body)?;
        Ok(Some(body))
    }

    fn handle_request(&mut self, request: &Value) -> Result<(), VarphiError> {
        let seq = request["seq"].as_i64().unwrap_or(0);
        let command = request["command"].as_str().unwrap_or("").to_string();
        let arguments = &request["arguments"];

        match command.as_str() {
            "initialize" => self.handle_initialize(seq),
            "launch" => self.handle_launch(seq, arguments),
            "setBreakpoints" => self.handle_set_breakpoints(seq, arguments),
            "configurationDone" => self.handle_configuration_done(seq),
            "threads" => self.handle_threads(seq),
            "stackTrace" => self.handle_stack_trace(seq),
            "scopes" => self.handle_scopes(seq),
            "variables" => self.handle_variables(seq),
            "next" | "stepIn" | "stepOut" => self.handle_step(seq, &command),
            "continue" => self.handle_continue(seq),
            "disconnect" => self.handle_disconnect(seq),
            // Unknown commands are ignored without a response.
            _ => Ok(()),
        }
    }

    fn handle_initialize(&mut self, seq: i64) -> Result<(), VarphiError> {
        let body = json!({
            "supportsConfigurationDoneRequest": true,
            "supportsSingleThreadExecutionRequests": true,
        });
        self.send_response(seq, true, "initialize", Some(body))?;
        self.send_event("initialized", None)
    }

    fn handle_launch(&mut self, seq: i64, arguments: &Value) -> Result<(), VarphiError> {
        let no_debug = arguments
            .get("noDebug")
            .and_then(Value::as_bool)
            .ok_or_else(|| missing_argument("noDebug"))?;
        let source_path = arguments
            .get("sourcePath")
            .and_then(Value::as_str)
            .ok_or_else(|| missing_argument("sourcePath"))?;
        let tape_string = arguments
            .get("tape")
            .and_then(Value::as_str)
            .ok_or_else(|| missing_argument("tape"))?;

        let tape = tape_from_string(tape_string)?;
        self.machine = Some(Machine::new(self.program.clone(), tape)?);
        self.no_debug = no_debug;
        self.source_path = Some(source_path.to_string());
        self.send_response(seq, true, "launch", None)
    }

    fn handle_set_breakpoints(&mut self, seq: i64, arguments: &Value) -> Result<(), VarphiError> {
        let mut verified = Vec::new();
        if let Some(breakpoints) = arguments.get("breakpoints").and_then(Value::as_array) {
            for breakpoint in breakpoints {
                let line = breakpoint
                    .get("line")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| {
                        VarphiError::Protocol(
                            "Error: Breakpoint without a line number.".to_string(),
                        )
                    })?;
                self.breakpoints.insert(line as u32);
                verified.push(json!({ "verified": true }));
            }
        }

        if arguments.get("sourceModified").and_then(Value::as_bool) == Some(true) {
            return Err(VarphiError::Protocol(
                "Error: Source code change detected. Please kindly restart the debugging process."
                    .to_string(),
            ));
        }

        self.send_response(
            seq,
            true,
            "setBreakpoints",
            Some(json!({ "breakpoints": verified })),
        )?;
        if self.no_debug {
            self.breakpoints.clear();
        }
        Ok(())
    }

    fn handle_configuration_done(&mut self, seq: i64) -> Result<(), VarphiError> {
        self.send_response(seq, true, "configurationDone", None)?;

        if self.no_debug {
            loop {
                if self.machine()?.step() == ExecutionResult::Halted {
                    return self.emit_halt();
                }
            }
        }

        if self.breakpoints.is_empty() {
            match self.machine()?.arm_next()? {
                ArmOutcome::Armed(instruction) => {
                    self.current_line = instruction.line as i64;
                    self.send_stopped("step")
                }
                ArmOutcome::Halted => self.emit_halt(),
            }
        } else {
            loop {
                match self.machine()?.arm_next()? {
                    ArmOutcome::Armed(instruction) => {
                        self.current_line = instruction.line as i64;
                        if self.breakpoints.contains(&instruction.line) {
                            return self.send_stopped("breakpoint");
                        }
                        self.machine()?.commit()?;
                    }
                    ArmOutcome::Halted => return self.emit_halt(),
                }
            }
        }
    }

    fn handle_threads(&mut self, seq: i64) -> Result<(), VarphiError> {
        let body = json!({ "threads": [{ "id": 1, "name": "thread1" }] });
        self.send_response(seq, true, "threads", Some(body))
    }

    fn handle_stack_trace(&mut self, seq: i64) -> Result<(), VarphiError> {
        let body = json!({
            "stackFrames": [{
                "id": 0,
                "name": "source",
                "source": { "name": "Varphi Program", "path": self.source_path },
                "line": self.current_line,
                "column": 0,
            }],
            "totalFrames": 1,
        });
        self.send_response(seq, true, "stackTrace", Some(body))
    }

    fn handle_scopes(&mut self, seq: i64) -> Result<(), VarphiError> {
        let body = json!({
            "scopes": [{ "name": "Machine Variables", "variablesReference": 1 }]
        });
        self.send_response(seq, true, "scopes", Some(body))
    }

    fn handle_variables(&mut self, seq: i64) -> Result<(), VarphiError> {
        let (tape_view, state, head, zero) = {
            let machine = self.machine()?;
            (
                machine.tape().render_with_head(machine.head_index()),
                machine.state_name().to_string(),
                machine.head_index().to_string(),
                (-machine.tape().min_touched()).to_string(),
            )
        };
        let body = json!({
            "variables": [
                { "name": "Tape", "value": tape_view, "variablesReference": 0 },
                { "name": "State", "value": state, "variablesReference": 0 },
                { "name": "Head", "value": head, "variablesReference": 0 },
                { "name": "Tape Zero", "value": zero, "variablesReference": 0 },
            ]
        });
        self.send_response(seq, true, "variables", Some(body))
    }

    /// `next`, `stepIn`, and `stepOut` behave identically: commit the armed
    /// instruction, arm the next one, and stop again. When arming finds no
    /// rule the halt triple is emitted and no response is sent.
    fn handle_step(&mut self, seq: i64, command: &str) -> Result<(), VarphiError> {
        self.machine()?.commit()?;
        match self.machine()?.arm_next()? {
            ArmOutcome::Armed(instruction) => {
                self.current_line = instruction.line as i64;
                self.send_response(
                    seq,
                    true,
                    command,
                    Some(json!({ "allThreadsContinued": true })),
                )?;
                self.send_stopped("step")
            }
            ArmOutcome::Halted => self.emit_halt(),
        }
    }

    fn handle_continue(&mut self, seq: i64) -> Result<(), VarphiError> {
        loop {
            self.machine()?.commit()?;
            match self.machine()?.arm_next()? {
                ArmOutcome::Armed(instruction) => {
                    self.current_line = instruction.line as i64;
                    if self.breakpoints.contains(&instruction.line) {
                        self.send_response(
                            seq,
                            true,
                            "continue",
                            Some(json!({ "allThreadsContinued": true })),
                        )?;
                        return self.send_stopped("breakpoint");
                    }
                }
                ArmOutcome::Halted => return self.emit_halt(),
            }
        }
    }

    fn handle_disconnect(&mut self, seq: i64) -> Result<(), VarphiError> {
        // The command is echoed as "terminate"; existing clients expect it.
        self.send_response(seq, true, "terminate", None)?;
        self.disconnected = true;
        Ok(())
    }

    fn machine(&mut self) -> Result<&mut Machine, VarphiError> {
        self.machine
            .as_mut()
            .ok_or_else(|| VarphiError::Protocol("Error: No Turing machine launched.".to_string()))
    }

    /// The halt triple: `exited{0}`, the tape on the console category, then
    /// `terminated`.
    fn emit_halt(&mut self) -> Result<(), VarphiError> {
        let rendered = self
            .machine
            .as_ref()
            .map(|machine| machine.tape().render())
            .unwrap_or_default();
        self.send_event("exited", Some(json!({ "exitCode": 0 })))?;
        self.send_event(
            "output",
            Some(json!({ "category": "console", "output": rendered })),
        )?;
        self.send_event("terminated", Some(json!({})))
    }

    /// The crash triple: like [`Self::emit_halt`] but reporting the error on
    /// the `stderr` category.
    fn emit_crash(&mut self, error: &VarphiError) -> Result<(), VarphiError> {
        self.send_event("exited", Some(json!({ "exitCode": 0 })))?;
        self.send_event(
            "output",
            Some(json!({ "category": "stderr", "output": error.to_string() })),
        )?;
        self.send_event("terminated", Some(json!({})))
    }

    fn send_stopped(&mut self, reason: &str) -> Result<(), VarphiError> {
        self.send_event(
            "stopped",
            Some(json!({ "reason": reason, "threadId": 1, "allThreadsStopped": true })),
        )
    }

    fn send_response(
        &mut self,
        request_seq: i64,
        success: bool,
        command: &str,
        body: Option<Value>,
    ) -> Result<(), VarphiError> {
        self.send_message(&Response {
            ty: "response",
            request_seq,
            success,
            command,
            message: None,
            body,
        })
    }

    fn send_event(&mut self, event: &str, body: Option<Value>) -> Result<(), VarphiError> {
        self.send_message(&Event {
            ty: "event",
            event,
            body,
        })
    }

    fn send_message<T: Serialize>(&mut self, message: &T) -> Result<(), VarphiError> {
        let body = serde_json::to_vec(message)?;
        write!(self.output, "Content-Length: {}\r\n\r\n", body.len())?;
        self.output.write_all(&body)?;
        self.output.flush()?;
        Ok(())
    }
}

fn missing_argument(name: &str) -> VarphiError {
    VarphiError::Protocol(format!(
        "Error: Missing argument \"{name}\" for Debug Adapter."
    ))
}
