//! Scripted [`ProcessRunner`] for tests.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::process::{
    CommandSpec, OutputMode, OutputTransform, ProcessError, ProcessOutput, ProcessResult,
    ProcessRunner,
};

/// Canned result for a matched invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// Succeed with this stdout.
    Stdout(String),
    /// Exit with a non-zero status.
    Exit { code: i32, output: String },
    /// Behave as if the program isn't installed.
    NotFound,
}

impl MockResponse {
    fn to_result(&self, program: &str) -> ProcessResult<ProcessOutput> {
        match self {
            MockResponse::Stdout(stdout) => Ok(ProcessOutput::from_stdout(stdout.clone())),
            MockResponse::Exit { code, output } => Err(ProcessError::NonZeroExit {
                code: *code,
                output: output.clone(),
            }),
            MockResponse::NotFound => Err(ProcessError::ExecutableNotFound {
                program: program.to_string(),
            }),
        }
    }
}

/// How an invocation was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationKind {
    Run(OutputMode),
    Piped(OutputTransform),
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: CommandSpec,
    pub kind: InvocationKind,
}

#[derive(Debug, Clone)]
struct Rule {
    program: String,
    prefix: Vec<String>,
    response: MockResponse,
}

impl Rule {
    fn matches(&self, command: &CommandSpec) -> bool {
        command.program == self.program && command.args.starts_with(&self.prefix)
    }
}

/// Configurable runner that never spawns anything.
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    rules: Arc<Mutex<Vec<Rule>>>,
    missing: Arc<Mutex<HashSet<String>>>,
    invocations: Arc<Mutex<Vec<Invocation>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to `program` invocations whose arguments start with `prefix`.
    pub fn respond(self, program: &str, prefix: &[&str], response: MockResponse) -> Self {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(Rule {
                program: program.to_string(),
                prefix: prefix.iter().map(|s| s.to_string()).collect(),
                response,
            });
        }
        self
    }

    /// Shorthand for a successful response with `stdout`.
    pub fn stdout(self, program: &str, prefix: &[&str], stdout: &str) -> Self {
        self.respond(program, prefix, MockResponse::Stdout(stdout.to_string()))
    }

    /// Make `locate(program)` fail.
    pub fn without(self, program: &str) -> Self {
        if let Ok(mut missing) = self.missing.lock() {
            missing.insert(program.to_string());
        }
        self
    }

    /// Every invocation so far, in order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Just the command lines, rendered.
    pub fn command_lines(&self) -> Vec<String> {
        self.invocations()
            .into_iter()
            .map(|i| i.command.to_string())
            .collect()
    }

    fn record(&self, command: &CommandSpec, kind: InvocationKind) {
        if let Ok(mut calls) = self.invocations.lock() {
            calls.push(Invocation {
                command: command.clone(),
                kind,
            });
        }
    }

    fn respond_to(&self, command: &CommandSpec) -> ProcessResult<ProcessOutput> {
        let rules = self.rules.lock().map(|r| r.clone()).unwrap_or_default();
        match rules.iter().find(|rule| rule.matches(command)) {
            Some(rule) => rule.response.to_result(&command.program),
            None => Ok(ProcessOutput::default()),
        }
    }
}

impl ProcessRunner for MockRunner {
    fn run(&self, command: &CommandSpec, mode: OutputMode) -> ProcessResult<ProcessOutput> {
        self.record(command, InvocationKind::Run(mode));
        let output = self.respond_to(command)?;
        match mode {
            OutputMode::Capture => Ok(output),
            OutputMode::Inherit => Ok(ProcessOutput::default()),
        }
    }

    fn run_piped(&self, command: &CommandSpec, transform: &OutputTransform) -> ProcessResult<()> {
        self.record(command, InvocationKind::Piped(transform.clone()));
        self.respond_to(command).map(|_| ())
    }

    fn locate(&self, program: &str) -> ProcessResult<PathBuf> {
        let missing = self
            .missing
            .lock()
            .map(|m| m.contains(program))
            .unwrap_or(false);
        if missing {
            Err(ProcessError::ExecutableNotFound {
                program: program.to_string(),
            })
        } else {
            Ok(PathBuf::from("/usr/bin").join(program))
        }
    }
}
