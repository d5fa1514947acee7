//! External process execution.
//!
//! Every toolchain invocation goes through a [`ProcessRunner`]. The system
//! implementation spawns real processes; tests swap in
//! [`crate::mock::MockRunner`] to script results and observe invocations.
//!
//! A run either captures output (for commands whose text gets parsed) or
//! passes it through live. The piped variant feeds the primary process's
//! stdout into an [`OutputTransform`] such as `xcbeautify`. The transform is
//! strictly best effort: if it can't be found or started the primary output
//! is forwarded unformatted, and only the primary's exit status decides the
//! result.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::{debug, warn};

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("executable {program:?} not found on PATH")]
    ExecutableNotFound { program: String },

    #[error("failed to start {program:?}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("exited with status {code}{}", output_suffix(.output))]
    NonZeroExit { code: i32, output: String },

    #[error("terminated by signal {signal}{}", output_suffix(.output))]
    Signaled { signal: i32, output: String },

    #[error("I/O error while running command: {0}")]
    Io(#[from] io::Error),
}

fn output_suffix(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(":\n{trimmed}")
    }
}

/// Result type for process operations.
pub type ProcessResult<T> = Result<T, ProcessError>;

/// A fully described invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    /// Added on top of the inherited environment.
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).envs(&self.env);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }
}

impl fmt::Display for CommandSpec {
    /// Shell-like rendering used in logs and error messages.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{}={} ", key, shell_quote(value))?;
        }
        f.write_str(&shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

fn shell_quote(text: &str) -> String {
    let plain = !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        text.to_string()
    } else {
        format!("'{}'", text.replace('\'', r"'\''"))
    }
}

/// What happens to a process's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Collect stdout and stderr for the caller.
    Capture,
    /// Let the output go straight to the terminal.
    Inherit,
}

/// Output of a successful run. Empty in [`OutputMode::Inherit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn from_stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// A secondary process that receives the primary process's stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTransform {
    pub program: String,
    pub args: Vec<String>,
}

impl OutputTransform {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Runs external commands.
pub trait ProcessRunner {
    /// Run `command` to completion.
    fn run(&self, command: &CommandSpec, mode: OutputMode) -> ProcessResult<ProcessOutput>;

    /// Run `command` with its stdout piped through `transform`.
    ///
    /// The transform's own failures are logged and never change the result.
    fn run_piped(&self, command: &CommandSpec, transform: &OutputTransform) -> ProcessResult<()>;

    /// Resolve `program` against the search path.
    fn locate(&self, program: &str) -> ProcessResult<PathBuf>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, command: &CommandSpec, mode: OutputMode) -> ProcessResult<ProcessOutput> {
        (**self).run(command, mode)
    }

    fn run_piped(&self, command: &CommandSpec, transform: &OutputTransform) -> ProcessResult<()> {
        (**self).run_piped(command, transform)
    }

    fn locate(&self, program: &str) -> ProcessResult<PathBuf> {
        (**self).locate(program)
    }
}

/// [`ProcessRunner`] that spawns real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn spawn_error(program: &str, source: io::Error) -> ProcessError {
        if source.kind() == io::ErrorKind::NotFound {
            ProcessError::ExecutableNotFound {
                program: program.to_string(),
            }
        } else {
            ProcessError::SpawnFailed {
                program: program.to_string(),
                source,
            }
        }
    }

    /// Start the transform with a piped stdin, or explain why not.
    fn spawn_transform(&self, transform: &OutputTransform) -> Result<Child, String> {
        let program = self.locate(&transform.program).map_err(|e| e.to_string())?;
        Command::new(program)
            .args(&transform.args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to start {:?}: {}", transform.program, e))
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, command: &CommandSpec, mode: OutputMode) -> ProcessResult<ProcessOutput> {
        debug!(command = %command, "running");
        let mut process = command.to_command();

        match mode {
            OutputMode::Capture => {
                let output = process
                    .stdin(Stdio::null())
                    .output()
                    .map_err(|e| Self::spawn_error(&command.program, e))?;
                let captured = ProcessOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                };
                check_status(output.status, &captured.combined())?;
                Ok(captured)
            }
            OutputMode::Inherit => {
                let status = process
                    .status()
                    .map_err(|e| Self::spawn_error(&command.program, e))?;
                check_status(status, "")?;
                Ok(ProcessOutput::default())
            }
        }
    }

    fn run_piped(&self, command: &CommandSpec, transform: &OutputTransform) -> ProcessResult<()> {
        debug!(command = %command, formatter = %transform.program, "running with output formatter");
        let mut process = command.to_command();

        // The formatter starts first so the primary can write straight into
        // its stdin. Without it the primary writes to the terminal.
        let mut formatter = match self.spawn_transform(transform) {
            Ok(mut formatter) => match formatter.stdin.take() {
                Some(stdin) => {
                    process.stdout(Stdio::from(stdin));
                    Some(formatter)
                }
                None => {
                    warn!("output formatter has no stdin, continuing unformatted");
                    let _ = formatter.kill();
                    let _ = formatter.wait();
                    None
                }
            },
            Err(reason) => {
                warn!("output formatter unavailable, continuing unformatted: {reason}");
                None
            }
        };

        let spawned = process.spawn();
        // Release our copy of the pipe's write end so the formatter sees EOF
        // once the primary exits.
        drop(process);

        let status = match spawned {
            Ok(mut child) => child.wait(),
            Err(e) => {
                if let Some(formatter) = formatter.as_mut() {
                    let _ = formatter.wait();
                }
                return Err(Self::spawn_error(&command.program, e));
            }
        };

        if let Some(mut formatter) = formatter {
            match formatter.wait() {
                Ok(s) if !s.success() => warn!("output formatter exited with {s}"),
                Err(e) => warn!("failed to wait for output formatter: {e}"),
                Ok(_) => {}
            }
        }

        check_status(status?, "")
    }

    fn locate(&self, program: &str) -> ProcessResult<PathBuf> {
        which::which(program).map_err(|_| ProcessError::ExecutableNotFound {
            program: program.to_string(),
        })
    }
}

/// Map an exit status onto success or a typed failure.
fn check_status(status: ExitStatus, output: &str) -> ProcessResult<()> {
    if status.success() {
        return Ok(());
    }
    if let Some(code) = status.code() {
        return Err(ProcessError::NonZeroExit {
            code,
            output: output.to_string(),
        });
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Err(ProcessError::Signaled {
                signal,
                output: output.to_string(),
            });
        }
    }

    Err(ProcessError::NonZeroExit {
        code: -1,
        output: output.to_string(),
    })
}
