//! Failure categories shared by every error type in the crate.

use std::fmt;

use serde::Serialize;

use crate::process::ProcessError;

/// Coarse classification callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing platform version, unsupported architecture, missing product.
    Configuration,
    /// A required executable isn't on the search path.
    ToolResolution,
    /// Non-zero exit, signal, or spawn failure.
    ProcessExecution,
    /// Tool output matched none of the accepted shapes.
    OutputParse,
    /// Build plan command missing or malformed.
    Artifact,
    /// Reading or moving files around the package failed.
    Filesystem,
}

impl ErrorCategory {
    pub fn of_process(error: &ProcessError) -> Self {
        match error {
            ProcessError::ExecutableNotFound { .. } => ErrorCategory::ToolResolution,
            _ => ErrorCategory::ProcessExecution,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::ToolResolution => "tool_resolution",
            ErrorCategory::ProcessExecution => "process_execution",
            ErrorCategory::OutputParse => "output_parse",
            ErrorCategory::Artifact => "artifact",
            ErrorCategory::Filesystem => "filesystem",
        };
        f.write_str(name)
    }
}
