//! Parse failure shared by every output parser.

use std::fmt;

use thiserror::Error;

/// Which kind of tool output failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    SwiftVersion,
    ToolsVersion,
    SdkPath,
    BuildPlan,
    TargetInfo,
    DestinationList,
    TargetTriple,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputKind::SwiftVersion => "swift version",
            OutputKind::ToolsVersion => "swift-tools-version",
            OutputKind::SdkPath => "SDK path",
            OutputKind::BuildPlan => "build plan",
            OutputKind::TargetInfo => "target info",
            OutputKind::DestinationList => "destination list",
            OutputKind::TargetTriple => "target triple",
        };
        f.write_str(name)
    }
}

/// Tool output that matched none of the accepted shapes.
///
/// Carries the original text and the byte offset where the most successful
/// rule gave up, so the message points at the offending spot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to parse {kind} at byte {position}: {reason} (input: {input:?})")]
pub struct ParseError {
    pub kind: OutputKind,
    pub input: String,
    pub position: usize,
    pub reason: String,
}

impl ParseError {
    pub fn new(
        kind: OutputKind,
        input: impl Into<String>,
        position: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            input: input.into(),
            position,
            reason: reason.into(),
        }
    }
}
