//! Mock process runner
//!
//! Scripts toolchain responses and records every invocation so tests can
//! assert on exact command lines, or on the absence of any spawn at all.
//!
//! # Matching
//!
//! Responses are registered against a program name and an argument prefix.
//! The first registered rule that matches wins; unmatched invocations
//! succeed with empty output.

mod runner;

pub use runner::{Invocation, InvocationKind, MockResponse, MockRunner};
