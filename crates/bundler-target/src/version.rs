//! Swift toolchain version parsing.
//!
//! `swift --version` has printed several shapes over the years. Each shape is
//! a rule; rules are tried in order and the first structural match wins.
//!
//! ```text
//! swift-driver version: 1.45.2 Apple Swift version 5.6 (swiftlang-5.6.0.323.62 clang-1316.0.20.8)
//! Apple Swift version 5.9.2 (swiftlang-5.9.2.2.56 clang-1500.1.0.2.5)
//! Swift version 5.9-dev (LLVM 1c2a1ab, Swift 7e1e1c5)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OutputKind, ParseError};
use crate::scanner::{Miss, RuleResult, Scanner};

/// A `major.minor.patch` toolchain version.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct ToolVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ToolVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

type VersionRule = fn(&mut Scanner<'_>) -> RuleResult<ToolVersion>;

const SWIFT_VERSION_RULES: &[VersionRule] = &[driver_swiftlang_rule, vendor_tool_version_rule];

/// Parse the output of `swift --version`.
pub fn parse_swift_version(output: &str) -> Result<ToolVersion, ParseError> {
    let mut furthest: Option<Miss> = None;
    for rule in SWIFT_VERSION_RULES {
        let mut scanner = Scanner::new(output);
        match rule(&mut scanner) {
            Ok(version) => return Ok(version),
            Err(miss) => {
                furthest = Some(match furthest {
                    Some(previous) => previous.furthest(miss),
                    None => miss,
                });
            }
        }
    }

    let miss = furthest.unwrap_or_else(|| Miss::new(0, "no rules"));
    Err(ParseError::new(
        OutputKind::SwiftVersion,
        output,
        miss.position,
        miss.reason,
    ))
}

/// Parse the `// swift-tools-version:X.Y[.Z]` header of a `Package.swift`.
pub fn parse_tools_version(manifest: &str) -> Result<ToolVersion, ParseError> {
    let fail = |miss: Miss| ParseError::new(OutputKind::ToolsVersion, manifest, miss.position, miss.reason);

    let mut scanner = Scanner::new(manifest);
    scanner.skip_whitespace();
    scanner.expect("//").map_err(fail)?;
    scanner.skip_whitespace();
    scanner.expect("swift-tools-version").map_err(fail)?;
    scanner.skip_whitespace();
    scanner.expect(":").map_err(fail)?;
    scanner.skip_whitespace();
    dotted_version(&mut scanner, false).map_err(fail)
}

/// `swift-driver version: ... (swiftlang-MAJOR.MINOR.PATCH...)`
fn driver_swiftlang_rule(scanner: &mut Scanner<'_>) -> RuleResult<ToolVersion> {
    scanner.skip_whitespace();
    scanner.expect("swift-driver version")?;
    scanner.seek_past("(swiftlang-")?;

    let major = scanner.number()?;
    scanner.expect(".")?;
    let minor = scanner.number()?;
    scanner.expect(".")?;
    let patch = scanner.number()?;
    Ok(ToolVersion::new(major, minor, patch))
}

/// `[Vendor ]Swift version MAJOR.MINOR[.PATCH][-suffix] (...)`
fn vendor_tool_version_rule(scanner: &mut Scanner<'_>) -> RuleResult<ToolVersion> {
    scanner.seek_past("Swift version ")?;
    dotted_version(scanner, true)
}

/// `MAJOR.MINOR[.PATCH]`, optionally followed by a `-suffix`, then a boundary.
fn dotted_version(scanner: &mut Scanner<'_>, allow_suffix: bool) -> RuleResult<ToolVersion> {
    let major = scanner.number()?;
    scanner.expect(".")?;
    let minor = scanner.number()?;
    let patch = if scanner.eat(".") {
        scanner.number()?
    } else {
        0
    };

    if allow_suffix && scanner.eat("-") {
        scanner.take_until(&[" ", "\n", "\t"]);
    }

    match scanner.peek() {
        None => Ok(ToolVersion::new(major, minor, patch)),
        Some(c) if c.is_whitespace() || c == '(' || c == ';' => {
            Ok(ToolVersion::new(major, minor, patch))
        }
        Some(c) => Err(scanner.miss(format!("unexpected {c:?} after version"))),
    }
}
