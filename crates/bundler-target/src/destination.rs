//! `xcodebuild -showdestinations` parsing and destination selection.
//!
//! xcodebuild prints one destination per line in a loose brace syntax:
//!
//! ```text
//!     Available destinations for the "MyApp" scheme:
//!         { platform:macOS, arch:arm64, id:00006000-001A, name:My Mac }
//!         { platform:iOS Simulator, id:5B3F..., OS:17.2, name:iPhone 15 }
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{OutputKind, ParseError};
use crate::platform::Platform;
use crate::scanner::{RuleResult, Scanner};

/// Errors during destination selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestinationError {
    /// Nothing left after filtering by platform and policy.
    #[error("no {platform} destination available")]
    NoDestination { platform: String },
}

/// One entry from `xcodebuild -showdestinations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XcodebuildDestination {
    pub platform: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

impl XcodebuildDestination {
    /// Value for xcodebuild's `-destination` flag.
    ///
    /// Only meaningful for destinations that report an OS version.
    pub fn argument(&self) -> String {
        format!(
            "platform={},OS={},name={}",
            self.platform,
            self.os_version.as_deref().unwrap_or("latest"),
            self.name
        )
    }
}

/// Which enumerated destinations are acceptable build targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DestinationPolicy {
    /// Destinations whose name contains this substring are skipped. Empty
    /// disables the filter.
    pub excluded_name_substring: Option<String>,
}

impl Default for DestinationPolicy {
    fn default() -> Self {
        Self {
            excluded_name_substring: Some("Designed for".to_string()),
        }
    }
}

/// Parse every `{ ... }` line of `xcodebuild -showdestinations` output.
///
/// Header and blank lines are skipped. A brace line that doesn't follow the
/// `key:value, ...` shape or lacks `platform`/`name` is an error.
pub fn parse_destinations(output: &str) -> Result<Vec<XcodebuildDestination>, ParseError> {
    let mut destinations = Vec::new();
    let mut offset = 0;

    for line in output.split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let trimmed = line.trim();
        if trimmed.starts_with('{') {
            let destination = parse_destination_line(trimmed).map_err(|miss| {
                ParseError::new(
                    OutputKind::DestinationList,
                    output,
                    offset + indent + miss.position,
                    miss.reason,
                )
            })?;
            destinations.push(destination);
        }
        offset += line.len();
    }

    Ok(destinations)
}

fn parse_destination_line(line: &str) -> RuleResult<XcodebuildDestination> {
    let mut scanner = Scanner::new(line);
    scanner.expect("{")?;

    let mut platform = None;
    let mut name = None;
    let mut os_version = None;
    let mut id = None;
    let mut arch = None;

    loop {
        scanner.skip_whitespace();
        if scanner.eat("}") {
            break;
        }
        if scanner.at_end() {
            return Err(scanner.miss("unterminated destination"));
        }

        let key_start = scanner.position();
        let key = scanner.take_until(&[":", ",", "}"]).trim();
        if !scanner.eat(":") {
            return Err(scanner.miss(format!("expected ':' after key {key:?}")));
        }
        if key.is_empty() {
            return Err(crate::scanner::Miss::new(key_start, "empty key"));
        }
        let value = take_value(&mut scanner).trim().to_string();
        scanner.eat(",");

        match key {
            "platform" => platform = Some(value),
            "name" => name = Some(value),
            "OS" => os_version = Some(value),
            "id" => id = Some(value),
            "arch" => arch = Some(value),
            _ => {}
        }
    }

    let platform = platform.ok_or_else(|| scanner.miss("destination has no platform"))?;
    let name = name.ok_or_else(|| scanner.miss("destination has no name"))?;

    Ok(XcodebuildDestination {
        platform,
        name,
        os_version,
        id,
        arch,
    })
}

/// A value runs to the next `, key:` or the closing ` }`. xcodebuild's
/// `error:` values contain plain ", " inside the message.
fn take_value<'a>(scanner: &mut Scanner<'a>) -> &'a str {
    let start = scanner.position();
    loop {
        scanner.take_until(&[", ", " }"]);
        if scanner.at_end() || scanner.rest().starts_with(" }") {
            break;
        }
        if starts_with_key(&scanner.rest()[2..]) {
            break;
        }
        scanner.eat(", ");
    }
    scanner.since(start)
}

fn starts_with_key(text: &str) -> bool {
    let key_len = text
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count();
    key_len > 0 && text[key_len..].starts_with(':')
}

/// Pick the destination with the newest OS for `platform`.
///
/// Candidates must match the platform's xcodebuild name, agree on being a
/// simulator, report an OS version and pass `policy`. Ties keep the order
/// xcodebuild listed them in.
pub fn select_destination<'a>(
    destinations: &'a [XcodebuildDestination],
    platform: Platform,
    policy: &DestinationPolicy,
) -> Result<&'a XcodebuildDestination, DestinationError> {
    let wanted = platform.device_counterpart().display_name();

    let mut candidates: Vec<&XcodebuildDestination> = destinations
        .iter()
        .filter(|d| d.platform.contains(wanted))
        .filter(|d| d.platform.contains("Simulator") == platform.is_simulator())
        .filter(|d| d.os_version.is_some())
        .filter(|d| match &policy.excluded_name_substring {
            Some(excluded) if !excluded.is_empty() => !d.name.contains(excluded.as_str()),
            _ => true,
        })
        .collect();

    candidates.sort_by(|a, b| compare_os_versions(b.os_version.as_deref(), a.os_version.as_deref()));

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| DestinationError::NoDestination {
            platform: platform.display_name().to_string(),
        })
}

/// Numeric comparison of dotted OS versions ("17.2" > "17.0.1").
fn compare_os_versions(a: Option<&str>, b: Option<&str>) -> Ordering {
    let parts = |v: Option<&str>| -> Vec<u64> {
        v.unwrap_or_default()
            .split('.')
            .map(|part| part.parse::<u64>().unwrap_or(0))
            .collect()
    };
    let (a, b) = (parts(a), parts(b));

    for i in 0..a.len().max(b.len()) {
        let ordering = a.get(i).copied().unwrap_or(0).cmp(&b.get(i).copied().unwrap_or(0));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
