//! `swiftc -print-target-info` output.

use serde::{Deserialize, Serialize};

use crate::error::{OutputKind, ParseError};

/// Target information reported by the Swift frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub target: TargetDetails,
    pub paths: TargetPaths,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDetails {
    pub triple: String,
    #[serde(default)]
    pub unversioned_triple: Option<String>,
    #[serde(default)]
    pub module_triple: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetPaths {
    pub runtime_resource_path: String,
    #[serde(default)]
    pub runtime_library_paths: Vec<String>,
    #[serde(default)]
    pub runtime_library_import_paths: Vec<String>,
}

/// Decode the JSON document printed by `swiftc -print-target-info`.
pub fn parse_target_info(output: &str) -> Result<TargetInfo, ParseError> {
    serde_json::from_str(output).map_err(|e| {
        let position = line_column_offset(output, e.line(), e.column());
        ParseError::new(OutputKind::TargetInfo, output, position, e.to_string())
    })
}

/// Convert serde_json's 1-based line/column into a byte offset.
fn line_column_offset(input: &str, line: usize, column: usize) -> usize {
    let line_start: usize = input
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(input.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
  "compilerVersion": "Apple Swift version 5.9.2 (swiftlang-5.9.2.2.56 clang-1500.1.0.2.5)",
  "target": {
    "triple": "arm64-apple-macosx14.0",
    "unversionedTriple": "arm64-apple-macosx",
    "moduleTriple": "arm64-apple-macos",
    "swiftRuntimeCompatibilityVersion": "5.9",
    "librariesRequireRPath": false
  },
  "paths": {
    "runtimeLibraryPaths": [
      "/usr/lib/swift"
    ],
    "runtimeLibraryImportPaths": [
      "/Library/Developer/CommandLineTools/usr/lib/swift/macosx"
    ],
    "runtimeResourcePath": "/Library/Developer/CommandLineTools/usr/lib/swift"
  }
}"#;

    #[test]
    fn test_parses_sample_ignoring_unknown_fields() {
        let info = parse_target_info(SAMPLE).unwrap();
        assert_eq!(info.target.triple, "arm64-apple-macosx14.0");
        assert_eq!(info.paths.runtime_library_paths, vec!["/usr/lib/swift"]);
        assert_eq!(
            info.paths.runtime_resource_path,
            "/Library/Developer/CommandLineTools/usr/lib/swift"
        );
    }

    #[test]
    fn test_missing_resource_path() {
        let err = parse_target_info(r#"{"target": {"triple": "x"}, "paths": {}}"#).unwrap_err();
        assert_eq!(err.kind, OutputKind::TargetInfo);
        assert!(err.reason.contains("runtimeResourcePath"));
    }

    #[test]
    fn test_error_position_points_into_input() {
        let input = "{\n  \"target\": oops\n}";
        let err = parse_target_info(input).unwrap_err();
        let value_start = input.find(':').unwrap();
        assert!(err.position > value_start && err.position < input.len());
    }
}
