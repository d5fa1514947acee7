//! `xcrun --show-sdk-path` output.

use std::path::PathBuf;

use crate::error::{OutputKind, ParseError};

/// Parse the single line printed by `xcrun --sdk <sdk> --show-sdk-path`.
pub fn parse_sdk_path(output: &str) -> Result<PathBuf, ParseError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(ParseError::new(OutputKind::SdkPath, output, 0, "empty output"));
    }
    if let Some(offset) = trimmed.find('\n') {
        let position = output.len() - output.trim_start().len() + offset;
        return Err(ParseError::new(
            OutputKind::SdkPath,
            output,
            position,
            "expected a single line",
        ));
    }
    Ok(PathBuf::from(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_whitespace() {
        let path = parse_sdk_path(
            "/Applications/Xcode.app/Contents/Developer/Platforms/iPhoneOS.platform/Developer/SDKs/iPhoneOS17.2.sdk\n",
        )
        .unwrap();
        assert!(path.ends_with("iPhoneOS17.2.sdk"));
    }

    #[test]
    fn test_empty_output() {
        let err = parse_sdk_path("  \n").unwrap_err();
        assert_eq!(err.kind, OutputKind::SdkPath);
    }

    #[test]
    fn test_multiple_lines() {
        let err = parse_sdk_path("xcrun: error: SDK \"foo\" cannot be located\n/usr\n").unwrap_err();
        assert_eq!(err.reason, "expected a single line");
    }
}
