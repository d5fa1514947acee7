//! LLVM target triples for Apple cross-compilation.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::error::{OutputKind, ParseError};
use crate::platform::{Architecture, Platform};
use crate::scanner::Scanner;

/// Errors from triple construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    /// Apple platforms other than macOS need a deployment version in the triple.
    #[error("building for {0} requires a platform version")]
    MissingPlatformVersion(Platform),

    /// Triples are only composed for Apple platforms.
    #[error("{0} is not an Apple platform")]
    NotApplePlatform(Platform),
}

/// `<arch>-apple-<os><version>[-simulator]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetTriple {
    architecture: Architecture,
    platform: Platform,
    version: String,
}

impl TargetTriple {
    /// Compose a triple for an Apple platform.
    ///
    /// # Panics
    ///
    /// Panics if `architecture` is not one the platform supports. Callers
    /// filter architectures against [`Platform::supported_architectures`]
    /// before getting here.
    pub fn apple(
        architecture: Architecture,
        platform: Platform,
        version: Option<&str>,
    ) -> Result<Self, TargetError> {
        if !platform.is_apple() {
            return Err(TargetError::NotApplePlatform(platform));
        }
        let version = version
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(TargetError::MissingPlatformVersion(platform))?;
        assert!(
            platform.supports(architecture),
            "{architecture} is not a valid architecture for {platform}"
        );

        Ok(Self {
            architecture,
            platform,
            version: version.to_string(),
        })
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// SDK the triple compiles against.
    pub fn sdk_name(&self) -> &'static str {
        self.platform.sdk_name()
    }
}

impl fmt::Display for TargetTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-apple-{}{}",
            self.architecture.as_str(),
            self.platform.os_name(),
            self.version
        )?;
        if self.platform.is_simulator() {
            f.write_str("-simulator")?;
        }
        Ok(())
    }
}

impl FromStr for TargetTriple {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |position: usize, reason: String| {
            ParseError::new(OutputKind::TargetTriple, s, position, reason)
        };
        let mut scanner = Scanner::new(s.trim());

        let arch_text = scanner.take_until(&["-"]);
        let architecture = arch_text
            .parse::<Architecture>()
            .map_err(|e| fail(0, e.to_string()))?;
        scanner
            .expect("-apple-")
            .map_err(|m| fail(m.position, m.reason))?;

        let os_start = scanner.position();
        let os_len = scanner
            .rest()
            .bytes()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        let os = &scanner.rest()[..os_len];
        let device = [
            Platform::MacOS,
            Platform::IOS,
            Platform::TvOS,
            Platform::VisionOS,
        ]
        .into_iter()
        .find(|p| p.os_name() == os)
        .ok_or_else(|| fail(os_start, format!("unknown OS component {os:?}")))?;
        scanner.eat(os);

        let version = scanner.take_until(&["-"]);
        if version.is_empty() {
            return Err(fail(scanner.position(), "missing OS version".to_string()));
        }

        let simulator = scanner.eat("-simulator");
        if !scanner.at_end() {
            return Err(fail(
                scanner.position(),
                format!("unexpected trailing text {:?}", scanner.rest()),
            ));
        }

        let platform = match (device, simulator) {
            (Platform::IOS, true) => Platform::IOSSimulator,
            (Platform::TvOS, true) => Platform::TvOSSimulator,
            (Platform::VisionOS, true) => Platform::VisionOSSimulator,
            (Platform::MacOS, true) => {
                return Err(fail(os_start, "macOS has no simulator".to_string()))
            }
            (platform, _) => platform,
        };

        if !platform.supports(architecture) {
            return Err(fail(
                0,
                format!("{architecture} is not a valid architecture for {platform}"),
            ));
        }

        Ok(Self {
            architecture,
            platform,
            version: version.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_triple_has_no_simulator_suffix() {
        let triple = TargetTriple::apple(Architecture::Arm64, Platform::IOS, Some("17.0")).unwrap();
        assert_eq!(triple.to_string(), "arm64-apple-ios17.0");
        assert_eq!(triple.sdk_name(), "iphoneos");
    }

    #[test]
    fn test_simulator_triple_suffix() {
        let triple =
            TargetTriple::apple(Architecture::X86_64, Platform::IOSSimulator, Some("16.4")).unwrap();
        assert_eq!(triple.to_string(), "x86_64-apple-ios16.4-simulator");
    }

    #[test]
    fn test_visionos_uses_xros() {
        let triple =
            TargetTriple::apple(Architecture::Arm64, Platform::VisionOSSimulator, Some("1.0"))
                .unwrap();
        assert_eq!(triple.to_string(), "arm64-apple-xros1.0-simulator");
    }

    #[test]
    fn test_missing_version() {
        let result = TargetTriple::apple(Architecture::Arm64, Platform::TvOS, None);
        assert_eq!(result, Err(TargetError::MissingPlatformVersion(Platform::TvOS)));

        let result = TargetTriple::apple(Architecture::Arm64, Platform::TvOS, Some("  "));
        assert_eq!(result, Err(TargetError::MissingPlatformVersion(Platform::TvOS)));
    }

    #[test]
    fn test_linux_is_rejected() {
        let result = TargetTriple::apple(Architecture::X86_64, Platform::Linux, Some("1"));
        assert_eq!(result, Err(TargetError::NotApplePlatform(Platform::Linux)));
    }

    #[test]
    #[should_panic(expected = "not a valid architecture")]
    fn test_invalid_architecture_panics() {
        let _ = TargetTriple::apple(Architecture::X86_64, Platform::IOS, Some("17.0"));
    }

    #[test]
    fn test_round_trip_all_apple_combinations() {
        for platform in Platform::ALL.into_iter().filter(Platform::is_apple) {
            for &arch in platform.supported_architectures() {
                let triple = TargetTriple::apple(arch, platform, Some("15.2")).unwrap();
                let parsed: TargetTriple = triple.to_string().parse().unwrap();
                assert_eq!(parsed.platform(), platform);
                assert_eq!(parsed.architecture(), arch);
                assert_eq!(parsed, triple);
            }
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = "arm64-pc-linux".parse::<TargetTriple>().unwrap_err();
        assert_eq!(err.kind, OutputKind::TargetTriple);
        assert_eq!(err.position, 5);

        let err = "arm64-apple-watchos10.0".parse::<TargetTriple>().unwrap_err();
        assert!(err.reason.contains("watchos"));

        assert!("arm64-apple-macosx14.0-simulator".parse::<TargetTriple>().is_err());
    }
}
