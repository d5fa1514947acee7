//! Platforms, architectures and build configurations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A name that doesn't correspond to any known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {what}: {value:?}")]
pub struct UnknownVariant {
    pub what: &'static str,
    pub value: String,
}

/// Platform a product is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Platform {
    #[serde(rename = "macOS")]
    MacOS,
    #[serde(rename = "iOS")]
    IOS,
    #[serde(rename = "iOSSimulator")]
    IOSSimulator,
    #[serde(rename = "tvOS")]
    TvOS,
    #[serde(rename = "tvOSSimulator")]
    TvOSSimulator,
    #[serde(rename = "visionOS")]
    VisionOS,
    #[serde(rename = "visionOSSimulator")]
    VisionOSSimulator,
    Linux,
}

impl Platform {
    pub const ALL: [Platform; 8] = [
        Platform::MacOS,
        Platform::IOS,
        Platform::IOSSimulator,
        Platform::TvOS,
        Platform::TvOSSimulator,
        Platform::VisionOS,
        Platform::VisionOSSimulator,
        Platform::Linux,
    ];

    /// Identifier used on the command line and in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::MacOS => "macOS",
            Platform::IOS => "iOS",
            Platform::IOSSimulator => "iOSSimulator",
            Platform::TvOS => "tvOS",
            Platform::TvOSSimulator => "tvOSSimulator",
            Platform::VisionOS => "visionOS",
            Platform::VisionOSSimulator => "visionOSSimulator",
            Platform::Linux => "linux",
        }
    }

    /// SDK name as understood by `xcrun --sdk`.
    pub fn sdk_name(&self) -> &'static str {
        match self {
            Platform::MacOS => "macosx",
            Platform::IOS => "iphoneos",
            Platform::IOSSimulator => "iphonesimulator",
            Platform::TvOS => "appletvos",
            Platform::TvOSSimulator => "appletvsimulator",
            Platform::VisionOS => "xros",
            Platform::VisionOSSimulator => "xrsimulator",
            Platform::Linux => "linux",
        }
    }

    /// Human readable name, also the `platform=` value xcodebuild prints.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::MacOS => "macOS",
            Platform::IOS => "iOS",
            Platform::IOSSimulator => "iOS Simulator",
            Platform::TvOS => "tvOS",
            Platform::TvOSSimulator => "tvOS Simulator",
            Platform::VisionOS => "visionOS",
            Platform::VisionOSSimulator => "visionOS Simulator",
            Platform::Linux => "Linux",
        }
    }

    /// OS component of an Apple target triple (without version).
    pub fn os_name(&self) -> &'static str {
        match self {
            Platform::MacOS => "macosx",
            Platform::IOS | Platform::IOSSimulator => "ios",
            Platform::TvOS | Platform::TvOSSimulator => "tvos",
            Platform::VisionOS | Platform::VisionOSSimulator => "xros",
            Platform::Linux => "linux",
        }
    }

    pub fn is_apple(&self) -> bool {
        !matches!(self, Platform::Linux)
    }

    pub fn is_simulator(&self) -> bool {
        matches!(
            self,
            Platform::IOSSimulator | Platform::TvOSSimulator | Platform::VisionOSSimulator
        )
    }

    /// Apple platforms that SwiftPM cannot target without extra SDK flags.
    pub fn requires_cross_compilation(&self) -> bool {
        !matches!(self, Platform::MacOS | Platform::Linux)
    }

    /// The physical device platform a simulator stands in for.
    pub fn device_counterpart(&self) -> Platform {
        match self {
            Platform::IOSSimulator => Platform::IOS,
            Platform::TvOSSimulator => Platform::TvOS,
            Platform::VisionOSSimulator => Platform::VisionOS,
            other => *other,
        }
    }

    /// Extension of dynamic libraries produced for this platform.
    pub fn dylib_extension(&self) -> &'static str {
        match self {
            Platform::Linux => "so",
            _ => "dylib",
        }
    }

    pub fn supported_architectures(&self) -> &'static [Architecture] {
        match self {
            Platform::MacOS
            | Platform::IOSSimulator
            | Platform::TvOSSimulator
            | Platform::Linux => &[Architecture::Arm64, Architecture::X86_64],
            Platform::IOS | Platform::TvOS | Platform::VisionOS | Platform::VisionOSSimulator => {
                &[Architecture::Arm64]
            }
        }
    }

    pub fn supports(&self, architecture: Architecture) -> bool {
        self.supported_architectures().contains(&architecture)
    }

    /// Architecture used when none was requested: the host's if the
    /// platform runs it, else the platform's first supported one.
    pub fn default_architecture(&self) -> Architecture {
        let host = Architecture::host();
        if self.supports(host) {
            return host;
        }
        self.supported_architectures()
            .first()
            .copied()
            .unwrap_or(Architecture::Arm64)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVariant {
                what: "platform",
                value: s.to_string(),
            })
    }
}

/// CPU architecture of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Architecture {
    #[serde(rename = "arm64")]
    Arm64,
    #[serde(rename = "x86_64")]
    X86_64,
}

impl Architecture {
    /// Architecture of the machine running the bundler.
    pub fn host() -> Self {
        match std::env::consts::ARCH {
            "x86_64" => Architecture::X86_64,
            _ => Architecture::Arm64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Arm64 => "arm64",
            Architecture::X86_64 => "x86_64",
        }
    }

    /// Token SwiftPM expects after `--arch` for the given platform.
    pub fn argument(&self, platform: Platform) -> &'static str {
        match (self, platform) {
            (Architecture::Arm64, Platform::Linux) => "aarch64",
            _ => self.as_str(),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arm64" | "aarch64" => Ok(Architecture::Arm64),
            "x86_64" => Ok(Architecture::X86_64),
            _ => Err(UnknownVariant {
                what: "architecture",
                value: s.to_string(),
            }),
        }
    }
}

/// Build configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildConfiguration {
    #[default]
    Debug,
    Release,
}

impl BuildConfiguration {
    /// Lowercase spelling used by SwiftPM (`-c debug`).
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildConfiguration::Debug => "debug",
            BuildConfiguration::Release => "release",
        }
    }

    /// Capitalized spelling used by xcodebuild (`-configuration Debug`).
    pub fn xcodebuild_name(&self) -> &'static str {
        match self {
            BuildConfiguration::Debug => "Debug",
            BuildConfiguration::Release => "Release",
        }
    }
}

impl fmt::Display for BuildConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildConfiguration {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(BuildConfiguration::Debug),
            "release" => Ok(BuildConfiguration::Release),
            _ => Err(UnknownVariant {
                what: "configuration",
                value: s.to_string(),
            }),
        }
    }
}
