//! Build backend selection.
//!
//! | never_xcodebuild | force_xcodebuild | platform                  | backend    |
//! |------------------|------------------|---------------------------|------------|
//! | true             | any              | any                       | SwiftPM    |
//! | false            | true             | any                       | xcodebuild |
//! | false            | false            | Apple, not macOS          | xcodebuild |
//! | false            | false            | macOS or Linux            | SwiftPM    |

use std::fmt;

use bundler_target::Platform;
use serde::{Deserialize, Serialize};

/// The external tool that compiles the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// `swift build`
    SwiftPM,
    /// `xcodebuild`
    Xcodebuild,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::SwiftPM => f.write_str("SwiftPM"),
            Backend::Xcodebuild => f.write_str("xcodebuild"),
        }
    }
}

/// User intent regarding xcodebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendFlags {
    /// Use xcodebuild even where SwiftPM would do.
    pub force_xcodebuild: bool,
    /// Never use xcodebuild. Wins over everything else.
    pub never_xcodebuild: bool,
}

/// Decide which backend builds for `platform`.
pub fn select_backend(flags: BackendFlags, platform: Platform) -> Backend {
    if flags.never_xcodebuild {
        return Backend::SwiftPM;
    }
    if flags.force_xcodebuild || platform.requires_cross_compilation() {
        return Backend::Xcodebuild;
    }
    Backend::SwiftPM
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(force: bool, never: bool) -> BackendFlags {
        BackendFlags {
            force_xcodebuild: force,
            never_xcodebuild: never,
        }
    }

    #[test]
    fn test_override_wins() {
        assert_eq!(select_backend(flags(true, true), Platform::IOS), Backend::SwiftPM);
        assert_eq!(select_backend(flags(false, true), Platform::VisionOSSimulator), Backend::SwiftPM);
    }

    #[test]
    fn test_non_macos_apple_forces_xcodebuild() {
        assert_eq!(select_backend(flags(false, false), Platform::IOS), Backend::Xcodebuild);
        assert_eq!(select_backend(flags(false, false), Platform::TvOSSimulator), Backend::Xcodebuild);
    }

    #[test]
    fn test_default_is_swiftpm() {
        assert_eq!(select_backend(flags(false, false), Platform::MacOS), Backend::SwiftPM);
        assert_eq!(select_backend(flags(false, false), Platform::Linux), Backend::SwiftPM);
    }

    #[test]
    fn test_explicit_flag() {
        assert_eq!(select_backend(flags(true, false), Platform::MacOS), Backend::Xcodebuild);
    }

    #[test]
    fn test_full_table() {
        for platform in Platform::ALL {
            for force in [false, true] {
                for never in [false, true] {
                    let expected = if never {
                        Backend::SwiftPM
                    } else if force || (platform.is_apple() && platform != Platform::MacOS) {
                        Backend::Xcodebuild
                    } else {
                        Backend::SwiftPM
                    };
                    assert_eq!(select_backend(flags(force, never), platform), expected);
                }
            }
        }
    }
}
