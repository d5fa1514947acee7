use std::path::PathBuf;

use bundler_target::{Architecture, BuildConfiguration, Platform, TargetError};
use serde::{Deserialize, Serialize};

use crate::args::ArgumentError;

/// Inputs for a single build. Constructed once per invocation and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildContext {
    /// Directory containing `Package.swift`
    pub package_directory: PathBuf,

    /// SwiftPM scratch directory (usually `<package>/.build`)
    pub scratch_directory: PathBuf,

    pub configuration: BuildConfiguration,

    /// Requested architectures, in order. Empty means the backend's default.
    /// Repeats are ignored; see [`BuildContext::unique_architectures`].
    pub architectures: Vec<Architecture>,

    pub platform: Platform,

    /// Required for every Apple platform except macOS
    pub platform_version: Option<String>,

    /// Appended verbatim after everything else
    pub additional_arguments: Vec<String>,

    pub hot_reloading_enabled: bool,
}

impl BuildContext {
    /// Context for `package_directory` with SwiftPM's default scratch path.
    pub fn new(package_directory: impl Into<PathBuf>, platform: Platform) -> Self {
        let package_directory = package_directory.into();
        Self {
            scratch_directory: package_directory.join(".build"),
            package_directory,
            configuration: BuildConfiguration::default(),
            architectures: Vec::new(),
            platform,
            platform_version: None,
            additional_arguments: Vec::new(),
            hot_reloading_enabled: false,
        }
    }

    /// Checks that hold for every backend: each requested architecture is
    /// buildable for the platform, and cross-compiled platforms carry a
    /// platform version.
    pub fn validate(&self) -> Result<(), ArgumentError> {
        if let Some(&architecture) = self
            .architectures
            .iter()
            .find(|architecture| !self.platform.supports(**architecture))
        {
            return Err(ArgumentError::UnsupportedArchitecture {
                architecture,
                platform: self.platform,
            });
        }

        let has_version = self
            .platform_version
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty());
        if self.platform.requires_cross_compilation() && !has_version {
            return Err(TargetError::MissingPlatformVersion(self.platform).into());
        }
        Ok(())
    }

    /// Requested architectures with repeats dropped, first occurrence kept.
    pub fn unique_architectures(&self) -> Vec<Architecture> {
        let mut unique = Vec::with_capacity(self.architectures.len());
        for &architecture in &self.architectures {
            if !unique.contains(&architecture) {
                unique.push(architecture);
            }
        }
        unique
    }

    /// `<scratch>/<configuration>.yaml`, written by SwiftPM after every build.
    pub fn build_plan_path(&self) -> PathBuf {
        self.scratch_directory
            .join(format!("{}.yaml", self.configuration.as_str()))
    }
}
