//! Toolchain queries
//!
//! Asks the installed Swift toolchain and Xcode about themselves: the Swift
//! version, SDK locations, target info, where build products land, and the
//! package manifest. Each query runs one command through the
//! [`ProcessRunner`] and decodes the output with the `bundler-target`
//! parsers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bundler_target::{
    parse_sdk_path, parse_swift_version, parse_target_info, parse_tools_version, ParseError,
    Platform, TargetInfo, TargetTriple, ToolVersion,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::args::{swiftpm_build_arguments, ArgumentError};
use crate::build::BuildContext;
use crate::config::OrchestratorConfig;
use crate::error::ErrorCategory;
use crate::process::{CommandSpec, OutputMode, ProcessError, ProcessRunner};

/// Errors from toolchain queries.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("`{command}` failed: {source}")]
    Command {
        command: String,
        #[source]
        source: ProcessError,
    },

    #[error("could not understand output of `{command}`: {source}")]
    Parse {
        command: String,
        #[source]
        source: ParseError,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("package manifest from `{command}` is invalid: {source}")]
    Manifest {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid products directory query: {0}")]
    Arguments(#[source] Box<ArgumentError>),
}

impl ToolchainError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ToolchainError::Command { source, .. } => ErrorCategory::of_process(source),
            ToolchainError::Parse { .. } | ToolchainError::Manifest { .. } => {
                ErrorCategory::OutputParse
            }
            ToolchainError::Io { .. } => ErrorCategory::Filesystem,
            ToolchainError::Arguments(inner) => inner.category(),
        }
    }
}

/// Result type for toolchain queries.
pub type ToolchainResult<T> = Result<T, ToolchainError>;

/// Something that can find the newest SDK for a platform.
pub trait SdkLocator {
    fn latest_sdk_path(&self, platform: Platform) -> ToolchainResult<PathBuf>;
}

impl<F> SdkLocator for F
where
    F: Fn(Platform) -> ToolchainResult<PathBuf>,
{
    fn latest_sdk_path(&self, platform: Platform) -> ToolchainResult<PathBuf> {
        self(platform)
    }
}

/// Toolchain queries bound to a runner and executable names.
#[derive(Debug, Clone)]
pub struct Toolchain<'a, R> {
    runner: R,
    config: &'a OrchestratorConfig,
}

impl<'a, R: ProcessRunner> Toolchain<'a, R> {
    pub fn new(runner: R, config: &'a OrchestratorConfig) -> Self {
        Self { runner, config }
    }

    fn capture(&self, command: CommandSpec) -> ToolchainResult<(String, String)> {
        let rendered = command.to_string();
        debug!(command = %rendered, "querying toolchain");
        let output = self
            .runner
            .run(&command, OutputMode::Capture)
            .map_err(|source| ToolchainError::Command {
                command: rendered.clone(),
                source,
            })?;
        Ok((rendered, output.stdout))
    }

    /// Version of the `swift` on the search path.
    pub fn swift_version(&self) -> ToolchainResult<ToolVersion> {
        let (command, stdout) =
            self.capture(CommandSpec::new(&self.config.swift_executable).arg("--version"))?;
        parse_swift_version(&stdout).map_err(|source| ToolchainError::Parse { command, source })
    }

    /// Path of the newest installed SDK for `platform`.
    pub fn latest_sdk_path(&self, platform: Platform) -> ToolchainResult<PathBuf> {
        let (command, stdout) = self.capture(CommandSpec::new(&self.config.xcrun_executable).args([
            "--sdk",
            platform.sdk_name(),
            "--show-sdk-path",
        ]))?;
        parse_sdk_path(&stdout).map_err(|source| ToolchainError::Parse { command, source })
    }

    /// Runtime paths for `triple`, or for the host when `None`.
    pub fn target_info(&self, triple: Option<&TargetTriple>) -> ToolchainResult<TargetInfo> {
        let mut command = CommandSpec::new(&self.config.swiftc_executable).arg("-print-target-info");
        if let Some(triple) = triple {
            command = command.args(["-target".to_string(), triple.to_string()]);
        }
        let (command, stdout) = self.capture(command)?;
        parse_target_info(&stdout).map_err(|source| ToolchainError::Parse { command, source })
    }

    /// Directory SwiftPM writes `product` into for `context`.
    pub fn products_directory(
        &self,
        product: Option<&str>,
        context: &BuildContext,
    ) -> ToolchainResult<PathBuf> {
        let mut args = swiftpm_build_arguments(product, context, self)
            .map_err(|e| ToolchainError::Arguments(Box::new(e)))?;
        args.push("--show-bin-path".to_string());

        let (command, stdout) = self.capture(
            CommandSpec::new(&self.config.swift_executable)
                .args(args)
                .current_dir(&context.package_directory),
        )?;
        parse_sdk_path(&stdout).map_err(|source| ToolchainError::Parse { command, source })
    }
}

impl<R: ProcessRunner> SdkLocator for Toolchain<'_, R> {
    fn latest_sdk_path(&self, platform: Platform) -> ToolchainResult<PathBuf> {
        Toolchain::latest_sdk_path(self, platform)
    }
}

/// The `swift-tools-version` declared by `<package_directory>/Package.swift`.
pub fn tools_version(package_directory: &Path) -> ToolchainResult<ToolVersion> {
    let path = package_directory.join("Package.swift");
    let source = fs::read_to_string(&path).map_err(|source| ToolchainError::Io {
        path: path.clone(),
        source,
    })?;
    parse_tools_version(&source).map_err(|source| ToolchainError::Parse {
        command: path.display().to_string(),
        source,
    })
}

/// Subset of `swift package describe --type json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    #[serde(default)]
    pub products: Vec<PackageProduct>,
    #[serde(default)]
    pub targets: Vec<PackageTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageProduct {
    pub name: String,
    /// `{"executable": null}` or `{"library": ["automatic"]}`.
    #[serde(rename = "type")]
    pub kind: serde_json::Value,
}

impl PackageProduct {
    pub fn is_executable(&self) -> bool {
        self.kind.get("executable").is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageTarget {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl PackageManifest {
    pub fn parse(json: &str, command: &str) -> ToolchainResult<Self> {
        serde_json::from_str(json).map_err(|source| ToolchainError::Manifest {
            command: command.to_string(),
            source,
        })
    }

    pub fn executable_products(&self) -> impl Iterator<Item = &PackageProduct> {
        self.products.iter().filter(|p| p.is_executable())
    }
}

/// Load the package manifest without blocking the caller's executor.
///
/// Independent packages can be loaded concurrently with `tokio::join!`.
pub async fn load_package_manifest(
    package_directory: &Path,
    swift_executable: &str,
) -> ToolchainResult<PackageManifest> {
    let spec = CommandSpec::new(swift_executable)
        .args(["package", "describe", "--type", "json"])
        .current_dir(package_directory);
    let command = spec.to_string();
    debug!(command = %command, "loading package manifest");

    let output = tokio::process::Command::new(swift_executable)
        .args(&spec.args)
        .current_dir(package_directory)
        .output()
        .await
        .map_err(|source| ToolchainError::Command {
            command: command.clone(),
            source: if source.kind() == io::ErrorKind::NotFound {
                ProcessError::ExecutableNotFound {
                    program: swift_executable.to_string(),
                }
            } else {
                ProcessError::SpawnFailed {
                    program: swift_executable.to_string(),
                    source,
                }
            },
        })?;

    if !output.status.success() {
        return Err(ToolchainError::Command {
            command,
            source: ProcessError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                output: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
        });
    }

    PackageManifest::parse(&String::from_utf8_lossy(&output.stdout), &command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockResponse, MockRunner};
    use bundler_target::{Architecture, BuildConfiguration};

    fn config() -> OrchestratorConfig {
        OrchestratorConfig::default()
    }

    #[test]
    fn test_swift_version() {
        let runner = MockRunner::new().stdout(
            "swift",
            &["--version"],
            "swift-driver version: 1.45.2 Apple Swift version 5.6 (swiftlang-5.6.0.323.62 clang-1316.0.20.8)\n",
        );
        let config = config();
        let toolchain = Toolchain::new(&runner, &config);
        assert_eq!(toolchain.swift_version().unwrap(), ToolVersion::new(5, 6, 0));
    }

    #[test]
    fn test_swift_version_unparseable() {
        let runner = MockRunner::new().stdout("swift", &["--version"], "garbage");
        let config = config();
        let err = Toolchain::new(&runner, &config).swift_version().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::OutputParse);
        assert!(err.to_string().contains("swift --version"));
    }

    #[test]
    fn test_latest_sdk_path() {
        let runner = MockRunner::new().stdout(
            "xcrun",
            &["--sdk", "iphonesimulator", "--show-sdk-path"],
            "/SDKs/iPhoneSimulator17.2.sdk\n",
        );
        let config = config();
        let path = Toolchain::new(&runner, &config)
            .latest_sdk_path(Platform::IOSSimulator)
            .unwrap();
        assert_eq!(path, PathBuf::from("/SDKs/iPhoneSimulator17.2.sdk"));
    }

    #[test]
    fn test_missing_xcrun_is_tool_resolution() {
        let runner = MockRunner::new().respond("xcrun", &[], MockResponse::NotFound);
        let config = config();
        let err = Toolchain::new(&runner, &config)
            .latest_sdk_path(Platform::TvOS)
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ToolResolution);
    }

    #[test]
    fn test_target_info_passes_triple() {
        let runner = MockRunner::new().stdout(
            "swiftc",
            &["-print-target-info"],
            r#"{"target": {"triple": "arm64-apple-ios17.0"}, "paths": {"runtimeResourcePath": "/usr/lib/swift", "runtimeLibraryPaths": ["/usr/lib/swift"]}}"#,
        );
        let config = config();
        let triple = TargetTriple::apple(Architecture::Arm64, Platform::IOS, Some("17.0")).unwrap();
        let info = Toolchain::new(&runner, &config)
            .target_info(Some(&triple))
            .unwrap();
        assert_eq!(info.target.triple, "arm64-apple-ios17.0");
        assert_eq!(
            runner.command_lines(),
            vec!["swiftc -print-target-info -target arm64-apple-ios17.0"]
        );
    }

    #[test]
    fn test_products_directory() {
        let runner = MockRunner::new().stdout("swift", &["build"], "/pkg/.build/arm64-apple-macosx/debug\n");
        let config = config();
        let context = BuildContext {
            package_directory: PathBuf::from("/pkg"),
            scratch_directory: PathBuf::from("/pkg/.build"),
            configuration: BuildConfiguration::Debug,
            architectures: vec![Architecture::Arm64],
            platform: Platform::MacOS,
            platform_version: None,
            additional_arguments: vec![],
            hot_reloading_enabled: false,
        };
        let dir = Toolchain::new(&runner, &config)
            .products_directory(Some("MyApp"), &context)
            .unwrap();
        assert_eq!(dir, PathBuf::from("/pkg/.build/arm64-apple-macosx/debug"));
        assert!(runner.command_lines()[0].ends_with("--scratch-path /pkg/.build --show-bin-path"));
    }

    #[test]
    fn test_tools_version_from_package_swift() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Package.swift"),
            "// swift-tools-version:5.8\nimport PackageDescription\n",
        )
        .unwrap();
        assert_eq!(tools_version(dir.path()).unwrap(), ToolVersion::new(5, 8, 0));
    }

    #[test]
    fn test_tools_version_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = tools_version(dir.path()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Filesystem);
    }

    #[test]
    fn test_manifest_parse() {
        let manifest = PackageManifest::parse(
            r#"{
                "name": "MyApp",
                "manifest_display_name": "MyApp",
                "products": [
                    {"name": "MyApp", "type": {"executable": null}, "targets": ["MyApp"]},
                    {"name": "Core", "type": {"library": ["automatic"]}, "targets": ["Core"]}
                ],
                "targets": [{"name": "MyApp", "type": "executable", "path": "Sources/MyApp"}]
            }"#,
            "swift package describe --type json",
        )
        .unwrap();
        let executables: Vec<_> = manifest.executable_products().map(|p| p.name.as_str()).collect();
        assert_eq!(executables, vec!["MyApp"]);
        assert_eq!(manifest.targets[0].kind, "executable");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_load_manifest_missing_swift() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_package_manifest(dir.path(), "app-bundler-no-such-swift")
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ToolResolution);
    }
}
