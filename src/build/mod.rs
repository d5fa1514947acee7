//! Build orchestration
//!
//! One call to [`Orchestrator::build`] walks these stages in order:
//!
//! ```text
//! BackendSelected -> ArgumentsBuilt -> ProcessRunning -> [ArtifactRelink] -> Succeeded
//! ```
//!
//! Any stage may end the build with a [`BuildError`] that names the command
//! or file involved.

mod context;
mod hot_reload;
mod scheme;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use bundler_target::{
    parse_destinations, select_destination, BuildPlanError, DestinationError, ParseError, Platform,
    XcodebuildDestination,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::args::{swiftpm_build_arguments, xcodebuild_arguments, ArgumentError};
use crate::backend::{select_backend, Backend, BackendFlags};
use crate::config::OrchestratorConfig;
use crate::error::ErrorCategory;
use crate::process::{CommandSpec, OutputMode, ProcessError, ProcessRunner};
use crate::toolchain::Toolchain;

pub use context::BuildContext;
pub use hot_reload::{plan_relink, relink, RelinkPlan};
pub use scheme::{scheme_path, SchemeGuard};

/// Stages of a build, as they appear in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    BackendSelected,
    ArgumentsBuilt,
    ProcessRunning,
    ArtifactRelink,
    Succeeded,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStage::BackendSelected => "backend_selected",
            BuildStage::ArgumentsBuilt => "arguments_built",
            BuildStage::ProcessRunning => "process_running",
            BuildStage::ArtifactRelink => "artifact_relink",
            BuildStage::Succeeded => "succeeded",
        };
        f.write_str(name)
    }
}

/// Errors from a build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Arguments(#[from] ArgumentError),

    #[error("hot reloading is unavailable: {reason}")]
    HotReload { reason: &'static str },

    #[error("failed to list destinations with `{command}`: {source}")]
    DestinationQuery {
        command: String,
        #[source]
        source: ProcessError,
    },

    #[error("could not parse destinations from `{command}`: {source}")]
    DestinationParse {
        command: String,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Destination(#[from] DestinationError),

    #[error("failed to move scheme {} aside: {source}", path.display())]
    Scheme {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("build command `{command}` failed: {source}")]
    Process {
        command: String,
        #[source]
        source: ProcessError,
    },

    #[error("failed to read build plan {}: {source}", path.display())]
    BuildPlanRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not parse build plan {}: {source}", path.display())]
    BuildPlanParse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("unusable build plan {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: BuildPlanError,
    },

    #[error("relink command `{command}` failed: {source}")]
    Relink {
        command: String,
        #[source]
        source: ProcessError,
    },
}

impl BuildError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BuildError::Arguments(inner) => inner.category(),
            BuildError::HotReload { .. } | BuildError::Destination(_) => {
                ErrorCategory::Configuration
            }
            BuildError::DestinationQuery { source, .. }
            | BuildError::Process { source, .. }
            | BuildError::Relink { source, .. } => ErrorCategory::of_process(source),
            BuildError::DestinationParse { .. } | BuildError::BuildPlanParse { .. } => {
                ErrorCategory::OutputParse
            }
            BuildError::Scheme { .. } => ErrorCategory::Filesystem,
            BuildError::BuildPlanRead { .. } | BuildError::Artifact { .. } => {
                ErrorCategory::Artifact
            }
        }
    }

    /// The command line that failed, when a process was involved.
    pub fn command(&self) -> Option<&str> {
        match self {
            BuildError::DestinationQuery { command, .. }
            | BuildError::DestinationParse { command, .. }
            | BuildError::Process { command, .. }
            | BuildError::Relink { command, .. } => Some(command),
            _ => None,
        }
    }
}

/// What a successful build produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOutcome {
    pub backend: Backend,
    /// The build command as run
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<XcodebuildDestination>,
    /// Relinked library, when hot reloading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dylib: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BuildOutcome {
    /// Wall-clock time from backend selection to the last step.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Drives builds through a [`ProcessRunner`].
#[derive(Debug, Clone)]
pub struct Orchestrator<R> {
    runner: R,
    config: OrchestratorConfig,
}

impl<R: ProcessRunner> Orchestrator<R> {
    pub fn new(runner: R, config: OrchestratorConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Toolchain queries sharing this orchestrator's runner and config.
    pub fn toolchain(&self) -> Toolchain<'_, &R> {
        Toolchain::new(&self.runner, &self.config)
    }

    /// Build `product` (or every product, for SwiftPM) for `context`.
    pub fn build(
        &self,
        product: Option<&str>,
        context: &BuildContext,
        flags: BackendFlags,
    ) -> Result<BuildOutcome, BuildError> {
        let started_at = Utc::now();
        let backend = select_backend(flags, context.platform);
        info!(
            stage = %BuildStage::BackendSelected,
            %backend,
            platform = %context.platform,
            configuration = %context.configuration,
            "selected build backend"
        );

        let outcome = match backend {
            Backend::SwiftPM => self.build_swiftpm(product, context, started_at)?,
            Backend::Xcodebuild => self.build_xcodebuild(product, context, started_at)?,
        };

        info!(
            stage = %BuildStage::Succeeded,
            %backend,
            elapsed_ms = outcome.duration().num_milliseconds(),
            "build finished"
        );
        Ok(outcome)
    }

    fn build_swiftpm(
        &self,
        product: Option<&str>,
        context: &BuildContext,
        started_at: DateTime<Utc>,
    ) -> Result<BuildOutcome, BuildError> {
        let relink_product = match (context.hot_reloading_enabled, product) {
            (true, None) => {
                return Err(BuildError::HotReload {
                    reason: "a product must be named so its link step can be rerun",
                })
            }
            (true, Some(product)) => Some(product),
            (false, _) => None,
        };

        let arguments = swiftpm_build_arguments(product, context, &self.toolchain())?;
        let mut command = CommandSpec::new(&self.config.swift_executable)
            .args(arguments)
            .current_dir(&context.package_directory);
        if context.hot_reloading_enabled {
            command = command.env(&self.config.hot_reloading_env_var, "1");
        }
        info!(stage = %BuildStage::ArgumentsBuilt, command = %command, "built SwiftPM arguments");

        self.execute(&command)?;

        let dylib = relink_product
            .map(|product| relink(&self.runner, product, context))
            .transpose()?;

        Ok(BuildOutcome {
            backend: Backend::SwiftPM,
            command: command.to_string(),
            destination: None,
            dylib,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn build_xcodebuild(
        &self,
        product: Option<&str>,
        context: &BuildContext,
        started_at: DateTime<Utc>,
    ) -> Result<BuildOutcome, BuildError> {
        if context.hot_reloading_enabled {
            return Err(BuildError::HotReload {
                reason: "dynamic library relinking requires the SwiftPM backend",
            });
        }
        // Version and architecture problems must surface before xcodebuild
        // is asked for destinations.
        context.validate()?;
        let scheme = product.ok_or(ArgumentError::MissingProduct)?;

        let guard = SchemeGuard::relocate(&context.package_directory, scheme).map_err(|source| {
            BuildError::Scheme {
                path: scheme_path(&context.package_directory, scheme),
                source,
            }
        })?;
        if guard.is_active() {
            info!(%scheme, "checked-in scheme moved aside until the build ends");
        }

        let destination = match context.platform {
            Platform::MacOS => None,
            platform => self.destination_for(scheme, &context.package_directory, platform)?,
        };

        let arguments = xcodebuild_arguments(Some(scheme), context, destination.as_ref())?;
        let command = CommandSpec::new(&self.config.xcodebuild_executable)
            .args(arguments)
            .current_dir(&context.package_directory);
        info!(stage = %BuildStage::ArgumentsBuilt, command = %command, "built xcodebuild arguments");

        let result = self.execute(&command);
        drop(guard);
        result?;

        Ok(BuildOutcome {
            backend: Backend::Xcodebuild,
            command: command.to_string(),
            destination,
            dylib: None,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Newest acceptable destination for `platform`.
    ///
    /// Device builds fall back to the generic destination when no device is
    /// attached. Simulators must resolve to a concrete destination.
    fn destination_for(
        &self,
        scheme: &str,
        package_directory: &Path,
        platform: Platform,
    ) -> Result<Option<XcodebuildDestination>, BuildError> {
        let destinations = self.destinations(scheme, package_directory)?;
        match select_destination(&destinations, platform, &self.config.destination) {
            Ok(destination) => {
                debug!(destination = %destination.argument(), "selected destination");
                Ok(Some(destination.clone()))
            }
            Err(DestinationError::NoDestination { .. }) if !platform.is_simulator() => {
                warn!(%platform, "no device destination found, building for the generic platform");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Everything `xcodebuild -showdestinations` lists for `scheme`.
    pub fn destinations(
        &self,
        scheme: &str,
        package_directory: &Path,
    ) -> Result<Vec<XcodebuildDestination>, BuildError> {
        let command = CommandSpec::new(&self.config.xcodebuild_executable)
            .args(["-showdestinations", "-scheme", scheme])
            .current_dir(package_directory);
        let rendered = command.to_string();
        debug!(command = %rendered, "listing destinations");

        let output = self
            .runner
            .run(&command, OutputMode::Capture)
            .map_err(|source| BuildError::DestinationQuery {
                command: rendered.clone(),
                source,
            })?;
        parse_destinations(&output.stdout).map_err(|source| BuildError::DestinationParse {
            command: rendered,
            source,
        })
    }

    /// Run the build command, through the formatter when one is configured.
    fn execute(&self, command: &CommandSpec) -> Result<(), BuildError> {
        info!(stage = %BuildStage::ProcessRunning, program = %command.program, "running build");
        let result = match self.config.output_transform() {
            Some(transform) => self.runner.run_piped(command, &transform),
            None => self.runner.run(command, OutputMode::Inherit).map(|_| ()),
        };
        result.map_err(|source| BuildError::Process {
            command: command.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{InvocationKind, MockResponse, MockRunner};
    use bundler_target::{Architecture, TargetError};
    use std::fs;
    use tempfile::TempDir;

    const SIMULATORS: &str = "\
Available destinations for the \"MyApp\" scheme:
        { platform:iOS Simulator, id:AAA, OS:16.0, name:iPhone 14 }
        { platform:iOS Simulator, id:BBB, OS:17.2, name:iPhone 15 }
        { platform:iOS Simulator, id:CCC, OS:17.0, name:iPhone 15 Pro }
";

    fn orchestrator(runner: MockRunner) -> Orchestrator<MockRunner> {
        Orchestrator::new(runner, OrchestratorConfig::default())
    }

    #[test]
    fn test_swiftpm_build_pipes_through_formatter() {
        let runner = MockRunner::new();
        let orchestrator = orchestrator(runner.clone());
        let context = BuildContext::new("/pkg", Platform::MacOS);

        let outcome = orchestrator
            .build(Some("MyApp"), &context, BackendFlags::default())
            .unwrap();
        assert_eq!(outcome.backend, Backend::SwiftPM);
        assert_eq!(
            outcome.command,
            "swift build -c debug --product MyApp --scratch-path /pkg/.build"
        );

        let calls = runner.invocations();
        assert_eq!(calls.len(), 1);
        match &calls[0].kind {
            InvocationKind::Piped(transform) => assert_eq!(transform.program, "xcbeautify"),
            other => panic!("expected a piped build, got {other:?}"),
        }
    }

    #[test]
    fn test_formatter_disabled_inherits_output() {
        let runner = MockRunner::new();
        let config = OrchestratorConfig {
            use_output_formatter: false,
            ..OrchestratorConfig::default()
        };
        let orchestrator = Orchestrator::new(runner.clone(), config);
        orchestrator
            .build(None, &BuildContext::new("/pkg", Platform::Linux), BackendFlags::default())
            .unwrap();
        assert_eq!(
            runner.invocations()[0].kind,
            InvocationKind::Run(OutputMode::Inherit)
        );
    }

    #[test]
    fn test_build_failure_carries_command() {
        let runner = MockRunner::new().respond(
            "swift",
            &["build"],
            MockResponse::Exit {
                code: 1,
                output: String::new(),
            },
        );
        let err = orchestrator(runner)
            .build(None, &BuildContext::new("/pkg", Platform::MacOS), BackendFlags::default())
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ProcessExecution);
        assert_eq!(
            err.command(),
            Some("swift build -c debug --scratch-path /pkg/.build")
        );
    }

    #[test]
    fn test_missing_version_spawns_nothing() {
        let runner = MockRunner::new();
        let flags = BackendFlags {
            never_xcodebuild: true,
            ..BackendFlags::default()
        };
        let err = orchestrator(runner.clone())
            .build(Some("MyApp"), &BuildContext::new("/pkg", Platform::IOS), flags)
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(runner.invocations().is_empty());
    }

    #[test]
    fn test_hot_reload_injects_env_and_relinks() {
        let dir = TempDir::new().unwrap();
        let mut context = BuildContext::new(dir.path(), Platform::MacOS);
        context.hot_reloading_enabled = true;
        fs::create_dir_all(&context.scratch_directory).unwrap();
        fs::write(
            context.build_plan_path(),
            "commands:\n  \"C.MyApp-debug.exe\":\n    tool: shell\n    arguments: [\"/usr/bin/swiftc\", \"-o\", \"/out/MyApp\"]\n",
        )
        .unwrap();

        let runner = MockRunner::new();
        let outcome = orchestrator(runner.clone())
            .build(Some("MyApp"), &context, BackendFlags::default())
            .unwrap();
        assert_eq!(outcome.dylib, Some(PathBuf::from("/out/libMyApp.dylib")));

        let calls = runner.invocations();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].command.env.get("APP_BUNDLER_HOT_RELOADING").map(String::as_str),
            Some("1")
        );
        assert_eq!(calls[1].command.program, "/usr/bin/swiftc");
    }

    #[test]
    fn test_hot_reload_rejected_for_xcodebuild() {
        let runner = MockRunner::new();
        let mut context = BuildContext::new("/pkg", Platform::IOSSimulator);
        context.platform_version = Some("17.0".to_string());
        context.hot_reloading_enabled = true;

        let err = orchestrator(runner.clone())
            .build(Some("MyApp"), &context, BackendFlags::default())
            .unwrap_err();
        assert!(matches!(err, BuildError::HotReload { .. }));
        assert!(runner.invocations().is_empty());
    }

    #[test]
    fn test_xcodebuild_simulator_picks_newest_destination() {
        let dir = TempDir::new().unwrap();
        let runner = MockRunner::new().stdout("xcodebuild", &["-showdestinations"], SIMULATORS);
        let mut context = BuildContext::new(dir.path(), Platform::IOSSimulator);
        context.platform_version = Some("17.0".to_string());

        let outcome = orchestrator(runner.clone())
            .build(Some("MyApp"), &context, BackendFlags::default())
            .unwrap();
        assert_eq!(outcome.backend, Backend::Xcodebuild);
        assert_eq!(
            outcome.destination.as_ref().map(|d| d.os_version.as_deref()),
            Some(Some("17.2"))
        );
        assert!(outcome
            .command
            .contains("-destination 'platform=iOS Simulator,OS=17.2,name=iPhone 15'"));
        assert_eq!(runner.invocations().len(), 2);
    }

    #[test]
    fn test_xcodebuild_simulator_without_destination_fails() {
        let dir = TempDir::new().unwrap();
        let runner = MockRunner::new().stdout("xcodebuild", &["-showdestinations"], "");
        let mut context = BuildContext::new(dir.path(), Platform::TvOSSimulator);
        context.platform_version = Some("17.0".to_string());

        let err = orchestrator(runner.clone())
            .build(Some("MyApp"), &context, BackendFlags::default())
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::Destination(DestinationError::NoDestination { .. })
        ));
        assert_eq!(runner.invocations().len(), 1);
    }

    #[test]
    fn test_xcodebuild_device_falls_back_to_generic() {
        let dir = TempDir::new().unwrap();
        let runner = MockRunner::new().stdout("xcodebuild", &["-showdestinations"], SIMULATORS);
        let mut context = BuildContext::new(dir.path(), Platform::IOS);
        context.platform_version = Some("17.0".to_string());
        context.architectures = vec![Architecture::Arm64];

        let outcome = orchestrator(runner)
            .build(Some("MyApp"), &context, BackendFlags::default())
            .unwrap();
        assert!(outcome.destination.is_none());
        assert!(outcome.command.ends_with("-destination generic/platform=iOS"));
    }

    #[test]
    fn test_xcodebuild_restores_scheme_after_failure() {
        let dir = TempDir::new().unwrap();
        let scheme = scheme_path(dir.path(), "MyApp");
        fs::create_dir_all(scheme.parent().unwrap()).unwrap();
        fs::write(&scheme, "<Scheme/>").unwrap();

        let runner = MockRunner::new().respond(
            "xcodebuild",
            &["-scheme"],
            MockResponse::Exit {
                code: 65,
                output: String::new(),
            },
        );
        let flags = BackendFlags {
            force_xcodebuild: true,
            ..BackendFlags::default()
        };
        let err = orchestrator(runner)
            .build(Some("MyApp"), &BuildContext::new(dir.path(), Platform::MacOS), flags)
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::Process {
                source: ProcessError::NonZeroExit { code: 65, .. },
                ..
            }
        ));
        assert!(scheme.exists());
    }

    #[test]
    fn test_xcodebuild_missing_version_spawns_nothing() {
        let dir = TempDir::new().unwrap();
        let scheme = scheme_path(dir.path(), "MyApp");
        fs::create_dir_all(scheme.parent().unwrap()).unwrap();
        fs::write(&scheme, "<Scheme/>").unwrap();

        for platform in Platform::ALL
            .into_iter()
            .filter(|p| p.requires_cross_compilation())
        {
            let runner = MockRunner::new().stdout("xcodebuild", &["-showdestinations"], SIMULATORS);
            let err = orchestrator(runner.clone())
                .build(
                    Some("MyApp"),
                    &BuildContext::new(dir.path(), platform),
                    BackendFlags::default(),
                )
                .unwrap_err();
            assert!(
                matches!(
                    err,
                    BuildError::Arguments(ArgumentError::Target(
                        TargetError::MissingPlatformVersion(p)
                    )) if p == platform
                ),
                "{platform}: {err}"
            );
            assert_eq!(err.category(), ErrorCategory::Configuration);
            assert!(runner.invocations().is_empty(), "{platform} spawned a process");
            assert!(scheme.exists(), "{platform} touched the scheme");
        }
    }

    #[test]
    fn test_xcodebuild_requires_product() {
        let flags = BackendFlags {
            force_xcodebuild: true,
            ..BackendFlags::default()
        };
        let err = orchestrator(MockRunner::new())
            .build(None, &BuildContext::new("/pkg", Platform::MacOS), flags)
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::Arguments(ArgumentError::MissingProduct)
        ));
    }
}
