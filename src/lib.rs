//! app-bundler - build orchestration for Swift packages
//!
//! Decides whether SwiftPM or xcodebuild builds a product, assembles the
//! exact arguments for the target platform, runs the build (optionally
//! through an output formatter) and relinks executables as dynamic
//! libraries for hot reloading.

pub mod args;
pub mod backend;
pub mod build;
pub mod config;
pub mod error;
pub mod mock;
pub mod process;
pub mod toolchain;

pub use args::{swiftpm_build_arguments, target_triple, xcodebuild_arguments, ArgumentError};
pub use backend::{select_backend, Backend, BackendFlags};
pub use build::{BuildContext, BuildError, BuildOutcome, BuildStage, Orchestrator};
pub use config::{ConfigError, OrchestratorConfig};
pub use error::ErrorCategory;
pub use process::{
    CommandSpec, OutputMode, OutputTransform, ProcessError, ProcessOutput, ProcessRunner,
    SystemRunner,
};
pub use toolchain::{
    load_package_manifest, tools_version, PackageManifest, Toolchain, ToolchainError,
};
