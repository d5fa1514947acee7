//! Build argument construction.
//!
//! Produces the exact argument vectors for `swift build` and `xcodebuild`.
//! Everything that can fail (missing platform version, unsupported
//! architecture, SDK lookup) fails here, before a build process is started.
//!
//! SwiftPM argument order:
//!
//! ```text
//! build -c <config> [--product <p>] [--arch <a>]*
//!       [-Xswiftc -sdk -Xswiftc <sdk> -Xswiftc -target -Xswiftc <triple>
//!        -Xcc --target=<triple> -Xcc -isysroot -Xcc <sdk>]
//!       --scratch-path <dir> [additional...]
//! ```
//!
//! Caller-supplied arguments always come last so they can override anything
//! before them.

use bundler_target::{Architecture, Platform, TargetError, TargetTriple, XcodebuildDestination};
use thiserror::Error;

use crate::build::BuildContext;
use crate::error::ErrorCategory;
use crate::toolchain::{SdkLocator, ToolchainError};

/// Errors from argument construction.
#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("{architecture} is not supported when building for {platform}")]
    UnsupportedArchitecture {
        architecture: Architecture,
        platform: Platform,
    },

    #[error("xcodebuild builds require a product to use as the scheme")]
    MissingProduct,

    #[error("failed to locate the {platform} SDK: {source}")]
    Sdk {
        platform: Platform,
        #[source]
        source: ToolchainError,
    },
}

impl ArgumentError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ArgumentError::Target(_)
            | ArgumentError::UnsupportedArchitecture { .. }
            | ArgumentError::MissingProduct => ErrorCategory::Configuration,
            ArgumentError::Sdk { source, .. } => source.category(),
        }
    }
}

/// Triple used for cross-compilation flags.
///
/// Uses the first requested architecture. Without one it falls back to
/// [`Platform::default_architecture`](bundler_target::Platform::default_architecture).
pub fn target_triple(context: &BuildContext) -> Result<TargetTriple, ArgumentError> {
    context.validate()?;
    let architecture = context
        .architectures
        .first()
        .copied()
        .unwrap_or_else(|| context.platform.default_architecture());
    Ok(TargetTriple::apple(
        architecture,
        context.platform,
        context.platform_version.as_deref(),
    )?)
}

/// Arguments for `swift build`.
pub fn swiftpm_build_arguments(
    product: Option<&str>,
    context: &BuildContext,
    sdk: &impl SdkLocator,
) -> Result<Vec<String>, ArgumentError> {
    context.validate()?;

    let platform_arguments: Vec<String> = if context.platform.requires_cross_compilation() {
        // Version first: a missing version must not cost an xcrun call.
        let triple = target_triple(context)?;
        let sdk_path = sdk
            .latest_sdk_path(context.platform)
            .map_err(|source| ArgumentError::Sdk {
                platform: context.platform,
                source,
            })?;
        let sdk_path = sdk_path.to_string_lossy().into_owned();
        let triple = triple.to_string();

        let swiftc = ["-sdk", sdk_path.as_str(), "-target", triple.as_str()]
            .into_iter()
            .flat_map(|flag| ["-Xswiftc".to_string(), flag.to_string()]);
        let target_flag = format!("--target={triple}");
        let cc = [target_flag.as_str(), "-isysroot", sdk_path.as_str()]
            .into_iter()
            .flat_map(|flag| ["-Xcc".to_string(), flag.to_string()]);
        swiftc.chain(cc).collect()
    } else {
        Vec::new()
    };

    let mut arguments = vec![
        "build".to_string(),
        "-c".to_string(),
        context.configuration.as_str().to_string(),
    ];
    if let Some(product) = product {
        arguments.extend(["--product".to_string(), product.to_string()]);
    }
    for architecture in context.unique_architectures() {
        arguments.extend([
            "--arch".to_string(),
            architecture.argument(context.platform).to_string(),
        ]);
    }
    arguments.extend(platform_arguments);
    arguments.extend([
        "--scratch-path".to_string(),
        context.scratch_directory.to_string_lossy().into_owned(),
    ]);
    arguments.extend(context.additional_arguments.iter().cloned());

    Ok(arguments)
}

/// Arguments for `xcodebuild`.
///
/// macOS is addressed by architecture. Other platforms use `destination`,
/// falling back to the platform's generic destination when none was found.
pub fn xcodebuild_arguments(
    product: Option<&str>,
    context: &BuildContext,
    destination: Option<&XcodebuildDestination>,
) -> Result<Vec<String>, ArgumentError> {
    context.validate()?;
    let scheme = product.ok_or(ArgumentError::MissingProduct)?;

    let destination = match (context.platform, destination) {
        (Platform::MacOS, _) => format!("platform=macOS,arch={}", architecture_list(context)),
        (platform, None) => format!("generic/platform={}", platform.display_name()),
        (_, Some(destination)) => destination.argument(),
    };

    let mut arguments: Vec<String> = [
        "-scheme",
        scheme,
        "-configuration",
        context.configuration.xcodebuild_name(),
        "-usePackageSupportBuiltinSCM",
        "-skipMacroValidation",
        "-derivedDataPath",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    arguments.push(derived_data_path(context));
    arguments.extend(["-destination".to_string(), destination]);
    arguments.extend(context.additional_arguments.iter().cloned());

    Ok(arguments)
}

fn architecture_list(context: &BuildContext) -> String {
    let architectures = context.unique_architectures();
    if architectures.is_empty() {
        return context.platform.default_architecture().as_str().to_string();
    }
    architectures
        .iter()
        .map(Architecture::as_str)
        .collect::<Vec<_>>()
        .join("_")
}

/// `<scratch>/<arch_arch>-apple-<sdk>`, one per architecture set and platform.
/// Without requested architectures the platform's default one is used.
fn derived_data_path(context: &BuildContext) -> String {
    context
        .scratch_directory
        .join(format!(
            "{}-apple-{}",
            architecture_list(context),
            context.platform.sdk_name()
        ))
        .to_string_lossy()
        .into_owned()
}
