//! Relinking a freshly built executable as a dynamic library.
//!
//! After a SwiftPM build, the link command for the product is recovered from
//! the build plan and re-run with its output redirected to
//! `lib<product>.<ext>` so a running instance can load the new code.

use std::fs;
use std::path::PathBuf;

use bundler_target::{link_command_name, BuildPlan, BuildPlanError};
use tracing::{debug, info};

use super::{BuildContext, BuildError, BuildStage};
use crate::process::{CommandSpec, OutputMode, ProcessRunner};

/// A relink step recovered from the build plan, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelinkPlan {
    pub command: CommandSpec,
    pub dylib: PathBuf,
}

/// Read the build plan and rewrite `product`'s link step to emit a dylib.
pub fn plan_relink(product: &str, context: &BuildContext) -> Result<RelinkPlan, BuildError> {
    let plan_path = context.build_plan_path();
    let document = fs::read_to_string(&plan_path).map_err(|source| BuildError::BuildPlanRead {
        path: plan_path.clone(),
        source,
    })?;
    let plan = BuildPlan::parse(&document).map_err(|source| BuildError::BuildPlanParse {
        path: plan_path.clone(),
        source,
    })?;

    let link = plan
        .link_command(product, context.configuration)
        .map_err(|source| BuildError::Artifact {
            path: plan_path.clone(),
            source,
        })?;
    // link_command guarantees an `-o` value; a bare file name has no directory.
    let dylib = link
        .dylib_path(product, context.platform)
        .ok_or_else(|| BuildError::Artifact {
            path: plan_path.clone(),
            source: BuildPlanError::MissingFlag {
                key: link_command_name(product, context.configuration),
                flag: "-o",
            },
        })?;
    let link = link.into_dylib(&dylib, context.platform);

    let command = CommandSpec::new(&link.executable)
        .args(&link.arguments)
        .current_dir(&context.package_directory);
    Ok(RelinkPlan { command, dylib })
}

/// Rebuild `product` as a dynamic library. Returns the library's path.
pub fn relink<R: ProcessRunner>(
    runner: &R,
    product: &str,
    context: &BuildContext,
) -> Result<PathBuf, BuildError> {
    info!(
        stage = %BuildStage::ArtifactRelink,
        plan = %context.build_plan_path().display(),
        "relinking as dynamic library"
    );
    let RelinkPlan { command, dylib } = plan_relink(product, context)?;

    debug!(command = %command, "running relink");
    runner
        .run(&command, OutputMode::Capture)
        .map_err(|source| BuildError::Relink {
            command: command.to_string(),
            source,
        })?;

    Ok(dylib)
}
