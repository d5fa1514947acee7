//! app-bundler CLI
//!
//! Entry point for the `app-bundler` command-line tool.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use app_bundler::build::plan_relink;
use app_bundler::{
    load_package_manifest, BackendFlags, BuildContext, ErrorCategory, Orchestrator,
    OrchestratorConfig, SystemRunner,
};
use bundler_target::{select_destination, Architecture, BuildConfiguration, Platform, TargetTriple};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Build Swift packages for Apple platforms and Linux
#[derive(Parser)]
#[command(name = "app-bundler")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Path to config file (default: app-bundler.toml)
    #[arg(long, global = true, default_value = "app-bundler.toml")]
    config: PathBuf,

    /// Don't pipe build output through the formatter
    #[arg(long, global = true)]
    no_formatter: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PackageArgs {
    /// Package directory containing Package.swift
    #[arg(long, default_value = ".")]
    package: PathBuf,

    /// Scratch directory (default: <package>/.build)
    #[arg(long)]
    scratch_path: Option<PathBuf>,

    /// debug or release
    #[arg(long, short = 'C', default_value = "debug")]
    configuration: BuildConfiguration,

    /// Target platform
    #[arg(long, default_value = "macOS")]
    platform: Platform,

    /// Minimum OS version, required for Apple platforms other than macOS
    #[arg(long)]
    platform_version: Option<String>,

    /// Architecture to build for (repeatable)
    #[arg(long = "arch")]
    architectures: Vec<Architecture>,
}

impl PackageArgs {
    fn context(&self) -> BuildContext {
        let mut context = BuildContext::new(&self.package, self.platform);
        if let Some(scratch) = &self.scratch_path {
            context.scratch_directory = scratch.clone();
        }
        context.configuration = self.configuration;
        context.architectures = self.architectures.clone();
        context.platform_version = self.platform_version.clone();
        context
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build a product
    Build {
        #[command(flatten)]
        package: PackageArgs,

        /// Product to build (default: every product, SwiftPM only)
        #[arg(long)]
        product: Option<String>,

        /// Relink the product as a dynamic library afterwards
        #[arg(long)]
        hot_reload: bool,

        /// Build with xcodebuild even when SwiftPM would do
        #[arg(long)]
        xcodebuild: bool,

        /// Never build with xcodebuild
        #[arg(long)]
        no_xcodebuild: bool,

        /// Extra arguments passed to the backend (after --)
        #[arg(last = true)]
        extra: Vec<String>,
    },

    /// Print the Swift toolchain version
    Version {
        /// Also print the swift-tools-version this package declares
        #[arg(long)]
        package: Option<PathBuf>,
    },

    /// Print the directory SwiftPM builds products into
    BinPath {
        #[command(flatten)]
        package: PackageArgs,

        #[arg(long)]
        product: Option<String>,
    },

    /// Print the newest SDK path for a platform
    SdkPath {
        #[arg(long, default_value = "macOS")]
        platform: Platform,
    },

    /// Print target info from the Swift compiler
    TargetInfo {
        /// Query a specific platform instead of the host
        #[arg(long)]
        platform: Option<Platform>,

        #[arg(long)]
        platform_version: Option<String>,

        #[arg(long, default_value = "arm64")]
        arch: Architecture,
    },

    /// List xcodebuild destinations for a scheme
    Destinations {
        /// Scheme (product) to query
        product: String,

        #[arg(long, default_value = ".")]
        package: PathBuf,

        /// Also show which destination a build would pick
        #[arg(long)]
        platform: Option<Platform>,
    },

    /// Show the dylib relink command recovered from the last build plan
    PlanLink {
        #[command(flatten)]
        package: PackageArgs,

        #[arg(long)]
        product: String,
    },

    /// Print products and targets declared by Package.swift
    Manifest {
        #[arg(long, default_value = ".")]
        package: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    let orchestrator = Orchestrator::new(SystemRunner::new(), config);

    match cli.command {
        Commands::Build {
            package,
            product,
            hot_reload,
            xcodebuild,
            no_xcodebuild,
            extra,
        } => {
            let mut context = package.context();
            context.hot_reloading_enabled = hot_reload;
            context.additional_arguments = extra;
            let flags = BackendFlags {
                force_xcodebuild: xcodebuild,
                never_xcodebuild: no_xcodebuild,
            };
            let outcome = orchestrator
                .build(product.as_deref(), &context, flags)
                .map_err(|e| {
                    let category = e.category();
                    anyhow::Error::new(e)
                        .context(format!("build failed ({category}): {}", hint(category)))
                })?;
            emit(cli.json, &outcome, |o| {
                let seconds = o.duration().num_milliseconds() as f64 / 1000.0;
                match &o.dylib {
                    Some(dylib) => format!(
                        "Built with {} in {seconds:.1}s; relinked {}",
                        o.backend,
                        dylib.display()
                    ),
                    None => format!("Built with {} in {seconds:.1}s", o.backend),
                }
            })
        }
        Commands::Version { package } => {
            let swift = orchestrator.toolchain().swift_version()?;
            let tools = package
                .as_deref()
                .map(app_bundler::tools_version)
                .transpose()?;
            let output = serde_json::json!({ "swift": swift, "tools": tools });
            emit(cli.json, &output, |_| match tools {
                Some(tools) => format!("Swift {swift}\nswift-tools-version {tools}"),
                None => format!("Swift {swift}"),
            })
        }
        Commands::BinPath { package, product } => {
            let path = orchestrator
                .toolchain()
                .products_directory(product.as_deref(), &package.context())?;
            emit(cli.json, &path, |p| p.display().to_string())
        }
        Commands::SdkPath { platform } => {
            let path = orchestrator.toolchain().latest_sdk_path(platform)?;
            emit(cli.json, &path, |p| p.display().to_string())
        }
        Commands::TargetInfo {
            platform,
            platform_version,
            arch,
        } => {
            let triple = match platform {
                Some(platform) => {
                    anyhow::ensure!(
                        platform.supports(arch),
                        "{arch} is not supported when building for {platform}"
                    );
                    let triple = TargetTriple::apple(arch, platform, platform_version.as_deref())
                        .context("invalid target")?;
                    Some(triple)
                }
                None => None,
            };
            let info = orchestrator.toolchain().target_info(triple.as_ref())?;
            emit(cli.json, &info, |i| {
                let mut text = format!(
                    "triple: {}\nruntime resources: {}",
                    i.target.triple, i.paths.runtime_resource_path
                );
                for path in &i.paths.runtime_library_paths {
                    text.push_str(&format!("\nlibrary path: {path}"));
                }
                text
            })
        }
        Commands::Destinations {
            product,
            package,
            platform,
        } => run_destinations(&orchestrator, cli.json, &product, &package, platform),
        Commands::PlanLink { package, product } => {
            let plan = plan_relink(&product, &package.context())?;
            let output = serde_json::json!({
                "command": plan.command.to_string(),
                "dylib": plan.dylib,
            });
            emit(cli.json, &output, |_| plan.command.to_string())
        }
        Commands::Manifest { package } => {
            let swift = orchestrator.config().swift_executable.clone();
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to start async runtime")?;
            let manifest = runtime.block_on(load_package_manifest(&package, &swift))?;
            emit(cli.json, &manifest, |m| {
                let executables: Vec<&str> =
                    m.executable_products().map(|p| p.name.as_str()).collect();
                format!(
                    "{}\n  products: {}\n  executables: {}\n  targets: {}",
                    m.name,
                    m.products.len(),
                    executables.join(", "),
                    m.targets.len()
                )
            })
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn load_config(cli: &Cli) -> Result<OrchestratorConfig> {
    let mut config = OrchestratorConfig::load(Some(cli.config.as_path()))
        .with_context(|| format!("failed to load {}", cli.config.display()))?
        .from_env_overlay(|key| std::env::var(key).ok())?;
    if cli.no_formatter {
        config = config.with_overrides(serde_json::json!({ "use_output_formatter": false }))?;
    }
    Ok(config)
}

fn run_destinations(
    orchestrator: &Orchestrator<SystemRunner>,
    json: bool,
    product: &str,
    package: &Path,
    platform: Option<Platform>,
) -> Result<()> {
    let destinations = orchestrator.destinations(product, package)?;
    let selected = platform
        .map(|platform| {
            select_destination(&destinations, platform, &orchestrator.config().destination)
        })
        .transpose()?;

    let output = serde_json::json!({
        "destinations": destinations,
        "selected": selected,
    });
    emit(json, &output, |_| {
        let mut lines: Vec<String> = destinations
            .iter()
            .map(|d| match &d.os_version {
                Some(os) => format!("{} | {} | {}", d.platform, d.name, os),
                None => format!("{} | {}", d.platform, d.name),
            })
            .collect();
        if let Some(selected) = selected {
            lines.push(format!("selected: {}", selected.argument()));
        }
        if lines.is_empty() {
            lines.push("no destinations".to_string());
        }
        lines.join("\n")
    })
}

/// Print `value` as JSON or as the text `human` renders.
fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", human(value));
    }
    Ok(())
}

fn hint(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Configuration => "check the build options",
        ErrorCategory::ToolResolution => "install the missing tool or fix PATH",
        ErrorCategory::ProcessExecution => "see the tool output above",
        ErrorCategory::OutputParse => "the tool printed something unexpected",
        ErrorCategory::Artifact => "rebuild without --hot-reload and try again",
        ErrorCategory::Filesystem => "check file permissions",
    }
}
