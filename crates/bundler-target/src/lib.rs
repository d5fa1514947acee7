//! Target descriptors and toolchain output parsers.
//!
//! This crate is the pure layer of the bundler: it describes what is being
//! built (platform, architecture, configuration, target triple) and decodes
//! the unstructured text that `swift`, `xcrun`, `swiftc` and `xcodebuild`
//! print back. Nothing in here spawns a process.

mod build_plan;
mod destination;
mod error;
mod platform;
mod scanner;
mod sdk;
mod target_info;
mod triple;
mod version;

pub use build_plan::{link_command_name, BuildPlan, BuildPlanError, LinkCommand, PlanCommand};
pub use destination::{
    parse_destinations, select_destination, DestinationError, DestinationPolicy,
    XcodebuildDestination,
};
pub use error::{OutputKind, ParseError};
pub use platform::{Architecture, BuildConfiguration, Platform, UnknownVariant};
pub use sdk::parse_sdk_path;
pub use target_info::{parse_target_info, TargetDetails, TargetInfo, TargetPaths};
pub use triple::{TargetError, TargetTriple};
pub use version::{parse_swift_version, parse_tools_version, ToolVersion};
