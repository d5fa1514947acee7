//! Orchestrator configuration
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. Config file (`[build]` table of a TOML file)
//! 3. Environment overlay (`APP_BUNDLER_NO_FORMATTER`)
//! 4. CLI overrides
//!
//! Nothing below reads the process environment directly. Callers hand in a
//! lookup function so tests can supply their own.

mod defaults;
mod layers;
mod merge;

pub use defaults::OrchestratorConfig;
pub use layers::{ConfigError, ConfigOrigin, NO_FORMATTER_ENV};
pub use merge::deep_merge;
