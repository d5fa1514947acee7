//! Config file, environment and CLI layers

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::defaults::OrchestratorConfig;
use super::merge::deep_merge;
use crate::error::ErrorCategory;

/// Set to a truthy value to skip the output formatter.
pub const NO_FORMATTER_ENV: &str = "APP_BUNDLER_NO_FORMATTER";

/// Where a layer came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    File,
    Env,
    Cli,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid {origin:?} configuration: {message}")]
    Invalid { origin: ConfigOrigin, message: String },
}

impl ConfigError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConfigError::Io { .. } => ErrorCategory::Filesystem,
            ConfigError::Parse { .. } | ConfigError::Invalid { .. } => ErrorCategory::Configuration,
        }
    }
}

/// On-disk shape. Only `[build]` belongs to us; other tables are ignored.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    build: Option<Value>,
}

impl OrchestratorConfig {
    /// Defaults overlaid with the `[build]` table of `path`, if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let Some(path) = path.filter(|p| p.exists()) else {
            return Ok(defaults);
        };

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), "loaded config file");

        match file.build {
            Some(build) => defaults.overlay(ConfigOrigin::File, build),
            None => Ok(defaults),
        }
    }

    /// Apply environment toggles read through `lookup`.
    ///
    /// `APP_BUNDLER_NO_FORMATTER` accepts 1/true/yes/on and 0/false/no/off
    /// (or empty). Anything else is rejected rather than guessed at.
    pub fn from_env_overlay<F>(self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(value) = lookup(NO_FORMATTER_ENV) else {
            return Ok(self);
        };
        match parse_switch(&value) {
            Some(true) => {
                debug!(var = NO_FORMATTER_ENV, "output formatter disabled by environment");
                self.overlay(
                    ConfigOrigin::Env,
                    serde_json::json!({ "use_output_formatter": false }),
                )
            }
            Some(false) => Ok(self),
            None => Err(ConfigError::Invalid {
                origin: ConfigOrigin::Env,
                message: format!("{NO_FORMATTER_ENV}={value:?} is not a boolean"),
            }),
        }
    }

    /// Apply CLI overrides, given as a partial config object.
    pub fn with_overrides(self, overrides: Value) -> Result<Self, ConfigError> {
        self.overlay(ConfigOrigin::Cli, overrides)
    }

    fn overlay(self, origin: ConfigOrigin, layer: Value) -> Result<Self, ConfigError> {
        if !layer.is_object() {
            return Err(ConfigError::Invalid {
                origin,
                message: "expected a table".to_string(),
            });
        }
        let merged = deep_merge(self.to_value(), layer);
        serde_json::from_value(merged).map_err(|e| ConfigError::Invalid {
            origin,
            message: e.to_string(),
        })
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
