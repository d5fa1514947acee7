//! Built-in defaults (layer 1)

use bundler_target::DestinationPolicy;
use serde::{Deserialize, Serialize};

use crate::process::OutputTransform;

/// Everything the orchestrator needs to know that isn't per-build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Pipe build output through `output_formatter` (default: true)
    pub use_output_formatter: bool,

    /// Formatter program (default: "xcbeautify")
    pub output_formatter: String,

    /// Formatter arguments (default: ["--disable-logging"])
    pub output_formatter_args: Vec<String>,

    /// Variable set to "1" in the build environment when hot reloading
    pub hot_reloading_env_var: String,

    /// Filtering applied to `xcodebuild -showdestinations` results
    pub destination: DestinationPolicy,

    pub swift_executable: String,
    pub swiftc_executable: String,
    pub xcodebuild_executable: String,
    pub xcrun_executable: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            use_output_formatter: true,
            output_formatter: "xcbeautify".to_string(),
            output_formatter_args: vec!["--disable-logging".to_string()],
            hot_reloading_env_var: "APP_BUNDLER_HOT_RELOADING".to_string(),
            destination: DestinationPolicy::default(),
            swift_executable: "swift".to_string(),
            swiftc_executable: "swiftc".to_string(),
            xcodebuild_executable: "xcodebuild".to_string(),
            xcrun_executable: "xcrun".to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// The formatter to pipe build output through, if enabled.
    pub fn output_transform(&self) -> Option<OutputTransform> {
        self.use_output_formatter
            .then(|| OutputTransform::new(&self.output_formatter, &self.output_formatter_args))
    }

    /// Convert to a JSON value for merging.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "use_output_formatter": self.use_output_formatter,
            "output_formatter": self.output_formatter,
            "output_formatter_args": self.output_formatter_args,
            "hot_reloading_env_var": self.hot_reloading_env_var,
            "destination": {
                "excluded_name_substring": self.destination.excluded_name_substring,
            },
            "swift_executable": self.swift_executable,
            "swiftc_executable": self.swiftc_executable,
            "xcodebuild_executable": self.xcodebuild_executable,
            "xcrun_executable": self.xcrun_executable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert!(config.use_output_formatter);
        assert_eq!(config.output_formatter, "xcbeautify");
        assert_eq!(config.hot_reloading_env_var, "APP_BUNDLER_HOT_RELOADING");
        assert_eq!(
            config.destination.excluded_name_substring.as_deref(),
            Some("Designed for")
        );
    }

    #[test]
    fn test_output_transform() {
        let mut config = OrchestratorConfig::default();
        let transform = config.output_transform().unwrap();
        assert_eq!(transform.program, "xcbeautify");
        assert_eq!(transform.args, vec!["--disable-logging"]);

        config.use_output_formatter = false;
        assert!(config.output_transform().is_none());
    }

    #[test]
    fn test_to_value_round_trips() {
        let config = OrchestratorConfig::default();
        let back: OrchestratorConfig = serde_json::from_value(config.to_value()).unwrap();
        assert_eq!(back, config);
    }
}
