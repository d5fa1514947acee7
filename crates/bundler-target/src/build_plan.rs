//! SwiftPM build plan (`<scratch>/<configuration>.yaml`) decoding.
//!
//! SwiftPM writes an llbuild manifest describing every compile and link step
//! of a build. Hot reloading only needs the link step of one product, which is
//! pulled out and rewritten to emit a dynamic library instead of an
//! executable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::error::{OutputKind, ParseError};
use crate::platform::{BuildConfiguration, Platform};

/// Problems with a build plan that decoded fine but lacks what we need.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildPlanError {
    #[error("build plan has no command named {key:?}")]
    MissingCommand { key: String },

    #[error("build plan command {key:?} uses tool {tool:?}, expected \"shell\"")]
    UnexpectedTool { key: String, tool: String },

    #[error("build plan command {key:?} has no arguments")]
    MissingArguments { key: String },

    #[error("build plan command {key:?} has no {flag:?} argument to replace")]
    MissingFlag { key: String, flag: &'static str },
}

/// The subset of an llbuild manifest the bundler reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BuildPlan {
    #[serde(default)]
    pub commands: BTreeMap<String, PlanCommand>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlanCommand {
    #[serde(default)]
    pub tool: String,
    #[serde(default, alias = "args")]
    pub arguments: Option<Vec<String>>,
}

/// A standalone link invocation recovered from a build plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCommand {
    pub executable: String,
    pub arguments: Vec<String>,
}

/// Key SwiftPM uses for a product's link command, e.g. `C.MyApp-debug.exe`.
pub fn link_command_name(product: &str, configuration: BuildConfiguration) -> String {
    format!("C.{}-{}.exe", product, configuration.as_str())
}

impl BuildPlan {
    /// Decode a build plan document. Unknown keys are ignored.
    pub fn parse(document: &str) -> Result<Self, ParseError> {
        serde_yaml::from_str(document).map_err(|e| {
            let position = e.location().map(|l| l.index()).unwrap_or(0);
            ParseError::new(OutputKind::BuildPlan, document, position, e.to_string())
        })
    }

    /// Find the link command for `product`.
    pub fn link_command(
        &self,
        product: &str,
        configuration: BuildConfiguration,
    ) -> Result<LinkCommand, BuildPlanError> {
        let key = link_command_name(product, configuration);
        let command = self
            .commands
            .get(&key)
            .ok_or_else(|| BuildPlanError::MissingCommand { key: key.clone() })?;

        if command.tool != "shell" {
            return Err(BuildPlanError::UnexpectedTool {
                key,
                tool: command.tool.clone(),
            });
        }

        let (executable, arguments) = command
            .arguments
            .as_deref()
            .and_then(|args| args.split_first())
            .ok_or_else(|| BuildPlanError::MissingArguments { key: key.clone() })?;

        let has_output = arguments
            .iter()
            .position(|a| a == "-o")
            .is_some_and(|i| i + 1 < arguments.len());
        if !has_output {
            return Err(BuildPlanError::MissingFlag { key, flag: "-o" });
        }

        Ok(LinkCommand {
            executable: executable.clone(),
            arguments: arguments.to_vec(),
        })
    }
}

impl LinkCommand {
    /// The value following `-o`.
    pub fn output_path(&self) -> Option<&Path> {
        self.arguments
            .iter()
            .position(|a| a == "-o")
            .and_then(|i| self.arguments.get(i + 1))
            .map(Path::new)
    }

    /// `lib<product>.<ext>` next to the executable this command links.
    pub fn dylib_path(&self, product: &str, platform: Platform) -> Option<PathBuf> {
        let directory = self.output_path()?.parent()?;
        Some(directory.join(format!("lib{}.{}", product, platform.dylib_extension())))
    }

    /// Rewrite the command to write a dynamic library to `output` instead.
    ///
    /// The original `-o <path>` pair is dropped and replaced at the end along
    /// with the linker flag that makes the output loadable at runtime.
    pub fn into_dylib(self, output: &Path, platform: Platform) -> LinkCommand {
        let mut arguments = Vec::with_capacity(self.arguments.len() + 2);
        let mut iter = self.arguments.into_iter();
        while let Some(argument) = iter.next() {
            if argument == "-o" {
                iter.next();
                continue;
            }
            arguments.push(argument);
        }

        let dylib_flag = match platform {
            Platform::Linux => "-shared",
            _ => "-dylib",
        };
        arguments.extend([
            "-o".to_string(),
            output.to_string_lossy().into_owned(),
            "-Xlinker".to_string(),
            dylib_flag.to_string(),
        ]);

        LinkCommand {
            executable: self.executable,
            arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"
client:
  name: basic
  file-system: device-agnostic
tools: {}
targets:
  "main": ["<C.MyApp-debug.exe>"]
commands:
  "C.MyApp-debug.exe":
    tool: shell
    inputs: ["/pkg/.build/debug/MyApp.build/main.swift.o"]
    outputs: ["/pkg/.build/debug/MyApp"]
    description: "Linking ./.build/debug/MyApp"
    args: ["/usr/bin/swiftc","-L","/pkg/.build/debug","-o","/pkg/.build/debug/MyApp","-module-name","MyApp","-emit-executable"]
  "C.MyApp-debug.module":
    tool: swift-compiler
    inputs: []
    outputs: []
"#;

    #[test]
    fn test_parse_tolerates_unknown_fields() {
        let plan = BuildPlan::parse(PLAN).unwrap();
        assert_eq!(plan.commands.len(), 2);
        assert_eq!(plan.commands["C.MyApp-debug.module"].tool, "swift-compiler");
        assert!(plan.commands["C.MyApp-debug.module"].arguments.is_none());
    }

    #[test]
    fn test_link_command_found() {
        let plan = BuildPlan::parse(PLAN).unwrap();
        let link = plan.link_command("MyApp", BuildConfiguration::Debug).unwrap();
        assert_eq!(link.executable, "/usr/bin/swiftc");
        assert_eq!(link.arguments[0], "-L");
    }

    #[test]
    fn test_missing_key_names_it() {
        let plan = BuildPlan::parse(PLAN).unwrap();
        let err = plan.link_command("MyApp", BuildConfiguration::Release).unwrap_err();
        assert_eq!(
            err,
            BuildPlanError::MissingCommand {
                key: "C.MyApp-release.exe".to_string()
            }
        );
        assert!(err.to_string().contains("C.MyApp-release.exe"));
    }

    #[test]
    fn test_wrong_tool() {
        let mut plan = BuildPlan::parse(PLAN).unwrap();
        let command = plan.commands.remove("C.MyApp-debug.module").unwrap();
        plan.commands.insert("C.Other-debug.exe".to_string(), command);
        let err = plan.link_command("Other", BuildConfiguration::Debug).unwrap_err();
        assert!(matches!(err, BuildPlanError::UnexpectedTool { .. }));
    }

    #[test]
    fn test_missing_output_flag_is_distinct() {
        let plan = BuildPlan::parse(
            r#"
commands:
  "C.MyApp-debug.exe":
    tool: shell
    arguments: ["/usr/bin/swiftc", "-emit-executable"]
"#,
        )
        .unwrap();
        let err = plan.link_command("MyApp", BuildConfiguration::Debug).unwrap_err();
        assert_eq!(
            err,
            BuildPlanError::MissingFlag {
                key: "C.MyApp-debug.exe".to_string(),
                flag: "-o"
            }
        );
    }

    #[test]
    fn test_empty_arguments() {
        let plan = BuildPlan::parse(
            "commands:\n  \"C.MyApp-debug.exe\":\n    tool: shell\n    arguments: []\n",
        )
        .unwrap();
        let err = plan.link_command("MyApp", BuildConfiguration::Debug).unwrap_err();
        assert!(matches!(err, BuildPlanError::MissingArguments { .. }));
    }

    #[test]
    fn test_into_dylib_rewrites_output() {
        let plan = BuildPlan::parse(PLAN).unwrap();
        let link = plan
            .link_command("MyApp", BuildConfiguration::Debug)
            .unwrap()
            .into_dylib(Path::new("/pkg/.build/debug/libMyApp.dylib"), Platform::MacOS);

        assert_eq!(
            link.arguments,
            vec![
                "-L",
                "/pkg/.build/debug",
                "-module-name",
                "MyApp",
                "-emit-executable",
                "-o",
                "/pkg/.build/debug/libMyApp.dylib",
                "-Xlinker",
                "-dylib",
            ]
        );
    }

    #[test]
    fn test_dylib_path_sits_next_to_executable() {
        let plan = BuildPlan::parse(PLAN).unwrap();
        let link = plan.link_command("MyApp", BuildConfiguration::Debug).unwrap();
        assert_eq!(link.output_path(), Some(Path::new("/pkg/.build/debug/MyApp")));
        assert_eq!(
            link.dylib_path("MyApp", Platform::MacOS),
            Some(PathBuf::from("/pkg/.build/debug/libMyApp.dylib"))
        );
        assert_eq!(
            link.dylib_path("MyApp", Platform::Linux),
            Some(PathBuf::from("/pkg/.build/debug/libMyApp.so"))
        );
    }

    #[test]
    fn test_malformed_document() {
        let err = BuildPlan::parse("commands: [unterminated").unwrap_err();
        assert_eq!(err.kind, OutputKind::BuildPlan);
    }
}
