// SPDX-License-Identifier: Apache-2.0

//! Locations of the external tools the loop drives.
//!
//! Values come from (highest precedence first) command line flags, the
//! `[toolchain]` table of an `emi-toolchain.toml` file, and defaults relative
//! to the build project root.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::EmiError;

/// Name of the toolchain file picked up from the project root when no
/// `--toolchain` flag is given.
pub const DEFAULT_TOOLCHAIN_FILE: &str = "emi-toolchain.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolchainConfig {
    /// Java launcher used to run the coverage report CLI.
    pub java: Option<String>,

    /// Heap-dump capture library loaded by each variant.
    pub heap_dump_lib: Option<String>,

    /// JaCoCo agent loaded by each variant in profile mode.
    pub jacoco_agent: Option<String>,

    /// JaCoCo command line jar used to turn `.exec` traces into XML reports.
    pub jacoco_cli: Option<String>,

    /// Command prefix that invokes the mutator; the driver appends
    /// `--registry`, `--variant`, `--new-variant` and `--coverage`.
    pub mutator_command: Option<Vec<String>>,

    /// Command prefix that compares two heap dumps. When present, every
    /// mutant's heap dump is checked against the seed's.
    pub heap_differ_command: Option<Vec<String>>,

    /// Package prefix handed to the heap differ as `--prefix`.
    pub heap_differ_prefix: Option<String>,

    /// File the table was read from, for error messages.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Deserialize)]
struct EmiToolchainFile {
    toolchain: ToolchainConfig,
}

/// Parses the text of a toolchain file.
pub fn parse_toolchain_config(text: &str, path: &Path) -> Result<ToolchainConfig, EmiError> {
    let file: EmiToolchainFile = toml::from_str(text).map_err(|e| EmiError::InvalidConfig {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(ToolchainConfig {
        source: Some(path.to_path_buf()),
        ..file.toolchain
    })
}

pub fn load_toolchain_config(path: &Path) -> Result<ToolchainConfig, EmiError> {
    if !path.exists() {
        return Err(EmiError::configuration(
            path,
            Some("The toolchain file given by --toolchain does not exist."),
        ));
    }
    let text = std::fs::read_to_string(path).map_err(|e| EmiError::io(path, e))?;
    parse_toolchain_config(&text, path)
}

/// Command line overrides for individual tools.
#[derive(Debug, Default, Clone)]
pub struct ToolOverrides {
    pub java: Option<String>,
    pub heap_dump_lib: Option<String>,
    pub jacoco_agent: Option<String>,
    pub jacoco_cli: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapDiffer {
    pub command: Vec<String>,
    pub prefix: Option<String>,
}

/// Fully resolved toolchain; every path is absolute or a bare program name to
/// be looked up on `PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub project_root: PathBuf,
    pub java: String,
    pub heap_dump_lib: PathBuf,
    pub jacoco_agent: PathBuf,
    pub jacoco_cli: PathBuf,
    pub mutator_command: Vec<String>,
    pub heap_differ: Option<HeapDiffer>,
}

impl Toolchain {
    pub fn resolve(
        project_root: &Path,
        config: Option<&ToolchainConfig>,
        overrides: &ToolOverrides,
    ) -> Result<Self, EmiError> {
        let java = overrides
            .java
            .clone()
            .or_else(|| config.and_then(|c| c.java.clone()))
            .map(|j| resolve_program_name(project_root, &j))
            .unwrap_or_else(|| "java".to_string());

        let config_path = config
            .and_then(|c| c.source.clone())
            .unwrap_or_else(|| project_root.join(DEFAULT_TOOLCHAIN_FILE));

        let mutator_command = match config.and_then(|c| c.mutator_command.clone()) {
            Some(command) => {
                if command.is_empty() {
                    return Err(EmiError::InvalidConfig {
                        path: config_path.clone(),
                        message: "mutator_command must not be empty".to_string(),
                    });
                }
                absolutize_program(project_root, command)
            }
            None => default_mutator_command(),
        };

        let heap_differ = match config.and_then(|c| c.heap_differ_command.clone()) {
            Some(command) if command.is_empty() => {
                return Err(EmiError::InvalidConfig {
                    path: config_path.clone(),
                    message: "heap_differ_command must not be empty".to_string(),
                });
            }
            Some(command) => Some(HeapDiffer {
                command: absolutize_program(project_root, command),
                prefix: config.and_then(|c| c.heap_differ_prefix.clone()),
            }),
            None => None,
        };

        Ok(Toolchain {
            project_root: project_root.to_path_buf(),
            java,
            heap_dump_lib: pick_path(
                project_root,
                &overrides.heap_dump_lib,
                config.and_then(|c| c.heap_dump_lib.clone()),
                "bazel-bin/libheap-dump.jar",
            ),
            jacoco_agent: pick_path(
                project_root,
                &overrides.jacoco_agent,
                config.and_then(|c| c.jacoco_agent.clone()),
                "lib/jacocoagent.jar",
            ),
            jacoco_cli: pick_path(
                project_root,
                &overrides.jacoco_cli,
                config.and_then(|c| c.jacoco_cli.clone()),
                "lib/jacococli.jar",
            ),
            mutator_command,
            heap_differ,
        })
    }
}

/// Flag value, else configured value, else `default`; relative paths are
/// taken from the project root.
fn pick_path(
    project_root: &Path,
    flag: &Option<String>,
    configured: Option<String>,
    default: &str,
) -> PathBuf {
    match flag.clone().or(configured) {
        Some(value) => project_root.join(value),
        None => project_root.join(default),
    }
}

/// The mutator is built and run through bazel from the project root.
pub fn default_mutator_command() -> Vec<String> {
    ["bazel", "run", ":mutator", "--"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Bare program names (`java`, `bazel`) are left for `PATH` lookup; anything
/// with a separator is taken relative to the project root.
fn resolve_program_name(project_root: &Path, program: &str) -> String {
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        project_root.join(program).to_string_lossy().to_string()
    } else {
        program.to_string()
    }
}

fn absolutize_program(project_root: &Path, mut command: Vec<String>) -> Vec<String> {
    command[0] = resolve_program_name(project_root, &command[0]);
    command
}
