// SPDX-License-Identifier: Apache-2.0

//! Startup checks that every tool and file the loop needs is present, starting
//! with the project root's `bazel-bin/`.
//!
//! These run once, before any variant is touched. The only per-iteration
//! check is variant resolution in the registry.

use std::path::{Path, PathBuf};

use crate::error::EmiError;
use crate::registry::Registry;
use crate::toolchain_config::Toolchain;

/// Build output directory expected under the project root.
pub const BAZEL_BIN_DIR: &str = "bazel-bin";

/// Returns `path` if it exists, otherwise a configuration error naming it.
pub fn check_path(path: &Path, hint: Option<&str>) -> Result<PathBuf, EmiError> {
    if !path.exists() {
        return Err(EmiError::configuration(path, hint));
    }
    Ok(path.to_path_buf())
}

/// Resolves a program: bare names via `PATH`, anything else as a path.
pub fn check_program(program: &str, hint: Option<&str>) -> Result<PathBuf, EmiError> {
    let as_path = Path::new(program);
    if as_path.components().count() > 1 || as_path.is_absolute() {
        return check_path(as_path, hint);
    }
    which::which(program).map_err(|e| {
        log::info!("which({}) failed: {}", program, e);
        EmiError::configuration(program, hint)
    })
}

#[cfg(unix)]
fn check_executable(path: &Path, hint: &str) -> Result<(), EmiError> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = std::fs::metadata(path).map_err(|e| EmiError::io(path, e))?;
    if metadata.permissions().mode() & 0o111 == 0 {
        return Err(EmiError::InvalidConfig {
            path: path.to_path_buf(),
            message: format!("file is not executable. {}", hint),
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_executable(_path: &Path, _hint: &str) -> Result<(), EmiError> {
    Ok(())
}

fn first_word<'a>(command: &'a [String], toolchain: &Toolchain, what: &str) -> Result<&'a str, EmiError> {
    command
        .first()
        .map(|program| program.as_str())
        .ok_or_else(|| EmiError::InvalidConfig {
            path: toolchain.project_root.clone(),
            message: format!("{} must not be empty", what),
        })
}

/// Validates the toolchain and the registry's run script, failing on the
/// first problem found.
pub fn check(toolchain: &Toolchain, registry: &Registry) -> Result<(), EmiError> {
    log::info!("preflight; project root: {}", toolchain.project_root.display());
    check_path(
        &toolchain.project_root.join(BAZEL_BIN_DIR),
        Some("Executable should be run from the bazel project root."),
    )?;
    check_program(
        &toolchain.java,
        Some("A Java launcher is required to generate coverage reports."),
    )?;
    check_path(
        &toolchain.heap_dump_lib,
        Some("The heap-dump library should be built."),
    )?;
    check_path(
        &toolchain.jacoco_agent,
        Some("The JaCoCo agent jar should be placed in lib/."),
    )?;
    check_path(
        &toolchain.jacoco_cli,
        Some("The JaCoCo CLI jar should be placed in lib/."),
    )?;
    let run_script = check_path(
        &registry.run_script(),
        Some("The registry should contain an executable `run` script."),
    )?;
    check_executable(&run_script, "Mark the registry's `run` script executable.")?;
    check_program(
        first_word(&toolchain.mutator_command, toolchain, "mutator command")?,
        Some("The mutator command should name an installed program."),
    )?;
    if let Some(differ) = &toolchain.heap_differ {
        check_program(
            first_word(&differ.command, toolchain, "heap differ command")?,
            Some("The heap differ command should name an installed program."),
        )?;
    }
    Ok(())
}
