// SPDX-License-Identifier: Apache-2.0

//! Requests a new EMI variant from the external mutator.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::error::EmiError;
use crate::subprocess::run_tool;
use crate::variant_id::VariantId;

pub trait Mutator {
    /// Asks for `next` to be derived from `current` using `coverage_report`.
    ///
    /// Success only means the mutator exited cleanly; whether
    /// `mutants/<next>` was actually written is checked when `next` is
    /// resolved on the following iteration.
    fn mutate(
        &self,
        registry_root: &Path,
        current: &VariantId,
        next: &VariantId,
        coverage_report: &Path,
    ) -> Result<(), EmiError>;
}

/// Runs a configured command prefix (by default `bazel run :mutator --`)
/// followed by `--registry --variant --new-variant --coverage`.
pub struct CommandMutator {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
    stop: Arc<AtomicBool>,
}

impl CommandMutator {
    pub fn new(command: &[String], working_dir: &Path, stop: Arc<AtomicBool>) -> Result<Self, EmiError> {
        let (program, args) = command.split_first().ok_or_else(|| EmiError::InvalidConfig {
            path: working_dir.to_path_buf(),
            message: "mutator command must not be empty".to_string(),
        })?;
        Ok(CommandMutator {
            program: program.clone(),
            args: args.to_vec(),
            working_dir: working_dir.to_path_buf(),
            stop,
        })
    }

    pub fn command(
        &self,
        registry_root: &Path,
        current: &VariantId,
        next: &VariantId,
        coverage_report: &Path,
    ) -> Command {
        let mut command = Command::new(&self.program);
        command
            .current_dir(&self.working_dir)
            .args(&self.args)
            .arg("--registry")
            .arg(registry_root)
            .arg("--variant")
            .arg(current.as_str())
            .arg("--new-variant")
            .arg(next.as_str())
            .arg("--coverage")
            .arg(coverage_report);
        command
    }
}

impl Mutator for CommandMutator {
    fn mutate(
        &self,
        registry_root: &Path,
        current: &VariantId,
        next: &VariantId,
        coverage_report: &Path,
    ) -> Result<(), EmiError> {
        log::info!("mutate; current: {}; next: {}", current, next);
        let mut command = self.command(registry_root, current, next, coverage_report);
        run_tool(&mut command, &self.stop)?;
        Ok(())
    }
}
