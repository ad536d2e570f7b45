// SPDX-License-Identifier: Apache-2.0

//! Runs a variant through the registry's `run` script.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::error::EmiError;
use crate::subprocess::run_tool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Load the heap-dump library and write a heap snapshot.
    Dump,
    /// Additionally load the coverage agent and write a raw coverage trace.
    Profile,
}

pub trait Executor {
    /// Runs the variant at `variant_path`, blocking until it exits. Exactly one
    /// artifact is written, at `output`.
    fn execute(&self, mode: ExecutionMode, variant_path: &Path, output: &Path)
        -> Result<(), EmiError>;
}

/// Invokes `run <variant-path> --dump-lib <lib> --output <path> [--profile
/// --jacoco <agent>]` with the registry root as working directory.
pub struct ScriptExecutor {
    registry_root: PathBuf,
    run_script: PathBuf,
    heap_dump_lib: PathBuf,
    jacoco_agent: PathBuf,
    stop: Arc<AtomicBool>,
}

impl ScriptExecutor {
    pub fn new(
        registry_root: &Path,
        run_script: &Path,
        heap_dump_lib: &Path,
        jacoco_agent: &Path,
        stop: Arc<AtomicBool>,
    ) -> Self {
        ScriptExecutor {
            registry_root: registry_root.to_path_buf(),
            run_script: run_script.to_path_buf(),
            heap_dump_lib: heap_dump_lib.to_path_buf(),
            jacoco_agent: jacoco_agent.to_path_buf(),
            stop,
        }
    }

    pub fn command(&self, mode: ExecutionMode, variant_path: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.run_script);
        command
            .current_dir(&self.registry_root)
            .arg(variant_path)
            .arg("--dump-lib")
            .arg(&self.heap_dump_lib)
            .arg("--output")
            .arg(output);
        if mode == ExecutionMode::Profile {
            command.arg("--profile").arg("--jacoco").arg(&self.jacoco_agent);
        }
        command
    }
}

impl Executor for ScriptExecutor {
    fn execute(
        &self,
        mode: ExecutionMode,
        variant_path: &Path,
        output: &Path,
    ) -> Result<(), EmiError> {
        log::info!("execute; mode: {:?}; variant: {}", mode, variant_path.display());
        let mut command = self.command(mode, variant_path, output);
        run_tool(&mut command, &self.stop)?;
        Ok(())
    }
}
