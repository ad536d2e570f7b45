// SPDX-License-Identifier: Apache-2.0

//! Converts a raw coverage trace into the XML report the mutator reads.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::error::EmiError;
use crate::subprocess::run_tool;

pub trait Reporter {
    /// Writes a report for `trace` at `report`, using the classfiles under
    /// `variant_path`. Always regenerates; nothing is cached.
    fn report(&self, trace: &Path, variant_path: &Path, report: &Path) -> Result<(), EmiError>;
}

/// Runs `java -jar jacococli.jar report <trace> --classfiles <variant> --xml
/// <report>`.
pub struct JacocoReporter {
    java: String,
    jacoco_cli: PathBuf,
    stop: Arc<AtomicBool>,
}

impl JacocoReporter {
    pub fn new(java: &str, jacoco_cli: &Path, stop: Arc<AtomicBool>) -> Self {
        JacocoReporter {
            java: java.to_string(),
            jacoco_cli: jacoco_cli.to_path_buf(),
            stop,
        }
    }

    pub fn command(&self, trace: &Path, variant_path: &Path, report: &Path) -> Command {
        let mut command = Command::new(&self.java);
        command
            .arg("-jar")
            .arg(&self.jacoco_cli)
            .arg("report")
            .arg(trace)
            .arg("--classfiles")
            .arg(variant_path)
            .arg("--xml")
            .arg(report);
        command
    }
}

impl Reporter for JacocoReporter {
    fn report(&self, trace: &Path, variant_path: &Path, report: &Path) -> Result<(), EmiError> {
        log::info!("report; trace: {}", trace.display());
        run_tool(&mut self.command(trace, variant_path, report), &self.stop)?;
        Ok(())
    }
}
