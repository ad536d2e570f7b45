// SPDX-License-Identifier: Apache-2.0

//! Optional comparison of a mutant's heap dump against the seed's.
//!
//! The loop always produces heap dumps but only compares them when a heap
//! differ is configured; the default checker accepts everything.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::error::EmiError;
use crate::subprocess::run_tool;
use crate::toolchain_config::HeapDiffer;

pub trait EquivalenceChecker {
    /// Compares `candidate` against `baseline`; an error means the variant's
    /// observed behavior diverged (or the comparison could not be made).
    fn check(&self, baseline: &Path, candidate: &Path) -> Result<(), EmiError>;

    /// Whether this checker actually compares anything.
    fn is_enabled(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
pub struct NoopEquivalenceChecker;

impl EquivalenceChecker for NoopEquivalenceChecker {
    fn check(&self, _baseline: &Path, _candidate: &Path) -> Result<(), EmiError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Runs `<differ> --first <baseline> --second <candidate> [--prefix <p>]`
/// from the project root.
pub struct HeapDiffChecker {
    program: String,
    args: Vec<String>,
    prefix: Option<String>,
    working_dir: PathBuf,
    stop: Arc<AtomicBool>,
}

impl HeapDiffChecker {
    pub fn new(differ: &HeapDiffer, working_dir: &Path, stop: Arc<AtomicBool>) -> Result<Self, EmiError> {
        let (program, args) = differ.command.split_first().ok_or_else(|| EmiError::InvalidConfig {
            path: working_dir.to_path_buf(),
            message: "heap differ command must not be empty".to_string(),
        })?;
        Ok(HeapDiffChecker {
            program: program.clone(),
            args: args.to_vec(),
            prefix: differ.prefix.clone(),
            working_dir: working_dir.to_path_buf(),
            stop,
        })
    }

    pub fn command(&self, baseline: &Path, candidate: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .current_dir(&self.working_dir)
            .args(&self.args)
            .arg("--first")
            .arg(baseline)
            .arg("--second")
            .arg(candidate);
        if let Some(prefix) = &self.prefix {
            command.arg("--prefix").arg(prefix);
        }
        command
    }
}

impl EquivalenceChecker for HeapDiffChecker {
    fn check(&self, baseline: &Path, candidate: &Path) -> Result<(), EmiError> {
        if !baseline.exists() {
            return Err(EmiError::configuration(
                baseline,
                Some("The seed's heap dump is needed as a baseline; run the seed variant first."),
            ));
        }
        log::info!(
            "heap diff; baseline: {}; candidate: {}",
            baseline.display(),
            candidate.display()
        );
        run_tool(&mut self.command(baseline, candidate), &self.stop)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_checker_accepts_anything() {
        let checker = NoopEquivalenceChecker;
        assert!(!checker.is_enabled());
        checker
            .check(Path::new("/does/not/exist"), Path::new("/nor/this"))
            .unwrap();
    }

    #[test]
    fn differ_command_includes_prefix_when_configured() {
        let differ = HeapDiffer {
            command: vec!["bazel".to_string(), "run".to_string(), ":heapdiffer".to_string(), "--".to_string()],
            prefix: Some("com.example".to_string()),
        };
        let checker =
            HeapDiffChecker::new(&differ, Path::new("/proj"), Arc::new(AtomicBool::new(false)))
                .unwrap();
        assert!(checker.is_enabled());
        let command = checker.command(
            Path::new("/reg/dumps/seed.hprof"),
            Path::new("/reg/dumps/0123456789abcdef.hprof"),
        );
        let args: Vec<_> = command
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            vec![
                "run",
                ":heapdiffer",
                "--",
                "--first",
                "/reg/dumps/seed.hprof",
                "--second",
                "/reg/dumps/0123456789abcdef.hprof",
                "--prefix",
                "com.example",
            ]
        );
    }

    #[test]
    fn missing_baseline_is_configuration_error() {
        let differ = HeapDiffer {
            command: vec!["true".to_string()],
            prefix: None,
        };
        let checker =
            HeapDiffChecker::new(&differ, Path::new("/"), Arc::new(AtomicBool::new(false)))
                .unwrap();
        let temp_dir = tempfile::tempdir().unwrap();
        let baseline = temp_dir.path().join("seed.hprof");
        match checker.check(&baseline, &temp_dir.path().join("x.hprof")) {
            Err(EmiError::Configuration { path, .. }) => assert_eq!(path, baseline),
            other => panic!("expected Configuration, got {:?}", other),
        }
    }

    #[test]
    fn empty_differ_command_is_invalid_config() {
        let differ = HeapDiffer {
            command: Vec::new(),
            prefix: None,
        };
        let result = HeapDiffChecker::new(&differ, Path::new("/proj"), Arc::new(AtomicBool::new(false)));
        assert!(matches!(result, Err(EmiError::InvalidConfig { .. })));
    }
}
