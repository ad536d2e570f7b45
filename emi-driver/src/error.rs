// SPDX-License-Identifier: Apache-2.0

//! Error types for the EMI loop.
//!
//! Nothing in the loop recovers locally: every error unwinds the whole run and
//! is reported to the user together with the step that produced it.

use std::path::PathBuf;

use thiserror::Error;

/// The stage of the loop an error was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Preflight,
    Layout,
    Resolve,
    Dump,
    Equivalence,
    Profile,
    Report,
    Mutate,
    Checkpoint,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Step::Preflight => "preflight",
            Step::Layout => "layout",
            Step::Resolve => "resolve",
            Step::Dump => "dump",
            Step::Equivalence => "equivalence",
            Step::Profile => "profile",
            Step::Report => "report",
            Step::Mutate => "mutate",
            Step::Checkpoint => "checkpoint",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Error)]
pub enum EmiError {
    /// A required tool, library or file is missing.
    #[error("path {} not found.{}", .path.display(), hint_suffix(.hint))]
    Configuration { path: PathBuf, hint: Option<String> },

    /// A configuration file exists but cannot be used.
    #[error("invalid configuration {}: {message}", .path.display())]
    InvalidConfig { path: PathBuf, message: String },

    /// The resolved path of a variant is absent; the mutator or the registry
    /// is corrupt.
    #[error("variant {variant} not found at {}", .path.display())]
    VariantNotFound { variant: String, path: PathBuf },

    #[error("invalid variant id `{id}`; expected `seed` or 16 hex characters")]
    InvalidVariantId { id: String },

    /// Every freshly minted identifier named an existing mutant.
    #[error("could not mint an unused variant id after {attempts} attempts")]
    VariantIdCollision { attempts: usize },

    /// An external process exited unsuccessfully.
    #[error("`{command}` failed with {}", describe_status(.status))]
    ExternalToolFailure {
        command: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// A stop was requested while `command` was running; it has been
    /// terminated.
    #[error("interrupted while running `{command}`")]
    Interrupted { command: String },

    #[error("checkpoint {}: {message}", .path.display())]
    Checkpoint { path: PathBuf, message: String },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EmiError {
    pub fn configuration(path: impl Into<PathBuf>, hint: Option<&str>) -> Self {
        EmiError::Configuration {
            path: path.into(),
            hint: hint.map(|h| h.to_string()),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EmiError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, EmiError::Interrupted { .. })
    }
}

fn hint_suffix(hint: &Option<String>) -> String {
    match hint {
        Some(hint) => format!(" {}", hint),
        None => String::new(),
    }
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {}", code),
        None => "no exit status (terminated by signal)".to_string(),
    }
}

/// An [`EmiError`] tagged with the loop step that raised it.
#[derive(Debug, Error)]
#[error("{step}: {source}")]
pub struct StepFailure {
    pub step: Step,
    #[source]
    pub source: EmiError,
}

impl StepFailure {
    pub fn new(step: Step, source: EmiError) -> Self {
        StepFailure { step, source }
    }
}

/// Extension for attaching a [`Step`] to a fallible result.
pub trait AtStep<T> {
    fn at(self, step: Step) -> Result<T, StepFailure>;
}

impl<T> AtStep<T> for Result<T, EmiError> {
    fn at(self, step: Step) -> Result<T, StepFailure> {
        self.map_err(|e| StepFailure::new(step, e))
    }
}
