// SPDX-License-Identifier: Apache-2.0

//! On-disk layout of an exploration registry.
//!
//! ```text
//! <registry>/run                      executable entry point for a variant
//! <registry>/dumps/<id>.hprof         heap dump from the dump-mode run
//! <registry>/coverage/<id>.exec       raw coverage trace from the profile run
//! <registry>/coverage/<id>.xml        coverage report handed to the mutator
//! <registry>/mutants/<id>/            variant written by the mutator
//! ```
//!
//! Artifacts are keyed by variant id and written once. The registry root is
//! passed explicitly to everything that needs it; the driver never changes
//! its own working directory.

use std::path::{Path, PathBuf};

use crate::error::EmiError;
use crate::variant_id::VariantId;

pub const RUN_SCRIPT: &str = "run";
pub const DUMPS_DIR: &str = "dumps";
pub const COVERAGE_DIR: &str = "coverage";
pub const MUTANTS_DIR: &str = "mutants";

/// Upper bound on re-minting when a fresh id names an existing mutant.
const MAX_MINT_ATTEMPTS: usize = 8;

#[derive(Debug, Clone)]
pub struct RegistryLayout {
    pub dumps: PathBuf,
    pub coverage: PathBuf,
    pub mutants: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Registry {
    root: PathBuf,
}

impl Registry {
    /// Opens an existing registry directory. The root is canonicalized so the
    /// paths handed to external tools do not depend on their working
    /// directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, EmiError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(EmiError::configuration(
                root,
                Some("The registry should be an existing directory."),
            ));
        }
        let root = std::fs::canonicalize(root).map_err(|e| EmiError::io(root, e))?;
        Ok(Registry { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_script(&self) -> PathBuf {
        self.root.join(RUN_SCRIPT)
    }

    pub fn layout(&self) -> RegistryLayout {
        RegistryLayout {
            dumps: self.root.join(DUMPS_DIR),
            coverage: self.root.join(COVERAGE_DIR),
            mutants: self.root.join(MUTANTS_DIR),
        }
    }

    /// Creates `dumps/`, `coverage/` and `mutants/` if they are absent.
    /// Existing directories and their contents are left alone.
    pub fn ensure_layout(&self) -> Result<RegistryLayout, EmiError> {
        let layout = self.layout();
        for dir in [&layout.dumps, &layout.coverage, &layout.mutants] {
            std::fs::create_dir_all(dir).map_err(|e| EmiError::io(dir, e))?;
        }
        log::debug!("registry layout ready under {}", self.root.display());
        Ok(layout)
    }

    pub fn mutant_path(&self, id: &VariantId) -> PathBuf {
        self.root.join(MUTANTS_DIR).join(id.as_str())
    }

    /// The directory holding the variant's program: the registry root for the
    /// seed, `mutants/<id>` otherwise.
    ///
    /// For mutants the path must exist at call time. This is the one check
    /// repeated on every iteration, so a mutator that exited cleanly without
    /// writing its output is caught here rather than inside the run script.
    pub fn resolve_variant_path(&self, id: &VariantId) -> Result<PathBuf, EmiError> {
        if id.is_seed() {
            return Ok(self.root.clone());
        }
        let path = self.mutant_path(id);
        if !path.exists() {
            return Err(EmiError::VariantNotFound {
                variant: id.to_string(),
                path,
            });
        }
        Ok(path)
    }

    pub fn heap_dump_path(&self, id: &VariantId) -> PathBuf {
        self.root.join(DUMPS_DIR).join(format!("{}.hprof", id))
    }

    pub fn coverage_trace_path(&self, id: &VariantId) -> PathBuf {
        self.root.join(COVERAGE_DIR).join(format!("{}.exec", id))
    }

    pub fn coverage_report_path(&self, id: &VariantId) -> PathBuf {
        self.root.join(COVERAGE_DIR).join(format!("{}.xml", id))
    }

    /// Mints an id whose `mutants/<id>` does not exist yet.
    pub fn mint_variant_id(&self) -> Result<VariantId, EmiError> {
        self.mint_variant_id_with(VariantId::generate)
    }

    pub fn mint_variant_id_with(
        &self,
        mut generate: impl FnMut() -> VariantId,
    ) -> Result<VariantId, EmiError> {
        for _ in 0..MAX_MINT_ATTEMPTS {
            let id = generate();
            if !self.mutant_path(&id).exists() {
                return Ok(id);
            }
            log::warn!("minted variant id {} already exists; retrying", id);
        }
        Err(EmiError::VariantIdCollision {
            attempts: MAX_MINT_ATTEMPTS,
        })
    }
}
