// SPDX-License-Identifier: Apache-2.0

//! Persistence of the loop position so a crashed or interrupted exploration
//! can be resumed.
//!
//! After every completed iteration the registry gets:
//!
//! - `checkpoint.json`: the variant to process next, replaced atomically;
//! - `lineage.log`: one `<iteration> <parent> <child>` line appended.

use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::EmiError;
use crate::registry::Registry;
use crate::variant_id::VariantId;

pub const CHECKPOINT_FILE: &str = "checkpoint.json";
pub const LINEAGE_FILE: &str = "lineage.log";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Next variant to process.
    pub current: VariantId,
    /// The variant `current` was derived from.
    pub parent: Option<VariantId>,
    /// Number of iterations completed in this registry.
    pub iteration: u64,
}

pub fn checkpoint_path(registry: &Registry) -> PathBuf {
    registry.root().join(CHECKPOINT_FILE)
}

pub fn lineage_path(registry: &Registry) -> PathBuf {
    registry.root().join(LINEAGE_FILE)
}

impl Checkpoint {
    /// Returns `None` when the registry has never completed an iteration.
    pub fn load(registry: &Registry) -> Result<Option<Self>, EmiError> {
        let path = checkpoint_path(registry);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).map_err(|e| EmiError::io(&path, e))?;
        let checkpoint = serde_json::from_str(&text).map_err(|e| EmiError::Checkpoint {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok(Some(checkpoint))
    }

    /// Writes through a temporary file in the registry and renames it into
    /// place, so a crash mid-write leaves the previous checkpoint intact.
    pub fn store(&self, registry: &Registry) -> Result<(), EmiError> {
        let path = checkpoint_path(registry);
        let json = serde_json::to_string_pretty(self).map_err(|e| EmiError::Checkpoint {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let mut temp = tempfile::NamedTempFile::new_in(registry.root())
            .map_err(|e| EmiError::io(registry.root(), e))?;
        temp.write_all(json.as_bytes())
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| EmiError::io(temp.path(), e))?;
        temp.persist(&path).map_err(|e| EmiError::io(&path, e.error))?;
        log::debug!("checkpoint stored: {:?}", self);
        Ok(())
    }
}

pub fn append_lineage(
    registry: &Registry,
    iteration: u64,
    parent: &VariantId,
    child: &VariantId,
) -> Result<(), EmiError> {
    let path = lineage_path(registry);
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| EmiError::io(&path, e))?;
    writeln!(file, "{} {} {}", iteration, parent, child).map_err(|e| EmiError::io(&path, e))
}

/// Reads back the lineage log as `(iteration, parent, child)` triples.
pub fn read_lineage(registry: &Registry) -> Result<Vec<(u64, VariantId, VariantId)>, EmiError> {
    let path = lineage_path(registry);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(&path).map_err(|e| EmiError::io(&path, e))?;
    let malformed = |line: &str| EmiError::Checkpoint {
        path: path.clone(),
        message: format!("malformed lineage line: {:?}", line),
    };
    let mut entries = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(malformed(line));
        }
        let iteration = fields[0].parse::<u64>().map_err(|_| malformed(line))?;
        let parent = VariantId::parse(fields[1]).map_err(|_| malformed(line))?;
        let child = VariantId::parse(fields[2]).map_err(|_| malformed(line))?;
        entries.push((iteration, parent, child));
    }
    Ok(entries)
}

/// Iterations already completed in the registry, whichever variant the next
/// run starts from. Numbering in `lineage.log` continues from here.
pub fn completed_iterations(registry: &Registry) -> Result<u64, EmiError> {
    let from_checkpoint = Checkpoint::load(registry)?.map_or(0, |c| c.iteration);
    let from_lineage = read_lineage(registry)?
        .last()
        .map_or(0, |(iteration, _, _)| *iteration);
    Ok(from_checkpoint.max(from_lineage))
}
