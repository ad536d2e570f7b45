// SPDX-License-Identifier: Apache-2.0

//! Conversion of a directory of classfiles to Soot's Jimple format, for
//! inspecting what the mutator produced.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::EmiError;

/// Locates the single `soot*.jar` directly inside `dir`.
pub fn find_soot_jar(dir: &Path) -> Result<PathBuf, EmiError> {
    let entries = std::fs::read_dir(dir).map_err(|e| EmiError::io(dir, e))?;
    let mut jars = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EmiError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with("soot") && name.ends_with(".jar") {
            jars.push(name);
        }
    }
    jars.sort();
    match jars.as_slice() {
        [] => Err(EmiError::configuration(
            dir.join("soot*.jar"),
            Some("Place a Soot jar in the working directory."),
        )),
        [jar] => Ok(dir.join(jar)),
        _ => Err(EmiError::InvalidConfig {
            path: dir.to_path_buf(),
            message: format!("multiple Soot jars found: {}", jars.join(", ")),
        }),
    }
}

pub fn jimple_command(java: &str, soot_jar: &Path, classfiles: &Path) -> Command {
    let mut command = Command::new(java);
    command
        .arg("-cp")
        .arg(soot_jar)
        .arg("soot.Main")
        .args(["-cp", "out", "-pp", "-f", "J", "-process-dir"])
        .arg(classfiles);
    command
}
