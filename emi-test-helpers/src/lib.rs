// SPDX-License-Identifier: Apache-2.0

//! Shell-script stand-ins for the JVM tooling the EMI driver orchestrates, so
//! the driver can be exercised end to end without Java or bazel.

#[cfg(unix)]
mod stub_env;

#[cfg(unix)]
pub use stub_env::{MutatorBehavior, RunBehavior, StubEnv, StubEnvBuilder, STUB_ARTIFACT};

use std::path::Path;

/// Writes an executable `/bin/sh` script at `path`, creating parent
/// directories as needed.
pub fn write_script(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create script directory");
    }
    std::fs::write(path, format!("#!/bin/sh\n{}", body)).expect("write script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .expect("make script executable");
    }
    log::info!("write_script; path: {}", path.display());
}

/// Number of files directly in `dir` whose name ends with `suffix`; zero if
/// `dir` does not exist.
pub fn count_files_with_suffix(dir: &Path, suffix: &str) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(suffix))
            .count(),
        Err(_) => 0,
    }
}

/// Non-empty lines of `path`, or nothing if it does not exist.
pub fn read_lines(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}
