// SPDX-License-Identifier: Apache-2.0

//! Helpers for running external tools as blocking child processes.
//!
//! Children run in their own process group and are polled against a shared
//! stop flag; when a stop is requested the whole group is terminated before
//! the call returns, so an interrupted driver does not leave a JVM behind.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::EmiError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long a terminated child group gets to exit before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Renders a command the way a user would type it, for logs and errors.
pub fn render_command(command: &Command) -> String {
    let mut pieces = vec![command.get_program().to_string_lossy().to_string()];
    pieces.extend(command.get_args().map(|a| a.to_string_lossy().to_string()));
    pieces.join(" ")
}

/// Runs `command` to completion, capturing its standard streams.
///
/// A non-zero exit is an [`EmiError::ExternalToolFailure`] carrying the
/// captured streams. If `stop` becomes set while the child runs, the child's
/// process group is terminated and [`EmiError::Interrupted`] is returned.
pub fn run_tool(command: &mut Command, stop: &AtomicBool) -> Result<ToolOutput, EmiError> {
    let rendered = render_command(command);
    log::info!("command: {}", rendered);
    if stop.load(Ordering::Relaxed) {
        return Err(EmiError::Interrupted { command: rendered });
    }

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    isolate(command);

    let mut child = command
        .spawn()
        .map_err(|e| EmiError::io(command.get_program(), e))?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(e) => return Err(EmiError::io(command.get_program(), e)),
        }
        if stop.load(Ordering::Relaxed) {
            log::warn!("stop requested; terminating `{}`", rendered);
            terminate(&mut child);
            return Err(EmiError::Interrupted { command: rendered });
        }
        std::thread::sleep(POLL_INTERVAL);
    };
    // Background processes left in the group would hold the pipes open.
    kill_stragglers(&child);

    let output = ToolOutput {
        stdout: collect(stdout),
        stderr: collect(stderr),
    };
    if !status.success() {
        log::info!("`{}` failed with status: {}", rendered, status);
        return Err(EmiError::ExternalToolFailure {
            command: rendered,
            status: status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        });
    }
    log::debug!("`{}` stdout: {}", rendered, output.stdout);
    log::debug!("`{}` stderr: {}", rendered, output.stderr);
    Ok(output)
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn collect(handle: JoinHandle<Vec<u8>>) -> String {
    let bytes = handle.join().unwrap_or_default();
    String::from_utf8_lossy(&bytes).to_string()
}

#[cfg(unix)]
fn isolate(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_command: &mut Command) {}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: signalling a process group we created; failures (e.g. ESRCH when
    // the group is already gone) are harmless.
    unsafe {
        libc::kill(-pgid, libc::SIGTERM);
    }
    let deadline = Instant::now() + TERMINATE_GRACE;
    while Instant::now() < deadline {
        if let Ok(Some(_)) = child.try_wait() {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    // Stragglers in the group (e.g. a JVM started by the run script).
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
    let _ = child.wait();
}

#[cfg(unix)]
fn kill_stragglers(child: &Child) {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: as in `terminate`; ESRCH means the group is already empty.
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_stragglers(_child: &Child) {}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn sh(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[test]
    fn captures_stdout_on_success() {
        let stop = AtomicBool::new(false);
        let output = run_tool(&mut sh("echo hello; echo oops >&2"), &stop).unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[test]
    fn non_zero_exit_is_external_tool_failure() {
        let stop = AtomicBool::new(false);
        match run_tool(&mut sh("echo partial; echo broken >&2; exit 3"), &stop) {
            Err(EmiError::ExternalToolFailure {
                command,
                status,
                stdout,
                stderr,
            }) => {
                assert!(command.starts_with("sh -c"), "command: {}", command);
                assert_eq!(status, Some(3));
                assert_eq!(stdout.trim(), "partial");
                assert_eq!(stderr.trim(), "broken");
            }
            other => panic!("expected ExternalToolFailure, got {:?}", other),
        }
    }

    #[test]
    fn missing_program_is_io_error() {
        let stop = AtomicBool::new(false);
        let mut command = Command::new("/nonexistent/emi-tool");
        match run_tool(&mut command, &stop) {
            Err(EmiError::Io { path, .. }) => {
                assert_eq!(path, std::path::PathBuf::from("/nonexistent/emi-tool"))
            }
            other => panic!("expected Io, got {:?}", other),
        }
    }

    #[test]
    fn stop_before_spawn_does_not_run_command() {
        let temp_dir = tempfile::tempdir().unwrap();
        let marker = temp_dir.path().join("ran");
        let stop = AtomicBool::new(true);
        let script = format!("touch {}", marker.display());
        let result = run_tool(&mut sh(&script), &stop);
        assert!(matches!(result, Err(EmiError::Interrupted { .. })));
        assert!(!marker.exists());
    }

    #[test]
    fn stop_terminates_running_child() {
        let stop = Arc::new(AtomicBool::new(false));
        let setter = {
            let stop = stop.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(200));
                stop.store(true, Ordering::Relaxed);
            })
        };
        let start = Instant::now();
        let result = run_tool(&mut sh("sleep 30"), &stop);
        setter.join().unwrap();
        assert!(matches!(result, Err(EmiError::Interrupted { .. })));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn background_children_do_not_outlive_the_tool() {
        let stop = Arc::new(AtomicBool::new(false));
        let setter = {
            let stop = stop.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(200));
                stop.store(true, Ordering::Relaxed);
            })
        };
        let start = Instant::now();
        let output = run_tool(&mut sh("echo started; sleep 5 & exit 0"), &stop).unwrap();
        setter.join().unwrap();
        assert_eq!(output.stdout.trim(), "started");
        assert!(
            start.elapsed() < Duration::from_secs(3),
            "elapsed: {:?}",
            start.elapsed()
        );
    }

    #[test]
    fn render_command_joins_program_and_args() {
        let mut command = Command::new("java");
        command.arg("-jar").arg("lib/jacococli.jar").arg("report");
        assert_eq!(render_command(&command), "java -jar lib/jacococli.jar report");
    }
}
