//! Supervision of the long-running main load generator.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::Context;
use plateau_sweep_core::prelude::log_timestamp;
use tokio::process::Child;

use crate::command::CommandSpec;
use crate::types::SweepResult;

/// How long a process gets to exit after a graceful termination request before it is killed.
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// A load generator started in the background, writing all of its output to a log file.
///
/// The process is killed if this value is dropped while it is still running, but callers are
/// expected to use [LoadProcess::stop] so it gets a chance to exit cleanly first.
#[derive(Debug)]
pub struct LoadProcess {
    child: Child,
    log: Option<File>,
    log_path: PathBuf,
}

impl LoadProcess {
    /// Start `command` with stdout and stderr appended to `log_path`.
    ///
    /// The command line is echoed into the log before the process starts. Must be called from
    /// within a Tokio runtime.
    pub fn start(command: &CommandSpec, log_path: &Path) -> SweepResult<Self> {
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_context(|| format!("Failed to open main load log {}", log_path.display()))?;
        writeln!(log, "[{}] MAIN CMD: {command}", log_timestamp())
            .with_context(|| format!("Failed to write to {}", log_path.display()))?;

        let stdout = log.try_clone().context("Failed to share log with stdout")?;
        let stderr = log.try_clone().context("Failed to share log with stderr")?;
        let child = command
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to start main load '{}'",
                    command.program().display()
                )
            })?;

        log::debug!(
            "Started main load with PID {:?}, logging to {}",
            child.id(),
            log_path.display()
        );

        Ok(Self {
            child,
            log: Some(log),
            log_path: log_path.to_path_buf(),
        })
    }

    /// OS process id, or `None` once the process has been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn is_running(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Ask the process to exit. On unix this is `SIGTERM`, elsewhere there is no graceful option so
    /// the process is killed outright.
    pub fn terminate(&mut self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let Some(id) = self.child.id() else {
                return Ok(());
            };
            let pid = i32::try_from(id)
                .map_err(|_| std::io::Error::other(format!("PID {id} out of range")))?;
            kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(std::io::Error::from)
        }

        #[cfg(not(unix))]
        {
            self.child.start_kill()
        }
    }

    /// Wait up to `timeout` for the process to exit.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> Option<ExitStatus> {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                log::warn!("Failed to wait for main load process: {e}");
                None
            }
            Err(_) => None,
        }
    }

    /// Stop the process and close its log.
    ///
    /// Sends a termination request, allows [STOP_GRACE_PERIOD] for the process to exit, then kills
    /// it. Never fails: problems are logged and the log is closed regardless. Safe to call more than
    /// once.
    pub async fn stop(&mut self) {
        if self.is_running() {
            log::info!("Stopping main load (PID {:?})", self.id());
            match self.terminate() {
                Ok(()) => {
                    if let Some(status) = self.wait_timeout(STOP_GRACE_PERIOD).await {
                        log::debug!("Main load exited with {status}");
                    }
                }
                Err(e) => log::warn!("Failed to send termination request to main load: {e}"),
            }
        }

        if self.is_running() {
            log::warn!("Main load still running after {STOP_GRACE_PERIOD:?}, killing it");
            if let Err(e) = self.child.kill().await {
                log::error!("Failed to kill main load: {e}");
            }
        }

        if let Some(log) = self.log.take() {
            if let Err(e) = log.sync_all() {
                log::warn!("Failed to flush {}: {e}", self.log_path.display());
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Instant;

    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").args(["-c", script])
    }

    #[tokio::test]
    async fn test_should_echo_command_then_capture_output() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("main_qps_10.log");

        let mut process = LoadProcess::start(&sh("echo out; echo err 1>&2"), &log_path).unwrap();
        process.wait_timeout(Duration::from_secs(10)).await.unwrap();
        process.stop().await;

        let log = std::fs::read_to_string(&log_path).unwrap();
        let lines = log.lines().collect::<Vec<_>>();
        assert!(lines[0].ends_with("MAIN CMD: sh -c echo out; echo err 1>&2"));
        assert!(lines[0].starts_with('['));
        assert_eq!(&lines[1..], ["out", "err"]);
    }

    #[tokio::test]
    async fn test_should_append_to_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("main.log");
        std::fs::write(&log_path, "earlier\n").unwrap();

        let mut process = LoadProcess::start(&sh("true"), &log_path).unwrap();
        process.stop().await;

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.starts_with("earlier\n"));
    }

    #[tokio::test]
    async fn test_should_stop_cooperative_process_quickly() {
        let dir = tempfile::tempdir().unwrap();
        let mut process =
            LoadProcess::start(&CommandSpec::new("sleep").arg("30"), &dir.path().join("main.log"))
                .unwrap();
        assert!(process.is_running());

        let started = Instant::now();
        process.stop().await;

        assert!(!process.is_running());
        assert!(started.elapsed() < STOP_GRACE_PERIOD);
    }

    #[tokio::test]
    async fn test_should_kill_process_ignoring_termination() {
        let dir = tempfile::tempdir().unwrap();
        let mut process = LoadProcess::start(
            &sh("trap '' TERM; while true; do sleep 1; done"),
            &dir.path().join("main.log"),
        )
        .unwrap();
        // Give the shell time to install its trap.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        process.stop().await;

        assert!(!process.is_running());
        assert!(started.elapsed() >= STOP_GRACE_PERIOD);
        assert!(started.elapsed() < STOP_GRACE_PERIOD + Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_should_allow_repeated_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut process =
            LoadProcess::start(&CommandSpec::new("sleep").arg("30"), &dir.path().join("main.log"))
                .unwrap();

        process.stop().await;
        process.stop().await;

        assert!(!process.is_running());
        assert_eq!(process.id(), None);
    }

    #[tokio::test]
    async fn test_should_fail_to_start_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let result = LoadProcess::start(
            &CommandSpec::new("/nonexistent/locust"),
            &dir.path().join("main.log"),
        );

        assert!(result.is_err());
    }
}
