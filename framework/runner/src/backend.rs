//! Starting and stopping the model server inside its container.
//!
//! Every command runs through a container exec wrapper as `<prefix...> <container> bash -lc
//! "<script>"`. The server is started detached with `nohup`, and its PID is kept in a file inside
//! the container so a later run, or the stop path, can find it.

use std::path::{Path, PathBuf};

use anyhow::Context;
use plateau_sweep_core::prelude::SweepError;

use crate::capture::run_captured;
use crate::command::CommandSpec;
use crate::process::STOP_GRACE_PERIOD;
use crate::types::SweepResult;

/// Runs shell scripts inside a named container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerExec {
    program: String,
    prefix_args: Vec<String>,
    container: String,
}

impl ContainerExec {
    /// `prefix` is split on whitespace, e.g. `sudo docker exec`.
    pub fn new(prefix: &str, container: impl Into<String>) -> Result<Self, SweepError> {
        let mut tokens = prefix.split_whitespace().map(str::to_string);
        let program = tokens.next().ok_or_else(|| {
            SweepError::InvalidConfig("Container exec prefix must not be empty".to_string())
        })?;

        let container = container.into();
        if container.trim().is_empty() {
            return Err(SweepError::InvalidConfig(
                "Container name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            program,
            prefix_args: tokens.collect(),
            container,
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn command(&self, script: &str) -> CommandSpec {
        CommandSpec::new(&self.program)
            .args(self.prefix_args.iter().cloned())
            .arg(self.container.as_str())
            .args(["bash", "-lc", script])
    }

    /// Run `script` in the container and return its combined output.
    ///
    /// The exit status is only logged; callers decide success from the output.
    pub async fn run(&self, script: &str) -> SweepResult<String> {
        let command = self.command(script);
        let run = run_captured(&command, None).await.with_context(|| {
            format!("Failed to run command in container '{}'", self.container)
        })?;

        if let Some(status) = run.status.filter(|status| !status.success()) {
            log::debug!("'{command}' exited with {status}");
        }

        Ok(run.output)
    }
}

/// The model server process inside the container.
#[derive(Debug, Clone)]
pub struct BackendServer {
    exec: ContainerExec,
    serve_cmd: String,
    pid_file: PathBuf,
    log_file: PathBuf,
}

impl BackendServer {
    pub fn new(
        exec: ContainerExec,
        serve_cmd: impl Into<String>,
        pid_file: impl Into<PathBuf>,
        log_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            exec,
            serve_cmd: serve_cmd.into(),
            pid_file: pid_file.into(),
            log_file: log_file.into(),
        }
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    pub fn start_script(&self) -> String {
        let pid = self.pid_file.display();
        format!(
            "rm -f {pid}; nohup {} > {} 2>&1 & echo $! > {pid}; sleep 1; cat {pid}",
            self.serve_cmd,
            self.log_file.display()
        )
    }

    /// Start the server detached and return its PID inside the container.
    pub async fn start(&self) -> SweepResult<u32> {
        log::info!(
            "Starting backend in container '{}': {}",
            self.exec.container(),
            self.serve_cmd
        );

        let output = self.exec.run(&self.start_script()).await?;
        let pid = parse_pid(&output).ok_or_else(|| SweepError::BackendStart {
            container: self.exec.container().to_string(),
            reason: if output.trim().is_empty() {
                "start script printed nothing".to_string()
            } else {
                format!("expected a PID, got: {}", output.trim())
            },
        })?;

        log::info!(
            "Backend started with PID {pid}, logging to {} inside the container",
            self.log_file.display()
        );
        Ok(pid)
    }

    /// Stop the server if its PID file exists: `TERM`, a grace period, then `KILL`.
    pub async fn stop(&self) -> SweepResult<()> {
        let pid = self.pid_file.display();
        let check = self
            .exec
            .run(&format!("test -f {pid} && echo OK || echo NO"))
            .await?;
        if last_line(&check) != Some("OK") {
            log::info!("No backend PID file at {pid}, nothing to stop");
            return Ok(());
        }

        log::info!("Stopping backend in container '{}'", self.exec.container());
        self.exec
            .run(&format!("kill -TERM $(cat {pid}) 2>/dev/null || true"))
            .await?;
        tokio::time::sleep(STOP_GRACE_PERIOD).await;
        self.exec
            .run(&format!("kill -KILL $(cat {pid}) 2>/dev/null || true"))
            .await?;
        self.exec.run(&format!("rm -f {pid}")).await?;

        log::info!("Backend stopped");
        Ok(())
    }
}

/// Last non-blank line of a script's output. A login shell may print a banner before it.
fn last_line(output: &str) -> Option<&str> {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
}

/// The PID printed on the last non-blank line of the start script's output.
fn parse_pid(output: &str) -> Option<u32> {
    let last = last_line(output)?;
    if last.bytes().all(|b| b.is_ascii_digit()) {
        last.parse().ok()
    } else {
        None
    }
}
