use std::io::{Read, Seek, SeekFrom};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::Context;

use crate::command::CommandSpec;
use crate::types::SweepResult;

/// Result of running a command to completion with its output captured.
#[derive(Debug)]
pub(crate) struct CapturedRun {
    /// `None` if the command was killed for running past its limit.
    pub status: Option<ExitStatus>,
    /// Stdout and stderr, interleaved in the order they were written.
    pub output: String,
}

impl CapturedRun {
    pub fn timed_out(&self) -> bool {
        self.status.is_none()
    }
}

/// Run `command` until it exits, or until `limit` elapses in which case it is killed.
///
/// Both output streams share one anonymous temp file, so the captured text keeps the ordering a
/// terminal would have shown.
pub(crate) async fn run_captured(
    command: &CommandSpec,
    limit: Option<Duration>,
) -> SweepResult<CapturedRun> {
    let mut capture = tempfile::tempfile().context("Failed to create output capture file")?;
    let stdout = capture
        .try_clone()
        .context("Failed to share capture file with stdout")?;
    let stderr = capture
        .try_clone()
        .context("Failed to share capture file with stderr")?;

    log::debug!("Running: {command}");
    let mut child = command
        .to_command()
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to run '{}'", command.program().display()))?;

    let status = match limit {
        None => Some(child.wait().await.context("Failed to wait for command")?),
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => Some(status.context("Failed to wait for command")?),
            Err(_) => {
                log::warn!("'{command}' still running after {limit:?}, killing it");
                child
                    .kill()
                    .await
                    .context("Failed to kill command that ran past its limit")?;
                None
            }
        },
    };

    capture
        .seek(SeekFrom::Start(0))
        .context("Failed to rewind output capture file")?;
    let mut bytes = Vec::new();
    capture
        .read_to_end(&mut bytes)
        .context("Failed to read captured output")?;

    Ok(CapturedRun {
        status,
        output: String::from_utf8_lossy(&bytes).into_owned(),
    })
}
