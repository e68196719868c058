use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Context;
use plateau_sweep_core::prelude::log_timestamp;
use plateau_sweep_instruments::{LabelledLatencyExtractor, LatencyExtractor};

use crate::capture::run_captured;
use crate::command::CommandSpec;
use crate::types::SweepResult;

/// Extra time a probe may take beyond its configured runtime before it is killed.
pub const PROBE_SLACK: Duration = Duration::from_secs(60);

/// What one probe run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    /// Latency reported by the probe, `None` if its output had no usable latency line.
    pub latency: Option<f64>,
    pub elapsed: Duration,
    /// The probe ran past its limit and was killed. Any latency was taken from partial output.
    pub timed_out: bool,
}

/// Runs a short, single-user load generator to completion and reads its latency from the output.
pub struct ProbeRunner {
    extractor: Box<dyn LatencyExtractor>,
}

impl Default for ProbeRunner {
    fn default() -> Self {
        Self::new(LabelledLatencyExtractor::time_to_first_token())
    }
}

impl ProbeRunner {
    pub fn new(extractor: impl LatencyExtractor + 'static) -> Self {
        Self {
            extractor: Box::new(extractor),
        }
    }

    /// Run `command`, waiting at most `max_duration`, and append the command line followed by its
    /// combined output to `log_path`.
    ///
    /// A non-zero exit status is not an error. The output is still searched for a latency.
    pub async fn run(
        &self,
        command: &CommandSpec,
        log_path: &Path,
        max_duration: Duration,
    ) -> SweepResult<ProbeOutcome> {
        let started = Instant::now();
        let run = run_captured(command, Some(max_duration)).await?;
        let elapsed = started.elapsed();

        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_context(|| format!("Failed to open probe log {}", log_path.display()))?;
        write!(
            log,
            "[{}] PROBE CMD: {command}\n{}\n",
            log_timestamp(),
            run.output
        )
        .with_context(|| format!("Failed to write probe log {}", log_path.display()))?;

        match run.status {
            Some(status) if !status.success() => {
                log::warn!("Probe exited with {status}, see {}", log_path.display())
            }
            None => log::warn!(
                "Probe killed after {max_duration:?}, reading latency from partial output"
            ),
            _ => {}
        }

        let latency = self.extractor.extract(&run.output);
        if latency.is_none() {
            log::warn!("No latency found in probe output, see {}", log_path.display());
        }

        Ok(ProbeOutcome {
            latency,
            elapsed,
            timed_out: run.timed_out(),
        })
    }
}
