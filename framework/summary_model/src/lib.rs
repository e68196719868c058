mod results_table;

use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

pub use results_table::{ResultRow, ResultsTable, RESULTS_HEADER};

/// The measurements taken at one offered-load level.
///
/// Only ever created once the plateau for that level has been detected and the probe has run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    /// Offered load for the main load generator, in queries per second.
    pub qps: u32,
    /// Simulated users for the main load, derived from [StepResult::qps].
    pub users: u32,
    /// User spawn rate for the main load, derived from [StepResult::qps].
    pub spawn_rate: u32,
    /// Highest running-request count seen before the gauge stopped increasing.
    pub plateau_running: f64,
    /// Waiting-request count read once, straight after the plateau was declared.
    ///
    /// `None` if the gauge could not be read at that moment.
    pub plateau_waiting: Option<f64>,
    /// Probe latency as printed by the load generator, without unit conversion.
    ///
    /// `None` if the probe output contained no usable latency line.
    pub probe_latency: Option<f64>,
    /// The runtime the probe was configured with, in seconds.
    pub probe_duration_s: u64,
    /// Combined output of the main load generator for this level.
    pub main_log: PathBuf,
    /// Combined output of the probe for this level.
    pub probe_log: PathBuf,
}

/// The knobs a sweep was run with.
///
/// Two runs with the same parameters and model are directly comparable, see
/// [SweepRun::fingerprint].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepParameters {
    pub qps_start: u32,
    pub qps_step: u32,
    pub qps_max: u32,
    pub users_multiplier: f64,
    pub spawn_multiplier: f64,
    pub poll_interval_ms: u64,
    pub plateau_duration_ms: u64,
    pub main_runtime_s: u64,
    pub probe_runtime_s: u64,
    pub main_max_tokens: u32,
    pub probe_max_tokens: u32,
}

/// How a sweep run ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SweepOutcome {
    InProgress,
    /// Every load level was measured.
    Completed,
    /// The sweep stopped on an error. Steps recorded before the error are kept.
    Failed { reason: String },
    /// An operator interrupted the sweep.
    Interrupted,
}

/// One execution of the controller: its identity, where it wrote its artifacts and the steps it
/// has measured so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepRun {
    /// Derived from the local start time, unique per run on one machine.
    pub run_id: String,
    /// The model profile the backend was serving.
    pub model_key: String,
    /// Directory holding the results table, watcher log and per-level logs.
    pub output_dir: PathBuf,
    /// Unix timestamp in seconds.
    pub started_at: i64,
    /// Unix timestamp in seconds, set by [SweepRun::finish].
    pub finished_at: Option<i64>,
    pub outcome: SweepOutcome,
    pub parameters: SweepParameters,
    /// Measured steps, in strictly increasing load order.
    pub steps: Vec<StepResult>,
    /// Version of the controller that produced this run.
    pub plateau_sweep_version: String,
}

impl SweepRun {
    pub fn new(
        run_id: String,
        model_key: String,
        output_dir: PathBuf,
        started_at: i64,
        parameters: SweepParameters,
        plateau_sweep_version: String,
    ) -> Self {
        Self {
            run_id,
            model_key,
            output_dir,
            started_at,
            finished_at: None,
            outcome: SweepOutcome::InProgress,
            parameters,
            steps: Vec::new(),
            plateau_sweep_version,
        }
    }

    /// The highest load level measured so far.
    pub fn last_level(&self) -> Option<u32> {
        self.steps.last().map(|step| step.qps)
    }

    /// Append a measured step. Levels must be strictly increasing and the run must not be
    /// finished.
    pub fn record_step(&mut self, step: StepResult) -> anyhow::Result<()> {
        if self.outcome != SweepOutcome::InProgress {
            anyhow::bail!("Cannot record a step on finished run {}", self.run_id);
        }
        if let Some(last) = self.last_level() {
            if step.qps <= last {
                anyhow::bail!(
                    "Load level {} recorded after level {last}, levels must increase",
                    step.qps
                );
            }
        }

        self.steps.push(step);
        Ok(())
    }

    pub fn finish(&mut self, outcome: SweepOutcome, finished_at: i64) {
        self.outcome = outcome;
        self.finished_at = Some(finished_at);
    }

    /// Compute a fingerprint of the configuration this run used.
    ///
    /// It covers the model key, every [SweepParameters] field and the controller version, and is
    /// computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let p = &self.parameters;
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.model_key.as_bytes());
        for value in [p.qps_start, p.qps_step, p.qps_max] {
            Digest::update(&mut hasher, value.to_le_bytes());
        }
        for value in [p.users_multiplier, p.spawn_multiplier] {
            Digest::update(&mut hasher, value.to_bits().to_le_bytes());
        }
        for value in [
            p.poll_interval_ms,
            p.plateau_duration_ms,
            p.main_runtime_s,
            p.probe_runtime_s,
        ] {
            Digest::update(&mut hasher, value.to_le_bytes());
        }
        for value in [p.main_max_tokens, p.probe_max_tokens] {
            Digest::update(&mut hasher, value.to_le_bytes());
        }
        Digest::update(&mut hasher, self.plateau_sweep_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run to a file as a single JSON line.
///
/// The recommended file extension is `.jsonl`.
pub fn append_sweep_run(run: &SweepRun, path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    serde_json::to_writer(&mut file, run)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Load every run from a file written by [append_sweep_run]. Blank lines are skipped.
pub fn load_sweep_runs(path: &Path) -> anyhow::Result<Vec<SweepRun>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        runs.push(serde_json::from_str(&line)?);
    }
    Ok(runs)
}
