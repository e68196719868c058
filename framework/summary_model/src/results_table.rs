use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::StepResult;

/// Column names of the results table, in order.
pub const RESULTS_HEADER: [&str; 8] = [
    "qps",
    "user",
    "spawn",
    "run",
    "wait",
    "probe_ttft",
    "test_time",
    "probe_log",
];

/// One row of the results table. Absent measurements are written as empty cells.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultRow {
    pub qps: u32,
    #[serde(rename = "user")]
    pub users: u32,
    #[serde(rename = "spawn")]
    pub spawn_rate: u32,
    #[serde(rename = "run")]
    pub plateau_running: f64,
    #[serde(rename = "wait")]
    pub plateau_waiting: Option<f64>,
    #[serde(rename = "probe_ttft")]
    pub probe_latency: Option<f64>,
    #[serde(rename = "test_time")]
    pub probe_duration_s: u64,
    pub probe_log: PathBuf,
}

impl From<&StepResult> for ResultRow {
    fn from(step: &StepResult) -> Self {
        Self {
            qps: step.qps,
            users: step.users,
            spawn_rate: step.spawn_rate,
            plateau_running: step.plateau_running,
            plateau_waiting: step.plateau_waiting,
            probe_latency: step.probe_latency,
            probe_duration_s: step.probe_duration_s,
            probe_log: step.probe_log.clone(),
        }
    }
}

/// CSV file with one row per measured load level.
///
/// The header is written when the table is created. Each row is appended and flushed on its own so
/// the file is usable while the sweep is still running and after it is interrupted.
#[derive(Debug, Clone)]
pub struct ResultsTable {
    path: PathBuf,
}

impl ResultsTable {
    /// Create (or truncate) the table at `path` and write the header.
    pub fn create(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create results table {}", path.display()))?;
        writer.write_record(RESULTS_HEADER)?;
        writer.flush()?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, step: &StepResult) -> anyhow::Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open results table {}", self.path.display()))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(ResultRow::from(step))?;
        writer.flush()?;
        Ok(())
    }

    /// Read back every row written so far.
    pub fn load(path: &Path) -> anyhow::Result<Vec<ResultRow>> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open results table {}", path.display()))?;
        reader
            .deserialize()
            .map(|row| row.map_err(anyhow::Error::from))
            .collect()
    }
}
