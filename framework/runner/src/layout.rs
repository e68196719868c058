use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::types::SweepResult;

/// File name of the run summary, kept in the output root and shared by all runs.
pub const RUN_SUMMARY_FILE: &str = "run_summary.jsonl";

/// Paths of everything one run writes, under `<output root>/<model key>_<run id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    dir: PathBuf,
}

impl RunLayout {
    pub fn new(output_root: &Path, model_key: &str, run_id: &str) -> Self {
        Self {
            dir: output_root.join(format!("{model_key}_{run_id}")),
        }
    }

    /// Create the run directory, and the output root if needed.
    pub fn create(&self) -> SweepResult<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create run directory {}", self.dir.display()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn results_csv(&self) -> PathBuf {
        self.dir.join("results.csv")
    }

    pub fn watcher_log(&self) -> PathBuf {
        self.dir.join("watcher.log")
    }

    pub fn main_log(&self, qps: u32) -> PathBuf {
        self.dir.join(format!("main_qps_{qps}.log"))
    }

    pub fn probe_log(&self, qps: u32) -> PathBuf {
        self.dir.join(format!("probe_at_qps_{qps}.log"))
    }
}
