use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use plateau_sweep_core::prelude::{log_timestamp, SignalSample};

/// Append-only record of every gauge sample taken during a run.
///
/// Lines look like `[2024-05-01 12:00:00] running=3`. The file is opened per write so it can be
/// tailed, rotated or removed while a long sweep is in progress.
#[derive(Debug, Clone)]
pub struct WatcherLog {
    path: PathBuf,
}

impl WatcherLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, label: &str, sample: SignalSample) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "[{}] {label}={sample}", log_timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_append_timestamped_samples() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = WatcherLog::new(dir.path().join("watcher.log"));

        watcher.record("running", SignalSample::Present(3.0)).unwrap();
        watcher.record("running", SignalSample::Absent).unwrap();
        watcher.record("waiting", SignalSample::Present(1.5)).unwrap();

        let content = std::fs::read_to_string(watcher.path()).unwrap();
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] running=3"));
        assert!(lines[1].ends_with("] running=absent"));
        assert!(lines[2].ends_with("] waiting=1.5"));
    }

    #[test]
    fn test_should_fail_when_directory_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = WatcherLog::new(dir.path().join("missing").join("watcher.log"));

        assert!(watcher.record("running", SignalSample::Absent).is_err());
    }
}
