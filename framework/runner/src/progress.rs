use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress over the load levels of a sweep, with the current phase as the message.
///
/// Hidden instances do nothing, which keeps call sites free of `--no-progress` checks.
#[derive(Debug, Clone)]
pub struct SweepProgress {
    bar: Option<ProgressBar>,
}

impl SweepProgress {
    pub fn new(levels: usize) -> Self {
        let bar = ProgressBar::new(levels as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} levels [{elapsed_precise}] {msg}",
            )
            .expect("Failed to set progress style")
            .progress_chars("#>-"),
        );
        bar.enable_steady_tick(Duration::from_millis(250));

        Self { bar: Some(bar) }
    }

    pub fn hidden() -> Self {
        Self { bar: None }
    }

    pub fn phase(&self, qps: u32, phase: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("QPS {qps}: {phase}"));
        }
    }

    pub fn complete_level(&self) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            log::trace!("Progress display shutting down");
            bar.finish_and_clear();
        }
    }
}
