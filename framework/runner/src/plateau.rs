//! Detection of the point where the backend's in-flight request count stops growing.
//!
//! [PlateauState::observe] is a pure transition over one sample, and [PlateauDetector] drives it
//! from a [SignalSource] on a fixed poll interval.

use std::time::Duration;

use anyhow::Context;
use plateau_sweep_core::prelude::SignalSample;
use plateau_sweep_instruments::{SignalSource, WatcherLog};
use tokio::time::Instant;

use crate::types::SweepResult;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlateauState {
    /// No positive sample seen yet. There is no timeout here: a zero reading cannot be told apart
    /// from a backend that has not received load yet, so an operator decides when to give up.
    WarmingUp,
    /// Tracking the highest sample and when it last went up.
    Dwelling { peak: f64, last_increase: Instant },
    /// No increase for the whole plateau duration.
    Plateaued { peak: f64 },
}

impl PlateauState {
    /// Advance by one sample taken at `now`.
    ///
    /// Absent samples never change the peak or move the last-increase time, but the plateau
    /// duration is still checked against `now`.
    pub fn observe(self, sample: SignalSample, now: Instant, plateau_duration: Duration) -> Self {
        match self {
            PlateauState::WarmingUp => match sample {
                SignalSample::Present(value) if sample.is_positive() => PlateauState::Dwelling {
                    peak: value,
                    last_increase: now,
                },
                _ => PlateauState::WarmingUp,
            },
            PlateauState::Dwelling {
                mut peak,
                mut last_increase,
            } => {
                if let SignalSample::Present(value) = sample {
                    if value > peak {
                        peak = value;
                        last_increase = now;
                    }
                }

                if now.saturating_duration_since(last_increase) >= plateau_duration {
                    PlateauState::Plateaued { peak }
                } else {
                    PlateauState::Dwelling {
                        peak,
                        last_increase,
                    }
                }
            }
            plateaued @ PlateauState::Plateaued { .. } => plateaued,
        }
    }

    pub fn peak(&self) -> Option<f64> {
        match self {
            PlateauState::WarmingUp => None,
            PlateauState::Dwelling { peak, .. } | PlateauState::Plateaued { peak } => Some(*peak),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlateauSettings {
    pub poll_interval: Duration,
    pub plateau_duration: Duration,
    /// Gauge of requests being processed, tracked until it plateaus.
    pub running_signal: String,
    /// Gauge of queued requests, read once the plateau is reached.
    pub waiting_signal: String,
}

/// Result of a completed plateau detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plateau {
    pub running: f64,
    pub waiting: SignalSample,
}

pub struct PlateauDetector<'a, S> {
    source: &'a S,
    watcher: &'a WatcherLog,
    settings: &'a PlateauSettings,
}

impl<'a, S: SignalSource> PlateauDetector<'a, S> {
    pub fn new(source: &'a S, watcher: &'a WatcherLog, settings: &'a PlateauSettings) -> Self {
        Self {
            source,
            watcher,
            settings,
        }
    }

    /// Poll until the running gauge plateaus, then read the waiting gauge once.
    ///
    /// Every sample goes to the watcher log. Only fails if the watcher log cannot be written.
    pub async fn detect(&self) -> SweepResult<Plateau> {
        let mut state = PlateauState::WarmingUp;

        loop {
            let sample = self.source.read(&self.settings.running_signal).await;
            self.record("running", sample)?;

            let now = Instant::now();
            state = state.observe(sample, now, self.settings.plateau_duration);
            match state {
                PlateauState::WarmingUp => {
                    log::info!("running={sample}, waiting for load to arrive");
                }
                PlateauState::Dwelling {
                    peak,
                    last_increase,
                } => {
                    log::info!(
                        "running={sample}, peak {peak}, {}s since last increase",
                        now.saturating_duration_since(last_increase).as_secs()
                    );
                }
                PlateauState::Plateaued { peak } => {
                    let waiting = self.source.read(&self.settings.waiting_signal).await;
                    self.record("waiting", waiting)?;
                    log::info!("Plateau reached: running={peak}, waiting={waiting}");

                    return Ok(Plateau {
                        running: peak,
                        waiting,
                    });
                }
            }

            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    fn record(&self, label: &str, sample: SignalSample) -> SweepResult<()> {
        self.watcher.record(label, sample).with_context(|| {
            format!("Failed to write watcher log {}", self.watcher.path().display())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    const PLATEAU: Duration = Duration::from_secs(5);

    fn secs(start: Instant, secs: u64) -> Instant {
        start + Duration::from_secs(secs)
    }

    #[test]
    fn test_should_stay_warming_up_while_absent_or_zero() {
        let start = Instant::now();
        let mut state = PlateauState::WarmingUp;
        for (i, sample) in [
            SignalSample::Absent,
            SignalSample::Present(0.0),
            SignalSample::Absent,
            SignalSample::Present(0.0),
        ]
        .into_iter()
        .enumerate()
        {
            state = state.observe(sample, secs(start, i as u64 * 100), PLATEAU);
        }

        assert_eq!(state, PlateauState::WarmingUp);
        assert_eq!(state.peak(), None);
    }

    #[test]
    fn test_should_start_dwelling_on_first_positive_sample() {
        let now = Instant::now();
        let state = PlateauState::WarmingUp.observe(SignalSample::Present(2.0), now, PLATEAU);

        assert_eq!(
            state,
            PlateauState::Dwelling {
                peak: 2.0,
                last_increase: now
            }
        );
    }

    #[test]
    fn test_should_plateau_exactly_after_duration_without_increase() {
        let start = Instant::now();
        let mut state = PlateauState::WarmingUp.observe(SignalSample::Present(3.0), start, PLATEAU);

        for t in 1..5 {
            state = state.observe(SignalSample::Present(3.0), secs(start, t), PLATEAU);
            assert!(matches!(state, PlateauState::Dwelling { .. }), "at {t}s");
        }

        state = state.observe(SignalSample::Present(3.0), secs(start, 5), PLATEAU);
        assert_eq!(state, PlateauState::Plateaued { peak: 3.0 });
    }

    #[test]
    fn test_should_reset_dwell_timer_on_increase() {
        let start = Instant::now();
        let state = PlateauState::WarmingUp
            .observe(SignalSample::Present(3.0), start, PLATEAU)
            .observe(SignalSample::Present(4.0), secs(start, 4), PLATEAU)
            .observe(SignalSample::Present(4.0), secs(start, 8), PLATEAU);

        assert_eq!(
            state,
            PlateauState::Dwelling {
                peak: 4.0,
                last_increase: secs(start, 4)
            }
        );
    }

    #[test]
    fn test_should_ignore_dips() {
        let start = Instant::now();
        let state = PlateauState::WarmingUp
            .observe(SignalSample::Present(5.0), start, PLATEAU)
            .observe(SignalSample::Present(1.0), secs(start, 2), PLATEAU)
            .observe(SignalSample::Present(0.0), secs(start, 5), PLATEAU);

        assert_eq!(state, PlateauState::Plateaued { peak: 5.0 });
    }

    #[test]
    fn test_should_not_reset_timer_on_absent_sample_between_increases() {
        let start = Instant::now();
        let state = PlateauState::WarmingUp
            .observe(SignalSample::Present(2.0), start, PLATEAU)
            .observe(SignalSample::Present(3.0), secs(start, 1), PLATEAU)
            .observe(SignalSample::Absent, secs(start, 2), PLATEAU)
            .observe(SignalSample::Present(4.0), secs(start, 3), PLATEAU);

        assert_eq!(
            state,
            PlateauState::Dwelling {
                peak: 4.0,
                last_increase: secs(start, 3)
            }
        );

        // Absent samples still let the plateau be declared once enough time has passed.
        let state = state.observe(SignalSample::Absent, secs(start, 8), PLATEAU);
        assert_eq!(state, PlateauState::Plateaued { peak: 4.0 });
    }

    #[test]
    fn test_should_stay_plateaued() {
        let now = Instant::now();
        let state = PlateauState::Plateaued { peak: 3.0 }.observe(
            SignalSample::Present(10.0),
            now,
            PLATEAU,
        );
        assert_eq!(state, PlateauState::Plateaued { peak: 3.0 });
    }

    /// Replays scripted samples per signal, repeating the last one once the script runs out.
    struct ScriptedSource {
        running: Mutex<VecDeque<SignalSample>>,
        waiting: SignalSample,
        reads: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn new(running: &[SignalSample], waiting: SignalSample) -> Self {
            Self {
                running: Mutex::new(running.iter().copied().collect()),
                waiting,
                reads: Mutex::new(Vec::new()),
            }
        }

        fn reads_of(&self, signal: &str) -> usize {
            self.reads
                .lock()
                .unwrap()
                .iter()
                .filter(|name| *name == signal)
                .count()
        }
    }

    impl SignalSource for ScriptedSource {
        async fn read(&self, signal_name: &str) -> SignalSample {
            self.reads.lock().unwrap().push(signal_name.to_string());
            if signal_name == "waiting" {
                return self.waiting;
            }

            let mut running = self.running.lock().unwrap();
            if running.len() > 1 {
                running.pop_front().unwrap()
            } else {
                *running.front().unwrap()
            }
        }
    }

    fn settings() -> PlateauSettings {
        PlateauSettings {
            poll_interval: Duration::from_secs(1),
            plateau_duration: PLATEAU,
            running_signal: "running".to_string(),
            waiting_signal: "waiting".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_plateau_five_polls_after_first_positive_reading() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = WatcherLog::new(dir.path().join("watcher.log"));
        let source = ScriptedSource::new(
            &[
                SignalSample::Present(0.0),
                SignalSample::Present(0.0),
                SignalSample::Present(3.0),
            ],
            SignalSample::Present(7.0),
        );
        let settings = settings();

        let started = Instant::now();
        let plateau = PlateauDetector::new(&source, &watcher, &settings)
            .detect()
            .await
            .unwrap();

        assert_eq!(
            plateau,
            Plateau {
                running: 3.0,
                waiting: SignalSample::Present(7.0)
            }
        );
        // Two zero reads, the first 3, then exactly five more.
        assert_eq!(source.reads_of("running"), 2 + 1 + 5);
        assert_eq!(source.reads_of("waiting"), 1);
        assert_eq!(started.elapsed(), Duration::from_secs(7));

        let log = std::fs::read_to_string(watcher.path()).unwrap();
        let lines = log.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 9);
        assert!(lines[0].ends_with("running=0"));
        assert!(lines[2].ends_with("running=3"));
        assert!(lines[8].ends_with("waiting=7"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_record_absent_samples_without_resetting_dwell() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = WatcherLog::new(dir.path().join("watcher.log"));
        let source = ScriptedSource::new(
            &[
                SignalSample::Present(2.0),
                SignalSample::Absent,
                SignalSample::Absent,
                SignalSample::Present(2.0),
            ],
            SignalSample::Absent,
        );
        let settings = settings();

        let plateau = PlateauDetector::new(&source, &watcher, &settings)
            .detect()
            .await
            .unwrap();

        assert_eq!(plateau.running, 2.0);
        assert!(plateau.waiting.is_absent());
        assert_eq!(source.reads_of("running"), 6);

        let log = std::fs::read_to_string(watcher.path()).unwrap();
        assert!(log.contains("running=absent"));
        assert!(log.contains("waiting=absent"));
    }
}
