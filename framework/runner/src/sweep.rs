//! The loop over load levels.
//!
//! Each level runs strictly as start main load, wait for plateau, probe, stop main load, record.
//! Only one main load process exists at a time, and it is always stopped before the level's
//! outcome is acted on, whether that is a recorded step, an error or a shutdown request.

use std::path::Path;

use anyhow::anyhow;
use plateau_sweep_core::prelude::{DelegatedShutdownListener, ShutdownSignalError};
use plateau_sweep_instruments::{SignalSource, WatcherLog};
use plateau_sweep_summary_model::{ResultsTable, StepResult, SweepRun};

use crate::command::CommandSpec;
use crate::config::SweepConfig;
use crate::layout::RunLayout;
use crate::plateau::{Plateau, PlateauDetector};
use crate::probe::{ProbeOutcome, ProbeRunner};
use crate::process::LoadProcess;
use crate::progress::SweepProgress;
use crate::types::SweepResult;

pub struct Sweep<'a, S> {
    config: &'a SweepConfig,
    source: S,
    probe: ProbeRunner,
    progress: SweepProgress,
    shutdown: DelegatedShutdownListener,
}

impl<'a, S: SignalSource> Sweep<'a, S> {
    pub fn new(config: &'a SweepConfig, source: S, shutdown: DelegatedShutdownListener) -> Self {
        Self {
            config,
            source,
            probe: ProbeRunner::default(),
            progress: SweepProgress::hidden(),
            shutdown,
        }
    }

    pub fn with_probe(mut self, probe: ProbeRunner) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_progress(mut self, progress: SweepProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Measure every level in order, appending each step to the results table and to `run`.
    ///
    /// Stops at the first error, or with [ShutdownSignalError] if shutdown is requested. Steps
    /// recorded before that point are kept; the interrupted level leaves no partial record.
    pub async fn run(&self, run: &mut SweepRun, layout: &RunLayout) -> SweepResult<()> {
        let table = ResultsTable::create(layout.results_csv())?;
        let watcher = WatcherLog::new(layout.watcher_log());

        let result = self.run_levels(run, layout, &table, &watcher).await;
        self.progress.finish();
        result
    }

    async fn run_levels(
        &self,
        run: &mut SweepRun,
        layout: &RunLayout,
        table: &ResultsTable,
        watcher: &WatcherLog,
    ) -> SweepResult<()> {
        for (index, qps) in self.config.levels.iter().enumerate() {
            if index > 0 {
                self.settle().await?;
            }
            if self.shutdown.should_shutdown() {
                return Err(anyhow!(ShutdownSignalError::default()));
            }

            let step = self.run_level(qps, layout, watcher).await?;
            table.append(&step)?;
            run.record_step(step)?;
            self.progress.complete_level();
        }

        log::info!("All {} load levels measured", run.steps.len());
        Ok(())
    }

    async fn run_level(
        &self,
        qps: u32,
        layout: &RunLayout,
        watcher: &WatcherLog,
    ) -> SweepResult<StepResult> {
        let config = self.config;
        let profile = config.main_profile(qps);
        log::info!(
            "Starting level: model={}, qps={qps}, users={}, spawn_rate={}",
            config.model_key,
            profile.users,
            profile.spawn_rate
        );

        let main_log = layout.main_log(qps);
        let probe_log = layout.probe_log(qps);
        let main_cmd = config
            .generator
            .command(&profile, &config.profile.main_extra_flags);
        let probe_cmd = config
            .generator
            .command(&config.probe_profile(), &config.profile.probe_extra_flags);

        self.progress.phase(qps, "starting main load");
        let mut main = LoadProcess::start(&main_cmd, &main_log)?;

        let mut shutdown = self.shutdown.clone();
        let measured = tokio::select! {
            result = self.measure(qps, &probe_cmd, &probe_log, watcher) => result,
            _ = shutdown.wait_for_shutdown() => Err(anyhow!(ShutdownSignalError::default())),
        };

        self.progress.phase(qps, "stopping main load");
        main.stop().await;
        let (plateau, probe) = measured?;

        Ok(StepResult {
            qps,
            users: profile.users,
            spawn_rate: profile.spawn_rate,
            plateau_running: plateau.running,
            plateau_waiting: plateau.waiting.value(),
            probe_latency: probe.latency,
            probe_duration_s: config.probe_run_time.as_secs(),
            main_log,
            probe_log,
        })
    }

    /// Wait for the plateau, then probe while the main load keeps running.
    async fn measure(
        &self,
        qps: u32,
        probe_cmd: &CommandSpec,
        probe_log: &Path,
        watcher: &WatcherLog,
    ) -> SweepResult<(Plateau, ProbeOutcome)> {
        self.progress.phase(qps, "waiting for plateau");
        let plateau = PlateauDetector::new(&self.source, watcher, &self.config.plateau)
            .detect()
            .await?;

        self.progress.phase(qps, "probing");
        log::info!(
            "Probing latency at qps={qps} for {}s",
            self.config.probe_run_time.as_secs()
        );
        let probe = self
            .probe
            .run(probe_cmd, probe_log, self.config.probe_limit())
            .await?;
        match probe.latency {
            Some(latency) => log::info!(
                "Probe finished in {:.1}s, TTFT = {latency}",
                probe.elapsed.as_secs_f64()
            ),
            None => log::info!(
                "Probe finished in {:.1}s, TTFT = absent",
                probe.elapsed.as_secs_f64()
            ),
        }

        Ok((plateau, probe))
    }

    async fn settle(&self) -> SweepResult<()> {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(self.config.settle_delay) => Ok(()),
            _ = shutdown.wait_for_shutdown() => Err(anyhow!(ShutdownSignalError::default())),
        }
    }
}
