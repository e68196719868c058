use anyhow::Context;
use plateau_sweep_core::prelude::{new_run_id, unix_timestamp, ShutdownSignalError};
use plateau_sweep_instruments::{MetricsEndpoint, ReadinessProbe};
use plateau_sweep_summary_model::{append_sweep_run, SweepOutcome, SweepRun};

use crate::bin_path::locust_path;
use crate::cli::SweepCli;
use crate::config::{ModelCatalog, SweepConfig};
use crate::executor::Executor;
use crate::layout::{RunLayout, RUN_SUMMARY_FILE};
use crate::progress::SweepProgress;
use crate::report::print_summary;
use crate::shutdown::start_shutdown_listener;
use crate::sweep::Sweep;
use crate::types::SweepResult;

/// Run a complete sweep as described by `cli`.
///
/// Whatever happens after the run directory has been created, a summary of the run is appended to
/// the run summary file and printed. The backend is stopped on every path unless stopping it was
/// skipped. Returns the outcome of a completed sweep, or the error that ended it, which is a
/// [ShutdownSignalError] if the sweep was interrupted.
pub fn run(cli: SweepCli) -> SweepResult<SweepOutcome> {
    let catalog = match &cli.config {
        Some(path) => ModelCatalog::builtin().merged_with(ModelCatalog::load(path)?),
        None => ModelCatalog::builtin(),
    };
    let locust = locust_path(cli.venv_path.as_deref())?;
    let config = SweepConfig::from_cli(&cli, &catalog, locust)?;

    log::info!(
        "Sweeping model {} at {} over {} load levels",
        config.model_key,
        config.host,
        config.levels.len()
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime);
    let executor = Executor::new(runtime, shutdown_handle);

    let run_id = new_run_id();
    let layout = RunLayout::new(&config.output_root, &config.model_key, &run_id);
    layout.create()?;

    let mut sweep_run = SweepRun::new(
        run_id,
        config.model_key.clone(),
        layout.dir().to_path_buf(),
        unix_timestamp(),
        config.parameters(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    log::info!(
        "Run {} writing to {}, configuration fingerprint {}",
        sweep_run.run_id,
        layout.dir().display(),
        sweep_run.fingerprint()
    );

    let result = run_with_backend(&executor, &config, &layout, &mut sweep_run);

    let outcome = match &result {
        Ok(()) => SweepOutcome::Completed,
        Err(e) if e.is::<ShutdownSignalError>() => SweepOutcome::Interrupted,
        Err(e) => SweepOutcome::Failed {
            reason: format!("{e:#}"),
        },
    };
    sweep_run.finish(outcome.clone(), unix_timestamp());

    let summary_path = config.output_root.join(RUN_SUMMARY_FILE);
    if let Err(e) = append_sweep_run(&sweep_run, &summary_path) {
        log::error!(
            "Failed to write run summary to {}: {e:?}",
            summary_path.display()
        );
    }
    print_summary(&sweep_run);

    result.map(|()| outcome)
}

/// Start the backend, wait for it, sweep, then stop the backend regardless of how the rest went.
fn run_with_backend(
    executor: &Executor,
    config: &SweepConfig,
    layout: &RunLayout,
    sweep_run: &mut SweepRun,
) -> SweepResult<()> {
    let result = start_and_sweep(executor, config, layout, sweep_run);

    match &config.backend.server {
        Some(server) if !config.backend.skip_stop => {
            if let Err(e) = executor.execute_to_completion(server.stop()) {
                log::error!("Failed to stop backend: {e:?}");
            }
        }
        _ => log::info!("Stopping the backend is skipped, leaving it running"),
    }

    result
}

fn start_and_sweep(
    executor: &Executor,
    config: &SweepConfig,
    layout: &RunLayout,
    sweep_run: &mut SweepRun,
) -> SweepResult<()> {
    match &config.backend.server {
        Some(server) if !config.backend.skip_start => {
            executor.execute_in_place(async { server.start().await.map(|_| ()) })?;
        }
        _ => log::info!("Starting the backend is skipped, expecting it to be running"),
    }

    executor.execute_in_place(async {
        ReadinessProbe::new(&config.host)?
            .wait(config.backend.ready_timeout)
            .await
            .map_err(anyhow::Error::from)
    })?;

    let progress = if config.no_progress {
        SweepProgress::hidden()
    } else {
        SweepProgress::new(config.levels.len())
    };
    let sweep = Sweep::new(
        config,
        MetricsEndpoint::new(&config.host)?,
        executor.shutdown_handle().new_listener(),
    )
    .with_progress(progress);

    // The sweep watches for shutdown itself so that it can stop the main load in an orderly way.
    executor.execute_to_completion(sweep.run(sweep_run, layout))
}
