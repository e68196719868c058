use clap::Parser;

use crate::cli::SweepCli;

/// Initialise the CLI and logging for the sweep runner.
///
/// Logs at `info` unless `RUST_LOG` says otherwise.
pub fn init() -> SweepCli {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    SweepCli::parse()
}
