mod backend;
mod bin_path;
mod capture;
mod cli;
mod command;
mod config;
mod executor;
mod init;
mod layout;
mod levels;
mod plateau;
mod probe;
mod process;
mod progress;
mod report;
mod run;
mod shutdown;
mod sweep;
mod types;

pub mod prelude {
    pub use crate::backend::{BackendServer, ContainerExec};
    pub use crate::bin_path::{locust_path, DEFAULT_VENV, SWEEP_LOCUST_PATH_ENV};
    pub use crate::cli::SweepCli;
    pub use crate::command::{CommandSpec, LoadGenerator, LoadProfile};
    pub use crate::config::{BackendOptions, ModelCatalog, ModelProfile, SweepConfig};
    pub use crate::init::init;
    pub use crate::layout::{RunLayout, RUN_SUMMARY_FILE};
    pub use crate::levels::{Concurrency, LoadLevels};
    pub use crate::plateau::{Plateau, PlateauDetector, PlateauSettings, PlateauState};
    pub use crate::probe::{ProbeOutcome, ProbeRunner, PROBE_SLACK};
    pub use crate::process::{LoadProcess, STOP_GRACE_PERIOD};
    pub use crate::progress::SweepProgress;
    pub use crate::report::{print_summary, render_steps};
    pub use crate::run::run;
    pub use crate::sweep::Sweep;
    pub use crate::types::SweepResult;
}
