use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct SweepCli {
    /// Which model profile to serve and load, see `--config` for adding profiles
    #[clap(long)]
    pub model_key: String,

    /// TOML file with extra model profiles under `[models.<key>]` tables
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Base URL of the backend, used for load, metrics and readiness checks
    #[clap(long, default_value = "http://127.0.0.1:8000")]
    pub host: String,

    /// Command used to run things inside the backend's container, split on whitespace
    #[clap(long, default_value = "sudo docker exec")]
    pub docker_exec_prefix: String,

    /// Virtual environment that provides the `locust` executable.
    ///
    /// When not set, `~/locust-env` is used if it provides `locust`, otherwise `locust` is looked
    /// up on `PATH`. The `SWEEP_LOCUST_PATH` environment variable takes precedence over all of
    /// these.
    #[clap(long)]
    pub venv_path: Option<PathBuf>,

    /// Name of the container the backend runs in. Required unless both starting and stopping the
    /// backend are skipped
    #[clap(long)]
    pub container_name: Option<String>,

    /// How long to wait for the backend to answer on `/v1/models` before giving up
    #[clap(long, default_value_t = 180)]
    pub ready_timeout_seconds: u64,

    /// Assume the backend is already running
    #[clap(long, default_value = "false")]
    pub skip_start_server: bool,

    /// Leave the backend running after the sweep
    #[clap(long, default_value = "false")]
    pub skip_stop_server: bool,

    /// PID file of the backend, inside the container
    #[clap(long, default_value = "/tmp/vllm_serve.pid")]
    pub pid_file: PathBuf,

    /// Log file of the backend, inside the container
    #[clap(long, default_value = "/tmp/vllm_serve.log")]
    pub server_log: PathBuf,

    /// First offered load level, in queries per second
    #[clap(long, default_value_t = 10)]
    pub qps_start: u32,

    /// Increment between load levels
    #[clap(long, default_value_t = 5)]
    pub qps_step: u32,

    /// Highest load level, included if it falls on a step
    #[clap(long, default_value_t = 200)]
    pub qps_max: u32,

    /// Seconds without an increase in running requests before a plateau is declared
    #[clap(long, default_value_t = 15)]
    pub plateau_seconds: u64,

    /// Seconds between metric polls
    #[clap(long, default_value_t = 1)]
    pub poll_seconds: u64,

    /// Runtime passed to the main load generator. Should outlast plateau detection and the probe
    #[clap(long, default_value_t = 99999)]
    pub main_runtime_seconds: u64,

    /// Runtime of the single-user latency probe
    #[clap(long, default_value_t = 120)]
    pub probe_runtime_seconds: u64,

    #[clap(long, default_value_t = 1000)]
    pub main_max_tokens: u32,

    #[clap(long, default_value_t = 100)]
    pub probe_max_tokens: u32,

    /// Main load users per unit of QPS, rounded down
    #[clap(long, default_value_t = 1.5)]
    pub users_multiplier: f64,

    /// Main load spawn rate per unit of QPS, rounded down
    #[clap(long, default_value_t = 1.5)]
    pub spawn_multiplier: f64,

    /// Seconds to let the backend settle between levels
    #[clap(long, default_value_t = 2)]
    pub settle_seconds: u64,

    /// Directory that run directories and the run summary are written to
    #[clap(long, default_value = "auto_results")]
    pub out_dir: PathBuf,

    /// Locust file passed to the load generator with `-f`
    #[clap(long, default_value = "load_test.py")]
    pub locustfile: String,

    /// Backend provider name passed to the load generator
    #[clap(long, default_value = "vllm")]
    pub provider: String,

    /// Gauge of in-flight requests that is tracked until it plateaus
    #[clap(long, default_value = "vllm:num_requests_running")]
    pub running_metric: String,

    /// Gauge of queued requests that is read once per level
    #[clap(long, default_value = "vllm:num_requests_waiting")]
    pub waiting_metric: String,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by
    /// anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,
}
