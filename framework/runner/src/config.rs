//! Turns parsed command line flags and the model catalog into a validated [SweepConfig].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use plateau_sweep_core::prelude::SweepError;
use plateau_sweep_summary_model::SweepParameters;
use serde::Deserialize;

use crate::backend::{BackendServer, ContainerExec};
use crate::cli::SweepCli;
use crate::command::{LoadGenerator, LoadProfile};
use crate::levels::{Concurrency, LoadLevels};
use crate::plateau::PlateauSettings;
use crate::probe::PROBE_SLACK;
use crate::types::SweepResult;

/// What to serve for one model and how to point the load generator at it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelProfile {
    pub model_path: String,
    /// Defaults to [ModelProfile::model_path] when omitted.
    #[serde(default)]
    pub tokenizer_path: Option<String>,
    /// Shell command that starts the backend inside its container.
    pub serve_cmd: String,
    #[serde(default)]
    pub main_extra_flags: Vec<String>,
    #[serde(default)]
    pub probe_extra_flags: Vec<String>,
}

impl ModelProfile {
    pub fn tokenizer(&self) -> &str {
        self.tokenizer_path.as_deref().unwrap_or(&self.model_path)
    }
}

/// Known model profiles by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ModelCatalog {
    #[serde(default)]
    pub models: BTreeMap<String, ModelProfile>,
}

impl ModelCatalog {
    /// Profiles that are available without a config file.
    pub fn builtin() -> Self {
        let mut models = BTreeMap::new();
        models.insert(
            "qwen3-8b".to_string(),
            ModelProfile {
                model_path: "/data/models/Qwen3-8B".to_string(),
                tokenizer_path: Some("/data/models/Qwen3-8B".to_string()),
                serve_cmd: "vllm serve /data/models/Qwen3-8B --host 0.0.0.0 --port 8000"
                    .to_string(),
                main_extra_flags: Vec::new(),
                probe_extra_flags: Vec::new(),
            },
        );

        Self { models }
    }

    pub fn from_toml_str(content: &str) -> SweepResult<Self> {
        toml::from_str(content).context("Failed to parse model catalog")
    }

    pub fn load(path: &Path) -> SweepResult<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model catalog {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid model catalog {}", path.display()))
    }

    /// Add every profile from `other`, replacing profiles with the same key.
    pub fn merged_with(mut self, other: ModelCatalog) -> Self {
        self.models.extend(other.models);
        self
    }

    pub fn get(&self, key: &str) -> Result<&ModelProfile, SweepError> {
        self.models.get(key).ok_or_else(|| {
            SweepError::InvalidConfig(format!(
                "Unknown model key '{key}', available keys: {}",
                self.models.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
        })
    }
}

/// Where the backend lives and which parts of its lifecycle the sweep manages.
#[derive(Debug, Clone)]
pub struct BackendOptions {
    /// `None` when both start and stop are skipped.
    pub server: Option<BackendServer>,
    pub skip_start: bool,
    pub skip_stop: bool,
    pub ready_timeout: Duration,
}

/// Everything a sweep needs, checked for consistency.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub model_key: String,
    pub profile: ModelProfile,
    pub host: String,
    pub generator: LoadGenerator,
    pub levels: LoadLevels,
    pub concurrency: Concurrency,
    pub plateau: PlateauSettings,
    pub main_run_time: Duration,
    pub main_max_tokens: u32,
    pub probe_run_time: Duration,
    pub probe_max_tokens: u32,
    pub settle_delay: Duration,
    pub output_root: PathBuf,
    pub backend: BackendOptions,
    pub no_progress: bool,
}

impl SweepConfig {
    pub fn from_cli(cli: &SweepCli, catalog: &ModelCatalog, locust: PathBuf) -> SweepResult<Self> {
        let profile = catalog.get(&cli.model_key)?.clone();

        let host = url::Url::parse(&cli.host)
            .map_err(|e| SweepError::InvalidConfig(format!("Invalid host '{}': {e}", cli.host)))?;
        if !matches!(host.scheme(), "http" | "https") {
            return Err(SweepError::InvalidConfig(format!(
                "Host must be an http(s) URL, got '{}'",
                cli.host
            ))
            .into());
        }
        let host = cli.host.trim_end_matches('/').to_string();

        if cli.poll_seconds == 0 {
            return Err(
                SweepError::InvalidConfig("Poll interval must be at least 1s".to_string()).into(),
            );
        }

        let levels = LoadLevels::new(cli.qps_start, cli.qps_step, cli.qps_max)?;
        if levels.is_empty() {
            log::warn!(
                "QPS start {} is above QPS max {}, no levels will run",
                cli.qps_start,
                cli.qps_max
            );
        }
        let concurrency = Concurrency::new(cli.users_multiplier, cli.spawn_multiplier)?;

        let server = if cli.skip_start_server && cli.skip_stop_server {
            None
        } else {
            let container = cli.container_name.as_deref().ok_or_else(|| {
                SweepError::InvalidConfig(
                    "--container-name is required unless both --skip-start-server and \
                     --skip-stop-server are set"
                        .to_string(),
                )
            })?;
            Some(BackendServer::new(
                ContainerExec::new(&cli.docker_exec_prefix, container)?,
                profile.serve_cmd.clone(),
                &cli.pid_file,
                &cli.server_log,
            ))
        };

        let generator = LoadGenerator {
            program: locust,
            locustfile: cli.locustfile.clone(),
            host: host.clone(),
            provider: cli.provider.clone(),
            model: profile.model_path.clone(),
            tokenizer: profile.tokenizer().to_string(),
        };

        Ok(Self {
            model_key: cli.model_key.clone(),
            profile,
            host,
            generator,
            levels,
            concurrency,
            plateau: PlateauSettings {
                poll_interval: Duration::from_secs(cli.poll_seconds),
                plateau_duration: Duration::from_secs(cli.plateau_seconds),
                running_signal: cli.running_metric.clone(),
                waiting_signal: cli.waiting_metric.clone(),
            },
            main_run_time: Duration::from_secs(cli.main_runtime_seconds),
            main_max_tokens: cli.main_max_tokens,
            probe_run_time: Duration::from_secs(cli.probe_runtime_seconds),
            probe_max_tokens: cli.probe_max_tokens,
            settle_delay: Duration::from_secs(cli.settle_seconds),
            output_root: cli.out_dir.clone(),
            backend: BackendOptions {
                server,
                skip_start: cli.skip_start_server,
                skip_stop: cli.skip_stop_server,
                ready_timeout: Duration::from_secs(cli.ready_timeout_seconds),
            },
            no_progress: cli.no_progress,
        })
    }

    /// Main load profile for `qps`.
    pub fn main_profile(&self, qps: u32) -> LoadProfile {
        let (users, spawn_rate) = self.concurrency.for_level(qps);
        LoadProfile {
            users,
            spawn_rate,
            qps,
            run_time: self.main_run_time,
            max_tokens: self.main_max_tokens,
        }
    }

    pub fn probe_profile(&self) -> LoadProfile {
        LoadProfile::probe(self.probe_run_time, self.probe_max_tokens)
    }

    /// Longest a probe may run before it is killed.
    pub fn probe_limit(&self) -> Duration {
        self.probe_run_time.saturating_add(PROBE_SLACK)
    }

    pub fn parameters(&self) -> SweepParameters {
        SweepParameters {
            qps_start: self.levels.start(),
            qps_step: self.levels.step(),
            qps_max: self.levels.max(),
            users_multiplier: self.concurrency.users_multiplier(),
            spawn_multiplier: self.concurrency.spawn_multiplier(),
            poll_interval_ms: self.plateau.poll_interval.as_millis() as u64,
            plateau_duration_ms: self.plateau.plateau_duration.as_millis() as u64,
            main_runtime_s: self.main_run_time.as_secs(),
            probe_runtime_s: self.probe_run_time.as_secs(),
            main_max_tokens: self.main_max_tokens,
            probe_max_tokens: self.probe_max_tokens,
        }
    }
}
