use std::time::Duration;

use anyhow::Context;
use plateau_sweep_core::prelude::SweepError;
use tokio::time::Instant;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Polls the backend's model listing until it answers with something.
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    client: reqwest::Client,
    url: String,
    poll_interval: Duration,
}

impl ReadinessProbe {
    /// Probe `<host>/v1/models`.
    pub fn new(host: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for the readiness probe")?;

        Ok(Self {
            client,
            url: format!("{}/v1/models", host.trim_end_matches('/')),
            poll_interval: POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// A single check. Any response with a non-blank body counts, whatever its status.
    pub async fn is_ready(&self) -> bool {
        let body = match self.client.get(&self.url).send().await {
            Ok(response) => response.text().await,
            Err(e) => {
                log::trace!("Readiness check against {} failed: {e}", self.url);
                return false;
            }
        };

        matches!(body, Ok(body) if !body.trim().is_empty())
    }

    /// Keep checking until the backend is ready or `timeout` has elapsed.
    pub async fn wait(&self, timeout: Duration) -> Result<(), SweepError> {
        log::info!("Waiting for backend to become ready: {}", self.url);
        let started = Instant::now();

        loop {
            if self.is_ready().await {
                log::info!("Backend is ready ({} answered)", self.url);
                return Ok(());
            }

            if started.elapsed() >= timeout {
                return Err(SweepError::ReadinessTimeout {
                    url: self.url.clone(),
                    timeout_s: timeout.as_secs(),
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
