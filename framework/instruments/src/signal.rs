use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use plateau_sweep_core::prelude::SignalSample;

/// Upper bound on a single scrape of the metrics endpoint. A slower scrape reads as absent.
const SCRAPE_TIMEOUT: Duration = Duration::from_secs(5);

/// Something that can be asked for the current value of a named gauge.
///
/// Implementations never fail: any problem reaching or parsing the source is reported as
/// [SignalSample::Absent] and the caller simply polls again later.
pub trait SignalSource {
    fn read(&self, signal_name: &str) -> impl Future<Output = SignalSample> + Send;
}

/// Pick the value of `signal_name` out of plain-text exposition output.
///
/// The last line containing `signal_name` wins. That line must have at least two
/// whitespace-separated tokens and the final token is parsed as the value.
pub fn parse_gauge(output: &str, signal_name: &str) -> SignalSample {
    let Some(line) = output.lines().rfind(|line| line.contains(signal_name)) else {
        return SignalSample::Absent;
    };

    let tokens = line.split_whitespace().collect::<Vec<_>>();
    match tokens.as_slice() {
        [_, .., value] => SignalSample::parse(value),
        _ => SignalSample::Absent,
    }
}

/// The backend's `/metrics` endpoint, scraped over HTTP.
#[derive(Debug, Clone)]
pub struct MetricsEndpoint {
    client: reqwest::Client,
    url: String,
}

impl MetricsEndpoint {
    /// Target `<host>/metrics`. A trailing slash on `host` is ignored.
    pub fn new(host: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SCRAPE_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for the metrics endpoint")?;

        Ok(Self {
            client,
            url: format!("{}/metrics", host.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the raw exposition text, or `None` if the endpoint could not be read.
    pub async fn scrape(&self) -> Option<String> {
        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => {
                log::debug!("Metrics scrape of {} failed: {e}", self.url);
                return None;
            }
        };

        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                log::debug!("Failed to read metrics body from {}: {e}", self.url);
                None
            }
        }
    }
}

impl SignalSource for MetricsEndpoint {
    fn read(&self, signal_name: &str) -> impl Future<Output = SignalSample> + Send {
        let endpoint = self.clone();
        let signal_name = signal_name.to_string();
        async move {
            match endpoint.scrape().await {
                Some(body) => parse_gauge(&body, &signal_name),
                None => SignalSample::Absent,
            }
        }
    }
}
