/// Failures that abort a sweep and that callers may want to tell apart.
///
/// Everything else travels as a plain `anyhow::Error` with context attached at the boundary where
/// it happened.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("Backend at '{url}' was not ready after {timeout_s}s")]
    ReadinessTimeout { url: String, timeout_s: u64 },
    #[error("Failed to start backend in container '{container}': {reason}")]
    BackendStart { container: String, reason: String },
    #[error("Invalid sweep configuration: {0}")]
    InvalidConfig(String),
    #[error("Load generator binary not found: {0}")]
    LoadGeneratorNotFound(String),
}
