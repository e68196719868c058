mod latency;
mod readiness;
mod signal;
mod watcher;

pub use latency::{LabelledLatencyExtractor, LatencyExtractor, QUANTILE_PREFIX, TTFT_LABEL};
pub use readiness::ReadinessProbe;
pub use signal::{parse_gauge, MetricsEndpoint, SignalSource};
pub use watcher::WatcherLog;
