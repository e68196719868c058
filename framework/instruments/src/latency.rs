use regex::Regex;

/// Label of the aggregate first-token latency line in the load generator's summary.
pub const TTFT_LABEL: &str = "time to first token";

/// Lines for quantile variants of a metric (`P50 ...`, `P90 ...`) start with this letter.
pub const QUANTILE_PREFIX: char = 'p';

const NUMBER_PATTERN: &str = r"[0-9]+(?:\.[0-9]+)?";

/// Strategy for pulling a latency figure out of free-form load generator output.
///
/// The load generator's report format is outside our control, so the rule lives behind this trait
/// and the orchestrator only ever sees the extracted number.
pub trait LatencyExtractor: Send + Sync {
    /// Returns the latency reported in `output`, in whatever unit the output uses.
    fn extract(&self, output: &str) -> Option<f64>;
}

/// Matches lines that start with a fixed label and contain a colon, skipping quantile variants.
///
/// Each line is trimmed and lowercased before matching. A line qualifies when it starts with the
/// label and contains `:`, unless it starts with the quantile prefix. The last number on the last
/// qualifying line is the result; a qualifying line without any number leaves the previous result
/// in place.
#[derive(Debug, Clone)]
pub struct LabelledLatencyExtractor {
    label: String,
    quantile_prefix: char,
    number: Regex,
}

impl LabelledLatencyExtractor {
    pub fn new(label: &str, quantile_prefix: char) -> Self {
        Self {
            label: label.to_lowercase(),
            quantile_prefix: quantile_prefix.to_ascii_lowercase(),
            number: Regex::new(NUMBER_PATTERN).expect("Number pattern is valid"),
        }
    }

    /// Time to first token, as printed in the load generator's end-of-run summary.
    pub fn time_to_first_token() -> Self {
        Self::new(TTFT_LABEL, QUANTILE_PREFIX)
    }

    fn qualifies(&self, lowered: &str) -> bool {
        lowered.starts_with(&self.label)
            && lowered.contains(':')
            && !lowered.starts_with(self.quantile_prefix)
    }
}

impl Default for LabelledLatencyExtractor {
    fn default() -> Self {
        Self::time_to_first_token()
    }
}

impl LatencyExtractor for LabelledLatencyExtractor {
    fn extract(&self, output: &str) -> Option<f64> {
        let mut latency = None;
        for line in output.lines() {
            let stripped = line.trim();
            if !self.qualifies(&stripped.to_lowercase()) {
                continue;
            }

            if let Some(value) = self
                .number
                .find_iter(stripped)
                .last()
                .and_then(|m| m.as_str().parse::<f64>().ok())
            {
                latency = Some(value);
            }
        }

        latency
    }
}
