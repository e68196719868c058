use std::fmt;

/// A single point-in-time reading of a backend gauge.
///
/// `Absent` covers every way a reading can fail to produce a number: the metrics source was
/// unreachable, no line matched, or the value token did not parse. It is deliberately distinct
/// from a present `0.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalSample {
    Present(f64),
    Absent,
}

impl SignalSample {
    /// Parse a single value token. Anything that is not a finite, non-negative number is absent.
    pub fn parse(token: &str) -> Self {
        match token.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => SignalSample::Present(value),
            _ => SignalSample::Absent,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            SignalSample::Present(value) => Some(*value),
            SignalSample::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, SignalSample::Absent)
    }

    /// True when the sample is present and strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        matches!(self, SignalSample::Present(value) if *value > 0.0)
    }
}

impl fmt::Display for SignalSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalSample::Present(value) => write!(f, "{value}"),
            SignalSample::Absent => write!(f, "absent"),
        }
    }
}
