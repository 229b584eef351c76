use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

/// Width of the "uncertain" band below the recognition threshold.
pub const WARNING_BAND: f64 = 0.15;
/// Lowest confidence that can ever be classified as uncertain.
pub const WARNING_FLOOR: f64 = 0.50;

/// Recognition confidence cutoff, always a finite fraction in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold(f64);

impl Threshold {
    /// Value used when neither the settings service nor the payload supplies one.
    pub const DEFAULT: Threshold = Threshold(0.5);

    pub fn new(value: f64) -> Result<Self, ThresholdError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ThresholdError::OutOfRange(value))
        }
    }

    /// Accepts a fraction or a percentage; values in `(1, 100]` are read as percent.
    pub fn from_fraction_or_percent(value: f64) -> Result<Self, ThresholdError> {
        if value > 1.0 && value <= 100.0 {
            Self::new(value / 100.0)
        } else {
            Self::new(value)
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn as_percent(self) -> f64 {
        self.0 * 100.0
    }

    /// Lower edge of the uncertain band: `max(t - 0.15, 0.50)`, never above `t`.
    pub fn warning_floor(self) -> f64 {
        (self.0 - WARNING_BAND).max(WARNING_FLOOR).min(self.0)
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<f64> for Threshold {
    type Error = ThresholdError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Threshold> for f64 {
    fn from(threshold: Threshold) -> Self {
        threshold.0
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}%", self.as_percent())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ThresholdError {
    #[error("threshold {0} is not a fraction in [0, 1]")]
    OutOfRange(f64),
}

/// Failure of an HTTP call against the detection, settings or history service.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response payload: {0}")]
    Decode(String),
    #[error("reading upload failed: {0}")]
    Io(String),
}

/// Settings update was not acknowledged; the local value is kept.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("threshold {requested} not acknowledged, server still at {acknowledged}: {source}")]
pub struct ThresholdCommitError {
    pub requested: Threshold,
    pub acknowledged: Threshold,
    #[source]
    pub source: TransportError,
}

/// External settings endpoint that owns the process-wide recognition threshold.
pub trait SettingsService: Send + Sync + 'static {
    fn fetch_threshold(&self) -> impl Future<Output = Result<Threshold, TransportError>> + Send;

    fn push_threshold(
        &self,
        value: Threshold,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_rejects_values_outside_unit_range() {
        assert!(Threshold::new(1.2).is_err());
        assert!(Threshold::new(-0.1).is_err());
        assert!(Threshold::new(f64::NAN).is_err());
        assert_eq!(Threshold::new(0.85).unwrap().value(), 0.85);
    }

    #[test]
    fn percent_values_are_scaled_down() {
        let threshold = Threshold::from_fraction_or_percent(85.0).unwrap();
        assert!((threshold.value() - 0.85).abs() < 1e-12);
        assert_eq!(Threshold::from_fraction_or_percent(0.6).unwrap().value(), 0.6);
        assert!(Threshold::from_fraction_or_percent(250.0).is_err());
    }

    #[test]
    fn warning_floor_never_exceeds_threshold() {
        for step in 0..=100 {
            let threshold = Threshold::new(step as f64 / 100.0).unwrap();
            assert!(threshold.warning_floor() <= threshold.value());
        }
        assert!((Threshold::new(0.85).unwrap().warning_floor() - 0.70).abs() < 1e-12);
        assert_eq!(Threshold::new(0.60).unwrap().warning_floor(), 0.50);
        assert_eq!(Threshold::new(0.30).unwrap().warning_floor(), 0.30);
    }

    #[test]
    fn threshold_deserializes_with_validation() {
        let parsed: Threshold = serde_json::from_str("0.7").unwrap();
        assert_eq!(parsed.value(), 0.7);
        assert!(serde_json::from_str::<Threshold>("7.5").is_err());
    }
}
