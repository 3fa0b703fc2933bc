//! Shared error type across prismetrics crates.

use thiserror::Error;

use crate::metric::MetricKind;

/// Stable error codes used in logs, stats and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Counter given a negative (or non-finite) increment.
    InvalidDelta,
    /// Observation value that cannot be recorded.
    InvalidValue,
    /// Label key fails the identifier rule.
    InvalidLabelName,
    /// Label value is empty.
    InvalidLabelValue,
    /// Metric name fails the exposition naming rule.
    InvalidMetricName,
    /// Metric name is not part of the taxonomy.
    UnknownMetric,
    /// Bucket thresholds are unusable.
    InvalidBuckets,
    /// Series name already registered as another kind.
    MetricRegistration,
    /// A refresh pass failed.
    Refresh,
    /// The exposition library failed.
    Exposition,
    /// Invalid configuration.
    Config,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and JSON stats.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidDelta => "INVALID_DELTA",
            ErrorCode::InvalidValue => "INVALID_VALUE",
            ErrorCode::InvalidLabelName => "INVALID_LABEL_NAME",
            ErrorCode::InvalidLabelValue => "INVALID_LABEL_VALUE",
            ErrorCode::InvalidMetricName => "INVALID_METRIC_NAME",
            ErrorCode::UnknownMetric => "UNKNOWN_METRIC",
            ErrorCode::InvalidBuckets => "INVALID_BUCKETS",
            ErrorCode::MetricRegistration => "METRIC_REGISTRATION",
            ErrorCode::Refresh => "REFRESH",
            ErrorCode::Exposition => "EXPOSITION",
            ErrorCode::Config => "CONFIG",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Unified error type used by core and exporter.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid delta for counter {name}: {delta} (must be finite and >= 0)")]
    InvalidDelta { name: String, delta: f64 },
    #[error("invalid value for {name}: {value} (must be finite)")]
    InvalidValue { name: String, value: f64 },
    #[error("invalid label name: {0:?}")]
    InvalidLabelName(String),
    #[error("invalid value for label {0:?}: must not be empty")]
    InvalidLabelValue(String),
    #[error("invalid metric name: {0:?}")]
    InvalidMetricName(String),
    #[error("metric {0:?} is not part of the taxonomy")]
    UnknownMetric(String),
    #[error("invalid buckets for {name}: {reason}")]
    InvalidBuckets { name: String, reason: String },
    #[error("metric {name:?} already registered as {existing}, requested {requested}")]
    MetricRegistration {
        name: String,
        existing: MetricKind,
        requested: MetricKind,
    },
    #[error("metrics refresh failed: {0}")]
    Refresh(#[source] Box<MetricsError>),
    #[error("exposition: {0}")]
    Exposition(String),
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl MetricsError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            MetricsError::InvalidDelta { .. } => ErrorCode::InvalidDelta,
            MetricsError::InvalidValue { .. } => ErrorCode::InvalidValue,
            MetricsError::InvalidLabelName(_) => ErrorCode::InvalidLabelName,
            MetricsError::InvalidLabelValue(_) => ErrorCode::InvalidLabelValue,
            MetricsError::InvalidMetricName(_) => ErrorCode::InvalidMetricName,
            MetricsError::UnknownMetric(_) => ErrorCode::UnknownMetric,
            MetricsError::InvalidBuckets { .. } => ErrorCode::InvalidBuckets,
            MetricsError::MetricRegistration { .. } => ErrorCode::MetricRegistration,
            MetricsError::Refresh(_) => ErrorCode::Refresh,
            MetricsError::Exposition(_) => ErrorCode::Exposition,
            MetricsError::Config(_) => ErrorCode::Config,
            MetricsError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Wrap an error as a refresh failure. Already-wrapped errors are kept as is.
    pub fn into_refresh(self) -> Self {
        match self {
            e @ MetricsError::Refresh(_) => e,
            other => MetricsError::Refresh(Box::new(other)),
        }
    }

    /// The original error behind a refresh failure.
    pub fn cause(&self) -> Option<&MetricsError> {
        match self {
            MetricsError::Refresh(inner) => Some(inner),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_keeps_original_cause() {
        let err = MetricsError::InvalidMetricName("bad.name".into()).into_refresh();
        assert_eq!(err.code(), ErrorCode::Refresh);
        let cause = err.cause().map(|c| c.code());
        assert_eq!(cause, Some(ErrorCode::InvalidMetricName));
        assert!(err.to_string().contains("bad.name"));
    }

    #[test]
    fn refresh_is_not_double_wrapped() {
        let err = MetricsError::Exposition("boom".into())
            .into_refresh()
            .into_refresh();
        assert_eq!(err.cause().map(|c| c.code()), Some(ErrorCode::Exposition));
    }
}
