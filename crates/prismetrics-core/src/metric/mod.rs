//! Metric primitives (Counter, Gauge, Histogram).
//!
//! Each primitive is safe to mutate from many threads at once: scalar state
//! lives in lock-free atomic cells, histogram state behind a mutex. Mutation
//! never suspends; exporters read through snapshot accessors only.

mod atomic;
pub mod counter;
pub mod gauge;
pub mod histogram;

use std::fmt;

use serde::Serialize;

pub use counter::Counter;
pub use gauge::Gauge;
pub use histogram::{BucketCount, Histogram, HistogramSummary};

/// Kind of a registered primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
