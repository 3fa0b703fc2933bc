//! Closed metric-name taxonomy: name → unit, plus default duration buckets.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unit attached to every taxonomy name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Count,
    #[serde(rename = "ms")]
    Milliseconds,
    Bytes,
    Percent,
}

impl Unit {
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Count => "count",
            Unit::Milliseconds => "ms",
            Unit::Bytes => "bytes",
            Unit::Percent => "percent",
        }
    }

    pub fn parse(s: &str) -> Option<Unit> {
        match s {
            "count" => Some(Unit::Count),
            "ms" => Some(Unit::Milliseconds),
            "bytes" => Some(Unit::Bytes),
            "percent" => Some(Unit::Percent),
            _ => None,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Suffix marking a duration metric.
pub const DURATION_SUFFIX: &str = "_ms";

/// Default ascending thresholds (milliseconds) for duration metrics.
pub const DEFAULT_DURATION_BUCKETS: [f64; 13] = [
    1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0,
];

const BUILTIN: &[(&str, Unit)] = &[
    ("http_requests", Unit::Count),
    ("http_errors", Unit::Count),
    ("http_request_duration_ms", Unit::Milliseconds),
    ("active_connections", Unit::Count),
    ("memory_usage_bytes", Unit::Bytes),
    ("cpu_usage_percent", Unit::Percent),
    ("cache_hits", Unit::Count),
    ("cache_misses", Unit::Count),
    ("cache_lookup_duration_ms", Unit::Milliseconds),
    ("db_query_duration_ms", Unit::Milliseconds),
    ("queue_depth", Unit::Count),
    ("payload_size_bytes", Unit::Bytes),
    ("metrics_scrapes", Unit::Count),
];

/// Static lookup table of known metric names.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    units: BTreeMap<String, Unit>,
}

impl Taxonomy {
    /// A taxonomy with no names; extend with [`Taxonomy::with_metric`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// The table shipped with prismetrics.
    pub fn builtin() -> Self {
        BUILTIN
            .iter()
            .fold(Self::empty(), |t, (name, unit)| t.with_metric(name, *unit))
    }

    pub fn with_metric(mut self, name: &str, unit: Unit) -> Self {
        self.units.insert(name.to_string(), unit);
        self
    }

    pub fn is_valid_metric_name(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    pub fn is_valid_metric_unit(&self, unit: &str) -> bool {
        Unit::parse(unit).is_some()
    }

    pub fn unit_for(&self, name: &str) -> Option<Unit> {
        self.units.get(name).copied()
    }

    /// Default thresholds for duration names, `None` for everything else.
    pub fn default_buckets_for_name(&self, name: &str) -> Option<Vec<f64>> {
        match self.unit_for(name) {
            Some(Unit::Milliseconds) if name.ends_with(DURATION_SUFFIX) => {
                Some(DEFAULT_DURATION_BUCKETS.to_vec())
            }
            _ => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }
}
