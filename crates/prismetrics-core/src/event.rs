//! Wire-shaped metric events produced by `MetricsRegistry::export`.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::metric::HistogramSummary;
use crate::taxonomy::Unit;

/// Scalar for counters and gauges, summary for histograms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Histogram(HistogramSummary),
}

impl MetricValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetricValue::Number(v) => Some(*v),
            MetricValue::Histogram(_) => None,
        }
    }

    pub fn as_histogram(&self) -> Option<&HistogramSummary> {
        match self {
            MetricValue::Histogram(s) => Some(s),
            MetricValue::Number(_) => None,
        }
    }
}

/// One exported metric. Built fresh per export and never mutated after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsEvent {
    /// ISO-8601 timestamp (UTC, millisecond precision).
    pub timestamp: String,
    pub name: String,
    pub value: MetricValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

impl MetricsEvent {
    pub fn new(at: DateTime<Utc>, name: impl Into<String>, value: MetricValue) -> Self {
        Self {
            timestamp: format_timestamp(at),
            name: name.into(),
            value,
            unit: None,
            tags: None,
        }
    }

    pub fn with_unit(mut self, unit: Option<Unit>) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = (!tags.is_empty()).then_some(tags);
        self
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::BucketCount;

    #[test]
    fn scalar_event_wire_shape() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let ev = MetricsEvent::new(at, "http_requests", MetricValue::Number(5.0))
            .with_unit(Some(Unit::Count));
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00.000Z");
        assert_eq!(json["value"], 5.0);
        assert_eq!(json["unit"], "count");
        assert!(json.get("tags").is_none());
    }

    #[test]
    fn histogram_event_round_trips() {
        let summary = HistogramSummary {
            count: 2,
            sum: 7.0,
            buckets: vec![BucketCount { le: 5.0, count: 1 }],
        };
        let ev = MetricsEvent::new(Utc::now(), "lat_ms", MetricValue::Histogram(summary.clone()));
        let back: MetricsEvent = serde_json::from_str(&serde_json::to_string(&ev).unwrap()).unwrap();
        assert_eq!(back.value.as_histogram(), Some(&summary));
    }

    #[test]
    fn empty_tags_are_omitted() {
        let ev = MetricsEvent::new(Utc::now(), "x", MetricValue::Number(1.0)).with_tags(BTreeMap::new());
        assert!(ev.tags.is_none());
    }
}
