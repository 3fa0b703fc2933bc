//! Metrics registry: the single owner of every live primitive, keyed by name.
//!
//! Entries are created lazily and idempotently: the first `counter(name)`
//! constructs and stores the instance, every later call hands back the same
//! `Arc`. `clear()` zeroes state but never removes entries, so handles held by
//! application code stay wired to what gets exported.
//!
//! There is no process-global registry; construct one at startup and pass it
//! (as `Arc<MetricsRegistry>`) to whatever records or exports.

use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::error::{MetricsError, Result};
use crate::event::{MetricValue, MetricsEvent};
use crate::metric::{Counter, Gauge, Histogram, MetricKind};
use crate::taxonomy::Taxonomy;
use crate::validate::{EventValidator, SchemaValidator};

/// Options honored only when a histogram is first constructed.
#[derive(Debug, Clone, Default)]
pub struct HistogramOptions {
    pub buckets: Option<Vec<f64>>,
}

impl HistogramOptions {
    pub fn buckets(buckets: impl Into<Vec<f64>>) -> Self {
        Self {
            buckets: Some(buckets.into()),
        }
    }
}

#[derive(Clone)]
enum Metric {
    Counter(Arc<Counter>),
    Gauge(Arc<Gauge>),
    Histogram(Arc<Histogram>),
}

impl Metric {
    fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Gauge(_) => MetricKind::Gauge,
            Metric::Histogram(_) => MetricKind::Histogram,
        }
    }

    fn value(&self) -> MetricValue {
        match self {
            Metric::Counter(c) => MetricValue::Number(c.value()),
            Metric::Gauge(g) => MetricValue::Number(g.value()),
            Metric::Histogram(h) => MetricValue::Histogram(h.summary()),
        }
    }

    fn reset(&self) {
        match self {
            Metric::Counter(c) => c.reset(),
            Metric::Gauge(g) => g.reset(),
            Metric::Histogram(h) => h.reset(),
        }
    }
}

pub struct MetricsRegistry {
    taxonomy: Taxonomy,
    metrics: DashMap<String, Metric>,
    validator: Option<Arc<dyn EventValidator>>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new(Taxonomy::builtin())
    }
}

impl MetricsRegistry {
    /// Empty registry over `taxonomy`. Debug builds check every exported
    /// event against the wire schema.
    pub fn new(taxonomy: Taxonomy) -> Self {
        let validator: Option<Arc<dyn EventValidator>> = if cfg!(debug_assertions) {
            Some(Arc::new(SchemaValidator::new()))
        } else {
            None
        };
        Self {
            taxonomy,
            metrics: DashMap::new(),
            validator,
        }
    }

    /// Replace (or with `None`, disable) the export-time validator.
    pub fn with_validator(mut self, validator: Option<Arc<dyn EventValidator>>) -> Self {
        self.validator = validator;
        self
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn counter(&self, name: &str) -> Result<Arc<Counter>> {
        match self.get_or_create(name, MetricKind::Counter, || {
            Ok(Metric::Counter(Arc::new(Counter::new(name))))
        })? {
            Metric::Counter(c) => Ok(c),
            other => Err(mismatch(name, other.kind(), MetricKind::Counter)),
        }
    }

    pub fn gauge(&self, name: &str) -> Result<Arc<Gauge>> {
        match self.get_or_create(name, MetricKind::Gauge, || {
            Ok(Metric::Gauge(Arc::new(Gauge::new(name))))
        })? {
            Metric::Gauge(g) => Ok(g),
            other => Err(mismatch(name, other.kind(), MetricKind::Gauge)),
        }
    }

    /// Histogram with taxonomy-default buckets.
    pub fn histogram(&self, name: &str) -> Result<Arc<Histogram>> {
        self.histogram_with(name, HistogramOptions::default())
    }

    /// `options` only apply on first construction; later calls return the
    /// stored instance unchanged.
    pub fn histogram_with(&self, name: &str, options: HistogramOptions) -> Result<Arc<Histogram>> {
        match self.get_or_create(name, MetricKind::Histogram, || {
            let h = Histogram::from_taxonomy(name, options.buckets, &self.taxonomy)?;
            Ok(Metric::Histogram(Arc::new(h)))
        })? {
            Metric::Histogram(h) => Ok(h),
            other => Err(mismatch(name, other.kind(), MetricKind::Histogram)),
        }
    }

    fn get_or_create(
        &self,
        name: &str,
        kind: MetricKind,
        make: impl FnOnce() -> Result<Metric>,
    ) -> Result<Metric> {
        if let Some(existing) = self.metrics.get(name) {
            return Ok(existing.value().clone());
        }
        if !self.taxonomy.is_valid_metric_name(name) {
            return Err(MetricsError::UnknownMetric(name.to_string()));
        }

        match self.metrics.entry(name.to_string()) {
            Entry::Occupied(o) => Ok(o.get().clone()),
            Entry::Vacant(v) => {
                let metric = make()?;
                v.insert(metric.clone());
                debug!(metric = %name, %kind, "metric registered");
                Ok(metric)
            }
        }
    }

    /// One event per registered name, ordered by name. Never mutates state.
    pub fn export(&self) -> Vec<MetricsEvent> {
        let now = Utc::now();
        let mut entries: Vec<(String, Metric)> = self
            .metrics
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let events: Vec<MetricsEvent> = entries
            .into_iter()
            .map(|(name, metric)| {
                let unit = self.taxonomy.unit_for(&name);
                MetricsEvent::new(now, name, metric.value()).with_unit(unit)
            })
            .collect();

        if let Some(validator) = &self.validator {
            for ev in &events {
                if let Err(errors) = validator.validate_event(ev) {
                    warn!(metric = %ev.name, ?errors, "exported event violates schema");
                }
            }
        }
        events
    }

    /// Export, then clear.
    pub fn flush(&self) -> Vec<MetricsEvent> {
        let events = self.export();
        self.clear();
        events
    }

    /// Export, hand the events to `on_emit`, then clear. Clearing happens
    /// even when `on_emit` fails or panics; its error is returned afterwards.
    pub fn flush_with<E>(
        &self,
        on_emit: impl FnOnce(&[MetricsEvent]) -> std::result::Result<(), E>,
    ) -> std::result::Result<Vec<MetricsEvent>, E> {
        let events = self.export();
        let _clear = ClearOnDrop(self);
        on_emit(&events)?;
        Ok(events)
    }

    /// Zero every primitive; entries stay registered.
    pub fn clear(&self) {
        for r in self.metrics.iter() {
            r.value().reset();
        }
    }

    /// Registered names, sorted.
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.metrics.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    pub fn kind_of(&self, name: &str) -> Option<MetricKind> {
        self.metrics.get(name).map(|r| r.value().kind())
    }
}

struct ClearOnDrop<'a>(&'a MetricsRegistry);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.clear();
    }
}

fn mismatch(name: &str, existing: MetricKind, requested: MetricKind) -> MetricsError {
    MetricsError::MetricRegistration {
        name: name.to_string(),
        existing,
        requested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::Unit;

    fn registry() -> MetricsRegistry {
        MetricsRegistry::new(
            Taxonomy::empty()
                .with_metric("x", Unit::Count)
                .with_metric("y", Unit::Count)
                .with_metric("lat_ms", Unit::Milliseconds),
        )
    }

    #[test]
    fn factories_are_idempotent() {
        let r = registry();
        let a = r.counter("x").unwrap();
        let b = r.counter("x").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let h1 = r.histogram_with("lat_ms", HistogramOptions::buckets([1.0, 2.0])).unwrap();
        let h2 = r.histogram_with("lat_ms", HistogramOptions::buckets([5.0])).unwrap();
        assert!(Arc::ptr_eq(&h1, &h2));
        assert_eq!(h2.thresholds(), &[1.0, 2.0]);
        assert_eq!(r.metric_count(), 2);
    }

    #[test]
    fn unknown_names_rejected() {
        let r = registry();
        let err = r.gauge("nope").unwrap_err();
        assert_eq!(err.code().as_str(), "UNKNOWN_METRIC");
        assert_eq!(r.metric_count(), 0);
    }

    #[test]
    fn kind_change_rejected() {
        let r = registry();
        r.counter("x").unwrap();
        let err = r.gauge("x").unwrap_err();
        assert_eq!(err.code().as_str(), "METRIC_REGISTRATION");
        assert_eq!(r.kind_of("x"), Some(MetricKind::Counter));
    }

    #[test]
    fn export_is_sorted_and_read_only() {
        let r = registry();
        r.gauge("y").unwrap().set(-3.0);
        r.counter("x").unwrap().inc_by(5.0).unwrap();

        let first = r.export();
        let second = r.export();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].name, "x");
        assert_eq!(first[0].value.as_number(), Some(5.0));
        assert_eq!(first[0].unit, Some(Unit::Count));
        assert_eq!(first[1].value.as_number(), Some(-3.0));
        assert_eq!(second[0].value, first[0].value);
        assert_eq!(first[0].timestamp, first[1].timestamp);
    }

    #[test]
    fn clear_keeps_instances() {
        let r = registry();
        let c = r.counter("x").unwrap();
        c.inc_by(3.0).unwrap();
        r.clear();
        assert_eq!(c.value(), 0.0);
        assert!(Arc::ptr_eq(&c, &r.counter("x").unwrap()));
        assert_eq!(r.metric_names(), vec!["x".to_string()]);
    }

    #[test]
    fn flush_clears_even_when_callback_fails() {
        let r = registry();
        r.counter("x").unwrap().inc_by(2.0).unwrap();
        r.histogram("lat_ms").unwrap().observe(4.0).unwrap();

        let res: std::result::Result<_, &str> = r.flush_with(|events| {
            assert_eq!(events.len(), 2);
            Err("sink down")
        });
        assert_eq!(res.unwrap_err(), "sink down");

        for ev in r.export() {
            match ev.value {
                MetricValue::Number(v) => assert_eq!(v, 0.0),
                MetricValue::Histogram(s) => {
                    assert_eq!(s.count, 0);
                    assert_eq!(s.sum, 0.0);
                }
            }
        }
    }

    #[test]
    fn flush_clears_even_when_callback_panics() {
        let r = registry();
        r.counter("x").unwrap().inc_by(2.0).unwrap();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = r.flush_with(|_| -> std::result::Result<(), ()> { panic!("emit blew up") });
        }));
        assert!(res.is_err());
        assert_eq!(r.counter("x").unwrap().value(), 0.0);
    }

    #[test]
    fn plain_flush_returns_pre_clear_values() {
        let r = registry();
        r.counter("x").unwrap().inc_by(7.0).unwrap();
        let events = r.flush();
        assert_eq!(events[0].value.as_number(), Some(7.0));
        assert_eq!(r.counter("x").unwrap().value(), 0.0);
    }
}
