//! Cumulative-bucket histogram with optional per-label-set state.
//!
//! Every series (the unlabeled one plus one per distinct label set) tracks a
//! running count, a running sum, and one cumulative counter per threshold.
//! Observing `v` bumps every threshold `le >= v`, so for thresholds
//! `b1 < b2` we always have `count(b1) <= count(b2) <= total count`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};
use crate::labels::LabelSet;
use crate::taxonomy::Taxonomy;

/// One cumulative bucket of a summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketCount {
    pub le: f64,
    pub count: u64,
}

/// Immutable snapshot of one histogram series. Buckets ascend by `le`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub buckets: Vec<BucketCount>,
}

impl HistogramSummary {
    pub fn empty(thresholds: &[f64]) -> Self {
        Self {
            count: 0,
            sum: 0.0,
            buckets: thresholds
                .iter()
                .map(|&le| BucketCount { le, count: 0 })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct SeriesState {
    count: u64,
    sum: f64,
    // aligned with Histogram::thresholds
    cumulative: Vec<u64>,
}

impl SeriesState {
    fn new(buckets: usize) -> Self {
        Self {
            count: 0,
            sum: 0.0,
            cumulative: vec![0; buckets],
        }
    }

    fn observe(&mut self, thresholds: &[f64], value: f64) {
        self.count += 1;
        self.sum += value;
        for (slot, &le) in self.cumulative.iter_mut().zip(thresholds) {
            if value <= le {
                *slot += 1;
            }
        }
    }

    fn summary(&self, thresholds: &[f64]) -> HistogramSummary {
        HistogramSummary {
            count: self.count,
            sum: self.sum,
            buckets: thresholds
                .iter()
                .zip(&self.cumulative)
                .map(|(&le, &count)| BucketCount { le, count })
                .collect(),
        }
    }
}

#[derive(Debug)]
struct HistogramState {
    unlabeled: SeriesState,
    labeled: HashMap<String, SeriesState>,
}

#[derive(Debug)]
pub struct Histogram {
    name: String,
    thresholds: Vec<f64>,
    state: Mutex<HistogramState>,
}

impl Histogram {
    /// Build with explicit thresholds. They are sorted and deduplicated once
    /// here; non-finite thresholds are rejected.
    pub fn with_buckets(name: impl Into<String>, mut thresholds: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if let Some(bad) = thresholds.iter().find(|b| !b.is_finite()) {
            return Err(MetricsError::InvalidBuckets {
                reason: format!("threshold {bad} is not finite"),
                name,
            });
        }
        thresholds.sort_by(f64::total_cmp);
        thresholds.dedup();

        let state = HistogramState {
            unlabeled: SeriesState::new(thresholds.len()),
            labeled: HashMap::new(),
        };
        Ok(Self {
            name,
            thresholds,
            state: Mutex::new(state),
        })
    }

    /// Explicit thresholds win; otherwise the taxonomy's duration ladder for
    /// this name; otherwise no buckets (count and sum only).
    pub fn from_taxonomy(
        name: impl Into<String>,
        thresholds: Option<Vec<f64>>,
        taxonomy: &Taxonomy,
    ) -> Result<Self> {
        let name = name.into();
        let thresholds = thresholds
            .or_else(|| taxonomy.default_buckets_for_name(&name))
            .unwrap_or_default();
        Self::with_buckets(name, thresholds)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    fn lock(&self) -> MutexGuard<'_, HistogramState> {
        // A poisoned lock only means another recorder panicked mid-update;
        // counters stay usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_value(&self, value: f64) -> Result<()> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(MetricsError::InvalidValue {
                name: self.name.clone(),
                value,
            })
        }
    }

    /// Record into the unlabeled series.
    pub fn observe(&self, value: f64) -> Result<()> {
        self.check_value(value)?;
        self.lock().unlabeled.observe(&self.thresholds, value);
        Ok(())
    }

    /// Record into the series for `labels`. Empty labels hit the unlabeled
    /// series; a new label set gets zeroed state on first use.
    pub fn observe_with_labels(&self, value: f64, labels: &[(&str, &str)]) -> Result<()> {
        let labels = LabelSet::from_pairs(labels)?;
        self.observe_labeled(value, &labels)
    }

    pub fn observe_labeled(&self, value: f64, labels: &LabelSet) -> Result<()> {
        if labels.is_empty() {
            return self.observe(value);
        }
        self.check_value(value)?;

        let buckets = self.thresholds.len();
        let mut state = self.lock();
        state
            .labeled
            .entry(labels.canonical_key())
            .or_insert_with(|| SeriesState::new(buckets))
            .observe(&self.thresholds, value);
        Ok(())
    }

    /// Snapshot of the unlabeled series.
    pub fn summary(&self) -> HistogramSummary {
        self.lock().unlabeled.summary(&self.thresholds)
    }

    /// Snapshot for one label set; a never-observed set reads as empty.
    pub fn summary_for_labels(&self, labels: &LabelSet) -> HistogramSummary {
        if labels.is_empty() {
            return self.summary();
        }
        self.lock()
            .labeled
            .get(&labels.canonical_key())
            .map(|s| s.summary(&self.thresholds))
            .unwrap_or_else(|| HistogramSummary::empty(&self.thresholds))
    }

    /// All labeled snapshots keyed by canonical label key.
    pub fn labeled_summaries(&self) -> BTreeMap<String, HistogramSummary> {
        self.lock()
            .labeled
            .iter()
            .map(|(k, s)| (k.clone(), s.summary(&self.thresholds)))
            .collect()
    }

    /// Zero the unlabeled series and drop every labeled one.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.unlabeled = SeriesState::new(self.thresholds.len());
        state.labeled.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(s: &HistogramSummary) -> Vec<(f64, u64)> {
        s.buckets.iter().map(|b| (b.le, b.count)).collect()
    }

    #[test]
    fn cumulative_buckets() {
        let h = Histogram::with_buckets("lat", vec![10.0, 50.0, 100.0]).unwrap();
        for v in [5.0, 25.0, 75.0] {
            h.observe(v).unwrap();
        }
        let s = h.summary();
        assert_eq!(s.count, 3);
        assert_eq!(s.sum, 105.0);
        assert_eq!(counts(&s), vec![(10.0, 1), (50.0, 2), (100.0, 3)]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let h = Histogram::with_buckets("lat", vec![10.0, 50.0]).unwrap();
        h.observe(10.0).unwrap();
        assert_eq!(counts(&h.summary()), vec![(10.0, 1), (50.0, 1)]);
    }

    #[test]
    fn values_above_top_threshold_only_count() {
        let h = Histogram::with_buckets("lat", vec![10.0]).unwrap();
        h.observe(500.0).unwrap();
        let s = h.summary();
        assert_eq!(s.count, 1);
        assert_eq!(s.buckets[0].count, 0);
    }

    #[test]
    fn thresholds_sorted_once() {
        let h = Histogram::with_buckets("lat", vec![100.0, 10.0, 50.0, 10.0]).unwrap();
        assert_eq!(h.thresholds(), &[10.0, 50.0, 100.0]);
        assert!(Histogram::with_buckets("lat", vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn taxonomy_defaults() {
        let tax = Taxonomy::builtin();
        let h = Histogram::from_taxonomy("http_request_duration_ms", None, &tax).unwrap();
        assert!(!h.thresholds().is_empty());

        let h = Histogram::from_taxonomy("payload_size_bytes", None, &tax).unwrap();
        assert!(h.thresholds().is_empty());
        h.observe(12.0).unwrap();
        assert_eq!(h.summary().count, 1);

        let h = Histogram::from_taxonomy("http_request_duration_ms", Some(vec![1.0]), &tax).unwrap();
        assert_eq!(h.thresholds(), &[1.0]);
    }

    #[test]
    fn labeled_series_are_independent() {
        let h = Histogram::with_buckets("lat", vec![10.0]).unwrap();
        h.observe_with_labels(5.0, &[("route", "/a")]).unwrap();
        h.observe_with_labels(20.0, &[("route", "/a")]).unwrap();
        h.observe_with_labels(1.0, &[("route", "/b")]).unwrap();
        h.observe_with_labels(3.0, &[]).unwrap();

        assert_eq!(h.summary().count, 1);

        let a = LabelSet::from_pairs(&[("route", "/a")]).unwrap();
        let sa = h.summary_for_labels(&a);
        assert_eq!(sa.count, 2);
        assert_eq!(sa.sum, 25.0);
        assert_eq!(sa.buckets[0].count, 1);

        let all = h.labeled_summaries();
        assert_eq!(all.keys().cloned().collect::<Vec<_>>(), vec!["route=/a", "route=/b"]);

        let unseen = LabelSet::from_pairs(&[("route", "/c")]).unwrap();
        assert_eq!(h.summary_for_labels(&unseen).count, 0);
    }

    #[test]
    fn bad_label_or_value_rejected() {
        let h = Histogram::with_buckets("lat", vec![10.0]).unwrap();
        let err = h.observe_with_labels(1.0, &[("bad-name", "x")]).unwrap_err();
        assert_eq!(err.code().as_str(), "INVALID_LABEL_NAME");
        assert!(h.observe(f64::NAN).is_err());
        assert_eq!(h.summary().count, 0);
    }

    #[test]
    fn reset_clears_everything() {
        let h = Histogram::with_buckets("lat", vec![10.0]).unwrap();
        h.observe(1.0).unwrap();
        h.observe_with_labels(1.0, &[("route", "/a")]).unwrap();
        h.reset();
        assert_eq!(h.summary(), HistogramSummary::empty(&[10.0]));
        assert!(h.labeled_summaries().is_empty());
    }
}
