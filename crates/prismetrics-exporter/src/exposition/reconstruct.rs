//! Cumulative buckets → synthetic raw observations.
//!
//! The Prometheus client only accepts raw `observe()` calls and derives its own
//! buckets from them. To mirror a registry summary we replay, per threshold
//! `le_i` with cumulative count `c_i`, exactly `c_i - c_(i-1)` observations
//! valued at `le_i` (inclusive upper bound, so each lands in its own bucket).
//! Observations above the top threshold (`count - c_last`) are replayed at
//! the mean of the residual sum when that lies above the top threshold,
//! otherwise just above it.
//!
//! Bucket counts and `_count` come out exact. `_sum` is exact only when there
//! are no thresholds; otherwise it is boundary-weighted and approximate.

use prismetrics_core::HistogramSummary;

/// `repeat` observations of `value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub value: f64,
    pub repeat: u64,
}

/// Run-length list of observations reproducing `summary`'s buckets and count.
pub fn synthetic_observations(summary: &HistogramSummary) -> Vec<Observation> {
    let mut out = Vec::with_capacity(summary.buckets.len() + 1);
    let mut prev = 0u64;
    let mut bucketed_sum = 0.0;

    for b in &summary.buckets {
        let fresh = b.count.saturating_sub(prev);
        if fresh > 0 {
            out.push(Observation {
                value: b.le,
                repeat: fresh,
            });
            bucketed_sum += b.le * fresh as f64;
        }
        prev = prev.max(b.count);
    }

    let overflow = summary.count.saturating_sub(prev);
    if overflow > 0 {
        let residual_mean = (summary.sum - bucketed_sum) / overflow as f64;
        let value = match summary.buckets.last() {
            None => residual_mean,
            Some(top) if residual_mean > top.le => residual_mean,
            Some(top) => top.le + top.le.abs().max(1.0),
        };
        out.push(Observation {
            value,
            repeat: overflow,
        });
    }
    out
}

/// Expanded form, one value per observation.
pub fn expand(observations: &[Observation]) -> impl Iterator<Item = f64> + '_ {
    observations
        .iter()
        .flat_map(|o| std::iter::repeat(o.value).take(o.repeat as usize))
}
