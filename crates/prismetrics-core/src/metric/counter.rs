use crate::error::{MetricsError, Result};

use super::atomic::AtomicF64;

/// Monotonically non-decreasing value; only [`Counter::reset`] lowers it.
#[derive(Debug)]
pub struct Counter {
    name: String,
    value: AtomicF64,
}

impl Counter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: AtomicF64::new(0.0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Increment by 1.
    pub fn inc(&self) {
        self.value.add(1.0);
    }

    /// Increment by `delta`. Negative or non-finite deltas are rejected and
    /// leave the value untouched.
    pub fn inc_by(&self, delta: f64) -> Result<()> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(MetricsError::InvalidDelta {
                name: self.name.clone(),
                delta,
            });
        }
        self.value.add(delta);
        Ok(())
    }

    pub fn value(&self) -> f64 {
        self.value.get()
    }

    pub fn reset(&self) {
        self.value.set(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_accumulate() {
        let c = Counter::new("http_requests");
        c.inc();
        c.inc_by(2.5).unwrap();
        c.inc_by(0.0).unwrap();
        assert_eq!(c.value(), 3.5);
    }

    #[test]
    fn negative_delta_rejected_without_change() {
        let c = Counter::new("http_requests");
        c.inc_by(4.0).unwrap();
        let err = c.inc_by(-1.0).unwrap_err();
        assert_eq!(err.code().as_str(), "INVALID_DELTA");
        assert_eq!(c.value(), 4.0);

        assert!(c.inc_by(f64::NAN).is_err());
        assert!(c.inc_by(f64::INFINITY).is_err());
        assert_eq!(c.value(), 4.0);
    }

    #[test]
    fn reset_returns_to_zero() {
        let c = Counter::new("http_requests");
        c.inc_by(10.0).unwrap();
        c.reset();
        assert_eq!(c.value(), 0.0);
    }
}
