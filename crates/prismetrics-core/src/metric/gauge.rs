use super::atomic::AtomicF64;

/// Arbitrary numeric state. No monotonicity, any sign.
#[derive(Debug)]
pub struct Gauge {
    name: String,
    value: AtomicF64,
}

impl Gauge {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: AtomicF64::new(0.0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set(&self, v: f64) {
        self.value.set(v);
    }

    /// Increment by 1.
    pub fn inc(&self) {
        self.add(1.0);
    }

    /// Decrement by 1.
    pub fn dec(&self) {
        self.sub(1.0);
    }

    /// Add an arbitrary signed delta.
    pub fn add(&self, delta: f64) {
        self.value.add(delta);
    }

    /// Subtract an arbitrary signed delta.
    pub fn sub(&self, delta: f64) {
        self.value.add(-delta);
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
    fn set_add_sub_any_sign() {
        let g = Gauge::new("queue_depth");
        g.set(-3.0);
        assert_eq!(g.value(), -3.0);
        g.add(5.0);
        assert_eq!(g.value(), 2.0);
        g.sub(1.5);
        assert_eq!(g.value(), 0.5);
        // negative deltas flip direction
        g.add(-0.5);
        g.sub(-2.0);
        assert_eq!(g.value(), 2.0);
    }

    #[test]
    fn inc_dec_by_one_and_reset() {
        let g = Gauge::new("active_connections");
        g.inc();
        g.inc();
        g.dec();
        assert_eq!(g.value(), 1.0);
        g.reset();
        assert_eq!(g.value(), 0.0);
    }
}
