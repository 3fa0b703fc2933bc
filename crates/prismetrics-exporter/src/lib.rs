//! prismetrics exporter library entry.
//!
//! This crate wires a `MetricsRegistry` into Prometheus exposition: the
//! adapter that mirrors registry snapshots into Prometheus collectors, the
//! refresh scheduler that drives it, signal-driven shutdown, strict YAML
//! config, and the HTTP ops surface. It is consumed by the binary
//! (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod exposition;
pub mod ops;
pub mod refresh;
pub mod router;
