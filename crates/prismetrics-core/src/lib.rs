//! prismetrics core: metric primitives, the metrics registry, and the
//! wire-shaped events it exports.
//!
//! This crate owns the in-process state of every metric and the error surface
//! shared with the exporter. It carries no async runtime or
//! exposition-library dependencies so it can be embedded anywhere.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `MetricsError`/`Result` so recording a metric
//! can never take down the host process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod error;
pub mod event;
pub mod labels;
pub mod metric;
pub mod registry;
pub mod taxonomy;
pub mod validate;

/// Error types shared with the exporter; see [`error`].
pub use error::{ErrorCode, MetricsError, Result};
pub use event::{MetricValue, MetricsEvent};
pub use labels::LabelSet;
pub use metric::{BucketCount, Counter, Gauge, Histogram, HistogramSummary, MetricKind};
pub use registry::{HistogramOptions, MetricsRegistry};
pub use taxonomy::{Taxonomy, Unit};
pub use validate::{EventValidator, SchemaValidator};
