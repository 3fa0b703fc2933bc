//! Top-level facade crate for prismetrics.
//!
//! Re-exports the core primitives and the exporter library so users can depend on a single crate.

pub mod core {
    pub use prismetrics_core::*;
}

pub mod exporter {
    pub use prismetrics_exporter::*;
}
