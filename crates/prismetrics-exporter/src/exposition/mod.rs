//! Prometheus exposition: the adapter plus the bucket-replay helper it uses.

pub mod exporter;
pub mod reconstruct;

pub use exporter::{
    compose_series_name, is_valid_series_name, ExporterOptions, ExporterStats, PrometheusExporter,
};
pub use reconstruct::{synthetic_observations, Observation};
