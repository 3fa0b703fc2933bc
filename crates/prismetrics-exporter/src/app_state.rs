//! Shared application state for the exporter binary.
//!
//! One `MetricsRegistry` is built here and handed to the exporter; HTTP
//! handlers reach both through `AppState`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use prismetrics_core::error::Result;
use prismetrics_core::{MetricsRegistry, Taxonomy};

use crate::config::ExporterConfig;
use crate::exposition::PrometheusExporter;

/// Counter bumped on every `/metrics` scrape.
pub const SCRAPES_METRIC: &str = "metrics_scrapes";

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ExporterConfig,
    registry: Arc<MetricsRegistry>,
    exporter: Arc<PrometheusExporter>,
    draining: AtomicBool,
}

impl AppState {
    /// Build state over a fresh registry with the built-in taxonomy.
    /// Returns Result so main can handle errors gracefully (no panic).
    pub fn new(cfg: ExporterConfig) -> Result<Self> {
        Self::with_registry(cfg, Arc::new(MetricsRegistry::new(Taxonomy::builtin())))
    }

    pub fn with_registry(cfg: ExporterConfig, registry: Arc<MetricsRegistry>) -> Result<Self> {
        let exporter = Arc::new(PrometheusExporter::new(
            Arc::clone(&registry),
            cfg.exporter.options(),
        )?);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                exporter,
                draining: AtomicBool::new(false),
            }),
        })
    }

    pub fn cfg(&self) -> &ExporterConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> Arc<MetricsRegistry> {
        Arc::clone(&self.inner.registry)
    }

    pub fn exporter(&self) -> Arc<PrometheusExporter> {
        Arc::clone(&self.inner.exporter)
    }

    /// Mark draining state.
    pub fn set_draining(&self) {
        self.inner.draining.store(true, Ordering::Relaxed);
    }

    /// Return whether draining is active.
    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Relaxed)
    }

    /// Count the scrape, then render the last refreshed snapshot.
    pub fn scrape(&self) -> Result<String> {
        // Taxonomies without the scrape counter simply skip counting.
        if let Ok(c) = self.inner.registry.counter(SCRAPES_METRIC) {
            c.inc();
        }
        self.inner.exporter.get_metrics()
    }
}
