//! Prometheus exposition adapter.
//!
//! State machine: uninitialized → initialized. No `prometheus::Registry`
//! exists until the first `refresh()` or `get_metrics()`; `reset()` drops it
//! again. Each refresh pulls one `export()` snapshot from the metrics
//! registry and creates or updates one collector per metric name:
//! - counters and gauges both become Prometheus *gauges* (the registry reports
//!   absolute values, so a `counter` type would misrepresent `clear()`s)
//! - histograms become Prometheus histograms, rebuilt from the summary via
//!   [`synthetic_observations`] on every refresh
//!
//! Default labels are validated at construction and attached to every series
//! through the Prometheus registry's common labels.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prometheus::{Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use serde::Serialize;
use tracing::{debug, info, warn};

use prismetrics_core::error::{MetricsError, Result};
use prismetrics_core::{LabelSet, MetricValue, MetricsEvent, MetricsRegistry};

use super::reconstruct::{expand, synthetic_observations};
use crate::refresh::{RefreshOptions, RefreshScheduler, RefreshTarget};

/// Exposition naming rule: `^[a-zA-Z_:][a-zA-Z0-9_:]*$`.
pub fn is_valid_series_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `{namespace}_{subsystem}_{name}`, skipping empty parts.
pub fn compose_series_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

#[derive(Debug, Clone)]
pub struct ExporterOptions {
    pub namespace: String,
    pub subsystem: String,
    pub default_labels: BTreeMap<String, String>,
}

impl Default for ExporterOptions {
    fn default() -> Self {
        Self {
            namespace: "prismetrics".into(),
            subsystem: "app".into(),
            default_labels: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExporterStats {
    pub refresh_count: u64,
    pub error_count: u64,
    pub last_refresh_time: Option<DateTime<Utc>>,
    /// Distinct series currently registered with Prometheus.
    pub metrics_count: usize,
    /// True while the background scheduler is active. Read from the
    /// scheduler on every `get_stats()` call.
    pub is_refreshing: bool,
    /// Updates skipped because the series exists with another type or schema.
    pub collision_count: u64,
}

enum Collector {
    Gauge {
        vec: GaugeVec,
        label_names: Vec<String>,
    },
    Histogram {
        vec: HistogramVec,
        label_names: Vec<String>,
        thresholds: Vec<f64>,
    },
}

impl Collector {
    fn type_name(&self) -> &'static str {
        match self {
            Collector::Gauge { .. } => "gauge",
            Collector::Histogram { .. } => "histogram",
        }
    }
}

/// Initialized exposition state.
struct Exposition {
    registry: Registry,
    collectors: HashMap<String, Collector>,
    series: BTreeSet<String>,
}

enum Applied {
    Updated,
    Collision,
}

pub struct PrometheusExporter {
    metrics: Arc<MetricsRegistry>,
    options: ExporterOptions,
    default_labels: LabelSet,
    state: Mutex<Option<Exposition>>,
    stats: Mutex<ExporterStats>,
    last_rendered: Mutex<Option<String>>,
    scheduler: RefreshScheduler,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn exposition_err(e: prometheus::Error) -> MetricsError {
    MetricsError::Exposition(e.to_string())
}

impl PrometheusExporter {
    /// Fails fast on malformed default label keys or namespace/subsystem.
    pub fn new(metrics: Arc<MetricsRegistry>, options: ExporterOptions) -> Result<Self> {
        let default_labels = LabelSet::from_map(options.default_labels.clone())?;
        for part in [&options.namespace, &options.subsystem] {
            if !part.is_empty() && !is_valid_series_name(part) {
                return Err(MetricsError::InvalidMetricName(part.clone()));
            }
        }

        Ok(Self {
            metrics,
            options,
            default_labels,
            state: Mutex::new(None),
            stats: Mutex::new(ExporterStats::default()),
            last_rendered: Mutex::new(None),
            scheduler: RefreshScheduler::new(),
        })
    }

    pub fn options(&self) -> &ExporterOptions {
        &self.options
    }

    fn initialize(&self) -> Result<Exposition> {
        let common: HashMap<String, String> = self
            .default_labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let common = (!common.is_empty()).then_some(common);
        let registry = Registry::new_custom(None, common).map_err(exposition_err)?;
        debug!(namespace = %self.options.namespace, "prometheus registry initialized");
        Ok(Exposition {
            registry,
            collectors: HashMap::new(),
            series: BTreeSet::new(),
        })
    }

    fn with_exposition<T>(&self, f: impl FnOnce(&mut Exposition) -> T) -> Result<T> {
        let mut guard = lock(&self.state);
        let exposition = match guard.take() {
            Some(e) => e,
            None => self.initialize()?,
        };
        let exposition = guard.insert(exposition);
        Ok(f(exposition))
    }

    /// Pull one snapshot from the registry and push it into Prometheus.
    ///
    /// A failing metric does not stop the others from being updated; the
    /// first failure is returned wrapped as [`MetricsError::Refresh`].
    ///
    /// Histogram replay is O(total observations) and runs synchronously.
    /// From async code go through [`RefreshTarget::refresh`], which moves
    /// the work onto the blocking pool.
    pub fn refresh(&self) -> Result<()> {
        let events = self.metrics.export();
        self.refresh_events(&events)
    }

    /// Push an already exported snapshot (for example the output of
    /// `MetricsRegistry::flush`) into Prometheus. Same semantics and stats
    /// accounting as [`refresh`](Self::refresh). Event `tags` become
    /// Prometheus labels.
    pub fn refresh_events(&self, events: &[MetricsEvent]) -> Result<()> {
        let outcome = self.with_exposition(|exp| {
            let mut first_err: Option<MetricsError> = None;
            let mut collisions = 0u64;
            for ev in events {
                match self.apply(exp, ev) {
                    Ok(Applied::Updated) => {}
                    Ok(Applied::Collision) => collisions += 1,
                    Err(e) => {
                        warn!(metric = %ev.name, error = %e, "metric export failed");
                        first_err.get_or_insert(e);
                    }
                }
            }
            (first_err, collisions, exp.series.len())
        });

        let mut stats = lock(&self.stats);
        let (first_err, collisions, series) = match outcome {
            Ok(o) => o,
            Err(e) => (Some(e), 0, 0),
        };
        stats.metrics_count = series;
        stats.collision_count += collisions;

        match first_err {
            Some(e) => {
                stats.error_count += 1;
                Err(e.into_refresh())
            }
            None => {
                stats.refresh_count += 1;
                stats.last_refresh_time = Some(Utc::now());
                debug!(metrics = events.len(), series, "metrics refreshed");
                Ok(())
            }
        }
    }

    fn apply(&self, exp: &mut Exposition, ev: &MetricsEvent) -> Result<Applied> {
        if !is_valid_series_name(&ev.name) {
            return Err(MetricsError::InvalidMetricName(ev.name.clone()));
        }
        let tags = LabelSet::from_map(ev.tags.clone().unwrap_or_default())?;
        let label_names: Vec<String> = tags.iter().map(|(k, _)| k.to_string()).collect();
        let label_values: Vec<&str> = tags.iter().map(|(_, v)| v).collect();
        let fq_name =
            compose_series_name(&self.options.namespace, &self.options.subsystem, &ev.name);

        match &ev.value {
            MetricValue::Number(v) => {
                if !exp.collectors.contains_key(&ev.name) {
                    let vec = self.new_gauge(ev, &label_names)?;
                    exp.registry
                        .register(Box::new(vec.clone()))
                        .map_err(exposition_err)?;
                    exp.collectors.insert(
                        ev.name.clone(),
                        Collector::Gauge {
                            vec,
                            label_names: label_names.clone(),
                        },
                    );
                }
                match exp.collectors.get(&ev.name) {
                    Some(Collector::Gauge {
                        vec,
                        label_names: existing,
                    }) if *existing == label_names => {
                        vec.get_metric_with_label_values(&label_values)
                            .map_err(exposition_err)?
                            .set(*v);
                    }
                    other => return Ok(collision(&ev.name, "gauge", other)),
                }
            }
            MetricValue::Histogram(summary) => {
                let thresholds: Vec<f64> = summary.buckets.iter().map(|b| b.le).collect();
                let stale = match exp.collectors.get(&ev.name) {
                    None => true,
                    Some(Collector::Histogram {
                        thresholds: existing,
                        label_names: names,
                        ..
                    }) => *existing != thresholds && *names == label_names,
                    Some(_) => false,
                };
                if stale {
                    if let Some(Collector::Histogram { vec, .. }) = exp.collectors.remove(&ev.name) {
                        debug!(metric = %ev.name, "bucket layout changed, replacing collector");
                        if let Err(e) = exp.registry.unregister(Box::new(vec)) {
                            warn!(
                                metric = %ev.name,
                                error = %e,
                                "failed to unregister stale histogram collector"
                            );
                        }
                    }
                    let vec = self.new_histogram(ev, &label_names, &thresholds)?;
                    exp.registry
                        .register(Box::new(vec.clone()))
                        .map_err(exposition_err)?;
                    exp.collectors.insert(
                        ev.name.clone(),
                        Collector::Histogram {
                            vec,
                            label_names: label_names.clone(),
                            thresholds: thresholds.clone(),
                        },
                    );
                }
                match exp.collectors.get(&ev.name) {
                    Some(Collector::Histogram {
                        vec,
                        label_names: existing,
                        ..
                    }) if *existing == label_names => {
                        vec.reset();
                        let h = vec
                            .get_metric_with_label_values(&label_values)
                            .map_err(exposition_err)?;
                        for v in expand(&synthetic_observations(summary)) {
                            h.observe(v);
                        }
                    }
                    other => return Ok(collision(&ev.name, "histogram", other)),
                }
            }
        }

        exp.series
            .insert(format!("{fq_name}{{{}}}", tags.canonical_key()));
        Ok(Applied::Updated)
    }

    fn help(ev: &MetricsEvent) -> String {
        match ev.unit {
            Some(unit) => format!("{} ({unit})", ev.name),
            None => ev.name.clone(),
        }
    }

    fn new_gauge(&self, ev: &MetricsEvent, label_names: &[String]) -> Result<GaugeVec> {
        let opts = Opts::new(ev.name.clone(), Self::help(ev))
            .namespace(self.options.namespace.clone())
            .subsystem(self.options.subsystem.clone());
        let names: Vec<&str> = label_names.iter().map(String::as_str).collect();
        GaugeVec::new(opts, &names).map_err(exposition_err)
    }

    fn new_histogram(
        &self,
        ev: &MetricsEvent,
        label_names: &[String],
        thresholds: &[f64],
    ) -> Result<HistogramVec> {
        // An empty list would make the client fall back to its own defaults;
        // a lone +Inf leaves just the implicit +Inf bucket.
        let buckets = if thresholds.is_empty() {
            vec![f64::INFINITY]
        } else {
            thresholds.to_vec()
        };
        let opts = HistogramOpts::new(ev.name.clone(), Self::help(ev))
            .namespace(self.options.namespace.clone())
            .subsystem(self.options.subsystem.clone())
            .buckets(buckets);
        let names: Vec<&str> = label_names.iter().map(String::as_str).collect();
        HistogramVec::new(opts, &names).map_err(exposition_err)
    }

    fn render(&self) -> Result<String> {
        let families = self.with_exposition(|exp| exp.registry.gather())?;
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buf)
            .map_err(exposition_err)?;
        String::from_utf8(buf).map_err(|e| MetricsError::Exposition(e.to_string()))
    }

    /// Rendered exposition text. Initializes lazily; does not refresh.
    /// When rendering fails the last successfully rendered text is served.
    pub fn get_metrics(&self) -> Result<String> {
        match self.render() {
            Ok(text) => {
                *lock(&self.last_rendered) = Some(text.clone());
                Ok(text)
            }
            Err(e) => match lock(&self.last_rendered).clone() {
                Some(stale) => {
                    warn!(error = %e, "render failed, serving last snapshot");
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }

    /// Drop all Prometheus state; the next call re-initializes from empty.
    pub fn reset(&self) {
        *lock(&self.state) = None;
        *lock(&self.last_rendered) = None;
        lock(&self.stats).metrics_count = 0;
    }

    pub fn get_stats(&self) -> ExporterStats {
        let mut stats = lock(&self.stats).clone();
        stats.is_refreshing = self.scheduler.is_running();
        stats
    }

    /// The underlying Prometheus registry, if initialized.
    pub fn get_registry(&self) -> Option<Registry> {
        lock(&self.state).as_ref().map(|e| e.registry.clone())
    }

    /// Start the background refresh loop. No-op if already running.
    pub fn start_refresh(self: &Arc<Self>, options: RefreshOptions) {
        let interval_ms = options.interval.as_millis() as u64;
        let target: Arc<dyn RefreshTarget> = self.clone();
        if self.scheduler.start(target, options) {
            info!(interval_ms, "metrics refresh started");
        }
    }

    /// Stop the loop, run one final refresh, and mark the exporter idle.
    /// Safe to call repeatedly or without a prior start.
    pub async fn stop_refresh(&self) {
        if self.scheduler.stop().await {
            info!("metrics refresh stopped");
        }
    }
}

#[async_trait]
impl RefreshTarget for PrometheusExporter {
    async fn refresh(self: Arc<Self>) -> Result<()> {
        tokio::task::spawn_blocking(move || PrometheusExporter::refresh(&self))
            .await
            .map_err(|e| MetricsError::Internal(format!("refresh task failed: {e}")))?
    }
}

fn collision(name: &str, wanted: &'static str, existing: Option<&Collector>) -> Applied {
    warn!(
        metric = %name,
        wanted,
        existing = existing.map(Collector::type_name).unwrap_or("none"),
        "series already registered with a different type or label schema; keeping existing collector"
    );
    Applied::Collision
}
