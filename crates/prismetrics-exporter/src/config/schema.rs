use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use prismetrics_core::error::{MetricsError, Result};
use prismetrics_core::LabelSet;

use crate::exposition::{is_valid_series_name, ExporterOptions};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub exporter: ExporterSection,
}

impl ExporterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MetricsError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.exporter.validate()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterSection {
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_subsystem")]
    pub subsystem: String,

    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    #[serde(default)]
    pub default_labels: BTreeMap<String, String>,
}

impl Default for ExporterSection {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            subsystem: default_subsystem(),
            refresh_interval_ms: default_refresh_interval_ms(),
            default_labels: BTreeMap::new(),
        }
    }
}

impl ExporterSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=3_600_000).contains(&self.refresh_interval_ms) {
            return Err(MetricsError::Config(
                "exporter.refresh_interval_ms must be between 100 and 3600000".into(),
            ));
        }
        for (field, value) in [("namespace", &self.namespace), ("subsystem", &self.subsystem)] {
            if !value.is_empty() && !is_valid_series_name(value) {
                return Err(MetricsError::Config(format!(
                    "exporter.{field} {value:?} must match [a-zA-Z_:][a-zA-Z0-9_:]*"
                )));
            }
        }
        // Label errors keep their own code (INVALID_LABEL_NAME / _VALUE).
        LabelSet::from_map(self.default_labels.clone())?;
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn options(&self) -> ExporterOptions {
        ExporterOptions {
            namespace: self.namespace.clone(),
            subsystem: self.subsystem.clone(),
            default_labels: self.default_labels.clone(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:9464".into()
}
fn default_namespace() -> String {
    "prismetrics".into()
}
fn default_subsystem() -> String {
    "app".into()
}
fn default_refresh_interval_ms() -> u64 {
    15_000
}
