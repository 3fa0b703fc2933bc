//! Schema check for the JSON wire form of `MetricsEvent`.
//!
//! Rules:
//! - `timestamp`: ISO-8601 (RFC 3339 profile) string
//! - `name`: non-empty string
//! - `value`: finite number, or `{count, sum, buckets: [{le, count}]}`
//! - `unit` (optional): one of the taxonomy units
//! - `tags` (optional): flat string → string map

use chrono::DateTime;
use serde_json::Value;

use crate::event::MetricsEvent;
use crate::taxonomy::Unit;

/// Validates one wire event; on failure returns every violation found.
pub trait EventValidator: Send + Sync {
    fn validate(&self, event: &Value) -> std::result::Result<(), Vec<String>>;

    fn validate_event(&self, event: &MetricsEvent) -> std::result::Result<(), Vec<String>> {
        match serde_json::to_value(event) {
            Ok(v) => self.validate(&v),
            Err(e) => Err(vec![format!("event is not serializable: {e}")]),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }
}

impl EventValidator for SchemaValidator {
    fn validate(&self, event: &Value) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let Some(obj) = event.as_object() else {
            return Err(vec!["event must be an object".into()]);
        };

        match obj.get("timestamp").and_then(Value::as_str) {
            Some(ts) if DateTime::parse_from_rfc3339(ts).is_ok() => {}
            Some(ts) => errors.push(format!("timestamp {ts:?} is not ISO-8601")),
            None => errors.push("timestamp must be a string".into()),
        }

        match obj.get("name").and_then(Value::as_str) {
            Some(n) if !n.is_empty() => {}
            _ => errors.push("name must be a non-empty string".into()),
        }

        match obj.get("value") {
            Some(Value::Number(n)) if n.as_f64().is_some_and(f64::is_finite) => {}
            Some(Value::Object(_)) => check_summary(&obj["value"], &mut errors),
            _ => errors.push("value must be a finite number or histogram summary".into()),
        }

        if let Some(unit) = obj.get("unit") {
            if !unit.as_str().is_some_and(|u| Unit::parse(u).is_some()) {
                errors.push(format!("unit {unit} is not a known unit"));
            }
        }

        if let Some(tags) = obj.get("tags") {
            match tags.as_object() {
                Some(map) => {
                    for (k, v) in map {
                        if !v.is_string() {
                            errors.push(format!("tag {k:?} must be a string"));
                        }
                    }
                }
                None => errors.push("tags must be an object".into()),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn check_summary(value: &Value, errors: &mut Vec<String>) {
    for field in ["count", "sum"] {
        if !value.get(field).is_some_and(Value::is_number) {
            errors.push(format!("value.{field} must be a number"));
        }
    }
    let Some(buckets) = value.get("buckets").and_then(Value::as_array) else {
        errors.push("value.buckets must be an array".into());
        return;
    };
    for (i, b) in buckets.iter().enumerate() {
        for field in ["le", "count"] {
            if !b.get(field).is_some_and(Value::is_number) {
                errors.push(format!("value.buckets[{i}].{field} must be a number"));
            }
        }
    }
}
