//! Label sets and their canonical map key.
//!
//! Labels are kept in a `BTreeMap` so iteration is always key-sorted; two
//! label sets built independently from the same pairs compare, hash and
//! canonicalize identically regardless of insertion order.

use std::collections::BTreeMap;

use crate::error::{MetricsError, Result};

/// Identifier rule shared by label keys: `^[a-zA-Z_][a-zA-Z0-9_]*$`.
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate one label pair.
pub fn validate_label(key: &str, value: &str) -> Result<()> {
    if !is_valid_label_name(key) {
        return Err(MetricsError::InvalidLabelName(key.to_string()));
    }
    if value.is_empty() {
        return Err(MetricsError::InvalidLabelValue(key.to_string()));
    }
    Ok(())
}

/// An unordered, validated set of label pairs. Empty means the default series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LabelSet {
    pairs: BTreeMap<String, String>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(key, value)` pairs, validating each. Later duplicates win.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Result<Self> {
        let mut set = Self::new();
        for (k, v) in pairs {
            set.insert(k, v)?;
        }
        Ok(set)
    }

    /// Build from an owned map, validating each pair.
    pub fn from_map(map: BTreeMap<String, String>) -> Result<Self> {
        for (k, v) in &map {
            validate_label(k, v)?;
        }
        Ok(Self { pairs: map })
    }

    pub fn insert(&mut self, key: &str, value: &str) -> Result<()> {
        validate_label(key, value)?;
        self.pairs.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.pairs
    }

    /// Canonical key: keys sorted, joined as `k=v,k=v`. Empty set → `""`.
    pub fn canonical_key(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_name_rule() {
        assert!(is_valid_label_name("route"));
        assert!(is_valid_label_name("_internal"));
        assert!(is_valid_label_name("status_2xx"));
        assert!(!is_valid_label_name(""));
        assert!(!is_valid_label_name("2xx"));
        assert!(!is_valid_label_name("bad-name"));
        assert!(!is_valid_label_name("a.b"));
    }

    #[test]
    fn canonical_key_ignores_insertion_order() {
        let a = LabelSet::from_pairs(&[("route", "/x"), ("method", "GET")]).unwrap();
        let b = LabelSet::from_pairs(&[("method", "GET"), ("route", "/x")]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.canonical_key(), "method=GET,route=/x");
        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn empty_set_is_default_series() {
        let s = LabelSet::from_pairs(&[]).unwrap();
        assert!(s.is_empty());
        assert_eq!(s.canonical_key(), "");
    }

    #[test]
    fn rejects_bad_pairs() {
        let err = LabelSet::from_pairs(&[("bad-name", "x")]).unwrap_err();
        assert_eq!(err.code().as_str(), "INVALID_LABEL_NAME");

        let err = LabelSet::from_pairs(&[("route", "")]).unwrap_err();
        assert_eq!(err.code().as_str(), "INVALID_LABEL_VALUE");
    }
}
