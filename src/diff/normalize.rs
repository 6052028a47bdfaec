//! # Canonical Normalization
//!
//! Marshals section values into the canonical API-shaped JSON form used for
//! structural comparison and operation payloads.
//!
//! Two differently-shaped inputs (a freshly parsed model and one round-tripped
//! through the API) must compare identically, so normalization strips null
//! fields, lowercases enum-like fields, and relies on `serde_json`'s sorted
//! map keys for insertion-order independence.

use serde::Serialize;
use serde_json::{Map, Value};

/// Field names whose values are enum-like at the API layer
///
/// Additions must be deliberate: lowercasing a free-form field (an address,
/// a header format) would corrupt comparisons.
const ENUM_LIKE_FIELDS: &[&str] = &[
    "mode",
    "algorithm",
    "check",
    "backup",
    "ssl",
    "verify",
    "cond",
    "type",
    "redir_type",
];

/// Serialize a value into its canonical comparison form
///
/// # Errors
/// Returns an error when the value cannot be represented as JSON.
pub fn canonical<T: Serialize>(value: &T) -> anyhow::Result<Value> {
    let raw = serde_json::to_value(value)?;
    Ok(normalize_value(raw, None))
}

/// True when two values have the same canonical form
///
/// # Errors
/// Propagates serialization failures from either side.
pub fn canonical_eq<T: Serialize>(a: &T, b: &T) -> anyhow::Result<bool> {
    Ok(canonical(a)? == canonical(b)?)
}

fn normalize_value(value: Value, field: Option<&str>) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, entry) in map {
                if entry.is_null() {
                    continue;
                }
                let normalized = normalize_value(entry, Some(&key));
                out.insert(key, normalized);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| normalize_value(item, None))
                .collect(),
        ),
        Value::String(s) => {
            if field.is_some_and(|f| ENUM_LIKE_FIELDS.contains(&f)) {
                Value::String(s.to_ascii_lowercase())
            } else {
                Value::String(s)
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Server, Switch};
    use serde_json::json;

    #[test]
    fn test_nulls_stripped() {
        let value = json!({"a": 1, "b": null, "c": {"d": null, "e": "x"}});
        let normalized = normalize_value(value, None);
        assert_eq!(normalized, json!({"a": 1, "c": {"e": "x"}}));
    }

    #[test]
    fn test_enum_like_fields_lowercased() {
        let value = json!({"mode": "HTTP", "address": "HOST.example"});
        let normalized = normalize_value(value, None);
        assert_eq!(normalized["mode"], "http");
        // Free-form fields keep their case
        assert_eq!(normalized["address"], "HOST.example");
    }

    #[test]
    fn test_canonical_eq_ignores_unset_optionals() {
        let a = Server {
            name: "s1".to_string(),
            address: "10.0.0.1".to_string(),
            port: Some(80),
            ..Server::default()
        };
        let b = a.clone();
        assert!(canonical_eq(&a, &b).unwrap());
    }

    #[test]
    fn test_canonical_detects_changes() {
        let a = Server {
            name: "s1".to_string(),
            address: "10.0.0.1".to_string(),
            weight: Some(10),
            ..Server::default()
        };
        let mut b = a.clone();
        b.weight = Some(20);
        assert!(!canonical_eq(&a, &b).unwrap());
    }

    #[test]
    fn test_canonical_payload_shape() {
        let server = Server {
            name: "s1".to_string(),
            address: "10.0.0.1".to_string(),
            check: Some(Switch::Enabled),
            ..Server::default()
        };
        let payload = canonical(&server).unwrap();
        assert_eq!(
            payload,
            json!({"name": "s1", "address": "10.0.0.1", "check": "enabled"})
        );
    }
}
