//! Per-section comparators.
//!
//! Shared discipline: identity by the section's natural key, add/remove by
//! set difference, update by canonical structural inequality, positional
//! children aligned by index.

use crate::diff::normalize;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub mod acls;
pub mod backend_switching_rules;
pub mod backends;
pub mod binds;
pub mod defaults;
pub mod frontends;
pub mod global;
pub mod http_request_rules;
pub mod servers;

/// Key-set difference over two named-resource maps
///
/// Returns `(added, removed, common)` by identity, each sorted by name.
pub(crate) fn split_keys<'a, V>(
    current: &'a BTreeMap<String, V>,
    desired: &'a BTreeMap<String, V>,
) -> (Vec<&'a str>, Vec<&'a str>, Vec<&'a str>) {
    let added = desired
        .keys()
        .filter(|k| !current.contains_key(*k))
        .map(String::as_str)
        .collect();
    let removed = current
        .keys()
        .filter(|k| !desired.contains_key(*k))
        .map(String::as_str)
        .collect();
    let common = desired
        .keys()
        .filter(|k| current.contains_key(*k))
        .map(String::as_str)
        .collect();
    (added, removed, common)
}

/// A positional change within an index-aligned child list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndexedChange {
    Create(usize),
    Replace(usize),
    Delete(usize),
}

/// Align two positional lists and report index-level changes
///
/// Indexes present on both sides compare canonically and differing ones
/// become replacements; a longer desired list creates at the tail, a longer
/// current list deletes at the tail.
pub(crate) fn diff_indexed<T: Serialize>(
    current: &[T],
    desired: &[T],
) -> anyhow::Result<Vec<IndexedChange>> {
    let mut changes = Vec::new();
    let shared = current.len().min(desired.len());
    for index in 0..shared {
        if !normalize::canonical_eq(&current[index], &desired[index])? {
            changes.push(IndexedChange::Replace(index));
        }
    }
    for index in shared..desired.len() {
        changes.push(IndexedChange::Create(index));
    }
    for index in (shared..current.len()).rev() {
        changes.push(IndexedChange::Delete(index));
    }
    Ok(changes)
}

/// Canonical payload with the positional `index` the API expects
pub(crate) fn indexed_payload<T: Serialize>(value: &T, index: usize) -> anyhow::Result<Value> {
    let mut payload = normalize::canonical(value)?;
    if let Value::Object(map) = &mut payload {
        map.insert("index".to_string(), Value::from(index));
    }
    Ok(payload)
}
