//! # Diff Aggregation
//!
//! Orders the concatenated per-section operations and derives the summary
//! callers use to report what changed.

use crate::diff::{OpKind, Operation};
use serde::Serialize;
use std::collections::BTreeMap;

/// Named changes within one section kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl SectionSummary {
    #[must_use]
    pub fn count(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }
}

/// Summary of a configuration diff, bucketed per section kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub total_operations: usize,
    pub sections: BTreeMap<String, SectionSummary>,
}

/// The full result of comparing two configurations
#[derive(Debug, Clone, Default)]
pub struct ConfigDiff {
    /// Operations in stable `(priority, section, resource_id)` order
    pub operations: Vec<Operation>,
    pub summary: DiffSummary,
}

impl ConfigDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// True when every operation can go through the runtime API, which lets
    /// the executor skip the transaction and the reload entirely.
    #[must_use]
    pub fn all_runtime_eligible(&self) -> bool {
        !self.operations.is_empty() && self.operations.iter().all(|op| op.runtime_eligible)
    }
}

/// Order operations and compute the summary
#[must_use]
pub fn aggregate(mut operations: Vec<Operation>) -> ConfigDiff {
    operations.sort_by(|a, b| a.order_key().cmp(&b.order_key()));

    let mut sections: BTreeMap<String, SectionSummary> = BTreeMap::new();
    for op in &operations {
        let bucket = sections.entry(op.section.to_string()).or_default();
        let names = match op.kind {
            OpKind::Create => &mut bucket.added,
            OpKind::Update => &mut bucket.modified,
            OpKind::Delete => &mut bucket.deleted,
        };
        names.push(op.resource_id.clone());
    }

    let summary = DiffSummary {
        total_operations: operations.len(),
        sections,
    };
    ConfigDiff {
        operations,
        summary,
    }
}
