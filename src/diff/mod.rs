//! # Configuration Differ
//!
//! Decomposes two parsed configurations into ordered, typed operations.
//!
//! A registry of per-section comparators produces [`Operation`]s; the
//! aggregator in [`summary`] orders them and computes the diff summary. Each
//! comparator owns one section kind and never touches another section's
//! resources, so comparator results concatenate without overlap.

use crate::model::Configuration;
use serde_json::Value;
use std::fmt;

pub mod normalize;
pub mod sections;
pub mod summary;

pub use summary::{ConfigDiff, DiffSummary, SectionSummary};

/// Priority for creating parent sections (frontends, backends)
pub const PRIO_CREATE_PARENT: u8 = 10;
/// Priority for creating child resources (servers, binds, ACLs, rules)
pub const PRIO_CREATE_CHILD: u8 = 20;
/// Priority for updates of any resource
pub const PRIO_UPDATE: u8 = 30;
/// Priority for deleting child resources
pub const PRIO_DELETE_CHILD: u8 = 40;
/// Priority for deleting parent sections
pub const PRIO_DELETE_PARENT: u8 = 50;

/// What an operation does to its resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Create,
    Update,
    Delete,
}

impl OpKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Create => "create",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One REST operation needed to move the target toward the desired state
///
/// `resource_id` is the resource's natural key, with parent components
/// separated by `/` (e.g. `api/s2` for server `s2` in backend `api`).
/// Executors apply operations in ascending `(priority, section, resource_id)`
/// order; creates of parents run before creates of children, deletes of
/// children before deletes of parents.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OpKind,
    pub section: &'static str,
    pub resource_id: String,
    /// Canonical API-shaped payload; empty object for deletes
    pub payload: Value,
    pub priority: u8,
    /// True only for operation classes known to apply through the runtime
    /// API without a reload. Currently that is server updates alone.
    pub runtime_eligible: bool,
}

impl Operation {
    /// Sort key giving the stable execution order
    #[must_use]
    pub fn order_key(&self) -> (u8, &'static str, &str) {
        (self.priority, self.section, &self.resource_id)
    }

    /// Short human-readable description for logs
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{} {} '{}'", self.kind, self.section, self.resource_id)
    }
}

/// A per-section comparator
///
/// Receives both full configurations and emits the operations for its own
/// section kind only.
pub trait SectionComparator: Send + Sync {
    /// Section name this comparator owns
    fn section(&self) -> &'static str;

    /// Compute the operations for this section
    ///
    /// # Errors
    /// Returns an error only on internal invariant violations, which the
    /// orchestrator surfaces as compare-stage bugs.
    fn compare(&self, current: &Configuration, desired: &Configuration)
        -> anyhow::Result<Vec<Operation>>;
}

/// Section names the differ must cover
pub const SUPPORTED_SECTIONS: &[&str] = &[
    "global",
    "defaults",
    "frontend",
    "backend",
    "server",
    "bind",
    "acl",
    "http_request_rule",
    "backend_switching_rule",
];

/// Registry of section comparators
pub struct DiffRegistry {
    comparators: Vec<Box<dyn SectionComparator>>,
}

impl fmt::Debug for DiffRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sections: Vec<&str> = self.comparators.iter().map(|c| c.section()).collect();
        f.debug_struct("DiffRegistry")
            .field("sections", &sections)
            .finish()
    }
}

impl DiffRegistry {
    /// Build the registry covering every supported section
    ///
    /// # Errors
    /// Returns an error when a supported section has no comparator. This is
    /// a construction-time check so a coverage gap fails at startup instead
    /// of silently skipping a section on every diff.
    pub fn standard() -> anyhow::Result<Self> {
        let registry = Self {
            comparators: vec![
                Box::new(sections::global::GlobalComparator),
                Box::new(sections::defaults::DefaultsComparator),
                Box::new(sections::frontends::FrontendComparator),
                Box::new(sections::backends::BackendComparator),
                Box::new(sections::servers::ServerComparator),
                Box::new(sections::binds::BindComparator),
                Box::new(sections::acls::AclComparator),
                Box::new(sections::http_request_rules::HttpRequestRuleComparator),
                Box::new(sections::backend_switching_rules::BackendSwitchingRuleComparator),
            ],
        };
        registry.verify_coverage()?;
        Ok(registry)
    }

    fn verify_coverage(&self) -> anyhow::Result<()> {
        for section in SUPPORTED_SECTIONS {
            if !self.comparators.iter().any(|c| c.section() == *section) {
                anyhow::bail!("no comparator registered for section '{section}'");
            }
        }
        Ok(())
    }

    /// Compare two configurations into an ordered, summarized diff
    ///
    /// # Errors
    /// Propagates comparator invariant violations.
    pub fn diff(
        &self,
        current: &Configuration,
        desired: &Configuration,
    ) -> anyhow::Result<ConfigDiff> {
        let mut operations = Vec::new();
        for comparator in &self.comparators {
            let mut ops = comparator.compare(current, desired)?;
            operations.append(&mut ops);
        }
        Ok(summary::aggregate(operations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_covers_all_sections() {
        let registry = DiffRegistry::standard().unwrap();
        for section in SUPPORTED_SECTIONS {
            assert!(
                registry.comparators.iter().any(|c| c.section() == *section),
                "missing comparator for {section}"
            );
        }
    }

    #[test]
    fn test_identical_configs_diff_empty() {
        let registry = DiffRegistry::standard().unwrap();
        let config = Configuration::default();
        let diff = registry.diff(&config, &config).unwrap();
        assert!(diff.operations.is_empty());
        assert_eq!(diff.summary.total_operations, 0);
    }

    #[test]
    fn test_operation_describe() {
        let op = Operation {
            kind: OpKind::Create,
            section: "server",
            resource_id: "api/s2".to_string(),
            payload: serde_json::json!({}),
            priority: PRIO_CREATE_CHILD,
            runtime_eligible: false,
        };
        assert_eq!(op.describe(), "create server 'api/s2'");
    }
}
