//! Comparator for the `global` section.

use crate::diff::{normalize, OpKind, Operation, SectionComparator, PRIO_UPDATE};
use crate::model::{Configuration, Global};

/// The `global` section always exists on a live instance, so it only ever
/// produces an update.
#[derive(Debug)]
pub struct GlobalComparator;

impl SectionComparator for GlobalComparator {
    fn section(&self) -> &'static str {
        "global"
    }

    fn compare(
        &self,
        current: &Configuration,
        desired: &Configuration,
    ) -> anyhow::Result<Vec<Operation>> {
        let Some(desired_global) = &desired.global else {
            return Ok(Vec::new());
        };
        let current_global = current.global.clone().unwrap_or_else(Global::default);
        if normalize::canonical_eq(&current_global, desired_global)? {
            return Ok(Vec::new());
        }
        Ok(vec![Operation {
            kind: OpKind::Update,
            section: "global",
            resource_id: "global".to_string(),
            payload: normalize::canonical(desired_global)?,
            priority: PRIO_UPDATE,
            runtime_eligible: false,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_desired_global_is_noop() {
        let current = Configuration {
            global: Some(Global {
                maxconn: Some(1024),
                ..Global::default()
            }),
            ..Configuration::default()
        };
        let ops = GlobalComparator
            .compare(&current, &Configuration::default())
            .unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn test_changed_global_updates() {
        let current = Configuration {
            global: Some(Global {
                maxconn: Some(1024),
                ..Global::default()
            }),
            ..Configuration::default()
        };
        let desired = Configuration {
            global: Some(Global {
                maxconn: Some(4096),
                ..Global::default()
            }),
            ..Configuration::default()
        };
        let ops = GlobalComparator.compare(&current, &desired).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OpKind::Update);
        assert_eq!(ops[0].payload["maxconn"], 4096);
    }

    #[test]
    fn test_missing_current_global_still_updates() {
        let desired = Configuration {
            global: Some(Global {
                nbthread: Some(4),
                ..Global::default()
            }),
            ..Configuration::default()
        };
        let ops = GlobalComparator
            .compare(&Configuration::default(), &desired)
            .unwrap();
        assert_eq!(ops.len(), 1);
    }
}
