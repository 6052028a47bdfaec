//! Comparator for the (unnamed) `defaults` section.

use crate::diff::{normalize, OpKind, Operation, SectionComparator, PRIO_UPDATE};
use crate::model::{Configuration, Defaults};

/// Like `global`, the defaults block is replaced in place and never created
/// or deleted as a resource.
#[derive(Debug)]
pub struct DefaultsComparator;

impl SectionComparator for DefaultsComparator {
    fn section(&self) -> &'static str {
        "defaults"
    }

    fn compare(
        &self,
        current: &Configuration,
        desired: &Configuration,
    ) -> anyhow::Result<Vec<Operation>> {
        let Some(desired_defaults) = &desired.defaults else {
            return Ok(Vec::new());
        };
        let current_defaults = current.defaults.clone().unwrap_or_else(Defaults::default);
        if normalize::canonical_eq(&current_defaults, desired_defaults)? {
            return Ok(Vec::new());
        }
        Ok(vec![Operation {
            kind: OpKind::Update,
            section: "defaults",
            resource_id: "defaults".to_string(),
            payload: normalize::canonical(desired_defaults)?,
            priority: PRIO_UPDATE,
            runtime_eligible: false,
        }])
    }
}
