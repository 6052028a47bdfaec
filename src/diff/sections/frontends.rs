//! Comparator for `frontend` sections.

use crate::diff::sections::split_keys;
use crate::diff::{
    normalize, OpKind, Operation, SectionComparator, PRIO_CREATE_PARENT, PRIO_DELETE_PARENT,
    PRIO_UPDATE,
};
use crate::model::Configuration;

/// Diffs frontends by name. Children (binds, ACLs, rules) are owned by their
/// own comparators; this one covers frontend attributes only.
#[derive(Debug)]
pub struct FrontendComparator;

impl SectionComparator for FrontendComparator {
    fn section(&self) -> &'static str {
        "frontend"
    }

    fn compare(
        &self,
        current: &Configuration,
        desired: &Configuration,
    ) -> anyhow::Result<Vec<Operation>> {
        let (added, removed, common) = split_keys(&current.frontends, &desired.frontends);
        let mut ops = Vec::new();

        for name in added {
            ops.push(Operation {
                kind: OpKind::Create,
                section: "frontend",
                resource_id: name.to_string(),
                payload: normalize::canonical(&desired.frontends[name])?,
                priority: PRIO_CREATE_PARENT,
                runtime_eligible: false,
            });
        }
        for name in common {
            let current_frontend = &current.frontends[name];
            let desired_frontend = &desired.frontends[name];
            if !normalize::canonical_eq(current_frontend, desired_frontend)? {
                ops.push(Operation {
                    kind: OpKind::Update,
                    section: "frontend",
                    resource_id: name.to_string(),
                    payload: normalize::canonical(desired_frontend)?,
                    priority: PRIO_UPDATE,
                    runtime_eligible: false,
                });
            }
        }
        for name in removed {
            ops.push(Operation {
                kind: OpKind::Delete,
                section: "frontend",
                resource_id: name.to_string(),
                payload: serde_json::json!({}),
                priority: PRIO_DELETE_PARENT,
                runtime_eligible: false,
            });
        }
        Ok(ops)
    }
}
