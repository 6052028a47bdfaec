//! Comparator for `backend` sections.

use crate::diff::sections::split_keys;
use crate::diff::{
    normalize, OpKind, Operation, SectionComparator, PRIO_CREATE_PARENT, PRIO_DELETE_PARENT,
    PRIO_UPDATE,
};
use crate::model::Configuration;

/// Diffs backends by name, attributes only; servers/ACLs/rules have their
/// own comparators.
#[derive(Debug)]
pub struct BackendComparator;

impl SectionComparator for BackendComparator {
    fn section(&self) -> &'static str {
        "backend"
    }

    fn compare(
        &self,
        current: &Configuration,
        desired: &Configuration,
    ) -> anyhow::Result<Vec<Operation>> {
        let (added, removed, common) = split_keys(&current.backends, &desired.backends);
        let mut ops = Vec::new();

        for name in added {
            ops.push(Operation {
                kind: OpKind::Create,
                section: "backend",
                resource_id: name.to_string(),
                payload: normalize::canonical(&desired.backends[name])?,
                priority: PRIO_CREATE_PARENT,
                runtime_eligible: false,
            });
        }
        for name in common {
            if !normalize::canonical_eq(&current.backends[name], &desired.backends[name])? {
                ops.push(Operation {
                    kind: OpKind::Update,
                    section: "backend",
                    resource_id: name.to_string(),
                    payload: normalize::canonical(&desired.backends[name])?,
                    priority: PRIO_UPDATE,
                    runtime_eligible: false,
                });
            }
        }
        for name in removed {
            ops.push(Operation {
                kind: OpKind::Delete,
                section: "backend",
                resource_id: name.to_string(),
                payload: serde_json::json!({}),
                priority: PRIO_DELETE_PARENT,
                runtime_eligible: false,
            });
        }
        Ok(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Backend, Balance, Mode};

    fn backend(name: &str, algorithm: &str) -> Backend {
        Backend {
            name: name.to_string(),
            mode: Some(Mode::Http),
            balance: Some(Balance {
                algorithm: algorithm.to_string(),
            }),
            ..Backend::default()
        }
    }

    #[test]
    fn test_rename_produces_create_and_delete() {
        let mut current = Configuration::default();
        current
            .backends
            .insert("old".to_string(), backend("old", "roundrobin"));
        let mut desired = Configuration::default();
        desired
            .backends
            .insert("new".to_string(), backend("new", "roundrobin"));

        let ops = BackendComparator.compare(&current, &desired).unwrap();
        assert_eq!(ops.len(), 2);
        let create = ops.iter().find(|op| op.kind == OpKind::Create).unwrap();
        let delete = ops.iter().find(|op| op.kind == OpKind::Delete).unwrap();
        assert_eq!(create.resource_id, "new");
        assert_eq!(create.priority, PRIO_CREATE_PARENT);
        assert_eq!(delete.resource_id, "old");
        assert_eq!(delete.priority, PRIO_DELETE_PARENT);
    }

    #[test]
    fn test_balance_change_updates() {
        let mut current = Configuration::default();
        current
            .backends
            .insert("api".to_string(), backend("api", "roundrobin"));
        let mut desired = Configuration::default();
        desired
            .backends
            .insert("api".to_string(), backend("api", "leastconn"));

        let ops = BackendComparator.compare(&current, &desired).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OpKind::Update);
        assert_eq!(ops[0].payload["balance"]["algorithm"], "leastconn");
    }
}
