//! Comparator for `acl` lines.
//!
//! ACLs are positional: identity is `(parent, index)` and a changed line at
//! an index becomes a replace-at-index operation.

use crate::diff::sections::{diff_indexed, indexed_payload, IndexedChange};
use crate::diff::{
    OpKind, Operation, SectionComparator, PRIO_CREATE_CHILD, PRIO_DELETE_CHILD, PRIO_UPDATE,
};
use crate::model::{Acl, Configuration};

#[derive(Debug)]
pub struct AclComparator;

fn compare_parent(
    ops: &mut Vec<Operation>,
    parent_kind: &str,
    parent_name: &str,
    current: &[Acl],
    desired: &[Acl],
) -> anyhow::Result<()> {
    for change in diff_indexed(current, desired)? {
        let op = match change {
            IndexedChange::Create(index) => Operation {
                kind: OpKind::Create,
                section: "acl",
                resource_id: format!("{parent_kind}/{parent_name}/{index}"),
                payload: indexed_payload(&desired[index], index)?,
                priority: PRIO_CREATE_CHILD,
                runtime_eligible: false,
            },
            IndexedChange::Replace(index) => Operation {
                kind: OpKind::Update,
                section: "acl",
                resource_id: format!("{parent_kind}/{parent_name}/{index}"),
                payload: indexed_payload(&desired[index], index)?,
                priority: PRIO_UPDATE,
                runtime_eligible: false,
            },
            IndexedChange::Delete(index) => Operation {
                kind: OpKind::Delete,
                section: "acl",
                resource_id: format!("{parent_kind}/{parent_name}/{index}"),
                payload: serde_json::json!({}),
                priority: PRIO_DELETE_CHILD,
                runtime_eligible: false,
            },
        };
        ops.push(op);
    }
    Ok(())
}

impl SectionComparator for AclComparator {
    fn section(&self) -> &'static str {
        "acl"
    }

    fn compare(
        &self,
        current: &Configuration,
        desired: &Configuration,
    ) -> anyhow::Result<Vec<Operation>> {
        let mut ops = Vec::new();
        static EMPTY: Vec<Acl> = Vec::new();

        for (name, desired_frontend) in &desired.frontends {
            let current_acls = current
                .frontends
                .get(name)
                .map_or(&EMPTY, |frontend| &frontend.acls);
            compare_parent(&mut ops, "frontend", name, current_acls, &desired_frontend.acls)?;
        }
        for (name, desired_backend) in &desired.backends {
            let current_acls = current
                .backends
                .get(name)
                .map_or(&EMPTY, |backend| &backend.acls);
            compare_parent(&mut ops, "backend", name, current_acls, &desired_backend.acls)?;
        }
        Ok(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Frontend;

    fn acl(name: &str, value: &str) -> Acl {
        Acl {
            acl_name: name.to_string(),
            criterion: "path_beg".to_string(),
            value: value.to_string(),
        }
    }

    fn config(acls: Vec<Acl>) -> Configuration {
        let mut cfg = Configuration::default();
        cfg.frontends.insert(
            "web".to_string(),
            Frontend {
                name: "web".to_string(),
                acls,
                ..Frontend::default()
            },
        );
        cfg
    }

    #[test]
    fn test_repositioned_acl_replaces_at_index() {
        let current = config(vec![acl("a", "/a"), acl("b", "/b")]);
        let desired = config(vec![acl("b", "/b"), acl("a", "/a")]);
        let ops = AclComparator.compare(&current, &desired).unwrap();
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|op| op.kind == OpKind::Update));
        assert_eq!(ops[0].resource_id, "frontend/web/0");
        assert_eq!(ops[1].resource_id, "frontend/web/1");
    }

    #[test]
    fn test_appended_acl_created_with_index() {
        let current = config(vec![acl("a", "/a")]);
        let desired = config(vec![acl("a", "/a"), acl("b", "/b")]);
        let ops = AclComparator.compare(&current, &desired).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OpKind::Create);
        assert_eq!(ops[0].payload["index"], 1);
    }

    #[test]
    fn test_acls_of_new_frontend_created() {
        let current = Configuration::default();
        let desired = config(vec![acl("a", "/a")]);
        let ops = AclComparator.compare(&current, &desired).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OpKind::Create);
    }
}
