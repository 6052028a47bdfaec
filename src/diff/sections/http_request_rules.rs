//! Comparator for `http-request` rules, positional within their parent.

use crate::diff::sections::{diff_indexed, indexed_payload, IndexedChange};
use crate::diff::{
    OpKind, Operation, SectionComparator, PRIO_CREATE_CHILD, PRIO_DELETE_CHILD, PRIO_UPDATE,
};
use crate::model::{Configuration, HttpRequestRule};

#[derive(Debug)]
pub struct HttpRequestRuleComparator;

fn compare_parent(
    ops: &mut Vec<Operation>,
    parent_kind: &str,
    parent_name: &str,
    current: &[HttpRequestRule],
    desired: &[HttpRequestRule],
) -> anyhow::Result<()> {
    for change in diff_indexed(current, desired)? {
        let op = match change {
            IndexedChange::Create(index) => Operation {
                kind: OpKind::Create,
                section: "http_request_rule",
                resource_id: format!("{parent_kind}/{parent_name}/{index}"),
                payload: indexed_payload(&desired[index], index)?,
                priority: PRIO_CREATE_CHILD,
                runtime_eligible: false,
            },
            IndexedChange::Replace(index) => Operation {
                kind: OpKind::Update,
                section: "http_request_rule",
                resource_id: format!("{parent_kind}/{parent_name}/{index}"),
                payload: indexed_payload(&desired[index], index)?,
                priority: PRIO_UPDATE,
                runtime_eligible: false,
            },
            IndexedChange::Delete(index) => Operation {
                kind: OpKind::Delete,
                section: "http_request_rule",
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

impl SectionComparator for HttpRequestRuleComparator {
    fn section(&self) -> &'static str {
        "http_request_rule"
    }

    fn compare(
        &self,
        current: &Configuration,
        desired: &Configuration,
    ) -> anyhow::Result<Vec<Operation>> {
        let mut ops = Vec::new();
        static EMPTY: Vec<HttpRequestRule> = Vec::new();

        for (name, desired_frontend) in &desired.frontends {
            let current_rules = current
                .frontends
                .get(name)
                .map_or(&EMPTY, |frontend| &frontend.http_request_rules);
            compare_parent(
                &mut ops,
                "frontend",
                name,
                current_rules,
                &desired_frontend.http_request_rules,
            )?;
        }
        for (name, desired_backend) in &desired.backends {
            let current_rules = current
                .backends
                .get(name)
                .map_or(&EMPTY, |backend| &backend.http_request_rules);
            compare_parent(
                &mut ops,
                "backend",
                name,
                current_rules,
                &desired_backend.http_request_rules,
            )?;
        }
        Ok(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Frontend;

    fn deny_rule(status: i64) -> HttpRequestRule {
        HttpRequestRule {
            rule_type: "deny".to_string(),
            cond: Some("if".to_string()),
            cond_test: Some("is_blocked".to_string()),
            deny_status: Some(status),
            ..HttpRequestRule::default()
        }
    }

    fn config(rules: Vec<HttpRequestRule>) -> Configuration {
        let mut cfg = Configuration::default();
        cfg.frontends.insert(
            "web".to_string(),
            Frontend {
                name: "web".to_string(),
                http_request_rules: rules,
                ..Frontend::default()
            },
        );
        cfg
    }

    #[test]
    fn test_changed_rule_replaced_at_index() {
        let current = config(vec![deny_rule(403)]);
        let desired = config(vec![deny_rule(429)]);
        let ops = HttpRequestRuleComparator.compare(&current, &desired).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OpKind::Update);
        assert_eq!(ops[0].resource_id, "frontend/web/0");
        assert_eq!(ops[0].payload["deny_status"], 429);
    }

    #[test]
    fn test_truncated_rule_list_deletes_tail() {
        let current = config(vec![deny_rule(403), deny_rule(404), deny_rule(405)]);
        let desired = config(vec![deny_rule(403)]);
        let ops = HttpRequestRuleComparator.compare(&current, &desired).unwrap();
        let deletes: Vec<&str> = ops
            .iter()
            .filter(|op| op.kind == OpKind::Delete)
            .map(|op| op.resource_id.as_str())
            .collect();
        assert_eq!(deletes, vec!["frontend/web/2", "frontend/web/1"]);
    }
}
