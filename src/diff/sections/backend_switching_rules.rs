//! Comparator for `use_backend` rules, positional within their frontend.

use crate::diff::sections::{diff_indexed, indexed_payload, IndexedChange};
use crate::diff::{
    OpKind, Operation, SectionComparator, PRIO_CREATE_CHILD, PRIO_DELETE_CHILD, PRIO_UPDATE,
};
use crate::model::{BackendSwitchingRule, Configuration};

#[derive(Debug)]
pub struct BackendSwitchingRuleComparator;

impl SectionComparator for BackendSwitchingRuleComparator {
    fn section(&self) -> &'static str {
        "backend_switching_rule"
    }

    fn compare(
        &self,
        current: &Configuration,
        desired: &Configuration,
    ) -> anyhow::Result<Vec<Operation>> {
        let mut ops = Vec::new();
        static EMPTY: Vec<BackendSwitchingRule> = Vec::new();

        for (name, desired_frontend) in &desired.frontends {
            let current_rules = current
                .frontends
                .get(name)
                .map_or(&EMPTY, |frontend| &frontend.backend_switching_rules);
            for change in diff_indexed(current_rules, &desired_frontend.backend_switching_rules)? {
                let op = match change {
                    IndexedChange::Create(index) => Operation {
                        kind: OpKind::Create,
                        section: "backend_switching_rule",
                        resource_id: format!("{name}/{index}"),
                        payload: indexed_payload(
                            &desired_frontend.backend_switching_rules[index],
                            index,
                        )?,
                        priority: PRIO_CREATE_CHILD,
                        runtime_eligible: false,
                    },
                    IndexedChange::Replace(index) => Operation {
                        kind: OpKind::Update,
                        section: "backend_switching_rule",
                        resource_id: format!("{name}/{index}"),
                        payload: indexed_payload(
                            &desired_frontend.backend_switching_rules[index],
                            index,
                        )?,
                        priority: PRIO_UPDATE,
                        runtime_eligible: false,
                    },
                    IndexedChange::Delete(index) => Operation {
                        kind: OpKind::Delete,
                        section: "backend_switching_rule",
                        resource_id: format!("{name}/{index}"),
                        payload: serde_json::json!({}),
                        priority: PRIO_DELETE_CHILD,
                        runtime_eligible: false,
                    },
                };
                ops.push(op);
            }
        }
        Ok(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Frontend;

    fn rule(backend: &str, test: &str) -> BackendSwitchingRule {
        BackendSwitchingRule {
            name: backend.to_string(),
            cond: Some("if".to_string()),
            cond_test: Some(test.to_string()),
        }
    }

    fn config(rules: Vec<BackendSwitchingRule>) -> Configuration {
        let mut cfg = Configuration::default();
        cfg.frontends.insert(
            "web".to_string(),
            Frontend {
                name: "web".to_string(),
                backend_switching_rules: rules,
                ..Frontend::default()
            },
        );
        cfg
    }

    #[test]
    fn test_retargeted_rule_replaced() {
        let current = config(vec![rule("old", "is_api")]);
        let desired = config(vec![rule("new", "is_api")]);
        let ops = BackendSwitchingRuleComparator
            .compare(&current, &desired)
            .unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OpKind::Update);
        assert_eq!(ops[0].payload["name"], "new");
        assert_eq!(ops[0].resource_id, "web/0");
    }

    #[test]
    fn test_new_rule_created() {
        let current = config(vec![]);
        let desired = config(vec![rule("api", "is_api")]);
        let ops = BackendSwitchingRuleComparator
            .compare(&current, &desired)
            .unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OpKind::Create);
        assert_eq!(ops[0].payload["index"], 0);
    }
}
