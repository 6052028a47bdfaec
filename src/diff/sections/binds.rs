//! Comparator for `bind` lines. Identity is `(frontend, name)`.

use crate::diff::sections::split_keys;
use crate::diff::{
    normalize, OpKind, Operation, SectionComparator, PRIO_CREATE_CHILD, PRIO_DELETE_CHILD,
    PRIO_UPDATE,
};
use crate::model::Configuration;

#[derive(Debug)]
pub struct BindComparator;

impl SectionComparator for BindComparator {
    fn section(&self) -> &'static str {
        "bind"
    }

    fn compare(
        &self,
        current: &Configuration,
        desired: &Configuration,
    ) -> anyhow::Result<Vec<Operation>> {
        let mut ops = Vec::new();

        for (frontend_name, desired_frontend) in &desired.frontends {
            match current.frontends.get(frontend_name) {
                None => {
                    for (bind_name, bind) in &desired_frontend.binds {
                        ops.push(Operation {
                            kind: OpKind::Create,
                            section: "bind",
                            resource_id: format!("{frontend_name}/{bind_name}"),
                            payload: normalize::canonical(bind)?,
                            priority: PRIO_CREATE_CHILD,
                            runtime_eligible: false,
                        });
                    }
                }
                Some(current_frontend) => {
                    let (added, removed, common) =
                        split_keys(&current_frontend.binds, &desired_frontend.binds);
                    for name in added {
                        ops.push(Operation {
                            kind: OpKind::Create,
                            section: "bind",
                            resource_id: format!("{frontend_name}/{name}"),
                            payload: normalize::canonical(&desired_frontend.binds[name])?,
                            priority: PRIO_CREATE_CHILD,
                            runtime_eligible: false,
                        });
                    }
                    for name in common {
                        if !normalize::canonical_eq(
                            &current_frontend.binds[name],
                            &desired_frontend.binds[name],
                        )? {
                            ops.push(Operation {
                                kind: OpKind::Update,
                                section: "bind",
                                resource_id: format!("{frontend_name}/{name}"),
                                payload: normalize::canonical(&desired_frontend.binds[name])?,
                                priority: PRIO_UPDATE,
                                runtime_eligible: false,
                            });
                        }
                    }
                    for name in removed {
                        ops.push(Operation {
                            kind: OpKind::Delete,
                            section: "bind",
                            resource_id: format!("{frontend_name}/{name}"),
                            payload: serde_json::json!({}),
                            priority: PRIO_DELETE_CHILD,
                            runtime_eligible: false,
                        });
                    }
                }
            }
        }
        Ok(ops)
    }
}
