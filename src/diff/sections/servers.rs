//! Comparator for `server` lines.
//!
//! Identity is `(backend, name)`. Server updates are the one operation class
//! the runtime API can apply without a reload, so they are flagged
//! runtime-eligible.

use crate::diff::sections::split_keys;
use crate::diff::{
    normalize, OpKind, Operation, SectionComparator, PRIO_CREATE_CHILD, PRIO_DELETE_CHILD,
    PRIO_UPDATE,
};
use crate::model::Configuration;

#[derive(Debug)]
pub struct ServerComparator;

impl SectionComparator for ServerComparator {
    fn section(&self) -> &'static str {
        "server"
    }

    fn compare(
        &self,
        current: &Configuration,
        desired: &Configuration,
    ) -> anyhow::Result<Vec<Operation>> {
        let mut ops = Vec::new();

        for (backend_name, desired_backend) in &desired.backends {
            match current.backends.get(backend_name) {
                None => {
                    // New backend: every server is a create. The deletion of
                    // a removed backend already removes its servers, so the
                    // removed side emits nothing there.
                    for (server_name, server) in &desired_backend.servers {
                        ops.push(Operation {
                            kind: OpKind::Create,
                            section: "server",
                            resource_id: format!("{backend_name}/{server_name}"),
                            payload: normalize::canonical(server)?,
                            priority: PRIO_CREATE_CHILD,
                            runtime_eligible: false,
                        });
                    }
                }
                Some(current_backend) => {
                    let (added, removed, common) =
                        split_keys(&current_backend.servers, &desired_backend.servers);
                    for name in added {
                        ops.push(Operation {
                            kind: OpKind::Create,
                            section: "server",
                            resource_id: format!("{backend_name}/{name}"),
                            payload: normalize::canonical(&desired_backend.servers[name])?,
                            priority: PRIO_CREATE_CHILD,
                            runtime_eligible: false,
                        });
                    }
                    for name in common {
                        if !normalize::canonical_eq(
                            &current_backend.servers[name],
                            &desired_backend.servers[name],
                        )? {
                            ops.push(Operation {
                                kind: OpKind::Update,
                                section: "server",
                                resource_id: format!("{backend_name}/{name}"),
                                payload: normalize::canonical(&desired_backend.servers[name])?,
                                priority: PRIO_UPDATE,
                                runtime_eligible: true,
                            });
                        }
                    }
                    for name in removed {
                        ops.push(Operation {
                            kind: OpKind::Delete,
                            section: "server",
                            resource_id: format!("{backend_name}/{name}"),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Backend, Server};

    fn config(backend: &str, servers: &[(&str, &str, i64)]) -> Configuration {
        let mut be = Backend {
            name: backend.to_string(),
            ..Backend::default()
        };
        for (name, address, weight) in servers {
            be.servers.insert(
                (*name).to_string(),
                Server {
                    name: (*name).to_string(),
                    address: (*address).to_string(),
                    port: Some(80),
                    weight: Some(*weight),
                    ..Server::default()
                },
            );
        }
        let mut cfg = Configuration::default();
        cfg.backends.insert(backend.to_string(), be);
        cfg
    }

    #[test]
    fn test_add_server() {
        let current = config("api", &[("s1", "10.0.0.1", 10)]);
        let desired = config("api", &[("s1", "10.0.0.1", 10), ("s2", "10.0.0.2", 10)]);
        let ops = ServerComparator.compare(&current, &desired).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OpKind::Create);
        assert_eq!(ops[0].resource_id, "api/s2");
        assert!(!ops[0].runtime_eligible);
    }

    #[test]
    fn test_weight_change_is_runtime_eligible() {
        let current = config("api", &[("s1", "10.0.0.1", 10)]);
        let desired = config("api", &[("s1", "10.0.0.1", 20)]);
        let ops = ServerComparator.compare(&current, &desired).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OpKind::Update);
        assert!(ops[0].runtime_eligible);
        assert_eq!(ops[0].payload["weight"], 20);
    }

    #[test]
    fn test_servers_of_new_backend_created() {
        let current = Configuration::default();
        let desired = config("api", &[("s1", "10.0.0.1", 10)]);
        let ops = ServerComparator.compare(&current, &desired).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OpKind::Create);
        assert_eq!(ops[0].priority, PRIO_CREATE_CHILD);
    }

    #[test]
    fn test_servers_of_removed_backend_not_deleted_individually() {
        let current = config("api", &[("s1", "10.0.0.1", 10)]);
        let desired = Configuration::default();
        let ops = ServerComparator.compare(&current, &desired).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn test_removed_server_deleted() {
        let current = config("api", &[("s1", "10.0.0.1", 10), ("s2", "10.0.0.2", 10)]);
        let desired = config("api", &[("s1", "10.0.0.1", 10)]);
        let ops = ServerComparator.compare(&current, &desired).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OpKind::Delete);
        assert_eq!(ops[0].priority, PRIO_DELETE_CHILD);
    }
}
