//! Differ behavior over parsed configurations.

mod common;

use common::TestParser;
use haproxy_dataplane_sync::diff::{DiffRegistry, OpKind};
use haproxy_dataplane_sync::model::ConfigParser;

const CURRENT: &str = "\
defaults
    mode http

frontend web
    bind :80 name http
    acl is_api path_beg /api
    use_backend old if is_api
    default_backend old

backend old
    balance roundrobin
    server s1 10.0.0.1:80 weight 10
";

#[test]
fn test_backend_rename_orders_create_before_rule_before_delete() {
    let parser = TestParser;
    let current = parser.parse(CURRENT).unwrap();
    let desired = parser.parse(&CURRENT.replace("old", "new")).unwrap();

    let registry = DiffRegistry::standard().unwrap();
    let diff = registry.diff(&current, &desired).unwrap();

    let create_backend = diff
        .operations
        .iter()
        .position(|op| op.kind == OpKind::Create && op.section == "backend")
        .expect("backend create present");
    let switch_rule = diff
        .operations
        .iter()
        .position(|op| op.section == "backend_switching_rule")
        .expect("switching rule update present");
    let frontend_update = diff
        .operations
        .iter()
        .position(|op| op.kind == OpKind::Update && op.section == "frontend")
        .expect("frontend update present");
    let delete_backend = diff
        .operations
        .iter()
        .position(|op| op.kind == OpKind::Delete && op.section == "backend")
        .expect("backend delete present");

    // The new backend exists before anything points at it, and the old one
    // goes away last
    assert!(create_backend < switch_rule);
    assert!(create_backend < frontend_update);
    assert!(switch_rule < delete_backend);
    assert!(frontend_update < delete_backend);
    assert_eq!(delete_backend, diff.operations.len() - 1);
}

#[test]
fn test_summary_buckets_match_operations() {
    let parser = TestParser;
    let current = parser.parse(CURRENT).unwrap();
    let desired = parser.parse(&CURRENT.replace("old", "new")).unwrap();

    let registry = DiffRegistry::standard().unwrap();
    let diff = registry.diff(&current, &desired).unwrap();

    assert_eq!(diff.summary.total_operations, diff.operations.len());
    let bucket_total: usize = diff.summary.sections.values().map(|s| s.count()).sum();
    assert_eq!(bucket_total, diff.operations.len());
    assert!(diff.summary.sections["backend"].added.contains(&"new".to_string()));
    assert!(diff.summary.sections["backend"].deleted.contains(&"old".to_string()));
}

#[test]
fn test_diff_of_identical_configs_is_empty() {
    let parser = TestParser;
    let config = parser.parse(CURRENT).unwrap();
    let registry = DiffRegistry::standard().unwrap();
    let diff = registry.diff(&config, &config).unwrap();
    assert!(diff.is_empty());
    assert!(!diff.all_runtime_eligible());
}

#[test]
fn test_only_server_updates_are_runtime_eligible() {
    let parser = TestParser;
    let current = parser.parse(CURRENT).unwrap();
    let desired = parser.parse(&CURRENT.replace("weight 10", "weight 42")).unwrap();

    let registry = DiffRegistry::standard().unwrap();
    let diff = registry.diff(&current, &desired).unwrap();

    assert_eq!(diff.operations.len(), 1);
    assert!(diff.all_runtime_eligible());

    // Add a bind change on top: the flag must drop
    let desired = parser
        .parse(
            &CURRENT
                .replace("weight 10", "weight 42")
                .replace(":80 name http", ":8080 name http"),
        )
        .unwrap();
    let diff = registry.diff(&current, &desired).unwrap();
    assert!(diff.operations.len() > 1);
    assert!(!diff.all_runtime_eligible());
}
