// crates/placer-core/tests/conflict.rs
// ============================================================================
// Module: Fan-In Conflict Tests
// Description: Multi-claim fan-in with conflicting rendered parameters.
// Purpose: Pin the instance-error semantics and differ behavior on conflict.
// Dependencies: placer-core, serde_json
// ============================================================================

//! Two claims landing on the same component key with different rendered
//! code parameters must mark the instance with an error, keep it in the
//! resolution, surface the conflict in the event log, and produce no differ
//! actions for that instance.

mod common;

use common::*;

use placer_core::ActionKind;
use placer_core::CancelToken;
use placer_core::ComponentInstanceKey;
use placer_core::EventLevel;
use placer_core::EventLog;
use placer_core::PolicyResolution;
use placer_core::PolicyResolver;
use placer_core::diff;
use serde_json::json;

/// Policy where the component's port renders from claim labels, so two
/// differently labeled claims collide on the same instance key.
fn conflicting_objects() -> Vec<placer_core::PolicyObject> {
    vec![
        bundle(
            "db-bundle",
            vec![code_component("pg", "helm", json!({"port": "{{port}}"}))],
        ),
        simple_service("db", "db-bundle", None, "k1"),
        contract("db-contract", "db"),
        cluster("k1"),
        claim("first", "alice", "db", &[("port", "5000")]),
        claim("second", "bob", "db", &[("port", "6000")]),
    ]
}

#[test]
fn conflicting_code_params_mark_the_instance_and_keep_it() {
    let policy = policy(conflicting_objects());
    let external = external_data(vec![user("alice", &[]), user("bob", &[])]);
    let event_log = EventLog::with_debug();
    let resolver = PolicyResolver::new(&policy, external, event_log.clone());

    let resolution = resolver.resolve_all_claims(&CancelToken::new()).expect("resolve");

    let code_key = ComponentInstanceKey::root(NS, "db-contract", "prod", "primary", "db", "k1")
        .with_component("pg");
    let instance = resolution.instance(&code_key.as_string()).expect("instance stays");

    let error = instance.error.as_ref().expect("conflict recorded");
    assert!(error.message.contains("conflicting code parameters"));
    assert_eq!(error.details["code_params_existing"]["port"], json!("5000"));
    assert_eq!(error.details["code_params_new"]["port"], json!("6000"));
    assert_eq!(error.details["diff"]["port"]["existing"], json!("5000"));
    assert_eq!(error.details["diff"]["port"]["new"], json!("6000"));

    // Both claims keep the instance alive despite the conflict.
    assert_eq!(instance.dependency_keys.len(), 2);

    // The conflict surfaces in the event log with its details in debug mode.
    let conflict_records: Vec<_> = event_log
        .records()
        .into_iter()
        .filter(|record| {
            record.level == EventLevel::Error
                && record.message.contains("conflicting code parameters")
        })
        .collect();
    assert_eq!(conflict_records.len(), 1);
    assert!(conflict_records[0].details.is_some());
}

#[test]
fn differ_refuses_to_act_on_errored_instances() {
    let policy = policy(conflicting_objects());
    let external = external_data(vec![user("alice", &[]), user("bob", &[])]);
    let resolver = PolicyResolver::new(&policy, external, EventLog::new());

    let resolution = resolver.resolve_all_claims(&CancelToken::new()).expect("resolve");
    let plan = diff(&resolution, &PolicyResolution::new_actual());

    let code_key = ComponentInstanceKey::root(NS, "db-contract", "prod", "primary", "db", "k1")
        .with_component("pg")
        .as_string();
    assert!(
        plan.actions.iter().all(|action| action.key != code_key),
        "no actions may target the errored instance"
    );

    // The healthy root instance is still created.
    let root_key = ComponentInstanceKey::root(NS, "db-contract", "prod", "primary", "db", "k1")
        .as_string();
    assert!(plan
        .actions
        .iter()
        .any(|action| action.key == root_key && action.kind == ActionKind::CreateInstance));
}
