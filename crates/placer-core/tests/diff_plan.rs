// crates/placer-core/tests/diff_plan.rs
// ============================================================================
// Module: Differ Tests
// Description: Ordered action plans from desired/previous resolution pairs.
// Purpose: Pin idempotence, ordering, and field-delta semantics.
// Dependencies: placer-core, serde_json
// ============================================================================

//! Differ scenarios: empty diffs for identical states, creations in
//! processing order with attaches, reverse-order deletions, and field-delta
//! updates for changed parameters.

mod common;

use common::*;

use placer_core::ActionKind;
use placer_core::CancelToken;
use placer_core::ComponentInstanceKey;
use placer_core::EventLog;
use placer_core::FieldDelta;
use placer_core::PolicyResolution;
use placer_core::PolicyResolver;
use placer_core::diff;
use serde_json::json;

/// Resolves a two-level service chain (`web` depends on `db`).
fn resolve_chain(claims: Vec<placer_core::PolicyObject>) -> PolicyResolution {
    let mut objects = vec![
        bundle("db-bundle", vec![code_component("pg", "helm", json!({"image": "pg:16"}))]),
        simple_service("db", "db-bundle", None, "k1"),
        contract("db-contract", "db"),
        bundle(
            "web-bundle",
            vec![
                code_component("frontend", "helm", json!({"image": "web:1"})),
                service_component("db-ref", "db", &[]),
            ],
        ),
        simple_service("web", "web-bundle", None, "k1"),
        contract("web-contract", "web"),
        cluster("k1"),
    ];
    objects.extend(claims);
    let policy = policy(objects);
    let external = external_data(vec![user("alice", &[])]);
    let resolver = PolicyResolver::new(&policy, external, EventLog::new());
    resolver.resolve_all_claims(&CancelToken::new()).expect("resolve")
}

#[test]
fn diffing_a_state_against_itself_is_empty() {
    let desired = resolve_chain(vec![claim("need-web", "alice", "web", &[])]);
    let plan = diff(&desired, &desired);
    assert!(plan.is_empty(), "unexpected actions: {:?}", plan.actions);
}

#[test]
fn creations_follow_processing_order_with_attaches_after_each_create() {
    let desired = resolve_chain(vec![claim("need-web", "alice", "web", &[])]);
    let plan = diff(&desired, &PolicyResolution::new_actual());

    // Creations appear in processing order.
    let created: Vec<&str> = plan
        .actions
        .iter()
        .filter(|action| action.kind == ActionKind::CreateInstance)
        .map(|action| action.key.as_str())
        .collect();
    let expected: Vec<&String> = desired.processing_order().iter().collect();
    assert_eq!(created.len(), expected.len());
    for (created_key, expected_key) in created.iter().zip(expected) {
        assert_eq!(created_key, &expected_key.as_str());
    }

    // Each attach directly targets a previously created instance.
    let mut seen: Vec<&str> = Vec::new();
    for action in &plan.actions {
        match &action.kind {
            ActionKind::CreateInstance => seen.push(&action.key),
            ActionKind::AttachDependency {
                ..
            } => {
                assert!(seen.contains(&action.key.as_str()), "attach before create");
            }
            _ => panic!("unexpected action in a create-only plan: {action:?}"),
        }
    }

    // Creations are non-idempotent; attaches are retry-safe.
    for action in &plan.actions {
        match action.kind {
            ActionKind::CreateInstance => assert!(!action.idempotent),
            _ => assert!(action.idempotent),
        }
    }
}

#[test]
fn emptying_all_claims_deletes_dependents_before_dependencies() {
    let previous = resolve_chain(vec![claim("need-web", "alice", "web", &[])]);
    let desired = resolve_chain(Vec::new());

    let plan = diff(&desired, &previous);

    let deleted: Vec<&str> = plan
        .actions
        .iter()
        .filter(|action| action.kind == ActionKind::DeleteInstance)
        .map(|action| action.key.as_str())
        .collect();

    // Deletions run in reverse processing order, so the web root goes
    // before anything it depends on.
    let reversed: Vec<&str> =
        previous.processing_order().iter().rev().map(String::as_str).collect();
    assert_eq!(deleted, reversed);

    let web_root =
        ComponentInstanceKey::root(NS, "web-contract", "prod", "primary", "web", "k1")
            .as_string();
    let db_root =
        ComponentInstanceKey::root(NS, "db-contract", "prod", "primary", "db", "k1").as_string();
    let web_pos = deleted.iter().position(|key| *key == web_root).expect("web deleted");
    let db_pos = deleted.iter().position(|key| *key == db_root).expect("db deleted");
    assert!(web_pos < db_pos, "dependents must be deleted before dependencies");

    // Every delete is preceded by the detach of its claims.
    for (index, action) in plan.actions.iter().enumerate() {
        if let ActionKind::DetachDependency {
            ..
        } = action.kind
        {
            let delete_pos = plan.actions[index ..]
                .iter()
                .position(|later| {
                    later.key == action.key && later.kind == ActionKind::DeleteInstance
                })
                .expect("detach must be followed by its delete");
            assert!(delete_pos > 0);
        }
    }
}

#[test]
fn changed_code_params_emit_an_update_with_the_field_delta() {
    let previous = resolve_chain(vec![claim("need-web", "alice", "web", &[])]);

    // Same topology, but the frontend image changes.
    let mut objects = vec![
        bundle("db-bundle", vec![code_component("pg", "helm", json!({"image": "pg:16"}))]),
        simple_service("db", "db-bundle", None, "k1"),
        contract("db-contract", "db"),
        bundle(
            "web-bundle",
            vec![
                code_component("frontend", "helm", json!({"image": "web:2"})),
                service_component("db-ref", "db", &[]),
            ],
        ),
        simple_service("web", "web-bundle", None, "k1"),
        contract("web-contract", "web"),
        cluster("k1"),
    ];
    objects.push(claim("need-web", "alice", "web", &[]));
    let policy = policy(objects);
    let external = external_data(vec![user("alice", &[])]);
    let resolver = PolicyResolver::new(&policy, external, EventLog::new());
    let desired = resolver.resolve_all_claims(&CancelToken::new()).expect("resolve");

    let plan = diff(&desired, &previous);

    let frontend_key =
        ComponentInstanceKey::root(NS, "web-contract", "prod", "primary", "web", "k1")
            .with_component("frontend")
            .as_string();
    let update = plan
        .actions
        .iter()
        .find(|action| matches!(action.kind, ActionKind::UpdateInstance { .. }))
        .expect("one update expected");
    assert_eq!(update.key, frontend_key);
    assert_eq!(
        update.kind,
        ActionKind::UpdateInstance {
            delta: FieldDelta {
                code_params: true,
                ..FieldDelta::default()
            },
        }
    );

    // Nothing else changed, so the plan carries exactly that one action.
    assert_eq!(plan.len(), 1);
}

#[test]
fn new_claim_on_existing_instances_emits_attaches_only() {
    let previous = resolve_chain(vec![claim("need-web", "alice", "web", &[])]);
    let desired = resolve_chain(vec![
        claim("need-web", "alice", "web", &[]),
        claim("need-web-again", "alice", "web", &[]),
    ]);

    let plan = diff(&desired, &previous);

    assert!(!plan.is_empty());
    for action in &plan.actions {
        assert!(
            matches!(action.kind, ActionKind::AttachDependency { .. }),
            "expected only attaches, got {action:?}"
        );
        match &action.kind {
            ActionKind::AttachDependency {
                claim_id,
                ..
            } => assert_eq!(claim_id, "main/need-web-again"),
            _ => unreachable!(),
        }
    }
}
