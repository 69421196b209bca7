// crates/placer-cli/tests/apply_workflow.rs
// ============================================================================
// Module: CLI Workflow Tests
// Description: Apply, noop, convergence, and reset against temp files.
// Purpose: Pin the end-to-end file-driven workflow of the CLI library.
// Dependencies: placer-cli, placer-config, placer-core, tempfile
// ============================================================================

//! Drives the apply pipeline against a policy directory on disk: noop mode
//! plans without persisting, emulate mode applies and saves a revision, a
//! repeated apply converges to an empty plan, and reset clears the state.

use std::fs;
use std::path::Path;

use placer_cli::ApplyOptions;
use placer_cli::apply_pipeline;
use placer_cli::reset_state;
use placer_cli::show_revision;
use placer_config::PlacerConfig;
use placer_core::Generation;
use placer_core::RevisionOutcome;
use placer_core::RevisionQuery;
use serde_json::json;

/// Writes the fixture workspace: config, policy dir, and users file.
fn write_workspace(dir: &Path) -> PlacerConfig {
    let policy_dir = dir.join("policy");
    fs::create_dir(&policy_dir).expect("mkdir");

    fs::write(
        policy_dir.join("10-bundle.json"),
        json!({
            "metadata": {"namespace": "main", "kind": "bundle", "name": "web-bundle"},
            "components": [
                {
                    "name": "frontend",
                    "code": {"type": "helm", "params": {"image": "web:1"}}
                }
            ]
        })
        .to_string(),
    )
    .expect("write bundle");

    fs::write(
        policy_dir.join("20-service.json"),
        json!({
            "metadata": {"namespace": "main", "kind": "service", "name": "web"},
            "bundle": "web-bundle",
            "contexts": [
                {
                    "name": "prod",
                    "labels": {"set": {"cluster": "k1"}},
                    "allocations": [{"name": "primary"}]
                }
            ]
        })
        .to_string(),
    )
    .expect("write service");

    fs::write(
        policy_dir.join("30-contract.json"),
        json!({
            "metadata": {"namespace": "main", "kind": "contract", "name": "web-contract"},
            "service": "web"
        })
        .to_string(),
    )
    .expect("write contract");

    fs::write(
        policy_dir.join("40-cluster.json"),
        json!({
            "metadata": {"namespace": "system", "kind": "cluster", "name": "k1"},
            "type": "kubernetes"
        })
        .to_string(),
    )
    .expect("write cluster");

    fs::write(
        policy_dir.join("50-claim.json"),
        json!({
            "metadata": {"namespace": "main", "kind": "claim", "name": "need-web"},
            "user": "alice",
            "service": "web"
        })
        .to_string(),
    )
    .expect("write claim");

    fs::write(
        dir.join("users.json"),
        json!([{"id": "alice", "name": "Alice"}]).to_string(),
    )
    .expect("write users");

    fs::write(dir.join("placer.toml"), "").expect("write config");
    PlacerConfig::load(Some(&dir.join("placer.toml"))).expect("load config")
}

#[test]
fn noop_plans_without_persisting_anything() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_workspace(dir.path());

    let summary = apply_pipeline(
        &config,
        &ApplyOptions {
            noop: true,
            ..ApplyOptions::default()
        },
    )
    .expect("noop apply");

    assert_eq!(summary.claims_resolved, 1);
    assert_eq!(
        summary.planned_actions, 4,
        "a create and an attach for both the code instance and the root"
    );
    assert!(summary.revision.is_none());
    assert!(!config.data.state_file.exists());
}

#[test]
fn emulated_apply_saves_a_revision_and_converges() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_workspace(dir.path());

    let options = ApplyOptions {
        emulate: true,
        ..ApplyOptions::default()
    };
    let first = apply_pipeline(&config, &options).expect("first apply");
    assert_eq!(first.revision, Some(Generation::FIRST));
    assert_eq!(first.failed_actions, 0);
    assert!(first.planned_actions > 0);

    let revision = show_revision(&config, RevisionQuery::Latest)
        .expect("query")
        .expect("revision saved");
    assert_eq!(revision.outcome, RevisionOutcome::Success);
    assert_eq!(revision.applied_actions.len(), first.planned_actions);

    // A second run over unchanged inputs has nothing to do.
    let second = apply_pipeline(&config, &options).expect("second apply");
    assert_eq!(second.planned_actions, 0);
    assert!(second.revision.is_none());
}

#[test]
fn mutating_runs_without_emulate_fail_closed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_workspace(dir.path());

    let err = apply_pipeline(&config, &ApplyOptions::default()).expect_err("no executors");
    assert!(err.to_string().contains("--emulate"));
    assert!(!config.data.state_file.exists());
}

#[test]
fn reset_requires_force_and_then_deletes_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_workspace(dir.path());

    apply_pipeline(
        &config,
        &ApplyOptions {
            emulate: true,
            ..ApplyOptions::default()
        },
    )
    .expect("apply");
    assert!(config.data.state_file.exists());

    assert!(!reset_state(&config, false).expect("guarded reset"));
    assert!(config.data.state_file.exists());

    assert!(reset_state(&config, true).expect("forced reset"));
    assert!(!config.data.state_file.exists());
    assert!(show_revision(&config, RevisionQuery::Latest).expect("query").is_none());
}

#[test]
fn unknown_revision_generations_are_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_workspace(dir.path());

    apply_pipeline(
        &config,
        &ApplyOptions {
            emulate: true,
            ..ApplyOptions::default()
        },
    )
    .expect("apply");

    let missing = show_revision(&config, RevisionQuery::Exact(Generation::new(99)))
        .expect("query");
    assert!(missing.is_none());
}
