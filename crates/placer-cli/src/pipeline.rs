// crates/placer-cli/src/pipeline.rs
// ============================================================================
// Module: CLI Pipeline
// Description: Apply, reset, and revision-show workflows.
// Purpose: Run the full resolve, diff, apply cycle from loaded files.
// Dependencies: placer-config, placer-core, placer-plugins
// ============================================================================

//! ## Overview
//! The apply pipeline is the CLI's core workflow: load the policy directory
//! and user files, resolve every claim, validate, diff against the previous
//! state, and (outside noop mode) drive the plan through the emulated
//! executor, persisting the actual state and a new revision. Real cluster
//! executors belong to the surrounding deployment layer; this binary only
//! ships emulation, so a mutating run requires `--emulate`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use placer_config::ConfigError;
use placer_config::PlacerConfig;
use placer_core::ActualStateStore;
use placer_core::ApiEvent;
use placer_core::Applier;
use placer_core::CancelToken;
use placer_core::EventLog;
use placer_core::ExternalData;
use placer_core::Generation;
use placer_core::Policy;
use placer_core::PolicyError;
use placer_core::PolicyResolution;
use placer_core::PolicyResolver;
use placer_core::ResolveError;
use placer_core::Revision;
use placer_core::RevisionOutcome;
use placer_core::RevisionQuery;
use placer_core::RevisionStore;
use placer_core::StoreError;
use placer_core::Timestamp;
use placer_core::ValidationError;
use placer_core::diff;
use placer_plugins::CodeExecutorRegistry;
use placer_plugins::EmulatedCodeExecutor;
use placer_plugins::ExecutorAccessPolicy;
use placer_plugins::RegistryError;
use std::sync::Arc;
use thiserror::Error;

use crate::loader::FileSecretLoader;
use crate::loader::FileUserLoader;
use crate::loader::LoaderError;
use crate::loader::load_policy_objects;
use crate::state::FileStateStore;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI workflow errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration loading failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Policy or user files failed to load.
    #[error(transparent)]
    Loader(#[from] LoaderError),
    /// Policy assembly failed.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// The resolved state failed referential validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The state store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Resolution aborted.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Executor registration failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The plan mutates state but no executors are available.
    #[error("the plan contains {actions} actions but this binary ships no cluster executors; re-run with --emulate or --noop")]
    NoExecutors {
        /// Number of planned actions.
        actions: usize,
    },
}

// ============================================================================
// SECTION: Options and Summary
// ============================================================================

/// Flags of `placer policy apply`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Plan only; execute nothing, persist nothing.
    pub noop: bool,
    /// Diff against the observed actual state instead of the last revision,
    /// recreating instances that were removed behind the engine's back.
    pub full: bool,
    /// Save a revision even when the plan is empty.
    pub newrevision: bool,
    /// Render debug records in the event log.
    pub verbose: bool,
    /// Execute the plan through the emulated executor.
    pub emulate: bool,
}

/// Result summary of an apply run.
#[derive(Debug, Clone)]
pub struct ApplySummary {
    /// Generation of the saved revision, when one was saved.
    pub revision: Option<Generation>,
    /// Number of planned actions.
    pub planned_actions: usize,
    /// Number of failed actions.
    pub failed_actions: usize,
    /// Total number of claims in the policy.
    pub claims_total: usize,
    /// Number of successfully resolved claims.
    pub claims_resolved: usize,
    /// Event log records projected for display.
    pub events: Vec<ApiEvent>,
}

// ============================================================================
// SECTION: Apply Pipeline
// ============================================================================

/// Runs the resolve, diff, and apply cycle.
///
/// # Errors
///
/// Returns [`CliError`] on load, validation, store, or executor failures.
/// Claim-scoped failures are reported in the summary, not here.
pub fn apply_pipeline(
    config: &PlacerConfig,
    options: &ApplyOptions,
) -> Result<ApplySummary, CliError> {
    let store = FileStateStore::new(&config.data.state_file);

    let objects = load_policy_objects(&config.data.policy_dir)?;
    let generation = store.next_generation()?;
    let policy = Policy::from_objects(generation, objects)?;

    let users = FileUserLoader::load(&config.data.users_file)?;
    let secrets = FileSecretLoader::load(config.data.secrets_file.as_deref())?;
    let external = ExternalData::new(Arc::new(users), Arc::new(secrets));

    let event_log = if options.verbose || config.engine.debug {
        EventLog::with_debug()
    } else {
        EventLog::new()
    };
    let cancel = CancelToken::new();

    let resolver = PolicyResolver::new(&policy, external, event_log.clone())
        .with_max_depth(config.engine.max_depth);
    let desired = resolver.resolve_all_claims(&cancel)?;
    desired.validate(&policy)?;

    let previous = if options.full {
        store.load_actual_state()?
    } else {
        store
            .get_revision(RevisionQuery::Latest)?
            .map_or_else(PolicyResolution::new_actual, |revision| revision.desired)
    };

    let plan = diff(&desired, &previous);
    let claims_total = policy.claims().len();
    let claims_resolved = desired.resolved_claims();

    if options.noop {
        return Ok(ApplySummary {
            revision: None,
            planned_actions: plan.len(),
            failed_actions: 0,
            claims_total,
            claims_resolved,
            events: event_log.as_api_events(),
        });
    }

    if plan.is_empty() && !options.newrevision {
        return Ok(ApplySummary {
            revision: None,
            planned_actions: 0,
            failed_actions: 0,
            claims_total,
            claims_resolved,
            events: event_log.as_api_events(),
        });
    }

    let mut actual = store.load_actual_state()?;
    let (outcomes, success) = if plan.is_empty() {
        (Vec::new(), true)
    } else {
        if !options.emulate {
            return Err(CliError::NoExecutors {
                actions: plan.len(),
            });
        }
        let registry = emulated_registry(&policy)?;
        let mut applier = Applier::new(
            &policy,
            &desired,
            &mut actual,
            &registry,
            event_log.clone(),
            Timestamp::now(),
        );
        let result = applier.apply(&plan, &cancel);
        (result.outcomes, result.success)
    };

    let failed_actions =
        outcomes.iter().filter(|o| o.status == placer_core::ActionStatus::Failed).count();

    store.save_actual_state(&actual)?;
    let revision = Revision {
        generation,
        policy_generation: generation,
        desired,
        applied_actions: outcomes,
        outcome: if plan.is_empty() {
            RevisionOutcome::Noop
        } else if success {
            RevisionOutcome::Success
        } else {
            RevisionOutcome::PartialFailure
        },
    };
    store.save_revision(&revision)?;

    Ok(ApplySummary {
        revision: Some(generation),
        planned_actions: plan.len(),
        failed_actions,
        claims_total,
        claims_resolved,
        events: event_log.as_api_events(),
    })
}

/// Builds a registry serving every policy code type through the emulator.
fn emulated_registry(policy: &Policy) -> Result<CodeExecutorRegistry, RegistryError> {
    let mut registry = CodeExecutorRegistry::new(ExecutorAccessPolicy::allow_all());
    for code_type in policy.code_types() {
        registry.register(code_type, EmulatedCodeExecutor::new())?;
    }
    Ok(registry)
}

// ============================================================================
// SECTION: Reset and Show
// ============================================================================

/// Deletes all persisted state. Returns false when `force` was not given.
///
/// # Errors
///
/// Returns [`CliError`] when removal fails.
pub fn reset_state(config: &PlacerConfig, force: bool) -> Result<bool, CliError> {
    if !force {
        return Ok(false);
    }
    let store = FileStateStore::new(&config.data.state_file);
    store.reset()?;
    Ok(true)
}

/// Loads a revision by query; `None` when the generation does not exist.
///
/// # Errors
///
/// Returns [`CliError`] when the store fails.
pub fn show_revision(
    config: &PlacerConfig,
    query: RevisionQuery,
) -> Result<Option<Revision>, CliError> {
    let store = FileStateStore::new(&config.data.state_file);
    Ok(store.get_revision(query)?)
}
