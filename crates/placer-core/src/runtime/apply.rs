// crates/placer-core/src/runtime/apply.rs
// ============================================================================
// Module: Apply Shell
// Description: Drive an action plan through the code-executor registry.
// Purpose: Converge actual state toward desired state, one action at a time.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The apply shell walks the plan sequentially. The first failure on an
//! instance stops further actions for that instance; unrelated instances
//! keep applying. Every action's status and duration lands in the event
//! log and in the returned outcomes, which are persisted with the revision.
//! Executors are dispatched by the component's code type through the
//! injected registry; the shell itself never talks to clusters.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::time::Instant;

use crate::core::Cluster;
use crate::core::EventLog;
use crate::core::Policy;
use crate::core::Timestamp;
use crate::interfaces::CancelToken;
use crate::interfaces::PluginRegistry;
use crate::runtime::actions::Action;
use crate::runtime::actions::ActionKind;
use crate::runtime::actions::ActionOutcome;
use crate::runtime::actions::ActionPlan;
use crate::runtime::actions::ActionStatus;
use crate::runtime::instance::ComponentInstance;
use crate::runtime::resolution::PolicyResolution;

// ============================================================================
// SECTION: Apply Result
// ============================================================================

/// Result of applying a plan.
#[derive(Debug, Clone)]
pub struct ApplyResult {
    /// Outcome per action, in plan order.
    pub outcomes: Vec<ActionOutcome>,
    /// True when no action failed.
    pub success: bool,
}

impl ApplyResult {
    /// Returns the number of failed actions.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == ActionStatus::Failed)
            .count()
    }
}

// ============================================================================
// SECTION: Applier
// ============================================================================

/// Sequential plan executor updating the actual state.
pub struct Applier<'a> {
    /// Policy the desired state was computed from.
    policy: &'a Policy,
    /// Desired state driving the plan.
    desired: &'a PolicyResolution,
    /// Actual state converged by the plan.
    actual: &'a mut PolicyResolution,
    /// Code-executor registry.
    plugins: &'a dyn PluginRegistry,
    /// Event log receiving per-action records.
    event_log: EventLog,
    /// Timestamp stamped onto created and updated instances.
    now: Timestamp,
}

impl<'a> Applier<'a> {
    /// Creates an applier over the injected collaborators.
    #[must_use]
    pub fn new(
        policy: &'a Policy,
        desired: &'a PolicyResolution,
        actual: &'a mut PolicyResolution,
        plugins: &'a dyn PluginRegistry,
        event_log: EventLog,
        now: Timestamp,
    ) -> Self {
        Self {
            policy,
            desired,
            actual,
            plugins,
            event_log,
            now,
        }
    }

    /// Applies the plan, stopping per instance on the first failure.
    pub fn apply(&mut self, plan: &ActionPlan, cancel: &CancelToken) -> ApplyResult {
        let mut outcomes = Vec::with_capacity(plan.actions.len());
        let mut failed_keys: BTreeSet<String> = BTreeSet::new();

        for action in &plan.actions {
            if cancel.is_cancelled() {
                outcomes.push(skipped(action, "apply cancelled"));
                continue;
            }
            if failed_keys.contains(&action.key) {
                outcomes.push(skipped(action, "earlier action on this instance failed"));
                continue;
            }

            let started = Instant::now();
            let result = self.execute(action);
            let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            match result {
                Ok(()) => {
                    self.event_log
                        .info(format!("applied: {} ({duration_ms} ms)", describe(action)));
                    outcomes.push(ActionOutcome {
                        action: action.clone(),
                        status: ActionStatus::Success,
                        duration_ms,
                        error: None,
                    });
                }
                Err(message) => {
                    self.event_log.error(format!(
                        "failed: {} ({duration_ms} ms): {message}",
                        describe(action)
                    ));
                    failed_keys.insert(action.key.clone());
                    outcomes.push(ActionOutcome {
                        action: action.clone(),
                        status: ActionStatus::Failed,
                        duration_ms,
                        error: Some(message),
                    });
                }
            }
        }

        let success =
            outcomes.iter().all(|outcome| outcome.status != ActionStatus::Failed);
        ApplyResult {
            outcomes,
            success,
        }
    }

    /// Executes one action against the actual state.
    fn execute(&mut self, action: &Action) -> Result<(), String> {
        match &action.kind {
            ActionKind::CreateInstance => self.create_instance(&action.key),
            ActionKind::UpdateInstance {
                ..
            } => self.update_instance(&action.key),
            ActionKind::DeleteInstance => self.delete_instance(&action.key),
            ActionKind::AttachDependency {
                claim_id,
                depth,
            } => self.attach_dependency(&action.key, claim_id, *depth),
            ActionKind::DetachDependency {
                claim_id,
            } => self.detach_dependency(&action.key, claim_id),
        }
    }

    /// Creates an instance and records its endpoints.
    fn create_instance(&mut self, key: &str) -> Result<(), String> {
        let desired = self
            .desired
            .instance(key)
            .ok_or_else(|| format!("instance '{key}' missing from desired state"))?;

        let mut endpoints = BTreeMap::new();
        if desired.is_code {
            let (executor, cluster) = self.executor_for(desired)?;
            endpoints = executor
                .create(desired, &desired.calculated_code_params, cluster, &self.event_log)
                .map_err(|error| error.to_string())?;
        }

        let mut created = desired.clone();
        created.edges_out.clear();
        // Dependencies arrive through the attach actions that follow.
        created.dependency_keys.clear();
        created.created_at = Some(self.now);
        created.updated_at = Some(self.now);
        created.endpoints = endpoints;
        created.endpoints_up_to_date = true;
        self.actual.component_instances.insert(key.to_string(), created);
        Ok(())
    }

    /// Updates an instance in place, preserving its creation time.
    fn update_instance(&mut self, key: &str) -> Result<(), String> {
        let desired = self
            .desired
            .instance(key)
            .ok_or_else(|| format!("instance '{key}' missing from desired state"))?;
        let previous = self
            .actual
            .instance(key)
            .ok_or_else(|| format!("instance '{key}' missing from actual state"))?
            .clone();

        let mut endpoints = previous.endpoints.clone();
        if desired.is_code {
            let (executor, cluster) = self.executor_for(desired)?;
            endpoints = executor
                .update(
                    desired,
                    &previous.calculated_code_params,
                    &desired.calculated_code_params,
                    cluster,
                    &self.event_log,
                )
                .map_err(|error| error.to_string())?;
        }

        let mut updated = desired.clone();
        updated.edges_out.clear();
        updated.dependency_keys = previous.dependency_keys.clone();
        updated.created_at = previous.created_at;
        updated.updated_at = Some(self.now);
        updated.endpoints = endpoints;
        updated.endpoints_up_to_date = true;
        self.actual.component_instances.insert(key.to_string(), updated);
        Ok(())
    }

    /// Destroys an instance and drops it from the actual state.
    fn delete_instance(&mut self, key: &str) -> Result<(), String> {
        let Some(existing) = self.actual.instance(key).cloned() else {
            // Deleting an instance that is already gone is a no-op.
            return Ok(());
        };

        if existing.is_code {
            let (executor, cluster) = self.executor_for(&existing)?;
            executor
                .destroy(&existing, cluster, &self.event_log)
                .map_err(|error| error.to_string())?;
        }

        self.actual.component_instances.remove(key);
        Ok(())
    }

    /// Records a claim dependency on an actual-state instance.
    fn attach_dependency(&mut self, key: &str, claim_id: &str, depth: u32) -> Result<(), String> {
        let instance = self
            .actual
            .component_instances
            .get_mut(key)
            .ok_or_else(|| format!("instance '{key}' missing from actual state"))?;
        instance.add_dependency(claim_id.to_string(), depth);
        // Attach is an observable transition, so the update time advances.
        instance.updated_at = Some(self.now);
        Ok(())
    }

    /// Removes a claim dependency from an actual-state instance.
    fn detach_dependency(&mut self, key: &str, claim_id: &str) -> Result<(), String> {
        let Some(instance) = self.actual.component_instances.get_mut(key) else {
            return Ok(());
        };
        instance.dependency_keys.remove(claim_id);
        instance.updated_at = Some(self.now);
        Ok(())
    }

    /// Resolves the executor and cluster for a code instance.
    fn executor_for(
        &self,
        instance: &ComponentInstance,
    ) -> Result<(&'a dyn crate::interfaces::CodeExecutor, &'a Cluster), String> {
        let key = &instance.key;
        let component = self
            .policy
            .component_for(&key.namespace, &key.service, &key.component)
            .ok_or_else(|| {
                format!("component '{}' not found in policy for instance '{key}'", key.component)
            })?;
        let code = component
            .code
            .as_ref()
            .ok_or_else(|| format!("component '{}' carries no code", key.component))?;

        let executor =
            self.plugins.for_code_type(&code.code_type).map_err(|error| error.to_string())?;
        let cluster = self
            .policy
            .get_cluster(&key.cluster)
            .ok_or_else(|| format!("cluster '{}' not found in policy", key.cluster))?;
        Ok((executor, cluster))
    }
}

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

/// Builds a skipped outcome for an action.
fn skipped(action: &Action, reason: &str) -> ActionOutcome {
    ActionOutcome {
        action: action.clone(),
        status: ActionStatus::Skipped,
        duration_ms: 0,
        error: Some(reason.to_string()),
    }
}

/// Renders a short human-readable form of an action.
fn describe(action: &Action) -> String {
    match &action.kind {
        ActionKind::CreateInstance => format!("create {}", action.key),
        ActionKind::UpdateInstance {
            ..
        } => format!("update {}", action.key),
        ActionKind::DeleteInstance => format!("delete {}", action.key),
        ActionKind::AttachDependency {
            claim_id,
            ..
        } => format!("attach {claim_id} -> {}", action.key),
        ActionKind::DetachDependency {
            claim_id,
        } => format!("detach {claim_id} -> {}", action.key),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_outcomes_carry_their_reason() {
        let action = Action::create("main:c:ctx:alloc:svc:db:k1");
        let outcome = skipped(&action, "earlier action on this instance failed");
        assert_eq!(outcome.status, ActionStatus::Skipped);
        assert_eq!(
            outcome.error.as_deref(),
            Some("earlier action on this instance failed")
        );
    }

    #[test]
    fn describe_renders_the_transition() {
        assert_eq!(describe(&Action::delete("k")), "delete k");
        assert_eq!(describe(&Action::attach("k", "main/claim", 0)), "attach main/claim -> k");
    }
}
