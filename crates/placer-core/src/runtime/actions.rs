// crates/placer-core/src/runtime/actions.rs
// ============================================================================
// Module: Action Plan
// Description: Ordered reconciliation actions emitted by the differ.
// Purpose: Describe the transition from previous to desired state.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! An action plan is the ordered list of instance transitions the apply
//! shell executes: create, update (with a field delta), delete, and
//! dependency attach/detach. Every action carries a retry hint; the differ
//! marks creations non-idempotent because executors may allocate external
//! names, while the remaining actions converge on the target state and can
//! be retried safely.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Field Delta
// ============================================================================

/// Fields that differ between the desired and previous instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDelta {
    /// Calculated labels differ.
    #[serde(default)]
    pub labels: bool,
    /// Calculated code parameters differ.
    #[serde(default)]
    pub code_params: bool,
    /// Calculated discovery parameters differ.
    #[serde(default)]
    pub discovery_params: bool,
    /// Plugin data differs.
    #[serde(default)]
    pub plugin_data: bool,
    /// Outgoing edges differ.
    #[serde(default)]
    pub edges: bool,
}

impl FieldDelta {
    /// Returns true when no field differs.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.labels
            || self.code_params
            || self.discovery_params
            || self.plugin_data
            || self.edges)
    }
}

// ============================================================================
// SECTION: Actions
// ============================================================================

/// Kind of transition applied to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    /// Create the instance on its target cluster.
    CreateInstance,
    /// Update the instance in place.
    UpdateInstance {
        /// Fields that changed.
        delta: FieldDelta,
    },
    /// Destroy the instance on its target cluster.
    DeleteInstance,
    /// Record a claim as depending on the instance.
    AttachDependency {
        /// Claim identifier.
        claim_id: String,
        /// Resolution depth of the dependency.
        depth: u32,
    },
    /// Remove a claim's dependency on the instance.
    DetachDependency {
        /// Claim identifier.
        claim_id: String,
    },
}

/// Single reconciliation action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Serialized key of the affected instance.
    pub key: String,
    /// Transition kind.
    #[serde(flatten)]
    pub kind: ActionKind,
    /// Retry hint: true when re-running the action is safe.
    pub idempotent: bool,
}

impl Action {
    /// Builds a create action (non-idempotent).
    #[must_use]
    pub fn create(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: ActionKind::CreateInstance,
            idempotent: false,
        }
    }

    /// Builds an update action (idempotent).
    #[must_use]
    pub fn update(key: impl Into<String>, delta: FieldDelta) -> Self {
        Self {
            key: key.into(),
            kind: ActionKind::UpdateInstance {
                delta,
            },
            idempotent: true,
        }
    }

    /// Builds a delete action (idempotent).
    #[must_use]
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: ActionKind::DeleteInstance,
            idempotent: true,
        }
    }

    /// Builds an attach action (idempotent).
    #[must_use]
    pub fn attach(key: impl Into<String>, claim_id: impl Into<String>, depth: u32) -> Self {
        Self {
            key: key.into(),
            kind: ActionKind::AttachDependency {
                claim_id: claim_id.into(),
                depth,
            },
            idempotent: true,
        }
    }

    /// Builds a detach action (idempotent).
    #[must_use]
    pub fn detach(key: impl Into<String>, claim_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: ActionKind::DetachDependency {
                claim_id: claim_id.into(),
            },
            idempotent: true,
        }
    }
}

// ============================================================================
// SECTION: Action Plan
// ============================================================================

/// Ordered reconciliation plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    /// Actions in execution order.
    pub actions: Vec<Action>,
}

impl ActionPlan {
    /// Returns true when the plan contains no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns the number of actions in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Result of executing one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// The action applied successfully.
    Success,
    /// The action failed; its instance stops processing.
    Failed,
    /// The action was skipped (earlier failure on the instance, errored
    /// instance, or cancellation).
    Skipped,
}

/// Recorded outcome of one executed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// The executed action.
    pub action: Action,
    /// Execution status.
    pub status: ActionStatus,
    /// Execution duration in milliseconds.
    pub duration_ms: u64,
    /// Failure message when the action failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
