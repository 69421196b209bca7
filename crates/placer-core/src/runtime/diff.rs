// crates/placer-core/src/runtime/diff.rs
// ============================================================================
// Module: State Differ
// Description: Pair desired and previous resolutions into an action plan.
// Purpose: Emit ordered, deterministic reconciliation actions.
// Dependencies: crate::runtime::{actions, instance, resolution}
// ============================================================================

//! ## Overview
//! The differ pairs the desired resolution against the previously applied
//! one and emits the transition as an ordered plan: creations and updates
//! follow the desired processing order so dependencies exist before their
//! dependents; deletions run in reverse of the previous processing order so
//! dependents disappear before their dependencies. Instances marked with an
//! error produce no actions. Diffing a state against itself yields the
//! empty plan.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::runtime::actions::Action;
use crate::runtime::actions::ActionPlan;
use crate::runtime::actions::FieldDelta;
use crate::runtime::instance::ComponentInstance;
use crate::runtime::resolution::PolicyResolution;

// ============================================================================
// SECTION: Diff
// ============================================================================

/// Computes the ordered action plan turning `previous` into `desired`.
#[must_use]
pub fn diff(desired: &PolicyResolution, previous: &PolicyResolution) -> ActionPlan {
    let mut plan = ActionPlan::default();

    // Creations and updates in desired-side processing order.
    for key in desired.processing_order() {
        let Some(instance) = desired.instance(key) else {
            continue;
        };
        if instance.error.is_some() {
            continue;
        }
        match previous.instance(key) {
            None => emit_create(&mut plan, key, instance),
            Some(existing) => {
                emit_update(&mut plan, key, instance, existing, previous.is_desired());
            }
        }
    }

    // Deletions in reverse previous-side processing order; keys the
    // previous state never ordered (actual state recovered from a store)
    // follow in reverse lexicographic order to keep plans deterministic.
    let mut deletion_keys: Vec<&String> = previous
        .processing_order()
        .iter()
        .rev()
        .filter(|key| previous.instance(key).is_some())
        .collect();
    let mut unordered: Vec<&String> = previous
        .component_instances
        .keys()
        .filter(|key| !previous.processing_order().contains(*key))
        .collect();
    unordered.sort_unstable_by(|a, b| b.cmp(a));
    deletion_keys.extend(unordered);

    for key in deletion_keys {
        if desired.instance(key).is_some() {
            continue;
        }
        let Some(existing) = previous.instance(key) else {
            continue;
        };
        for claim_id in existing.dependency_keys.keys() {
            plan.actions.push(Action::detach(key.clone(), claim_id.clone()));
        }
        plan.actions.push(Action::delete(key.clone()));
    }

    plan
}

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

/// Emits a creation followed by an attach per depending claim.
fn emit_create(plan: &mut ActionPlan, key: &str, instance: &ComponentInstance) {
    plan.actions.push(Action::create(key.to_string()));
    for (claim_id, depth) in &instance.dependency_keys {
        plan.actions.push(Action::attach(key.to_string(), claim_id.clone(), *depth));
    }
}

/// Emits attaches, a field-delta update, and detaches for a surviving
/// instance.
fn emit_update(
    plan: &mut ActionPlan,
    key: &str,
    desired: &ComponentInstance,
    previous: &ComponentInstance,
    compare_edges: bool,
) {
    // Dependency attaches precede the parameter update.
    for (claim_id, depth) in &desired.dependency_keys {
        if !previous.dependency_keys.contains_key(claim_id) {
            plan.actions.push(Action::attach(key.to_string(), claim_id.clone(), *depth));
        }
    }

    let delta = field_delta(desired, previous, compare_edges);
    if !delta.is_empty() {
        plan.actions.push(Action::update(key.to_string(), delta));
    }

    // Detaches follow the inverse order: after the update.
    for claim_id in previous.dependency_keys.keys() {
        if !desired.dependency_keys.contains_key(claim_id) {
            plan.actions.push(Action::detach(key.to_string(), claim_id.clone()));
        }
    }
}

/// Compares the observable fields of two instances.
///
/// Edges only exist on desired-state instances, so they are compared only
/// when the previous side is a desired resolution.
fn field_delta(
    desired: &ComponentInstance,
    previous: &ComponentInstance,
    compare_edges: bool,
) -> FieldDelta {
    FieldDelta {
        labels: desired.calculated_labels != previous.calculated_labels,
        code_params: !desired.calculated_code_params.deep_equal(&previous.calculated_code_params),
        discovery_params: !desired
            .calculated_discovery_params
            .deep_equal(&previous.calculated_discovery_params),
        plugin_data: desired.data_for_plugins != previous.data_for_plugins,
        edges: compare_edges && desired.edges_out != previous.edges_out,
    }
}
