// crates/placer-core/src/runtime/instance.rs
// ============================================================================
// Module: Component Instance
// Description: Per-key aggregate of resolution contributions.
// Purpose: Accumulate labels, parameters, and edges with conflict detection.
// Dependencies: crate::core, crate::runtime::key, serde_json
// ============================================================================

//! ## Overview
//! A component instance aggregates every contribution that touches its key:
//! which claims keep it alive, the union of calculated labels, the rendered
//! code and discovery parameters, outgoing graph edges, and data recorded
//! for plugins. Contributions from different claims must agree on the
//! parameter trees; a mismatch marks the instance with an error but leaves
//! it in the resolution so the differ can refuse to act on it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::json;

use crate::core::ErrorWithDetails;
use crate::core::LabelSet;
use crate::core::NestedParams;
use crate::core::RuleActionResult;
use crate::core::Timestamp;
use crate::runtime::key::ComponentInstanceKey;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Plugin-data key indicating whether ingress traffic is allowed.
pub const ALLOW_INGRESS: &str = "allow_ingress";

// ============================================================================
// SECTION: Instance Error
// ============================================================================

/// Error recorded on an instance without aborting the resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceError {
    /// Human-readable error message.
    pub message: String,
    /// Structured diagnostic details.
    pub details: serde_json::Value,
}

impl From<ErrorWithDetails> for InstanceError {
    fn from(error: ErrorWithDetails) -> Self {
        Self {
            message: error.message,
            details: error.details,
        }
    }
}

// ============================================================================
// SECTION: Component Instance
// ============================================================================

/// Aggregate state of one resolved component instance.
///
/// Desired-state instances carry `edges_out`; actual-state instances carry
/// timestamps and endpoints. The two never mix in one resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInstance {
    /// Canonical instance key.
    pub key: ComponentInstanceKey,
    /// First error that made the instance unusable, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<InstanceError>,
    /// Claims keeping this instance alive, with their resolution depth.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependency_keys: BTreeMap<String, u32>,
    /// True when the instance carries code.
    #[serde(default)]
    pub is_code: bool,
    /// Calculated labels, aggregated over all contributors.
    #[serde(default, skip_serializing_if = "LabelSet::is_empty")]
    pub calculated_labels: LabelSet,
    /// Calculated code parameters; equal across all contributors.
    #[serde(default, skip_serializing_if = "NestedParams::is_empty")]
    pub calculated_code_params: NestedParams,
    /// Calculated discovery parameters; equal across all contributors.
    #[serde(default, skip_serializing_if = "NestedParams::is_empty")]
    pub calculated_discovery_params: NestedParams,
    /// Additional data recorded for plugins.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data_for_plugins: BTreeMap<String, String>,
    /// Outgoing graph edges; desired state only.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub edges_out: BTreeSet<String>,
    /// Creation time; actual state only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    /// Last update time; actual state only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    /// Endpoints last observed from the cluster; actual state only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub endpoints: BTreeMap<String, String>,
    /// True when `endpoints` reflects the latest apply; actual state only.
    #[serde(default)]
    pub endpoints_up_to_date: bool,
}

impl ComponentInstance {
    /// Creates an empty instance for a key.
    #[must_use]
    pub fn new(key: ComponentInstanceKey) -> Self {
        Self {
            key,
            error: None,
            dependency_keys: BTreeMap::new(),
            is_code: false,
            calculated_labels: LabelSet::new(),
            calculated_code_params: NestedParams::new(),
            calculated_discovery_params: NestedParams::new(),
            data_for_plugins: BTreeMap::new(),
            edges_out: BTreeSet::new(),
            created_at: None,
            updated_at: None,
            endpoints: BTreeMap::new(),
            endpoints_up_to_date: false,
        }
    }

    /// Records a claim as keeping this instance alive.
    pub fn add_dependency(&mut self, claim_id: impl Into<String>, depth: u32) {
        self.dependency_keys.insert(claim_id.into(), depth);
    }

    /// Records the ingress verdict computed by the rule gate.
    pub fn add_rule_information(&mut self, result: &RuleActionResult) {
        self.data_for_plugins
            .insert(ALLOW_INGRESS.to_string(), (!result.reject_ingress).to_string());
    }

    /// Merges calculated labels from a contributor.
    pub fn add_labels(&mut self, labels: &LabelSet) {
        // Different contributors routinely arrive with different labels;
        // the union is the calculated set.
        self.calculated_labels = self.calculated_labels.add_labels(labels);
    }

    /// Records code parameters, detecting conflicts with earlier
    /// contributions.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorWithDetails`] with the conflicting trees and their
    /// diff when the parameters differ.
    pub fn add_code_params(&mut self, code_params: &NestedParams) -> Result<(), ErrorWithDetails> {
        if self.calculated_code_params.is_empty() {
            self.calculated_code_params = code_params.clone();
        } else if !self.calculated_code_params.deep_equal(code_params) {
            return Err(ErrorWithDetails::new(
                format!("conflicting code parameters for component instance: {}", self.key),
                json!({
                    "code_params_existing": self.calculated_code_params,
                    "code_params_new": code_params,
                    "diff": self.calculated_code_params.diff(code_params),
                }),
            ));
        }
        Ok(())
    }

    /// Records discovery parameters, detecting conflicts with earlier
    /// contributions.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorWithDetails`] with the conflicting trees and their
    /// diff when the parameters differ.
    pub fn add_discovery_params(
        &mut self,
        discovery_params: &NestedParams,
    ) -> Result<(), ErrorWithDetails> {
        if self.calculated_discovery_params.is_empty() {
            self.calculated_discovery_params = discovery_params.clone();
        } else if !self.calculated_discovery_params.deep_equal(discovery_params) {
            return Err(ErrorWithDetails::new(
                format!(
                    "conflicting discovery parameters for component instance: {}",
                    self.key
                ),
                json!({
                    "discovery_params_existing": self.calculated_discovery_params,
                    "discovery_params_new": discovery_params,
                    "diff": self.calculated_discovery_params.diff(discovery_params),
                }),
            ));
        }
        Ok(())
    }

    /// Records an outgoing graph edge.
    pub fn add_edge_out(&mut self, dst_key: impl Into<String>) {
        self.edges_out.insert(dst_key.into());
    }

    /// Preserves the earliest creation time and the latest update time.
    pub fn update_times(&mut self, created_at: Option<Timestamp>, updated_at: Option<Timestamp>) {
        match (self.created_at, created_at) {
            (None, Some(incoming)) => self.created_at = Some(incoming),
            (Some(current), Some(incoming)) if incoming < current => {
                self.created_at = Some(incoming);
            }
            _ => {}
        }
        match (self.updated_at, updated_at) {
            (None, Some(incoming)) => self.updated_at = Some(incoming),
            (Some(current), Some(incoming)) if incoming > current => {
                self.updated_at = Some(incoming);
            }
            _ => {}
        }
    }

    /// Merges a fully populated contributor into this instance.
    ///
    /// Both sides must be fully populated aggregates; merging into a fresh
    /// instance is an insert, not an append. Conflicts set `self.error` and
    /// stop the merge; the instance stays in the resolution so downstream
    /// passes can refuse to act on it.
    pub fn append(&mut self, other: &Self) {
        for (claim_id, depth) in &other.dependency_keys {
            self.add_dependency(claim_id.clone(), *depth);
        }

        if self.is_code != other.is_code {
            self.error = Some(InstanceError {
                message: format!(
                    "component {} cannot be converted between code and non-code",
                    self.key
                ),
                details: serde_json::Value::Null,
            });
            return;
        }

        self.add_labels(&other.calculated_labels);

        if let Err(error) = self.add_discovery_params(&other.calculated_discovery_params) {
            self.error = Some(error.into());
            return;
        }
        if let Err(error) = self.add_code_params(&other.calculated_code_params) {
            self.error = Some(error.into());
            return;
        }

        for dst_key in &other.edges_out {
            self.add_edge_out(dst_key.clone());
        }

        // Plugin data merges right-wins, except the ingress flag which is
        // permissive only when every contributor allows ingress.
        for (key, value) in &other.data_for_plugins {
            if key == ALLOW_INGRESS {
                let existing =
                    self.data_for_plugins.get(ALLOW_INGRESS).map_or(true, |v| v == "true");
                let incoming = value == "true";
                self.data_for_plugins
                    .insert(ALLOW_INGRESS.to_string(), (existing && incoming).to_string());
            } else {
                self.data_for_plugins.insert(key.clone(), value.clone());
            }
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds an instance for a component key.
    fn instance(component: &str) -> ComponentInstance {
        let key = ComponentInstanceKey::root("main", "c", "ctx", "alloc", "svc", "k1")
            .with_component(component);
        ComponentInstance::new(key)
    }

    #[test]
    fn code_param_conflict_reports_a_diff() {
        let mut left = instance("db");
        left.add_code_params(&json!({"port": 5000}).into()).expect("first");

        let err = left
            .add_code_params(&json!({"port": 6000}).into())
            .expect_err("conflict expected");
        assert_eq!(err.details["code_params_existing"]["port"], json!(5000));
        assert_eq!(err.details["code_params_new"]["port"], json!(6000));
        assert_eq!(err.details["diff"]["port"]["existing"], json!(5000));
    }

    #[test]
    fn append_sets_instance_error_on_conflict_but_keeps_data() {
        let mut left = instance("db");
        left.is_code = true;
        left.add_dependency("main/claim-1", 0);
        left.add_code_params(&json!({"port": 5000}).into()).expect("params");

        let mut right = instance("db");
        right.is_code = true;
        right.add_dependency("main/claim-2", 0);
        right.add_code_params(&json!({"port": 6000}).into()).expect("params");

        left.append(&right);
        assert!(left.error.is_some());
        assert_eq!(left.dependency_keys.len(), 2);
        assert_eq!(left.calculated_code_params, json!({"port": 5000}).into());
    }

    #[test]
    fn allow_ingress_merges_as_boolean_and() {
        let mut left = instance("db");
        left.data_for_plugins.insert(ALLOW_INGRESS.to_string(), "true".to_string());

        let mut denied = instance("db");
        denied.data_for_plugins.insert(ALLOW_INGRESS.to_string(), "false".to_string());

        left.append(&denied);
        assert_eq!(left.data_for_plugins[ALLOW_INGRESS], "false");

        // Once any contributor denies ingress, later grants do not restore it.
        let mut allowed = instance("db");
        allowed.data_for_plugins.insert(ALLOW_INGRESS.to_string(), "true".to_string());
        left.append(&allowed);
        assert_eq!(left.data_for_plugins[ALLOW_INGRESS], "false");
    }

    #[test]
    fn other_plugin_data_keys_merge_right_wins() {
        let mut left = instance("db");
        left.data_for_plugins.insert("zone".to_string(), "a".to_string());

        let mut right = instance("db");
        right.data_for_plugins.insert("zone".to_string(), "b".to_string());

        left.append(&right);
        assert_eq!(left.data_for_plugins["zone"], "b");
    }

    #[test]
    fn update_times_preserves_creation_and_advances_updates() {
        let mut inst = instance("db");
        inst.update_times(Some(Timestamp::Logical(10)), Some(Timestamp::Logical(10)));
        inst.update_times(Some(Timestamp::Logical(5)), Some(Timestamp::Logical(20)));

        assert_eq!(inst.created_at, Some(Timestamp::Logical(5)));
        assert_eq!(inst.updated_at, Some(Timestamp::Logical(20)));

        inst.update_times(Some(Timestamp::Logical(7)), Some(Timestamp::Logical(15)));
        assert_eq!(inst.created_at, Some(Timestamp::Logical(5)));
        assert_eq!(inst.updated_at, Some(Timestamp::Logical(20)));
    }
}
