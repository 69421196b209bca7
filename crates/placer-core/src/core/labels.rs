// crates/placer-core/src/core/labels.rs
// ============================================================================
// Module: Label Engine
// Description: Immutable label sets and label transformation operations.
// Purpose: Propagate and transform labels through policy resolution.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Labels drive every matching decision in the engine: context and
//! allocation criteria, rule gates, and dynamic names all evaluate over the
//! label set flowing through the resolution tree. `LabelSet` is immutable;
//! every transformation returns a new set, so sibling branches of the
//! resolution never observe each other's changes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Label Operations
// ============================================================================

/// Label transformation applied by contexts, allocations, and components.
///
/// # Invariants
/// - `set` entries are applied before `remove` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelOperations {
    /// Labels to set, overwriting existing values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set: BTreeMap<String, String>,
    /// Label keys to remove after setting.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub remove: BTreeSet<String>,
}

// ============================================================================
// SECTION: Label Set
// ============================================================================

/// Immutable set of string labels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet {
    /// Label key/value pairs.
    labels: BTreeMap<String, String>,
}

impl LabelSet {
    /// Creates an empty label set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a label set from a map.
    #[must_use]
    pub fn from_map(labels: BTreeMap<String, String>) -> Self {
        Self {
            labels,
        }
    }

    /// Returns the underlying label map.
    #[must_use]
    pub const fn as_map(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Returns the value for a label key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Returns the number of labels in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true when the set contains no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Applies a transformation: set entries first, then removals.
    #[must_use]
    pub fn apply(&self, ops: &LabelOperations) -> Self {
        let mut labels = self.labels.clone();
        for (key, value) in &ops.set {
            labels.insert(key.clone(), value.clone());
        }
        for key in &ops.remove {
            labels.remove(key);
        }
        Self {
            labels,
        }
    }

    /// Applies an optional transformation, returning a clone when absent.
    #[must_use]
    pub fn apply_optional(&self, ops: Option<&LabelOperations>) -> Self {
        match ops {
            Some(ops) => self.apply(ops),
            None => self.clone(),
        }
    }

    /// Unions two label sets with right-biased overwrite.
    #[must_use]
    pub fn add_labels(&self, other: &Self) -> Self {
        let mut labels = self.labels.clone();
        for (key, value) in &other.labels {
            labels.insert(key.clone(), value.clone());
        }
        Self {
            labels,
        }
    }
}

impl PartialEq for LabelSet {
    /// Treats an absent map and an empty map as equal.
    fn eq(&self, other: &Self) -> bool {
        if self.labels.is_empty() && other.labels.is_empty() {
            return true;
        }
        self.labels == other.labels
    }
}

impl Eq for LabelSet {}

impl<const N: usize> From<[(&str, &str); N]> for LabelSet {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self {
            labels: pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect(),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_sets_then_removes() {
        let base = LabelSet::from([("env", "dev"), ("team", "core")]);
        let ops = LabelOperations {
            set: [("env".to_string(), "prod".to_string())].into(),
            remove: ["team".to_string()].into(),
        };

        let next = base.apply(&ops);
        assert_eq!(next.get("env"), Some("prod"));
        assert_eq!(next.get("team"), None);

        // The receiver is untouched.
        assert_eq!(base.get("env"), Some("dev"));
        assert_eq!(base.get("team"), Some("core"));
    }

    #[test]
    fn remove_wins_over_set_for_the_same_key() {
        let base = LabelSet::new();
        let ops = LabelOperations {
            set: [("ephemeral".to_string(), "yes".to_string())].into(),
            remove: ["ephemeral".to_string()].into(),
        };
        assert_eq!(base.apply(&ops).get("ephemeral"), None);
    }

    #[test]
    fn add_labels_is_right_biased() {
        let left = LabelSet::from([("env", "dev"), ("team", "core")]);
        let right = LabelSet::from([("env", "prod")]);

        let merged = left.add_labels(&right);
        assert_eq!(merged.get("env"), Some("prod"));
        assert_eq!(merged.get("team"), Some("core"));
    }

    #[test]
    fn empty_sets_are_equal() {
        assert_eq!(LabelSet::new(), LabelSet::from_map(BTreeMap::new()));
    }
}
