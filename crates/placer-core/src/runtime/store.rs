// crates/placer-core/src/runtime/store.rs
// ============================================================================
// Module: In-Memory Stores
// Description: In-memory revision and actual-state stores.
// Purpose: Back tests and local demos without external dependencies.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! These stores implement the persistence interfaces over in-process maps.
//! They are deterministic and safe for concurrent use, but hold nothing
//! across process restarts; production deployments bring their own
//! implementations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::Generation;
use crate::interfaces::ActualStateStore;
use crate::interfaces::Revision;
use crate::interfaces::RevisionQuery;
use crate::interfaces::RevisionStore;
use crate::interfaces::StoreError;
use crate::runtime::resolution::PolicyResolution;

// ============================================================================
// SECTION: In-Memory Revision Store
// ============================================================================

/// In-memory revision store for tests and local demos.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRevisionStore {
    /// Revisions keyed by generation.
    revisions: Arc<Mutex<BTreeMap<Generation, Revision>>>,
}

impl InMemoryRevisionStore {
    /// Creates an empty revision store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the revision map, recovering from poisoned locks.
    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<Generation, Revision>> {
        self.revisions.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl RevisionStore for InMemoryRevisionStore {
    fn get_revision(&self, query: RevisionQuery) -> Result<Option<Revision>, StoreError> {
        let guard = self.lock();
        let revision = match query {
            RevisionQuery::Latest => guard.values().next_back().cloned(),
            RevisionQuery::Exact(generation) => guard.get(&generation).cloned(),
        };
        Ok(revision)
    }

    fn save_revision(&self, revision: &Revision) -> Result<(), StoreError> {
        self.lock().insert(revision.generation, revision.clone());
        Ok(())
    }

    fn next_generation(&self) -> Result<Generation, StoreError> {
        let guard = self.lock();
        Ok(guard
            .keys()
            .next_back()
            .map_or(Generation::FIRST, |generation| generation.next()))
    }
}

// ============================================================================
// SECTION: In-Memory Actual State Store
// ============================================================================

/// In-memory actual-state store for tests and local demos.
#[derive(Debug, Default, Clone)]
pub struct InMemoryActualStateStore {
    /// Last saved actual state.
    state: Arc<Mutex<Option<PolicyResolution>>>,
}

impl InMemoryActualStateStore {
    /// Creates an empty actual-state store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActualStateStore for InMemoryActualStateStore {
    fn load_actual_state(&self) -> Result<PolicyResolution, StoreError> {
        let guard = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(guard.clone().unwrap_or_else(PolicyResolution::new_actual))
    }

    fn save_actual_state(&self, state: &PolicyResolution) -> Result<(), StoreError> {
        let mut guard = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(state.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::RevisionOutcome;

    /// Builds a revision for a generation.
    fn revision(generation: u64) -> Revision {
        Revision {
            generation: Generation::new(generation),
            policy_generation: Generation::FIRST,
            desired: PolicyResolution::new_desired(),
            applied_actions: Vec::new(),
            outcome: RevisionOutcome::Success,
        }
    }

    #[test]
    fn latest_returns_the_highest_generation() {
        let store = InMemoryRevisionStore::new();
        store.save_revision(&revision(1)).expect("save");
        store.save_revision(&revision(3)).expect("save");
        store.save_revision(&revision(2)).expect("save");

        let latest = store
            .get_revision(RevisionQuery::Latest)
            .expect("query")
            .expect("present");
        assert_eq!(latest.generation, Generation::new(3));
    }

    #[test]
    fn missing_generation_is_none_not_an_error() {
        let store = InMemoryRevisionStore::new();
        let found = store
            .get_revision(RevisionQuery::Exact(Generation::new(9)))
            .expect("query");
        assert!(found.is_none());
    }

    #[test]
    fn next_generation_starts_at_first_and_increments() {
        let store = InMemoryRevisionStore::new();
        assert_eq!(store.next_generation().expect("next"), Generation::FIRST);

        store.save_revision(&revision(1)).expect("save");
        assert_eq!(store.next_generation().expect("next"), Generation::new(2));
    }

    #[test]
    fn actual_state_defaults_to_empty() {
        let store = InMemoryActualStateStore::new();
        let state = store.load_actual_state().expect("load");
        assert!(state.component_instances.is_empty());
        assert!(!state.is_desired());
    }
}
