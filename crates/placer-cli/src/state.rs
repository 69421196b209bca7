// crates/placer-cli/src/state.rs
// ============================================================================
// Module: File State Store
// Description: Single-file store for revisions and the actual state.
// Purpose: Persist engine state across CLI invocations.
// Dependencies: placer-core, serde_json
// ============================================================================

//! ## Overview
//! The CLI persists everything into one JSON document: the revision history
//! and the last observed actual state. Writes replace the file through a
//! temporary sibling so a crash never leaves a torn document behind. The
//! store implements the core [`RevisionStore`] and [`ActualStateStore`]
//! interfaces.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use placer_core::ActualStateStore;
use placer_core::Generation;
use placer_core::PolicyResolution;
use placer_core::Revision;
use placer_core::RevisionQuery;
use placer_core::RevisionStore;
use placer_core::StoreError;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: State Document
// ============================================================================

/// Serialized state document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDoc {
    /// Revision history keyed by generation.
    #[serde(default)]
    revisions: BTreeMap<u64, Revision>,
    /// Last observed actual state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    actual: Option<PolicyResolution>,
}

// ============================================================================
// SECTION: File State Store
// ============================================================================

/// Single-file revision and actual-state store.
pub struct FileStateStore {
    /// Path of the state document.
    path: PathBuf,
    /// Serialized writes; reads go to disk every time.
    write_lock: Mutex<()>,
}

impl FileStateStore {
    /// Creates a store over the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the store path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the state document if present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when removal fails.
    pub fn reset(&self) -> Result<(), StoreError> {
        let _guard = self.lock();
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|error| StoreError::Io(error.to_string()))?;
        }
        Ok(())
    }

    /// Reads the state document; absent files yield the empty document.
    fn read_doc(&self) -> Result<StateDoc, StoreError> {
        if !self.path.exists() {
            return Ok(StateDoc::default());
        }
        let raw =
            fs::read_to_string(&self.path).map_err(|error| StoreError::Io(error.to_string()))?;
        serde_json::from_str(&raw).map_err(|error| StoreError::Corrupt(error.to_string()))
    }

    /// Writes the state document through a temporary sibling file.
    fn write_doc(&self, doc: &StateDoc) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(doc)
            .map_err(|error| StoreError::Store(error.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(|error| StoreError::Io(error.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|error| StoreError::Io(error.to_string()))?;
        Ok(())
    }

    /// Acquires the write lock, recovering from poisoned locks.
    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl RevisionStore for FileStateStore {
    fn get_revision(&self, query: RevisionQuery) -> Result<Option<Revision>, StoreError> {
        let doc = self.read_doc()?;
        let revision = match query {
            RevisionQuery::Latest => doc.revisions.values().next_back().cloned(),
            RevisionQuery::Exact(generation) => doc.revisions.get(&generation.as_u64()).cloned(),
        };
        Ok(revision)
    }

    fn save_revision(&self, revision: &Revision) -> Result<(), StoreError> {
        let _guard = self.lock();
        let mut doc = self.read_doc()?;
        doc.revisions.insert(revision.generation.as_u64(), revision.clone());
        self.write_doc(&doc)
    }

    fn next_generation(&self) -> Result<Generation, StoreError> {
        let doc = self.read_doc()?;
        Ok(doc
            .revisions
            .keys()
            .next_back()
            .map_or(Generation::FIRST, |gen| Generation::new(gen + 1)))
    }
}

impl ActualStateStore for FileStateStore {
    fn load_actual_state(&self) -> Result<PolicyResolution, StoreError> {
        let doc = self.read_doc()?;
        Ok(doc.actual.unwrap_or_else(PolicyResolution::new_actual))
    }

    fn save_actual_state(&self, state: &PolicyResolution) -> Result<(), StoreError> {
        let _guard = self.lock();
        let mut doc = self.read_doc()?;
        doc.actual = Some(state.clone());
        self.write_doc(&doc)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use placer_core::RevisionOutcome;

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
    fn revisions_survive_store_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path);
        store.save_revision(&revision(1)).expect("save");
        store.save_revision(&revision(2)).expect("save");

        let reopened = FileStateStore::new(&path);
        let latest = reopened
            .get_revision(RevisionQuery::Latest)
            .expect("query")
            .expect("present");
        assert_eq!(latest.generation, Generation::new(2));
        assert_eq!(reopened.next_generation().expect("next"), Generation::new(3));
    }

    #[test]
    fn reset_clears_everything() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path);
        store.save_revision(&revision(1)).expect("save");
        store.reset().expect("reset");

        assert!(store.get_revision(RevisionQuery::Latest).expect("query").is_none());
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_documents_are_reported_not_swallowed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        fs::write(&path, "{ torn").expect("write");

        let store = FileStateStore::new(&path);
        assert!(matches!(
            store.get_revision(RevisionQuery::Latest),
            Err(StoreError::Corrupt(_))
        ));
    }
}
