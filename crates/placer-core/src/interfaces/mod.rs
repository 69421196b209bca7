// crates/placer-core/src/interfaces/mod.rs
// ============================================================================
// Module: Placer Interfaces
// Description: Backend-agnostic interfaces for users, plugins, and stores.
// Purpose: Define the contract surfaces the engine expects from the
//          surrounding deployment layer.
// Dependencies: crate::{core, runtime}
// ============================================================================

//! ## Overview
//! The engine never talks to clusters, user directories, or databases
//! directly. Everything external arrives through the interfaces defined
//! here: a user loader (with separate secret loading), a code-executor
//! registry dispatched by code type, and revision/actual-state stores.
//! Implementations must be deterministic for identical inputs and fail
//! closed on missing data. Long-running calls must honor the cancellation
//! token threaded through the engine.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::Cluster;
use crate::core::EventLog;
use crate::core::Generation;
use crate::core::NestedParams;
use crate::core::User;
use crate::runtime::ActionOutcome;
use crate::runtime::ComponentInstance;
use crate::runtime::PolicyResolution;

// ============================================================================
// SECTION: Cancellation
// ============================================================================

/// Cooperative cancellation token threaded through engine passes.
///
/// Handles are cheap to clone and share the same flag. The engine checks the
/// token before each claim and before each external call; a cancelled run
/// stops issuing external calls and is never persisted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    /// Shared cancellation flag.
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true when cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: User Loader
// ============================================================================

/// User loader errors.
#[derive(Debug, Error)]
pub enum UserLoaderError {
    /// Loader transport or storage failure.
    #[error("user loader error: {0}")]
    Loader(String),
}

/// External directory of consumer identities.
pub trait UserLoader: Send + Sync {
    /// Loads a single user by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`UserLoaderError`] when the backing directory fails.
    fn load_user(&self, id: &str) -> Result<Option<User>, UserLoaderError>;

    /// Loads all known users.
    ///
    /// # Errors
    ///
    /// Returns [`UserLoaderError`] when the backing directory fails.
    fn load_users(&self) -> Result<Vec<User>, UserLoaderError>;
}

/// Per-user secret loader, separate from the identity directory.
pub trait SecretLoader: Send + Sync {
    /// Loads the secrets for a user id; unknown users yield an empty map.
    ///
    /// # Errors
    ///
    /// Returns [`UserLoaderError`] when the backing store fails.
    fn load_secrets(&self, user_id: &str) -> Result<BTreeMap<String, String>, UserLoaderError>;
}

/// External collaborators injected into the resolver.
#[derive(Clone)]
pub struct ExternalData {
    /// User identity directory.
    pub user_loader: Arc<dyn UserLoader>,
    /// Per-user secret store.
    pub secret_loader: Arc<dyn SecretLoader>,
}

impl ExternalData {
    /// Bundles the external collaborators.
    #[must_use]
    pub fn new(user_loader: Arc<dyn UserLoader>, secret_loader: Arc<dyn SecretLoader>) -> Self {
        Self {
            user_loader,
            secret_loader,
        }
    }
}

// ============================================================================
// SECTION: Code Executors
// ============================================================================

/// Code executor errors.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Transport failure talking to the target cluster.
    #[error("executor transport error: {0}")]
    Transport(String),
    /// The executor rejected the operation.
    #[error("executor rejected operation: {0}")]
    Rejected(String),
}

/// Deployment driver for one code type (e.g. `helm`).
///
/// Implementations talk to real clusters and are invoked only by the apply
/// shell; the resolver never calls them.
pub trait CodeExecutor: Send + Sync {
    /// Creates the component on the target cluster.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when creation fails.
    fn create(
        &self,
        instance: &ComponentInstance,
        params: &NestedParams,
        cluster: &Cluster,
        log: &EventLog,
    ) -> Result<BTreeMap<String, String>, ExecutorError>;

    /// Updates the component in place.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when the update fails.
    fn update(
        &self,
        instance: &ComponentInstance,
        old_params: &NestedParams,
        new_params: &NestedParams,
        cluster: &Cluster,
        log: &EventLog,
    ) -> Result<BTreeMap<String, String>, ExecutorError>;

    /// Destroys the component on the target cluster.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when destruction fails.
    fn destroy(
        &self,
        instance: &ComponentInstance,
        cluster: &Cluster,
        log: &EventLog,
    ) -> Result<(), ExecutorError>;

    /// Returns the externally reachable endpoints of the component.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when endpoint discovery fails.
    fn endpoints(
        &self,
        instance: &ComponentInstance,
        cluster: &Cluster,
    ) -> Result<BTreeMap<String, String>, ExecutorError>;
}

/// Plugin registry errors.
#[derive(Debug, Error)]
pub enum PluginError {
    /// No executor is registered for the code type.
    #[error("no code executor registered for type '{code_type}'")]
    UnknownCodeType {
        /// Requested code type.
        code_type: String,
    },
    /// The executor is blocked by registry policy.
    #[error("code executor blocked by policy: '{code_type}'")]
    Blocked {
        /// Requested code type.
        code_type: String,
    },
}

/// Registry resolving code executors by code type tag.
pub trait PluginRegistry: Send + Sync {
    /// Returns the executor for a code type.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] when no executor serves the type.
    fn for_code_type(&self, code_type: &str) -> Result<&dyn CodeExecutor, PluginError>;
}

// ============================================================================
// SECTION: Revision Store
// ============================================================================

/// Store errors shared by revision and actual-state stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O failure.
    #[error("store io error: {0}")]
    Io(String),
    /// Stored data is corrupted or fails integrity checks.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// Store reported an error.
    #[error("store error: {0}")]
    Store(String),
}

/// Outcome of applying a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionOutcome {
    /// Every action applied successfully.
    Success,
    /// Some instances failed; unrelated instances were still applied.
    PartialFailure,
    /// The plan was empty; nothing changed.
    Noop,
}

/// Persisted milestone of one apply pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Revision {
    /// Revision generation, monotonically increasing.
    pub generation: Generation,
    /// Generation of the policy this revision was computed from.
    pub policy_generation: Generation,
    /// Desired resolution computed by the resolver.
    pub desired: PolicyResolution,
    /// Outcomes of the actions applied for this revision.
    pub applied_actions: Vec<ActionOutcome>,
    /// Overall apply outcome.
    pub outcome: RevisionOutcome,
}

/// Revision lookup selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionQuery {
    /// The most recent revision.
    Latest,
    /// A specific generation.
    Exact(Generation),
}

impl FromStr for RevisionQuery {
    type Err = String;

    /// Parses `latest` or a numeric generation.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == "latest" {
            return Ok(Self::Latest);
        }
        value
            .parse::<u64>()
            .map(|gen| Self::Exact(Generation::new(gen)))
            .map_err(|_| format!("invalid revision query '{value}': expected 'latest' or a number"))
    }
}

/// Store of applied revisions keyed by monotonic generation.
pub trait RevisionStore: Send + Sync {
    /// Loads a revision; `None` when the generation does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store fails.
    fn get_revision(&self, query: RevisionQuery) -> Result<Option<Revision>, StoreError>;

    /// Saves a revision.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store fails.
    fn save_revision(&self, revision: &Revision) -> Result<(), StoreError>;

    /// Returns the generation the next revision should use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store fails.
    fn next_generation(&self) -> Result<Generation, StoreError>;
}

// ============================================================================
// SECTION: Actual State Store
// ============================================================================

/// Store of the last observed actual state.
pub trait ActualStateStore: Send + Sync {
    /// Loads the actual state; an empty resolution when nothing was applied.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store fails.
    fn load_actual_state(&self) -> Result<PolicyResolution, StoreError>;

    /// Persists the actual state after an apply pass.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store fails.
    fn save_actual_state(&self, state: &PolicyResolution) -> Result<(), StoreError>;
}
