// crates/placer-core/src/runtime/resolution.rs
// ============================================================================
// Module: Policy Resolution
// Description: Desired or actual state of resolved component instances.
// Purpose: Accumulate instances, processing order, and claim outcomes.
// Dependencies: crate::{core, runtime}
// ============================================================================

//! ## Overview
//! A `PolicyResolution` is the engine's state artifact. The desired flavor
//! is produced by the resolver and carries the processing order: the order
//! in which instances were finalized by the DFS, which is a valid
//! dependencies-first ordering of the instance graph. The actual flavor is
//! loaded from a store and carries only the instance map. Merging a
//! per-claim resolution into the master copy is the engine's single fan-in
//! point; parameter conflicts discovered here mark the instance, never abort
//! the pass.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::Policy;
use crate::core::SYSTEM_NAMESPACE;
use crate::runtime::instance::ComponentInstance;
use crate::runtime::key::ComponentInstanceKey;

// ============================================================================
// SECTION: Claim Resolution
// ============================================================================

/// Outcome of resolving one claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResolution {
    /// True when the claim resolved to a root instance.
    pub resolved: bool,
    /// Root instance key when resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Failure message when unresolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClaimResolution {
    /// Builds a successful claim resolution.
    #[must_use]
    pub fn resolved(key: impl Into<String>) -> Self {
        Self {
            resolved: true,
            key: Some(key.into()),
            error: None,
        }
    }

    /// Builds a failed claim resolution.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            resolved: false,
            key: None,
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// SECTION: Validation Errors
// ============================================================================

/// Referential-integrity violations between a resolution and a policy.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Instance key references a missing contract.
    #[error("contract '{namespace}/{contract}' can only be deleted after it is no longer in use; still used by: {key}")]
    MissingContract {
        /// Instance namespace.
        namespace: String,
        /// Missing contract name.
        contract: String,
        /// Instance key holding the reference.
        key: String,
    },
    /// Instance key references a context absent from the service.
    #[error("context '{namespace}/{service}/{context}' can only be deleted after it is no longer in use; still used by: {key}")]
    MissingContext {
        /// Instance namespace.
        namespace: String,
        /// Service name.
        service: String,
        /// Missing context name.
        context: String,
        /// Instance key holding the reference.
        key: String,
    },
    /// Instance key references a missing service.
    #[error("service '{namespace}/{service}' can only be deleted after it is no longer in use; still used by: {key}")]
    MissingService {
        /// Instance namespace.
        namespace: String,
        /// Missing service name.
        service: String,
        /// Instance key holding the reference.
        key: String,
    },
    /// Instance key references a component absent from the bundle.
    #[error("component '{namespace}/{service}/{component}' can only be deleted after it is no longer in use; still used by: {key}")]
    MissingComponent {
        /// Instance namespace.
        namespace: String,
        /// Service name.
        service: String,
        /// Missing component name.
        component: String,
        /// Instance key holding the reference.
        key: String,
    },
    /// Instance key references a missing cluster.
    #[error("cluster '{SYSTEM_NAMESPACE}/{cluster}' can only be deleted after it is no longer in use; still used by: {key}")]
    MissingCluster {
        /// Missing cluster name.
        cluster: String,
        /// Instance key holding the reference.
        key: String,
    },
}

// ============================================================================
// SECTION: Policy Resolution
// ============================================================================

/// Desired or actual state of resolved component instances.
///
/// # Invariants
/// - `processing_order` contains exactly the keys of
///   `component_instances`, each once, in finalization order (desired
///   flavor only).
/// - Instances are never removed; conflicts mark them with an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyResolution {
    /// True for resolver-produced desired state.
    is_desired: bool,
    /// Resolved component instances keyed by serialized instance key.
    pub component_instances: BTreeMap<String, ComponentInstance>,
    /// Instance keys in the order they were finalized; desired flavor only.
    processing_order: Vec<String>,
    /// Membership index for `processing_order`; rebuilt after
    /// deserialization.
    #[serde(skip)]
    processing_order_has: BTreeSet<String>,
    /// Outcome per claim id.
    pub claim_resolutions: BTreeMap<String, ClaimResolution>,
}

impl PolicyResolution {
    /// Creates an empty desired-state resolution.
    #[must_use]
    pub fn new_desired() -> Self {
        Self {
            is_desired: true,
            ..Self::default()
        }
    }

    /// Creates an empty actual-state resolution.
    #[must_use]
    pub fn new_actual() -> Self {
        Self::default()
    }

    /// Returns true for resolver-produced desired state.
    #[must_use]
    pub const fn is_desired(&self) -> bool {
        self.is_desired
    }

    /// Returns the instance for a key, creating an empty entry on first use.
    pub fn instance_entry(&mut self, key: &ComponentInstanceKey) -> &mut ComponentInstance {
        self.component_instances
            .entry(key.as_string())
            .or_insert_with(|| ComponentInstance::new(key.clone()))
    }

    /// Returns the instance for a serialized key.
    #[must_use]
    pub fn instance(&self, key: &str) -> Option<&ComponentInstance> {
        self.component_instances.get(key)
    }

    /// Records the processing position of a key the first time it is seen.
    pub fn record_processing_order(&mut self, key: &ComponentInstanceKey) {
        self.ensure_order_index();
        let serialized = key.as_string();
        if self.processing_order_has.insert(serialized.clone()) {
            self.processing_order.push(serialized);
        }
    }

    /// Returns the processing order; meaningful for the desired flavor.
    #[must_use]
    pub fn processing_order(&self) -> &[String] {
        &self.processing_order
    }

    /// Merges a per-claim resolution into this one.
    ///
    /// New keys are inserted; existing keys merge through
    /// [`ComponentInstance::append`], where parameter conflicts mark the
    /// instance with an error. Processing order is extended with the
    /// contributor's order.
    pub fn append(&mut self, other: &Self) {
        for (key, incoming) in &other.component_instances {
            match self.component_instances.get_mut(key) {
                Some(existing) => existing.append(incoming),
                None => {
                    self.component_instances.insert(key.clone(), incoming.clone());
                }
            }
        }
        for key in &other.processing_order {
            self.ensure_order_index();
            if self.processing_order_has.insert(key.clone()) {
                self.processing_order.push(key.clone());
            }
        }
        for (claim_id, outcome) in &other.claim_resolutions {
            self.claim_resolutions.insert(claim_id.clone(), outcome.clone());
        }
    }

    /// Verifies that every instance references objects present in the
    /// policy.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub fn validate(&self, policy: &Policy) -> Result<(), ValidationError> {
        for (serialized, instance) in &self.component_instances {
            let key = &instance.key;

            if policy.get_contract(&key.namespace, &key.contract).is_none() {
                return Err(ValidationError::MissingContract {
                    namespace: key.namespace.clone(),
                    contract: key.contract.clone(),
                    key: serialized.clone(),
                });
            }

            let Some(service) = policy.get_service(&key.namespace, &key.service) else {
                return Err(ValidationError::MissingService {
                    namespace: key.namespace.clone(),
                    service: key.service.clone(),
                    key: serialized.clone(),
                });
            };

            if !service.contexts.iter().any(|context| context.name == key.context) {
                return Err(ValidationError::MissingContext {
                    namespace: key.namespace.clone(),
                    service: key.service.clone(),
                    context: key.context.clone(),
                    key: serialized.clone(),
                });
            }

            if !key.is_root()
                && policy.component_for(&key.namespace, &key.service, &key.component).is_none()
            {
                return Err(ValidationError::MissingComponent {
                    namespace: key.namespace.clone(),
                    service: key.service.clone(),
                    component: key.component.clone(),
                    key: serialized.clone(),
                });
            }

            if policy.get_cluster(&key.cluster).is_none() {
                return Err(ValidationError::MissingCluster {
                    cluster: key.cluster.clone(),
                    key: serialized.clone(),
                });
            }
        }
        Ok(())
    }

    /// Returns the number of successfully resolved claims.
    #[must_use]
    pub fn resolved_claims(&self) -> usize {
        self.claim_resolutions.values().filter(|outcome| outcome.resolved).count()
    }

    /// Returns true when every claim resolved successfully.
    #[must_use]
    pub fn all_claims_resolved(&self) -> bool {
        self.resolved_claims() == self.claim_resolutions.len()
    }

    /// Rebuilds the order index after deserialization.
    fn ensure_order_index(&mut self) {
        if self.processing_order_has.len() != self.processing_order.len() {
            self.processing_order_has = self.processing_order.iter().cloned().collect();
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
