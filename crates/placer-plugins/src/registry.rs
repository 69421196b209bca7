// crates/placer-plugins/src/registry.rs
// ============================================================================
// Module: Executor Registry
// Description: Registry for code executors keyed by code type.
// Purpose: Route apply actions by code type with policy checks.
// Dependencies: placer-core
// ============================================================================

//! ## Overview
//! The registry resolves code executors by their code type tag and enforces
//! allowlist and denylist policies. It implements the core
//! [`PluginRegistry`] interface so the apply shell dispatches through it
//! without knowing any executor specifics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use placer_core::CodeExecutor;
use placer_core::PluginError;
use placer_core::PluginRegistry;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry construction errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// An executor is already registered for the code type.
    #[error("executor already registered for code type '{code_type}'")]
    AlreadyRegistered {
        /// Duplicated code type tag.
        code_type: String,
    },
}

// ============================================================================
// SECTION: Access Policy
// ============================================================================

/// Access policy controlling which code types may be dispatched.
///
/// # Invariants
/// - `denylist` overrides `allowlist` when both are present.
/// - If `allowlist` is `None`, all code types are allowed unless denied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutorAccessPolicy {
    /// Optional allowlist of code type tags.
    pub allowlist: Option<BTreeSet<String>>,
    /// Explicit denylist of code type tags.
    pub denylist: BTreeSet<String>,
}

impl ExecutorAccessPolicy {
    /// Returns a policy that permits every code type.
    #[must_use]
    pub const fn allow_all() -> Self {
        Self {
            allowlist: None,
            denylist: BTreeSet::new(),
        }
    }

    /// Returns true when the code type is allowed by policy.
    #[must_use]
    pub fn is_allowed(&self, code_type: &str) -> bool {
        if self.denylist.contains(code_type) {
            return false;
        }
        if let Some(allowlist) = &self.allowlist {
            return allowlist.contains(code_type);
        }
        true
    }
}

// ============================================================================
// SECTION: Executor Registry
// ============================================================================

/// Code-executor registry with policy enforcement.
///
/// # Invariants
/// - Code type tags are unique within the registry.
/// - Access policy is enforced on every lookup.
pub struct CodeExecutorRegistry {
    /// Executor implementations keyed by code type tag.
    executors: BTreeMap<String, Box<dyn CodeExecutor + Send + Sync>>,
    /// Access control policy for dispatch.
    policy: ExecutorAccessPolicy,
}

impl CodeExecutorRegistry {
    /// Creates an empty registry with the provided policy.
    #[must_use]
    pub fn new(policy: ExecutorAccessPolicy) -> Self {
        Self {
            executors: BTreeMap::new(),
            policy,
        }
    }

    /// Registers an executor under a code type tag.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyRegistered`] when the tag is taken.
    pub fn register(
        &mut self,
        code_type: impl Into<String>,
        executor: impl CodeExecutor + Send + Sync + 'static,
    ) -> Result<(), RegistryError> {
        let code_type = code_type.into();
        if self.executors.contains_key(&code_type) {
            return Err(RegistryError::AlreadyRegistered {
                code_type,
            });
        }
        self.executors.insert(code_type, Box::new(executor));
        Ok(())
    }

    /// Returns the configured policy.
    #[must_use]
    pub const fn policy(&self) -> &ExecutorAccessPolicy {
        &self.policy
    }

    /// Returns the registered code type tags.
    #[must_use]
    pub fn code_types(&self) -> Vec<&str> {
        self.executors.keys().map(String::as_str).collect()
    }
}

impl PluginRegistry for CodeExecutorRegistry {
    fn for_code_type(&self, code_type: &str) -> Result<&dyn CodeExecutor, PluginError> {
        if !self.policy.is_allowed(code_type) {
            return Err(PluginError::Blocked {
                code_type: code_type.to_string(),
            });
        }
        self.executors
            .get(code_type)
            .map(|executor| executor.as_ref() as &dyn CodeExecutor)
            .ok_or_else(|| PluginError::UnknownCodeType {
                code_type: code_type.to_string(),
            })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulate::EmulatedCodeExecutor;

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = CodeExecutorRegistry::new(ExecutorAccessPolicy::allow_all());
        registry.register("helm", EmulatedCodeExecutor::new()).expect("first");

        let err = registry
            .register("helm", EmulatedCodeExecutor::new())
            .expect_err("duplicate");
        assert!(matches!(err, RegistryError::AlreadyRegistered { .. }));
    }

    #[test]
    fn unknown_code_type_is_an_error() {
        let registry = CodeExecutorRegistry::new(ExecutorAccessPolicy::allow_all());
        let err = match registry.for_code_type("helm") {
            Err(e) => e,
            Ok(_) => panic!("unknown"),
        };
        assert!(matches!(err, PluginError::UnknownCodeType { .. }));
    }

    #[test]
    fn denylist_overrides_registration() {
        let mut registry = CodeExecutorRegistry::new(ExecutorAccessPolicy {
            allowlist: None,
            denylist: ["helm".to_string()].into(),
        });
        registry.register("helm", EmulatedCodeExecutor::new()).expect("register");

        let err = match registry.for_code_type("helm") {
            Err(e) => e,
            Ok(_) => panic!("blocked"),
        };
        assert!(matches!(err, PluginError::Blocked { .. }));
    }

    #[test]
    fn allowlist_restricts_dispatch() {
        let mut registry = CodeExecutorRegistry::new(ExecutorAccessPolicy {
            allowlist: Some(["helm".to_string()].into()),
            denylist: BTreeSet::new(),
        });
        registry.register("helm", EmulatedCodeExecutor::new()).expect("register");
        registry
            .register("kube-deployment", EmulatedCodeExecutor::new())
            .expect("register");

        assert!(registry.for_code_type("helm").is_ok());
        assert!(matches!(
            registry.for_code_type("kube-deployment"),
            Err(PluginError::Blocked { .. })
        ));
    }
}
