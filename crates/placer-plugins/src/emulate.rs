// crates/placer-plugins/src/emulate.rs
// ============================================================================
// Module: Emulated Executor
// Description: Deterministic in-process executor for tests and demos.
// Purpose: Exercise the apply pipeline without touching real clusters.
// Dependencies: placer-core
// ============================================================================

//! ## Overview
//! The emulated executor records every call it receives and fabricates
//! deterministic endpoints from the instance's deploy name and cluster. The
//! CLI's `--emulate` mode and the end-to-end tests both use it so the whole
//! resolve-diff-apply pipeline runs against real interfaces with no network
//! in sight. A failure list makes selected components fail their create
//! call, which is how tests exercise per-instance failure isolation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use placer_core::Cluster;
use placer_core::CodeExecutor;
use placer_core::ComponentInstance;
use placer_core::EventLog;
use placer_core::ExecutorError;
use placer_core::NestedParams;

// ============================================================================
// SECTION: Recorded Calls
// ============================================================================

/// One recorded executor invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmulatedCall {
    /// Create was invoked for the instance key.
    Create(String),
    /// Update was invoked for the instance key.
    Update(String),
    /// Destroy was invoked for the instance key.
    Destroy(String),
}

// ============================================================================
// SECTION: Emulated Executor
// ============================================================================

/// Deterministic executor recording its calls.
#[derive(Debug, Default, Clone)]
pub struct EmulatedCodeExecutor {
    /// Recorded calls in invocation order.
    calls: Arc<Mutex<Vec<EmulatedCall>>>,
    /// Component names whose create call fails.
    fail_components: Arc<BTreeSet<String>>,
}

impl EmulatedCodeExecutor {
    /// Creates an executor that succeeds on every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor whose create call fails for the named
    /// components.
    #[must_use]
    pub fn failing_for(components: &[&str]) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_components: Arc::new(
                components.iter().map(|name| (*name).to_string()).collect(),
            ),
        }
    }

    /// Returns the recorded calls so far.
    #[must_use]
    pub fn calls(&self) -> Vec<EmulatedCall> {
        self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Records one call.
    fn record(&self, call: EmulatedCall) {
        self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(call);
    }

    /// Fabricates deterministic endpoints for an instance.
    fn fabricate_endpoints(
        instance: &ComponentInstance,
        cluster: &Cluster,
    ) -> BTreeMap<String, String> {
        [(
            "internal".to_string(),
            format!("{}.{}.svc.cluster.local", instance.key.deploy_name(), cluster.metadata.name),
        )]
        .into()
    }
}

impl CodeExecutor for EmulatedCodeExecutor {
    fn create(
        &self,
        instance: &ComponentInstance,
        _params: &NestedParams,
        cluster: &Cluster,
        log: &EventLog,
    ) -> Result<BTreeMap<String, String>, ExecutorError> {
        self.record(EmulatedCall::Create(instance.key.as_string()));
        if self.fail_components.contains(&instance.key.component) {
            return Err(ExecutorError::Transport(format!(
                "emulated create failure for '{}'",
                instance.key
            )));
        }
        log.debug(format!("emulate: created {}", instance.key.deploy_name()));
        Ok(Self::fabricate_endpoints(instance, cluster))
    }

    fn update(
        &self,
        instance: &ComponentInstance,
        _old_params: &NestedParams,
        _new_params: &NestedParams,
        cluster: &Cluster,
        log: &EventLog,
    ) -> Result<BTreeMap<String, String>, ExecutorError> {
        self.record(EmulatedCall::Update(instance.key.as_string()));
        log.debug(format!("emulate: updated {}", instance.key.deploy_name()));
        Ok(Self::fabricate_endpoints(instance, cluster))
    }

    fn destroy(
        &self,
        instance: &ComponentInstance,
        _cluster: &Cluster,
        log: &EventLog,
    ) -> Result<(), ExecutorError> {
        self.record(EmulatedCall::Destroy(instance.key.as_string()));
        log.debug(format!("emulate: destroyed {}", instance.key.deploy_name()));
        Ok(())
    }

    fn endpoints(
        &self,
        instance: &ComponentInstance,
        cluster: &Cluster,
    ) -> Result<BTreeMap<String, String>, ExecutorError> {
        Ok(Self::fabricate_endpoints(instance, cluster))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use placer_core::ComponentInstanceKey;
    use placer_core::Kind;
    use placer_core::Metadata;
    use placer_core::SYSTEM_NAMESPACE;

    /// Builds a code instance and its cluster.
    fn fixture() -> (ComponentInstance, Cluster) {
        let key = ComponentInstanceKey::root("main", "c", "prod", "primary", "web", "k1")
            .with_component("frontend");
        let mut instance = ComponentInstance::new(key);
        instance.is_code = true;

        let cluster = Cluster {
            metadata: Metadata::new(SYSTEM_NAMESPACE, Kind::Cluster, "k1"),
            cluster_type: "kubernetes".to_string(),
            config: serde_json::Value::Null,
        };
        (instance, cluster)
    }

    #[test]
    fn endpoints_derive_from_deploy_name_and_cluster() {
        let (instance, cluster) = fixture();
        let executor = EmulatedCodeExecutor::new();

        let endpoints = executor
            .create(&instance, &NestedParams::new(), &cluster, &EventLog::new())
            .expect("create");
        assert_eq!(
            endpoints["internal"],
            "web-prod-primary-frontend.k1.svc.cluster.local"
        );
    }

    #[test]
    fn calls_are_recorded_in_order() {
        let (instance, cluster) = fixture();
        let executor = EmulatedCodeExecutor::new();
        let log = EventLog::new();

        executor.create(&instance, &NestedParams::new(), &cluster, &log).expect("create");
        executor.destroy(&instance, &cluster, &log).expect("destroy");

        let key = instance.key.as_string();
        assert_eq!(
            executor.calls(),
            vec![EmulatedCall::Create(key.clone()), EmulatedCall::Destroy(key)]
        );
    }

    #[test]
    fn configured_components_fail_their_create() {
        let (instance, cluster) = fixture();
        let executor = EmulatedCodeExecutor::failing_for(&["frontend"]);

        let err = executor
            .create(&instance, &NestedParams::new(), &cluster, &EventLog::new())
            .expect_err("configured failure");
        assert!(matches!(err, ExecutorError::Transport(_)));
    }
}
