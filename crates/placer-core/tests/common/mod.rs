// crates/placer-core/tests/common/mod.rs
// ============================================================================
// Module: Test Fixtures
// Description: Shared policy builders and in-memory loaders for tests.
// Purpose: Keep integration tests focused on behavior, not setup.
// Dependencies: placer-core, serde_json
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use placer_core::Allocation;
use placer_core::Bundle;
use placer_core::Claim;
use placer_core::Cluster;
use placer_core::CodeSpec;
use placer_core::Component;
use placer_core::Context;
use placer_core::Contract;
use placer_core::ExternalData;
use placer_core::Generation;
use placer_core::Kind;
use placer_core::LabelOperations;
use placer_core::LabelSet;
use placer_core::Metadata;
use placer_core::Policy;
use placer_core::PolicyObject;
use placer_core::SYSTEM_NAMESPACE;
use placer_core::SecretLoader;
use placer_core::Service;
use placer_core::User;
use placer_core::UserLoader;
use placer_core::UserLoaderError;

/// Default namespace used by fixtures.
pub const NS: &str = "main";

/// In-memory user loader for tests.
pub struct StaticUserLoader {
    /// Users keyed by id.
    users: BTreeMap<String, User>,
}

impl StaticUserLoader {
    /// Creates a loader over the given users.
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: users.into_iter().map(|user| (user.id.clone(), user)).collect(),
        }
    }
}

impl UserLoader for StaticUserLoader {
    fn load_user(&self, id: &str) -> Result<Option<User>, UserLoaderError> {
        Ok(self.users.get(id).cloned())
    }

    fn load_users(&self) -> Result<Vec<User>, UserLoaderError> {
        Ok(self.users.values().cloned().collect())
    }
}

/// Secret loader returning no secrets for anyone.
pub struct NoSecrets;

impl SecretLoader for NoSecrets {
    fn load_secrets(&self, _user_id: &str) -> Result<BTreeMap<String, String>, UserLoaderError> {
        Ok(BTreeMap::new())
    }
}

/// Bundles the in-memory loaders into `ExternalData`.
pub fn external_data(users: Vec<User>) -> ExternalData {
    ExternalData::new(Arc::new(StaticUserLoader::new(users)), Arc::new(NoSecrets))
}

/// Builds a user with labels.
pub fn user(id: &str, labels: &[(&str, &str)]) -> User {
    User {
        id: id.to_string(),
        name: id.to_string(),
        labels: label_set(labels),
        admin: false,
    }
}

/// Builds a label set from pairs.
pub fn label_set(pairs: &[(&str, &str)]) -> LabelSet {
    LabelSet::from_map(
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect(),
    )
}

/// Builds label operations that only set labels.
pub fn set_labels(pairs: &[(&str, &str)]) -> LabelOperations {
    LabelOperations {
        set: pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect(),
        remove: Default::default(),
    }
}

/// Builds a code component.
pub fn code_component(name: &str, code_type: &str, params: serde_json::Value) -> Component {
    Component {
        name: name.to_string(),
        criteria: None,
        labels: None,
        code: Some(CodeSpec {
            code_type: code_type.to_string(),
            params: params.into(),
        }),
        service: None,
        dependencies: Vec::new(),
        discovery: Default::default(),
    }
}

/// Builds a service-reference component.
pub fn service_component(name: &str, service: &str, dependencies: &[&str]) -> Component {
    Component {
        name: name.to_string(),
        criteria: None,
        labels: None,
        code: None,
        service: Some(service.to_string()),
        dependencies: dependencies.iter().map(|d| (*d).to_string()).collect(),
        discovery: Default::default(),
    }
}

/// Builds a service with a single context and allocation.
///
/// The context sets the `cluster` label so resolution lands on `cluster`.
pub fn simple_service(
    name: &str,
    bundle: &str,
    context_criteria: Option<&str>,
    cluster: &str,
) -> PolicyObject {
    PolicyObject::Service(Service {
        metadata: Metadata::new(NS, Kind::Service, name),
        bundle: bundle.to_string(),
        contexts: vec![Context {
            name: "prod".to_string(),
            criteria: context_criteria.map(str::to_string),
            labels: Some(set_labels(&[("cluster", cluster)])),
            allocations: vec![Allocation {
                name: "primary".to_string(),
                criteria: None,
                labels: None,
            }],
        }],
    })
}

/// Builds a bundle object from components.
pub fn bundle(name: &str, components: Vec<Component>) -> PolicyObject {
    PolicyObject::Bundle(Bundle {
        metadata: Metadata::new(NS, Kind::Bundle, name),
        components,
    })
}

/// Builds a contract binding a service.
pub fn contract(name: &str, service: &str) -> PolicyObject {
    PolicyObject::Contract(Contract {
        metadata: Metadata::new(NS, Kind::Contract, name),
        service: service.to_string(),
    })
}

/// Builds a cluster in the system namespace.
pub fn cluster(name: &str) -> PolicyObject {
    PolicyObject::Cluster(Cluster {
        metadata: Metadata::new(SYSTEM_NAMESPACE, Kind::Cluster, name),
        cluster_type: "kubernetes".to_string(),
        config: serde_json::Value::Null,
    })
}

/// Builds a claim object.
pub fn claim(name: &str, user: &str, service: &str, labels: &[(&str, &str)]) -> PolicyObject {
    PolicyObject::Claim(Claim {
        metadata: Metadata::new(NS, Kind::Claim, name),
        user: user.to_string(),
        service: service.to_string(),
        labels: label_set(labels),
    })
}

/// Assembles a policy from objects, panicking on load errors.
pub fn policy(objects: Vec<PolicyObject>) -> Policy {
    Policy::from_objects(Generation::FIRST, objects).expect("policy must assemble")
}
