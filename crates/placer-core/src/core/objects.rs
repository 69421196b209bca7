// crates/placer-core/src/core/objects.rs
// ============================================================================
// Module: Policy Object Model
// Description: Typed, namespaced policy objects and their metadata.
// Purpose: Define the canonical schema for placement policies.
// Dependencies: crate::core::{labels, params}, serde
// ============================================================================

//! ## Overview
//! Every policy object carries `{namespace, kind, name, generation}`
//! metadata. Services own ordered contexts with allocations; bundles own the
//! component DAG; contracts bind a service to the claims that consume it;
//! clusters are deployment targets living in the reserved system namespace.
//! Policy objects are untrusted input and are validated when assembled into
//! a [`Policy`](crate::core::policy::Policy).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::labels::LabelOperations;
use crate::core::labels::LabelSet;
use crate::core::params::NestedParams;
use crate::core::rules::Rule;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reserved namespace for system objects such as clusters.
pub const SYSTEM_NAMESPACE: &str = "system";

// ============================================================================
// SECTION: Generation
// ============================================================================

/// Monotonic object generation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    /// First generation assigned to new objects.
    pub const FIRST: Self = Self(1);

    /// Creates a generation from a raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the next generation.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw generation value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for Generation {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Object Kinds
// ============================================================================

/// Kind discriminator for policy objects.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Kind {
    /// Consumable service with ordered contexts.
    Service,
    /// Bundle of components instantiating a service.
    Bundle,
    /// Binding between a service and its consumers.
    Contract,
    /// Deployment target in the system namespace.
    Cluster,
    /// Global placement rule.
    Rule,
    /// Access-control rule assigning roles.
    AclRule,
    /// Consumption claim.
    Claim,
}

impl Kind {
    /// Returns the stable string form of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Bundle => "bundle",
            Self::Contract => "contract",
            Self::Cluster => "cluster",
            Self::Rule => "rule",
            Self::AclRule => "acl-rule",
            Self::Claim => "claim",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Metadata
// ============================================================================

/// Object metadata shared by all policy objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Namespace the object lives in.
    pub namespace: String,
    /// Object kind.
    pub kind: Kind,
    /// Object name, unique per `(kind, namespace)`.
    pub name: String,
    /// Object generation.
    #[serde(default)]
    pub generation: Generation,
}

impl Metadata {
    /// Creates metadata for a namespaced object.
    #[must_use]
    pub fn new(namespace: impl Into<String>, kind: Kind, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            name: name.into(),
            generation: Generation::FIRST,
        }
    }

    /// Returns the storable key `namespace/kind/name`.
    #[must_use]
    pub fn storable_key(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.kind, self.name)
    }
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Consumable service: ordered contexts plus the bundle it instantiates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Object metadata.
    pub metadata: Metadata,
    /// Name of the bundle instantiated by this service (same namespace).
    pub bundle: String,
    /// Contexts evaluated in declaration order; first match wins.
    pub contexts: Vec<Context>,
}

/// Label-gated variant of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Context name, unique within the service.
    pub name: String,
    /// Criteria expression over labels; absent means always-match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<String>,
    /// Label transformation applied when the context matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<LabelOperations>,
    /// Allocations evaluated in declaration order; first match wins.
    pub allocations: Vec<Allocation>,
}

/// Label-gated instantiation target with an optionally dynamic name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// Allocation name; may contain `{{label}}` template placeholders.
    pub name: String,
    /// Criteria expression over labels; absent means always-match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<String>,
    /// Label transformation applied when the allocation matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<LabelOperations>,
}

// ============================================================================
// SECTION: Bundle
// ============================================================================

/// Bundle of components: the DAG instantiating a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Object metadata.
    pub metadata: Metadata,
    /// Components in declaration order. Dependencies must be acyclic.
    pub components: Vec<Component>,
}

impl Bundle {
    /// Returns the component with the given name.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|component| component.name == name)
    }

    /// Returns a name-keyed map of the bundle's components.
    #[must_use]
    pub fn components_map(&self) -> BTreeMap<&str, &Component> {
        self.components.iter().map(|component| (component.name.as_str(), component)).collect()
    }
}

/// Single component within a bundle: either code or a service reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Component name, unique within the bundle.
    pub name: String,
    /// Criteria expression over labels; absent means always-include.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<String>,
    /// Label transformation applied to this component's subtree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<LabelOperations>,
    /// Code body when this is a code component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeSpec>,
    /// Referenced service name when this is a service component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Names of sibling components this component depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Discovery parameters published to dependent components.
    #[serde(default, skip_serializing_if = "NestedParams::is_empty")]
    pub discovery: NestedParams,
}

impl Component {
    /// Returns true when this component carries code.
    #[must_use]
    pub const fn is_code(&self) -> bool {
        self.code.is_some()
    }
}

/// Typed code body of a code component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeSpec {
    /// Code type tag used for executor dispatch (e.g. `helm`).
    #[serde(rename = "type")]
    pub code_type: String,
    /// Code parameters; string leaves may contain `{{label}}` templates.
    #[serde(default, skip_serializing_if = "NestedParams::is_empty")]
    pub params: NestedParams,
}

// ============================================================================
// SECTION: Contract, Cluster, Claim
// ============================================================================

/// Binding between a service and the claims consuming it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Object metadata.
    pub metadata: Metadata,
    /// Name of the bound service (same namespace).
    pub service: String,
}

/// Deployment target registered in the system namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Object metadata.
    pub metadata: Metadata,
    /// Cluster type tag (e.g. `kubernetes`).
    #[serde(rename = "type")]
    pub cluster_type: String,
    /// Opaque connection configuration handed to executors.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,
}

/// Declaration that a user needs a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Object metadata.
    pub metadata: Metadata,
    /// Identifier of the consuming user.
    pub user: String,
    /// Name of the requested service (claim's namespace).
    pub service: String,
    /// Labels contributed by the claim.
    #[serde(default, skip_serializing_if = "LabelSet::is_empty")]
    pub labels: LabelSet,
}

impl Claim {
    /// Returns the claim identifier `namespace/name`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}/{}", self.metadata.namespace, self.metadata.name)
    }
}

// ============================================================================
// SECTION: User
// ============================================================================

/// Consumer identity provided by the external user loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable user identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Labels attached to the user.
    #[serde(default, skip_serializing_if = "LabelSet::is_empty")]
    pub labels: LabelSet,
    /// True when the user is a domain administrator.
    #[serde(default)]
    pub admin: bool,
}

// ============================================================================
// SECTION: Loader Envelope
// ============================================================================

/// Policy object envelope used by loaders.
///
/// Deserialization goes through [`PolicyObject::from_value`], which
/// dispatches on `metadata.kind`; a plain untagged derive would confuse
/// claims with contracts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PolicyObject {
    /// Service object.
    Service(Service),
    /// Bundle object.
    Bundle(Bundle),
    /// Contract object.
    Contract(Contract),
    /// Cluster object.
    Cluster(Cluster),
    /// Rule or ACL rule object.
    Rule(Rule),
    /// Claim object.
    Claim(Claim),
}

impl PolicyObject {
    /// Returns the object's metadata.
    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        match self {
            Self::Service(object) => &object.metadata,
            Self::Bundle(object) => &object.metadata,
            Self::Contract(object) => &object.metadata,
            Self::Cluster(object) => &object.metadata,
            Self::Rule(object) => &object.metadata,
            Self::Claim(object) => &object.metadata,
        }
    }

    /// Deserializes a policy object from a JSON value, dispatching on the
    /// `metadata.kind` field.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` when the value is malformed or the kind
    /// is unknown.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Probe {
            metadata: Metadata,
        }

        let probe: Probe = serde_json::from_value(value.clone())?;
        match probe.metadata.kind {
            Kind::Service => Ok(Self::Service(serde_json::from_value(value)?)),
            Kind::Bundle => Ok(Self::Bundle(serde_json::from_value(value)?)),
            Kind::Contract => Ok(Self::Contract(serde_json::from_value(value)?)),
            Kind::Cluster => Ok(Self::Cluster(serde_json::from_value(value)?)),
            Kind::Rule | Kind::AclRule => Ok(Self::Rule(serde_json::from_value(value)?)),
            Kind::Claim => Ok(Self::Claim(serde_json::from_value(value)?)),
        }
    }
}
