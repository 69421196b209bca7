// crates/placer-core/src/core/policy.rs
// ============================================================================
// Module: Policy Collection
// Description: Assembled, validated policy with precomputed lookups.
// Purpose: Provide O(1) object lookup and load-time integrity checks.
// Dependencies: crate::core::{objects, rules}, thiserror
// ============================================================================

//! ## Overview
//! A `Policy` is the immutable input of a resolution run: every namespaced
//! object, plus the lookups the resolver needs precomputed: per-bundle
//! component topological order (cycles are hard load errors), the
//! contract-per-service binding, and weight-sorted rule lists. Assembly is
//! atomic: either every object validates and the policy is usable, or
//! loading fails with a policy-scoped error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::objects::Bundle;
use crate::core::objects::Claim;
use crate::core::objects::Cluster;
use crate::core::objects::Component;
use crate::core::objects::Contract;
use crate::core::objects::Generation;
use crate::core::objects::Kind;
use crate::core::objects::PolicyObject;
use crate::core::objects::SYSTEM_NAMESPACE;
use crate::core::objects::Service;
use crate::core::rules::Rule;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Policy assembly and integrity errors. All of these are fatal.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Two objects share the same `(kind, namespace, name)`.
    #[error("duplicate policy object: {key}")]
    DuplicateObject {
        /// Storable key of the duplicated object.
        key: String,
    },
    /// An object name or namespace contains a reserved character.
    #[error("invalid object name '{name}': names must match [A-Za-z0-9_.-]+")]
    InvalidName {
        /// Offending name.
        name: String,
    },
    /// A cluster was declared outside the system namespace.
    #[error("cluster '{name}' must live in the '{SYSTEM_NAMESPACE}' namespace, not '{namespace}'")]
    ClusterOutsideSystemNamespace {
        /// Cluster name.
        name: String,
        /// Namespace the cluster was declared in.
        namespace: String,
    },
    /// An object's metadata kind does not match its payload.
    #[error("object '{name}' carries kind '{kind}' which does not match its payload")]
    KindMismatch {
        /// Object name.
        name: String,
        /// Declared kind.
        kind: Kind,
    },
    /// A component declares both code and a service reference, or neither.
    #[error("component '{component}' in bundle '{bundle}' must be either code or a service reference")]
    AmbiguousComponent {
        /// Bundle name.
        bundle: String,
        /// Component name.
        component: String,
    },
    /// A component depends on a sibling that does not exist.
    #[error("component '{component}' in bundle '{bundle}' depends on unknown component '{dependency}'")]
    UnknownComponentDependency {
        /// Bundle name.
        bundle: String,
        /// Component name.
        component: String,
        /// Missing dependency name.
        dependency: String,
    },
    /// Component dependencies within a bundle form a cycle.
    #[error("component cycle detected in bundle '{bundle}'")]
    ComponentCycle {
        /// Bundle name.
        bundle: String,
    },
    /// A service references a bundle that does not exist in its namespace.
    #[error("service '{service}' references unknown bundle '{bundle}'")]
    UnknownBundle {
        /// Service name.
        service: String,
        /// Missing bundle name.
        bundle: String,
    },
    /// A component references a service that does not exist in its namespace.
    #[error("component '{component}' in bundle '{bundle}' references unknown service '{service}'")]
    UnknownServiceReference {
        /// Bundle name.
        bundle: String,
        /// Component name.
        component: String,
        /// Missing service name.
        service: String,
    },
    /// A contract binds a service that does not exist.
    #[error("contract '{contract}' binds unknown service '{service}'")]
    ContractServiceMissing {
        /// Contract name.
        contract: String,
        /// Missing service name.
        service: String,
    },
    /// Two contracts bind the same service.
    #[error("service '{service}' is bound by more than one contract")]
    DuplicateContractBinding {
        /// Service name.
        service: String,
    },
    /// A service has no contract binding it.
    #[error("service '{service}' has no contract binding it")]
    MissingContract {
        /// Service name.
        service: String,
    },
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Namespaced key `(namespace, name)` for typed object maps.
type NsKey = (String, String);

/// Assembled, validated policy.
///
/// # Invariants
/// - Immutable after [`Policy::from_objects`] returns.
/// - `components_sorted` holds a dependency-first topological order for
///   every bundle.
/// - `rules` and `acl_rules` are sorted by `(weight, name)`.
#[derive(Debug, Default)]
pub struct Policy {
    /// Policy generation.
    generation: Generation,
    /// Services keyed by `(namespace, name)`.
    services: BTreeMap<NsKey, Service>,
    /// Bundles keyed by `(namespace, name)`.
    bundles: BTreeMap<NsKey, Bundle>,
    /// Contracts keyed by `(namespace, name)`.
    contracts: BTreeMap<NsKey, Contract>,
    /// Clusters keyed by name; always in the system namespace.
    clusters: BTreeMap<String, Cluster>,
    /// Placement rules sorted by `(weight, name)`.
    rules: Vec<Rule>,
    /// ACL rules sorted by `(weight, name)`.
    acl_rules: Vec<Rule>,
    /// Claims in declaration order.
    claims: Vec<Claim>,
    /// Contract name bound to each `(namespace, service)`.
    contract_by_service: BTreeMap<NsKey, String>,
    /// Topologically sorted component names per `(namespace, bundle)`.
    components_sorted: BTreeMap<NsKey, Vec<String>>,
}

impl Policy {
    /// Assembles and validates a policy from loaded objects.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] on duplicate objects, invalid names,
    /// component cycles, or broken references.
    pub fn from_objects(
        generation: Generation,
        objects: Vec<PolicyObject>,
    ) -> Result<Self, PolicyError> {
        let mut policy = Self {
            generation,
            ..Self::default()
        };
        for object in objects {
            policy.add_object(object)?;
        }
        policy.finalize()?;
        Ok(policy)
    }

    /// Returns the policy generation.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Returns a service by namespace and name.
    #[must_use]
    pub fn get_service(&self, namespace: &str, name: &str) -> Option<&Service> {
        self.services.get(&(namespace.to_string(), name.to_string()))
    }

    /// Returns a bundle by namespace and name.
    #[must_use]
    pub fn get_bundle(&self, namespace: &str, name: &str) -> Option<&Bundle> {
        self.bundles.get(&(namespace.to_string(), name.to_string()))
    }

    /// Returns a contract by namespace and name.
    #[must_use]
    pub fn get_contract(&self, namespace: &str, name: &str) -> Option<&Contract> {
        self.contracts.get(&(namespace.to_string(), name.to_string()))
    }

    /// Returns a cluster by name (system namespace).
    #[must_use]
    pub fn get_cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.get(name)
    }

    /// Returns the contract bound to a service.
    #[must_use]
    pub fn contract_for_service(&self, namespace: &str, service: &str) -> Option<&Contract> {
        let name = self.contract_by_service.get(&(namespace.to_string(), service.to_string()))?;
        self.get_contract(namespace, name)
    }

    /// Returns a bundle's components in dependency-first topological order.
    #[must_use]
    pub fn components_topo_sorted(&self, namespace: &str, bundle: &str) -> Option<&[String]> {
        self.components_sorted
            .get(&(namespace.to_string(), bundle.to_string()))
            .map(Vec::as_slice)
    }

    /// Resolves a component through the service's bundle.
    #[must_use]
    pub fn component_for(
        &self,
        namespace: &str,
        service: &str,
        component: &str,
    ) -> Option<&Component> {
        let service = self.get_service(namespace, service)?;
        let bundle = self.get_bundle(namespace, &service.bundle)?;
        bundle.component(component)
    }

    /// Returns placement rules sorted by weight.
    #[must_use]
    pub fn rules_sorted(&self) -> &[Rule] {
        &self.rules
    }

    /// Returns ACL rules sorted by weight.
    #[must_use]
    pub fn acl_rules_sorted(&self) -> &[Rule] {
        &self.acl_rules
    }

    /// Returns claims in declaration order.
    #[must_use]
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Returns every code type tag referenced by the policy's bundles.
    #[must_use]
    pub fn code_types(&self) -> std::collections::BTreeSet<String> {
        self.bundles
            .values()
            .flat_map(|bundle| &bundle.components)
            .filter_map(|component| component.code.as_ref())
            .map(|code| code.code_type.clone())
            .collect()
    }

    /// Adds a single object, checking names, kinds, and duplicates.
    fn add_object(&mut self, object: PolicyObject) -> Result<(), PolicyError> {
        let metadata = object.metadata().clone();
        ensure_valid_name(&metadata.namespace)?;
        ensure_valid_name(&metadata.name)?;

        let ns_key = (metadata.namespace.clone(), metadata.name.clone());
        match object {
            PolicyObject::Service(service) => {
                expect_kind(&metadata.name, metadata.kind, Kind::Service)?;
                for context in &service.contexts {
                    ensure_valid_name(&context.name)?;
                }
                insert_unique(&mut self.services, ns_key, service, &metadata)
            }
            PolicyObject::Bundle(bundle) => {
                expect_kind(&metadata.name, metadata.kind, Kind::Bundle)?;
                for component in &bundle.components {
                    ensure_valid_name(&component.name)?;
                }
                insert_unique(&mut self.bundles, ns_key, bundle, &metadata)
            }
            PolicyObject::Contract(contract) => {
                expect_kind(&metadata.name, metadata.kind, Kind::Contract)?;
                insert_unique(&mut self.contracts, ns_key, contract, &metadata)
            }
            PolicyObject::Cluster(cluster) => {
                expect_kind(&metadata.name, metadata.kind, Kind::Cluster)?;
                if metadata.namespace != SYSTEM_NAMESPACE {
                    return Err(PolicyError::ClusterOutsideSystemNamespace {
                        name: metadata.name,
                        namespace: metadata.namespace,
                    });
                }
                if self.clusters.contains_key(&metadata.name) {
                    return Err(PolicyError::DuplicateObject {
                        key: metadata.storable_key(),
                    });
                }
                self.clusters.insert(metadata.name, cluster);
                Ok(())
            }
            PolicyObject::Rule(rule) => {
                let bucket = match metadata.kind {
                    Kind::Rule => &mut self.rules,
                    Kind::AclRule => &mut self.acl_rules,
                    kind => {
                        return Err(PolicyError::KindMismatch {
                            name: metadata.name,
                            kind,
                        });
                    }
                };
                let taken = bucket.iter().any(|existing| {
                    existing.metadata.namespace == metadata.namespace
                        && existing.metadata.name == metadata.name
                });
                if taken {
                    return Err(PolicyError::DuplicateObject {
                        key: metadata.storable_key(),
                    });
                }
                bucket.push(rule);
                Ok(())
            }
            PolicyObject::Claim(claim) => {
                expect_kind(&metadata.name, metadata.kind, Kind::Claim)?;
                let taken = self.claims.iter().any(|existing| {
                    existing.metadata.namespace == metadata.namespace
                        && existing.metadata.name == metadata.name
                });
                if taken {
                    return Err(PolicyError::DuplicateObject {
                        key: metadata.storable_key(),
                    });
                }
                self.claims.push(claim);
                Ok(())
            }
        }
    }

    /// Precomputes lookups and runs load-time integrity checks.
    fn finalize(&mut self) -> Result<(), PolicyError> {
        self.rules.sort_by(|a, b| {
            (a.weight, &a.metadata.name).cmp(&(b.weight, &b.metadata.name))
        });
        self.acl_rules.sort_by(|a, b| {
            (a.weight, &a.metadata.name).cmp(&(b.weight, &b.metadata.name))
        });

        self.bind_contracts()?;
        self.check_service_references()?;
        self.sort_bundle_components()?;
        Ok(())
    }

    /// Builds the contract-per-service binding.
    fn bind_contracts(&mut self) -> Result<(), PolicyError> {
        for ((namespace, name), contract) in &self.contracts {
            let service_key = (namespace.clone(), contract.service.clone());
            if !self.services.contains_key(&service_key) {
                return Err(PolicyError::ContractServiceMissing {
                    contract: name.clone(),
                    service: contract.service.clone(),
                });
            }
            if self.contract_by_service.insert(service_key, name.clone()).is_some() {
                return Err(PolicyError::DuplicateContractBinding {
                    service: contract.service.clone(),
                });
            }
        }

        for (namespace, name) in self.services.keys() {
            if !self.contract_by_service.contains_key(&(namespace.clone(), name.clone())) {
                return Err(PolicyError::MissingContract {
                    service: name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Verifies service-to-bundle and component-to-service references.
    fn check_service_references(&self) -> Result<(), PolicyError> {
        for ((namespace, name), service) in &self.services {
            let bundle_key = (namespace.clone(), service.bundle.clone());
            if !self.bundles.contains_key(&bundle_key) {
                return Err(PolicyError::UnknownBundle {
                    service: name.clone(),
                    bundle: service.bundle.clone(),
                });
            }
        }

        for ((namespace, name), bundle) in &self.bundles {
            for component in &bundle.components {
                match (&component.code, &component.service) {
                    (Some(_), None) => {}
                    (None, Some(service)) => {
                        let service_key = (namespace.clone(), service.clone());
                        if !self.services.contains_key(&service_key) {
                            return Err(PolicyError::UnknownServiceReference {
                                bundle: name.clone(),
                                component: component.name.clone(),
                                service: service.clone(),
                            });
                        }
                    }
                    _ => {
                        return Err(PolicyError::AmbiguousComponent {
                            bundle: name.clone(),
                            component: component.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Topologically sorts every bundle's components; cycles are fatal.
    fn sort_bundle_components(&mut self) -> Result<(), PolicyError> {
        for ((namespace, name), bundle) in &self.bundles {
            let order = topo_sort_components(name, bundle)?;
            self.components_sorted.insert((namespace.clone(), name.clone()), order);
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

/// Inserts into a typed map, rejecting duplicates.
fn insert_unique<T>(
    map: &mut BTreeMap<NsKey, T>,
    key: NsKey,
    value: T,
    metadata: &crate::core::objects::Metadata,
) -> Result<(), PolicyError> {
    if map.contains_key(&key) {
        return Err(PolicyError::DuplicateObject {
            key: metadata.storable_key(),
        });
    }
    map.insert(key, value);
    Ok(())
}

/// Ensures the declared kind matches the payload type.
fn expect_kind(name: &str, declared: Kind, expected: Kind) -> Result<(), PolicyError> {
    if declared == expected {
        Ok(())
    } else {
        Err(PolicyError::KindMismatch {
            name: name.to_string(),
            kind: declared,
        })
    }
}

/// Validates an object name against the reserved character set.
fn ensure_valid_name(name: &str) -> Result<(), PolicyError> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.');
    if valid {
        Ok(())
    } else {
        Err(PolicyError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// Three-color DFS state for component sorting.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Visit in progress.
    InProgress,
    /// Visit complete.
    Done,
}

/// Topologically sorts a bundle's components, dependencies first.
fn topo_sort_components(bundle_name: &str, bundle: &Bundle) -> Result<Vec<String>, PolicyError> {
    let components = bundle.components_map();
    let mut colors: BTreeMap<&str, Color> = BTreeMap::new();
    let mut order = Vec::with_capacity(bundle.components.len());

    for component in &bundle.components {
        if !colors.contains_key(component.name.as_str()) {
            visit_component(bundle_name, &components, component, &mut colors, &mut order)?;
        }
    }
    Ok(order)
}

/// DFS visit pushing components in post-order.
fn visit_component<'a>(
    bundle_name: &str,
    components: &BTreeMap<&'a str, &'a Component>,
    component: &'a Component,
    colors: &mut BTreeMap<&'a str, Color>,
    order: &mut Vec<String>,
) -> Result<(), PolicyError> {
    colors.insert(&component.name, Color::InProgress);

    for dependency in &component.dependencies {
        let Some(next) = components.get(dependency.as_str()) else {
            return Err(PolicyError::UnknownComponentDependency {
                bundle: bundle_name.to_string(),
                component: component.name.clone(),
                dependency: dependency.clone(),
            });
        };
        match colors.get(dependency.as_str()).copied() {
            None => visit_component(bundle_name, components, next, colors, order)?,
            Some(Color::InProgress) => {
                return Err(PolicyError::ComponentCycle {
                    bundle: bundle_name.to_string(),
                });
            }
            Some(Color::Done) => {}
        }
    }

    order.push(component.name.clone());
    colors.insert(&component.name, Color::Done);
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::objects::CodeSpec;
    use crate::core::objects::Metadata;
    use crate::core::params::NestedParams;

    /// Builds a code component with dependencies.
    fn code_component(name: &str, dependencies: &[&str]) -> Component {
        Component {
            name: name.to_string(),
            criteria: None,
            labels: None,
            code: Some(CodeSpec {
                code_type: "helm".to_string(),
                params: NestedParams::new(),
            }),
            service: None,
            dependencies: dependencies.iter().map(|d| (*d).to_string()).collect(),
            discovery: NestedParams::new(),
        }
    }

    /// Builds a minimal valid policy object set around one bundle.
    fn base_objects(components: Vec<Component>) -> Vec<PolicyObject> {
        vec![
            PolicyObject::Bundle(Bundle {
                metadata: Metadata::new("main", Kind::Bundle, "web-bundle"),
                components,
            }),
            PolicyObject::Service(Service {
                metadata: Metadata::new("main", Kind::Service, "web"),
                bundle: "web-bundle".to_string(),
                contexts: Vec::new(),
            }),
            PolicyObject::Contract(Contract {
                metadata: Metadata::new("main", Kind::Contract, "web-contract"),
                service: "web".to_string(),
            }),
        ]
    }

    #[test]
    fn components_sort_dependencies_first() {
        let objects = base_objects(vec![
            code_component("frontend", &["backend"]),
            code_component("backend", &["db"]),
            code_component("db", &[]),
        ]);
        let policy = Policy::from_objects(Generation::FIRST, objects).expect("assemble");

        let order = policy.components_topo_sorted("main", "web-bundle").expect("order");
        assert_eq!(order, ["db", "backend", "frontend"]);
    }

    #[test]
    fn component_cycle_is_a_hard_load_error() {
        let objects = base_objects(vec![
            code_component("a", &["b"]),
            code_component("b", &["a"]),
        ]);

        let err = Policy::from_objects(Generation::FIRST, objects).expect_err("cycle");
        assert!(matches!(err, PolicyError::ComponentCycle { .. }));
    }

    #[test]
    fn duplicate_objects_are_rejected() {
        let mut objects = base_objects(vec![code_component("db", &[])]);
        objects.push(PolicyObject::Service(Service {
            metadata: Metadata::new("main", Kind::Service, "web"),
            bundle: "web-bundle".to_string(),
            contexts: Vec::new(),
        }));

        let err = Policy::from_objects(Generation::FIRST, objects).expect_err("duplicate");
        assert!(matches!(err, PolicyError::DuplicateObject { .. }));
    }

    #[test]
    fn service_without_contract_is_rejected() {
        let mut objects = base_objects(vec![code_component("db", &[])]);
        objects.retain(|object| !matches!(object, PolicyObject::Contract(_)));

        let err = Policy::from_objects(Generation::FIRST, objects).expect_err("binding");
        assert!(matches!(err, PolicyError::MissingContract { .. }));
    }

    #[test]
    fn clusters_must_live_in_the_system_namespace() {
        let mut objects = base_objects(vec![code_component("db", &[])]);
        objects.push(PolicyObject::Cluster(Cluster {
            metadata: Metadata::new("main", Kind::Cluster, "k1"),
            cluster_type: "kubernetes".to_string(),
            config: serde_json::Value::Null,
        }));

        let err = Policy::from_objects(Generation::FIRST, objects).expect_err("namespace");
        assert!(matches!(err, PolicyError::ClusterOutsideSystemNamespace { .. }));
    }

    #[test]
    fn names_with_reserved_characters_are_rejected() {
        let objects = vec![PolicyObject::Bundle(Bundle {
            metadata: Metadata::new("main", Kind::Bundle, "web:bundle"),
            components: Vec::new(),
        })];

        let err = Policy::from_objects(Generation::FIRST, objects).expect_err("name");
        assert!(matches!(err, PolicyError::InvalidName { .. }));
    }

    #[test]
    fn rules_sort_by_weight_then_name() {
        let mut objects = base_objects(vec![code_component("db", &[])]);
        for (name, weight) in [("zz-first", 1), ("aa-second", 5), ("mm-zero", 0)] {
            objects.push(PolicyObject::Rule(Rule {
                metadata: Metadata::new("main", Kind::Rule, name),
                weight,
                criteria: None,
                actions: crate::core::rules::RuleActions::default(),
            }));
        }

        let policy = Policy::from_objects(Generation::FIRST, objects).expect("assemble");
        let names: Vec<&str> =
            policy.rules_sorted().iter().map(|rule| rule.metadata.name.as_str()).collect();
        assert_eq!(names, ["mm-zero", "zz-first", "aa-second"]);
    }
}
