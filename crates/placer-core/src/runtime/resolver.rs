// crates/placer-core/src/runtime/resolver.rs
// ============================================================================
// Module: Policy Resolver
// Description: Claim-driven DFS producing the desired-state resolution.
// Purpose: Resolve every claim through contexts, allocations, and bundles.
// Dependencies: crate::{core, interfaces, runtime}, label-logic
// ============================================================================

//! ## Overview
//! The resolver walks each claim through the policy: match a context, match
//! an allocation, resolve the target cluster, then instantiate the service's
//! bundle component by component, recursing into service references. Each
//! claim resolves into a private resolution that is merged into the master
//! copy afterwards; a failed claim contributes nothing and never aborts the
//! pass. All iteration follows declaration order, so identical inputs
//! produce byte-identical output, including the processing order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use label_logic::ExpressionCache;
use label_logic::evaluate;
use thiserror::Error;

use crate::core::Claim;
use crate::core::EventLog;
use crate::core::LabelSet;
use crate::core::Policy;
use crate::core::RuleActionResult;
use crate::core::User;
use crate::core::evaluate_rules;
use crate::interfaces::CancelToken;
use crate::interfaces::ExternalData;
use crate::runtime::key::ComponentInstanceKey;
use crate::runtime::resolution::ClaimResolution;
use crate::runtime::resolution::PolicyResolution;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Label key naming the target cluster.
const CLUSTER_LABEL: &str = "cluster";

/// Default recursion depth limit for service references.
const DEFAULT_MAX_DEPTH: u32 = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal resolution errors. Claim-scoped failures are recorded per claim
/// and never surface here.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The run was cancelled; partial state must not be persisted.
    #[error("resolution cancelled")]
    Cancelled,
}

/// Claim-scoped failures: the claim is marked unresolved and the pass
/// continues with the next claim.
#[derive(Debug, Error)]
pub enum ClaimError {
    /// The claim names a user unknown to the user loader.
    #[error("claim '{claim}' refers to non-existing user: {user}")]
    UserNotFound {
        /// Claim identifier.
        claim: String,
        /// Missing user identifier.
        user: String,
    },
    /// Rules rejected the dependency.
    #[error("rules do not allow claim '{claim}' ('{user}' -> '{service}'): processing '{current}', tree depth {depth}")]
    RulesRejectDependency {
        /// Claim identifier.
        claim: String,
        /// Consuming user.
        user: String,
        /// Service requested by the claim.
        service: String,
        /// Service being processed when the gate fired.
        current: String,
        /// Resolution tree depth.
        depth: u32,
    },
    /// The requested service does not exist.
    #[error("service '{namespace}/{service}' not found in policy (claim '{claim}')")]
    ServiceNotFound {
        /// Service namespace.
        namespace: String,
        /// Missing service name.
        service: String,
        /// Claim identifier.
        claim: String,
    },
    /// The requested service has no contract binding it.
    #[error("service '{namespace}/{service}' has no contract binding it (claim '{claim}')")]
    ContractNotFound {
        /// Service namespace.
        namespace: String,
        /// Service name.
        service: String,
        /// Claim identifier.
        claim: String,
    },
    /// No context criteria matched the labels.
    #[error("unable to find matching context within service: '{service}'")]
    ContextNotMatched {
        /// Service name.
        service: String,
    },
    /// No allocation criteria matched the labels.
    #[error("unable to find matching allocation within context '{context}' of service '{service}'")]
    AllocationNotMatched {
        /// Matched context name.
        context: String,
        /// Service name.
        service: String,
    },
    /// The allocation's dynamic name rendered empty or invalid.
    #[error("cannot resolve name for allocation '{allocation}' (context '{context}', service '{service}')")]
    AllocationNameUnresolved {
        /// Allocation name template.
        allocation: String,
        /// Matched context name.
        context: String,
        /// Service name.
        service: String,
    },
    /// The `cluster` label is not set after label propagation.
    #[error("not sure where components should be deployed: label 'cluster' is not set (claim '{claim}', service '{service}')")]
    ClusterLabelMissing {
        /// Claim identifier.
        claim: String,
        /// Service name.
        service: String,
    },
    /// The `cluster` label names a cluster missing from the system
    /// namespace.
    #[error("cluster '{cluster}' lookup error (claim '{claim}', service '{service}')")]
    ClusterNotFound {
        /// Missing cluster name.
        cluster: String,
        /// Claim identifier.
        claim: String,
        /// Service name.
        service: String,
    },
    /// The service's bundle is missing from its namespace.
    #[error("bundle '{bundle}' not found for service '{service}'")]
    BundleNotFound {
        /// Missing bundle name.
        bundle: String,
        /// Service name.
        service: String,
    },
    /// The service dependency graph loops back on itself.
    #[error("bundle cycle detected while processing policy: {path:?}")]
    BundleCycle {
        /// Path of `(service, context, allocation)` triples visited.
        path: Vec<String>,
    },
    /// The service reference chain exceeded the configured depth limit.
    #[error("resolution depth limit {limit} exceeded while processing '{service}'")]
    DepthExceeded {
        /// Configured depth limit.
        limit: u32,
        /// Service being processed when the limit fired.
        service: String,
    },
    /// A criteria or template failed to parse.
    #[error("error while evaluating criteria for {scope}: {source}")]
    Criteria {
        /// What was being evaluated.
        scope: String,
        /// Underlying parse failure.
        #[source]
        source: label_logic::ParseError,
    },
    /// The run was cancelled mid-claim.
    #[error("resolution cancelled")]
    Cancelled,
}

// ============================================================================
// SECTION: Resolution Node
// ============================================================================

/// One DFS frame: a claim being resolved against a service.
struct ResolutionNode<'a> {
    /// Claim driving this resolution tree.
    claim: &'a Claim,
    /// Consuming user.
    user: &'a User,
    /// Service under resolution.
    service_name: String,
    /// Labels flowing into this frame.
    labels: LabelSet,
    /// `(service, context, allocation)` triples on the path from the root.
    path: Vec<String>,
    /// Tree depth; zero at the claim root.
    depth: u32,
}

// ============================================================================
// SECTION: Policy Resolver
// ============================================================================

/// Claim-driven policy resolver.
pub struct PolicyResolver<'a> {
    /// Policy under resolution; read-only for the whole pass.
    policy: &'a Policy,
    /// External user and secret loaders.
    external: ExternalData,
    /// Expression compile cache shared across the pass.
    cache: Arc<ExpressionCache>,
    /// Event log narrating the pass.
    event_log: EventLog,
    /// Recursion depth limit for service references.
    max_depth: u32,
}

impl<'a> PolicyResolver<'a> {
    /// Creates a resolver over a policy and its collaborators.
    #[must_use]
    pub fn new(policy: &'a Policy, external: ExternalData, event_log: EventLog) -> Self {
        Self {
            policy,
            external,
            cache: Arc::new(ExpressionCache::new()),
            event_log,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Overrides the recursion depth limit.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns the event log used by this resolver.
    #[must_use]
    pub const fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Resolves every claim in the policy into a desired-state resolution.
    ///
    /// Claim failures are recorded on the returned resolution; only
    /// cancellation aborts the pass.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Cancelled`] when the token fires.
    pub fn resolve_all_claims(
        &self,
        cancel: &CancelToken,
    ) -> Result<PolicyResolution, ResolveError> {
        let mut master = PolicyResolution::new_desired();

        for claim in self.policy.claims() {
            if cancel.is_cancelled() {
                return Err(ResolveError::Cancelled);
            }

            let mut claim_resolution = PolicyResolution::new_desired();
            match self.resolve_claim(claim, &mut claim_resolution, cancel) {
                Ok(root_key) => {
                    claim_resolution
                        .claim_resolutions
                        .insert(claim.id(), ClaimResolution::resolved(root_key));
                    master.append(&claim_resolution);
                }
                Err(ClaimError::Cancelled) => return Err(ResolveError::Cancelled),
                Err(error) => {
                    // The failed claim's partial instances are discarded;
                    // unrelated claims keep resolving.
                    self.event_log.warn(format!("claim '{}' not resolved: {error}", claim.id()));
                    master
                        .claim_resolutions
                        .insert(claim.id(), ClaimResolution::failed(error.to_string()));
                }
            }
        }

        self.log_instance_errors(&master);
        Ok(master)
    }

    /// Resolves a single claim into its private resolution.
    fn resolve_claim(
        &self,
        claim: &Claim,
        resolution: &mut PolicyResolution,
        cancel: &CancelToken,
    ) -> Result<String, ClaimError> {
        if cancel.is_cancelled() {
            return Err(ClaimError::Cancelled);
        }

        let user = self
            .external
            .user_loader
            .load_user(&claim.user)
            .ok()
            .flatten()
            .ok_or_else(|| ClaimError::UserNotFound {
                claim: claim.id(),
                user: claim.user.clone(),
            })?;

        self.event_log.info(format!(
            "resolving top-level claim '{}' ('{}' -> '{}')",
            claim.id(),
            claim.user,
            claim.service
        ));

        let labels = user.labels.add_labels(&claim.labels);
        self.log_labels(&user, &labels, "initial");

        let node = ResolutionNode {
            claim,
            user: &user,
            service_name: claim.service.clone(),
            labels,
            path: Vec::new(),
            depth: 0,
        };
        self.resolve_node(&node, resolution, cancel)
    }

    /// Resolves one DFS frame and recurses into service references.
    fn resolve_node(
        &self,
        node: &ResolutionNode<'_>,
        resolution: &mut PolicyResolution,
        cancel: &CancelToken,
    ) -> Result<String, ClaimError> {
        if cancel.is_cancelled() {
            return Err(ClaimError::Cancelled);
        }
        if node.depth > self.max_depth {
            return Err(ClaimError::DepthExceeded {
                limit: self.max_depth,
                service: node.service_name.clone(),
            });
        }

        let namespace = node.claim.metadata.namespace.as_str();
        let claim_id = node.claim.id();

        if node.depth > 0 {
            self.event_log.info(format!(
                "resolving claim '{claim_id}': processing '{}', tree depth {}",
                node.service_name, node.depth
            ));
        }

        let service = self.policy.get_service(namespace, &node.service_name).ok_or_else(|| {
            ClaimError::ServiceNotFound {
                namespace: namespace.to_string(),
                service: node.service_name.clone(),
                claim: claim_id.clone(),
            }
        })?;
        self.event_log.debug(format!("service found in policy: '{}'", node.service_name));

        let contract =
            self.policy.contract_for_service(namespace, &node.service_name).ok_or_else(|| {
                ClaimError::ContractNotFound {
                    namespace: namespace.to_string(),
                    service: node.service_name.clone(),
                    claim: claim_id.clone(),
                }
            })?;

        // Dependency gate under the labels flowing into this frame.
        let dependency_gate = self.evaluate_rule_gate(&node.labels, "dependency rules")?;
        if dependency_gate.reject_dependency {
            return Err(ClaimError::RulesRejectDependency {
                claim: claim_id.clone(),
                user: node.claim.user.clone(),
                service: node.claim.service.clone(),
                current: node.service_name.clone(),
                depth: node.depth,
            });
        }

        let context = self.match_context(service, &node.labels)?;
        let labels = node.labels.apply_optional(context.labels.as_ref());
        self.event_log.info(format!(
            "found matching context within service '{}': {}",
            node.service_name, context.name
        ));

        let allocation = self.match_allocation(service, context, &labels)?;
        let allocation_name = self.resolve_allocation_name(service, context, allocation, &labels)?;
        let labels = labels.apply_optional(allocation.labels.as_ref());
        self.event_log.info(format!(
            "matched allocation '{}' -> '{allocation_name}' (context '{}', service '{}')",
            allocation.name, context.name, node.service_name
        ));

        // Ingress gate under the transformed labels; recorded on instances.
        let ingress_gate = self.evaluate_rule_gate(&labels, "ingress rules")?;

        let cluster_name = labels.get(CLUSTER_LABEL).ok_or_else(|| {
            ClaimError::ClusterLabelMissing {
                claim: claim_id.clone(),
                service: node.service_name.clone(),
            }
        })?;
        if self.policy.get_cluster(cluster_name).is_none() {
            return Err(ClaimError::ClusterNotFound {
                cluster: cluster_name.to_string(),
                claim: claim_id.clone(),
                service: node.service_name.clone(),
            });
        }

        let bundle =
            self.policy.get_bundle(namespace, &service.bundle).ok_or_else(|| {
                ClaimError::BundleNotFound {
                    bundle: service.bundle.clone(),
                    service: node.service_name.clone(),
                }
            })?;
        self.event_log.debug(format!("bundle found in policy: '{}'", bundle.metadata.name));

        // Cycle check on the (service, context, allocation) triple.
        let triple = format!("{namespace}/{}#{}#{allocation_name}", node.service_name, context.name);
        if node.path.contains(&triple) {
            let mut path = node.path.clone();
            path.push(triple);
            return Err(ClaimError::BundleCycle {
                path,
            });
        }

        let root_key = ComponentInstanceKey::root(
            namespace,
            contract.metadata.name.clone(),
            context.name.clone(),
            allocation_name,
            node.service_name.clone(),
            cluster_name,
        );

        {
            let root = resolution.instance_entry(&root_key);
            root.add_dependency(claim_id.clone(), node.depth);
            root.add_rule_information(&ingress_gate);
            root.add_labels(&labels);
        }

        let component_order: Vec<String> = self
            .policy
            .components_topo_sorted(namespace, &service.bundle)
            .map(<[String]>::to_vec)
            .unwrap_or_default();

        for component_name in &component_order {
            let Some(component) = bundle.component(component_name) else {
                continue;
            };

            if let Some(criteria) = &component.criteria {
                let matched = self.eval_criteria(
                    criteria,
                    &labels,
                    format!("component '{}' of bundle '{}'", component.name, bundle.metadata.name),
                )?;
                if !matched {
                    self.event_log.info(format!(
                        "component criteria evaluated to 'false', excluding it from processing: bundle '{}', component '{}'",
                        bundle.metadata.name, component.name
                    ));
                    continue;
                }
            }

            let component_labels = labels.apply_optional(component.labels.as_ref());

            if let Some(code) = &component.code {
                self.event_log.info(format!(
                    "processing claim on component with code: {} ({})",
                    component.name, code.code_type
                ));
                let component_key = root_key.with_component(component.name.clone());

                let code_params = code
                    .params
                    .render(component_labels.as_map(), &self.cache)
                    .map_err(|source| ClaimError::Criteria {
                        scope: format!("code params of component '{}'", component.name),
                        source,
                    })?;
                let discovery_params = component
                    .discovery
                    .render(component_labels.as_map(), &self.cache)
                    .map_err(|source| ClaimError::Criteria {
                        scope: format!("discovery params of component '{}'", component.name),
                        source,
                    })?;

                {
                    let instance = resolution.instance_entry(&component_key);
                    instance.is_code = true;
                    instance.add_dependency(claim_id.clone(), node.depth);
                    instance.add_rule_information(&ingress_gate);
                    instance.add_labels(&component_labels);
                    if let Err(error) = instance.add_code_params(&code_params) {
                        instance.error = Some(error.into());
                    }
                    if let Err(error) = instance.add_discovery_params(&discovery_params) {
                        instance.error = Some(error.into());
                    }
                }
                resolution.record_processing_order(&component_key);
                resolution.instance_entry(&root_key).add_edge_out(component_key.as_string());
            } else if let Some(child_service) = &component.service {
                self.event_log
                    .info(format!("processing claim on another service: {child_service}"));

                let mut child_path = node.path.clone();
                child_path.push(triple.clone());
                let child = ResolutionNode {
                    claim: node.claim,
                    user: node.user,
                    service_name: child_service.clone(),
                    labels: component_labels,
                    path: child_path,
                    depth: node.depth + 1,
                };
                let child_root = self.resolve_node(&child, resolution, cancel)?;
                resolution.instance_entry(&root_key).add_edge_out(child_root);
            }
        }

        resolution.record_processing_order(&root_key);
        self.event_log.info(format!(
            "successfully resolved instance '{}' -> '{}': {root_key}",
            node.user.name, node.service_name
        ));
        Ok(root_key.as_string())
    }

    /// Evaluates the global rules under the given labels.
    fn evaluate_rule_gate(
        &self,
        labels: &LabelSet,
        scope: &str,
    ) -> Result<RuleActionResult, ClaimError> {
        evaluate_rules(self.policy.rules_sorted(), labels, &self.cache).map_err(|source| {
            ClaimError::Criteria {
                scope: scope.to_string(),
                source,
            }
        })
    }

    /// Matches the first context whose criteria evaluates true.
    fn match_context<'s>(
        &self,
        service: &'s crate::core::Service,
        labels: &LabelSet,
    ) -> Result<&'s crate::core::Context, ClaimError> {
        for context in &service.contexts {
            let matched = match &context.criteria {
                Some(criteria) => self.eval_criteria(
                    criteria,
                    labels,
                    format!("context '{}' of service '{}'", context.name, service.metadata.name),
                )?,
                None => true,
            };
            self.event_log.debug(format!(
                "trying context '{}' within service '{}': matched = {matched}",
                context.name, service.metadata.name
            ));
            if matched {
                return Ok(context);
            }
        }
        Err(ClaimError::ContextNotMatched {
            service: service.metadata.name.clone(),
        })
    }

    /// Matches the first allocation whose criteria evaluates true.
    fn match_allocation<'s>(
        &self,
        service: &crate::core::Service,
        context: &'s crate::core::Context,
        labels: &LabelSet,
    ) -> Result<&'s crate::core::Allocation, ClaimError> {
        for allocation in &context.allocations {
            let matched = match &allocation.criteria {
                Some(criteria) => self.eval_criteria(
                    criteria,
                    labels,
                    format!(
                        "allocation '{}' in context '{}' of service '{}'",
                        allocation.name, context.name, service.metadata.name
                    ),
                )?,
                None => true,
            };
            if matched {
                return Ok(allocation);
            }
        }
        Err(ClaimError::AllocationNotMatched {
            context: context.name.clone(),
            service: service.metadata.name.clone(),
        })
    }

    /// Renders the allocation's possibly dynamic name over the labels.
    fn resolve_allocation_name(
        &self,
        service: &crate::core::Service,
        context: &crate::core::Context,
        allocation: &crate::core::Allocation,
        labels: &LabelSet,
    ) -> Result<String, ClaimError> {
        let template =
            self.cache.template(&allocation.name).map_err(|source| ClaimError::Criteria {
                scope: format!("allocation name '{}'", allocation.name),
                source,
            })?;
        let rendered = template.render(labels.as_map());

        let valid = !rendered.is_empty()
            && rendered
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.');
        if !valid {
            return Err(ClaimError::AllocationNameUnresolved {
                allocation: allocation.name.clone(),
                context: context.name.clone(),
                service: service.metadata.name.clone(),
            });
        }
        Ok(rendered)
    }

    /// Evaluates a criteria expression, mapping parse failures to the scope.
    fn eval_criteria(
        &self,
        criteria: &str,
        labels: &LabelSet,
        scope: String,
    ) -> Result<bool, ClaimError> {
        let expr = self.cache.expression(criteria).map_err(|source| ClaimError::Criteria {
            scope,
            source,
        })?;
        Ok(evaluate(&expr, labels.as_map()))
    }

    /// Logs the labels flowing into a frame, with the user's secret count.
    fn log_labels(&self, user: &User, labels: &LabelSet, scope: &str) {
        let secret_count = self
            .external
            .secret_loader
            .load_secrets(&user.id)
            .map(|secrets| secrets.len())
            .unwrap_or(0);
        self.event_log.info(format!(
            "labels ({scope}): {:?} and {secret_count} secrets",
            labels.as_map()
        ));
    }

    /// Emits an error record for every instance that ended up in conflict.
    fn log_instance_errors(&self, resolution: &PolicyResolution) {
        for instance in resolution.component_instances.values() {
            if let Some(error) = &instance.error {
                self.event_log.error_with_details(&crate::core::ErrorWithDetails::new(
                    error.message.clone(),
                    error.details.clone(),
                ));
            }
        }
    }
}
