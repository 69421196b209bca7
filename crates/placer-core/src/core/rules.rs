// crates/placer-core/src/core/rules.rs
// ============================================================================
// Module: Placement Rules
// Description: Weight-ordered, label-matched rules and their actions.
// Purpose: Gate dependencies and ingress, and assign ACL roles.
// Dependencies: crate::core::{acl, labels, objects}, label-logic, serde
// ============================================================================

//! ## Overview
//! Rules match label predicates and carry actions: reject a dependency,
//! reject ingress traffic, or assign roles over namespace spans. Rules are
//! evaluated in ascending weight order and every matching rule's actions are
//! applied into a [`RuleActionResult`]. The same shape serves both global
//! placement rules and ACL rules; the ACL resolver only applies role
//! assignments.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use label_logic::ExpressionCache;
use label_logic::ParseError;
use label_logic::evaluate;
use serde::Deserialize;
use serde::Serialize;

use crate::core::acl::RoleId;
use crate::core::acl::RoleMap;
use crate::core::labels::LabelSet;
use crate::core::objects::Metadata;

// ============================================================================
// SECTION: Rule
// ============================================================================

/// Enforcement decision carried by a rule action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Permit the gated operation.
    Allow,
    /// Reject the gated operation.
    Reject,
}

/// Actions applied when a rule matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleActions {
    /// Dependency gate: `reject` fails the claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency: Option<Decision>,
    /// Ingress gate: `reject` clears `allow_ingress` for the instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<Decision>,
    /// Role assignments: role to namespace spans (`*` spans everything).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub add_role: BTreeMap<RoleId, Vec<String>>,
}

/// Weight-ordered, label-matched rule.
///
/// # Invariants
/// - Rules with equal weight order by name for determinism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Object metadata.
    pub metadata: Metadata,
    /// Evaluation weight; lower weights evaluate first.
    pub weight: i32,
    /// Criteria expression over labels; absent means always-match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<String>,
    /// Actions applied when the rule matches.
    #[serde(default)]
    pub actions: RuleActions,
}

impl Rule {
    /// Evaluates the rule's criteria against a label set.
    ///
    /// A rule without criteria matches everything.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the criteria source is malformed.
    pub fn matches(&self, labels: &LabelSet, cache: &ExpressionCache) -> Result<bool, ParseError> {
        match &self.criteria {
            Some(source) => {
                let expr = cache.expression(source)?;
                Ok(evaluate(&expr, labels.as_map()))
            }
            None => Ok(true),
        }
    }

    /// Applies the rule's actions into an accumulated result.
    pub fn apply_actions(&self, result: &mut RuleActionResult) {
        if self.actions.dependency == Some(Decision::Reject) {
            result.reject_dependency = true;
        }
        if self.actions.ingress == Some(Decision::Reject) {
            result.reject_ingress = true;
        }
        for (role, namespaces) in &self.actions.add_role {
            let span = result.role_map.entry(*role).or_insert_with(BTreeSet::new);
            for namespace in namespaces {
                span.insert(namespace.clone());
            }
        }
    }
}

// ============================================================================
// SECTION: Rule Action Result
// ============================================================================

/// Accumulated result of applying matching rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleActionResult {
    /// True when any matching rule rejected the dependency.
    pub reject_dependency: bool,
    /// True when any matching rule rejected ingress.
    pub reject_ingress: bool,
    /// Accumulated role assignments.
    pub role_map: RoleMap,
}

impl RuleActionResult {
    /// Creates an empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================================
// SECTION: Rule Evaluation
// ============================================================================

/// Evaluates rules in order and accumulates actions of the matching ones.
///
/// # Errors
///
/// Returns [`ParseError`] when a rule's criteria source is malformed.
pub fn evaluate_rules(
    rules: &[Rule],
    labels: &LabelSet,
    cache: &ExpressionCache,
) -> Result<RuleActionResult, ParseError> {
    let mut result = RuleActionResult::new();
    for rule in rules {
        if rule.matches(labels, cache)? {
            rule.apply_actions(&mut result);
        }
    }
    Ok(result)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::objects::Kind;

    /// Builds a rule with the given criteria and actions.
    fn rule(name: &str, weight: i32, criteria: Option<&str>, actions: RuleActions) -> Rule {
        Rule {
            metadata: Metadata::new("main", Kind::Rule, name),
            weight,
            criteria: criteria.map(str::to_string),
            actions,
        }
    }

    #[test]
    fn matching_rule_rejects_ingress() {
        let rules = vec![rule(
            "no-prod-ingress",
            10,
            Some("env == 'prod'"),
            RuleActions {
                ingress: Some(Decision::Reject),
                ..RuleActions::default()
            },
        )];
        let cache = ExpressionCache::new();

        let prod = evaluate_rules(&rules, &LabelSet::from([("env", "prod")]), &cache)
            .expect("evaluate");
        assert!(prod.reject_ingress);
        assert!(!prod.reject_dependency);

        let dev = evaluate_rules(&rules, &LabelSet::from([("env", "dev")]), &cache)
            .expect("evaluate");
        assert!(!dev.reject_ingress);
    }

    #[test]
    fn rule_without_criteria_matches_everything() {
        let rules = vec![rule(
            "deny-all",
            1,
            None,
            RuleActions {
                dependency: Some(Decision::Reject),
                ..RuleActions::default()
            },
        )];
        let cache = ExpressionCache::new();

        let result = evaluate_rules(&rules, &LabelSet::new(), &cache).expect("evaluate");
        assert!(result.reject_dependency);
    }

    #[test]
    fn role_assignments_accumulate_across_rules() {
        let rules = vec![
            rule(
                "ops-admin",
                1,
                None,
                RuleActions {
                    add_role: [(RoleId::NamespaceAdmin, vec!["main".to_string()])].into(),
                    ..RuleActions::default()
                },
            ),
            rule(
                "ops-admin-extra",
                2,
                None,
                RuleActions {
                    add_role: [(RoleId::NamespaceAdmin, vec!["staging".to_string()])].into(),
                    ..RuleActions::default()
                },
            ),
        ];
        let cache = ExpressionCache::new();

        let result = evaluate_rules(&rules, &LabelSet::new(), &cache).expect("evaluate");
        let span = result.role_map.get(&RoleId::NamespaceAdmin).expect("span");
        assert!(span.contains("main") && span.contains("staging"));
    }
}
