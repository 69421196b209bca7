// crates/placer-core/src/core/acl.rs
// ============================================================================
// Module: ACL Resolver
// Description: Role-based privilege resolution with per-user caching.
// Purpose: Determine read/write/consume rights for users over objects.
// Dependencies: crate::core::{objects, rules}, label-logic, serde
// ============================================================================

//! ## Overview
//! ACL resolution maps a user to a role map (role to namespace spans) by
//! running the user's labels through weight-ordered ACL rules, then answers
//! privilege lookups by walking the roles in privilege order and returning
//! the first role whose span covers the object's namespace. Role maps are
//! cached per user; entries are immutable once stored, so concurrent readers
//! never observe partial results.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use label_logic::ExpressionCache;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::objects::Kind;
use crate::core::objects::SYSTEM_NAMESPACE;
use crate::core::objects::User;
use crate::core::rules::Rule;
use crate::core::rules::RuleActionResult;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Namespace span wildcard covering every namespace.
pub const NAMESPACE_ALL: &str = "*";

// ============================================================================
// SECTION: Roles
// ============================================================================

/// Access-control role identifiers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RoleId {
    /// Full control over the whole domain.
    DomainAdmin,
    /// Full control over a set of namespaces.
    NamespaceAdmin,
    /// Consume services within a set of namespaces.
    ServiceConsumer,
    /// No granted role.
    Nobody,
}

/// Roles in privilege order; the first covering role wins a lookup.
pub const ROLES_ORDERED: [RoleId; 4] =
    [RoleId::DomainAdmin, RoleId::NamespaceAdmin, RoleId::ServiceConsumer, RoleId::Nobody];

/// Map from role to the namespaces it spans (`*` spans everything).
pub type RoleMap = BTreeMap<RoleId, BTreeSet<String>>;

// ============================================================================
// SECTION: Privileges
// ============================================================================

/// Privileges for a single object kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privilege {
    /// Permission to read the object.
    pub read: bool,
    /// Permission to create, update, or delete the object.
    pub write: bool,
    /// Permission to consume the object (claims against services).
    pub consume: bool,
}

impl Privilege {
    /// No access at all.
    pub const NO_ACCESS: Self = Self {
        read: false,
        write: false,
        consume: false,
    };
    /// Read-only access.
    pub const VIEW: Self = Self {
        read: true,
        write: false,
        consume: false,
    };
    /// Read plus consume access.
    pub const CONSUME: Self = Self {
        read: true,
        write: false,
        consume: true,
    };
    /// Full access.
    pub const FULL: Self = Self {
        read: true,
        write: true,
        consume: true,
    };
}

/// Returns the privilege a role grants for an object kind.
///
/// `system_namespace` selects the global-object table; otherwise the
/// namespaced-object table applies. Missing entries yield no access.
#[must_use]
pub fn role_object_privilege(role: RoleId, kind: Kind, system_namespace: bool) -> Privilege {
    match role {
        RoleId::DomainAdmin => Privilege::FULL,
        RoleId::NamespaceAdmin => {
            if system_namespace {
                Privilege::VIEW
            } else {
                Privilege::FULL
            }
        }
        RoleId::ServiceConsumer => {
            if system_namespace {
                Privilege::VIEW
            } else {
                match kind {
                    Kind::Claim => Privilege::CONSUME,
                    Kind::Service | Kind::Bundle | Kind::Contract | Kind::Rule => Privilege::VIEW,
                    Kind::Cluster | Kind::AclRule => Privilege::NO_ACCESS,
                }
            }
        }
        RoleId::Nobody => Privilege::NO_ACCESS,
    }
}

// ============================================================================
// SECTION: ACL Resolver
// ============================================================================

/// ACL resolution errors.
#[derive(Debug, Error)]
pub enum AclError {
    /// An ACL rule's criteria failed to parse.
    #[error("unable to resolve roles for user '{user}': {source}")]
    RuleCriteria {
        /// User whose roles were being resolved.
        user: String,
        /// Underlying parse failure.
        #[source]
        source: label_logic::ParseError,
    },
}

/// Resolves user privileges from weight-ordered ACL rules.
///
/// # Invariants
/// - `rules` are sorted by ascending weight before construction.
/// - Cached role maps are immutable once stored.
pub struct AclResolver {
    /// ACL rules in evaluation order.
    rules: Vec<Rule>,
    /// Shared expression compile cache.
    cache: Arc<ExpressionCache>,
    /// Role maps cached per user id.
    role_map_cache: RwLock<HashMap<String, Arc<RoleMap>>>,
}

impl AclResolver {
    /// Creates a resolver over weight-sorted ACL rules.
    #[must_use]
    pub fn new(rules: Vec<Rule>, cache: Arc<ExpressionCache>) -> Self {
        Self {
            rules,
            cache,
            role_map_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the privilege the user holds over an object.
    ///
    /// # Errors
    ///
    /// Returns [`AclError`] when role resolution fails on malformed rule
    /// criteria.
    pub fn user_privileges(
        &self,
        user: &User,
        namespace: &str,
        kind: Kind,
    ) -> Result<Privilege, AclError> {
        let role_map = self.user_role_map(user)?;
        let system_namespace = namespace == SYSTEM_NAMESPACE;

        for role in ROLES_ORDERED {
            let Some(span) = role_map.get(&role) else {
                continue;
            };
            if span.contains(NAMESPACE_ALL) || span.contains(namespace) {
                return Ok(role_object_privilege(role, kind, system_namespace));
            }
        }

        Ok(Privilege::NO_ACCESS)
    }

    /// Returns the cached role map for a user, computing it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`AclError`] when an ACL rule's criteria fails to parse.
    pub fn user_role_map(&self, user: &User) -> Result<Arc<RoleMap>, AclError> {
        if let Some(cached) = self.read_cached(&user.id) {
            return Ok(cached);
        }

        let mut result = RuleActionResult::new();
        if user.admin {
            // Explicitly flagged domain admins bypass the rule walk.
            result
                .role_map
                .entry(RoleId::DomainAdmin)
                .or_default()
                .insert(NAMESPACE_ALL.to_string());
        } else {
            for rule in &self.rules {
                let matched =
                    rule.matches(&user.labels, &self.cache).map_err(|source| {
                        AclError::RuleCriteria {
                            user: user.id.clone(),
                            source,
                        }
                    })?;
                if matched {
                    rule.apply_actions(&mut result);
                }
            }
        }

        let role_map = Arc::new(result.role_map);
        let mut guard =
            self.role_map_cache.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let entry = guard.entry(user.id.clone()).or_insert_with(|| Arc::clone(&role_map));
        Ok(Arc::clone(entry))
    }

    /// Returns the number of cached role maps.
    #[must_use]
    pub fn cached_users(&self) -> usize {
        self.role_map_cache.read().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    /// Looks up a cached role map under the read lock.
    fn read_cached(&self, user_id: &str) -> Option<Arc<RoleMap>> {
        self.role_map_cache
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(user_id)
            .map(Arc::clone)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::labels::LabelSet;
    use crate::core::objects::Metadata;
    use crate::core::rules::RuleActions;

    /// Builds a user with the given labels.
    fn user(id: &str, admin: bool, labels: LabelSet) -> User {
        User {
            id: id.to_string(),
            name: id.to_string(),
            labels,
            admin,
        }
    }

    /// Builds an ACL rule assigning a role over namespaces.
    fn acl_rule(name: &str, criteria: &str, role: RoleId, namespaces: &[&str]) -> Rule {
        Rule {
            metadata: Metadata::new(SYSTEM_NAMESPACE, Kind::AclRule, name),
            weight: 10,
            criteria: Some(criteria.to_string()),
            actions: RuleActions {
                add_role: [(role, namespaces.iter().map(|ns| (*ns).to_string()).collect())]
                    .into(),
                ..RuleActions::default()
            },
        }
    }

    #[test]
    fn user_without_roles_has_no_access_anywhere() {
        let resolver = AclResolver::new(Vec::new(), Arc::new(ExpressionCache::new()));
        let outsider = user("mallory", false, LabelSet::new());

        for kind in [Kind::Service, Kind::Bundle, Kind::Cluster, Kind::Claim, Kind::Rule] {
            let privilege = resolver
                .user_privileges(&outsider, "main", kind)
                .expect("resolve");
            assert_eq!(privilege, Privilege::NO_ACCESS);
        }
    }

    #[test]
    fn admin_flag_grants_write_everywhere_and_caches() {
        let resolver = AclResolver::new(
            vec![acl_rule("consumers", "team == 'dev'", RoleId::ServiceConsumer, &["main"])],
            Arc::new(ExpressionCache::new()),
        );
        let root = user("root", true, LabelSet::new());

        let first = resolver
            .user_privileges(&root, "main", Kind::Service)
            .expect("resolve");
        assert!(first.write);

        let system = resolver
            .user_privileges(&root, SYSTEM_NAMESPACE, Kind::Cluster)
            .expect("resolve");
        assert!(system.write);

        // Second lookup is served from the cache without re-running rules.
        assert_eq!(resolver.cached_users(), 1);
        let again = resolver
            .user_privileges(&root, "main", Kind::Service)
            .expect("resolve");
        assert!(again.write);
        assert_eq!(resolver.cached_users(), 1);
    }

    #[test]
    fn consumer_role_spans_only_its_namespaces() {
        let resolver = AclResolver::new(
            vec![acl_rule("consumers", "team == 'dev'", RoleId::ServiceConsumer, &["main"])],
            Arc::new(ExpressionCache::new()),
        );
        let dev = user("alice", false, LabelSet::from([("team", "dev")]));

        let in_span = resolver.user_privileges(&dev, "main", Kind::Claim).expect("resolve");
        assert!(in_span.consume);

        let out_of_span =
            resolver.user_privileges(&dev, "staging", Kind::Claim).expect("resolve");
        assert_eq!(out_of_span, Privilege::NO_ACCESS);

        // A span of plain namespaces does not cover the system namespace.
        let global = resolver
            .user_privileges(&dev, SYSTEM_NAMESPACE, Kind::Cluster)
            .expect("resolve");
        assert_eq!(global, Privilege::NO_ACCESS);
    }

    #[test]
    fn wildcard_span_grants_view_on_global_objects() {
        let resolver = AclResolver::new(
            vec![acl_rule("everywhere", "team == 'dev'", RoleId::ServiceConsumer, &["*"])],
            Arc::new(ExpressionCache::new()),
        );
        let dev = user("carol", false, LabelSet::from([("team", "dev")]));

        let global = resolver
            .user_privileges(&dev, SYSTEM_NAMESPACE, Kind::Cluster)
            .expect("resolve");
        assert!(global.read && !global.write);
    }

    #[test]
    fn first_covering_role_in_order_wins() {
        let resolver = AclResolver::new(
            vec![
                acl_rule("admins", "team == 'ops'", RoleId::NamespaceAdmin, &["main"]),
                acl_rule("consumers", "team == 'ops'", RoleId::ServiceConsumer, &["main"]),
            ],
            Arc::new(ExpressionCache::new()),
        );
        let ops = user("bob", false, LabelSet::from([("team", "ops")]));

        let privilege = resolver.user_privileges(&ops, "main", Kind::Service).expect("resolve");
        assert!(privilege.write, "namespace admin outranks service consumer");
    }
}
