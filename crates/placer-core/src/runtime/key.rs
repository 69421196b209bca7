// crates/placer-core/src/runtime/key.rs
// ============================================================================
// Module: Component Instance Key
// Description: Canonical identity of a resolved component instance.
// Purpose: Provide a stable string form that parses back to its tuple.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A component instance is identified by the tuple `(namespace, contract,
//! context, allocation, service, component, cluster)`. The key serializes by
//! joining the fields with `:`; policy object names exclude the separator,
//! so the string form is unambiguous and round-trips exactly. Service-level
//! instances use the reserved `#root` component marker.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reserved component name for service-level root instances.
pub const COMPONENT_ROOT_NAME: &str = "#root";

/// Separator between key fields in the serialized form.
const KEY_SEPARATOR: char = ':';

/// Number of fields in a serialized key.
const KEY_FIELDS: usize = 7;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Key parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The serialized form did not contain exactly seven fields.
    #[error("component instance key '{key}' must have {KEY_FIELDS} fields")]
    FieldCount {
        /// Offending serialized key.
        key: String,
    },
    /// A key field was empty.
    #[error("component instance key '{key}' has an empty field")]
    EmptyField {
        /// Offending serialized key.
        key: String,
    },
}

// ============================================================================
// SECTION: Key
// ============================================================================

/// Canonical identity of a resolved component instance.
///
/// # Invariants
/// - The serialized form is a pure function of the tuple.
/// - No field is empty; no field other than `component` starts with `#`.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ComponentInstanceKey {
    /// Namespace of the resolved service.
    pub namespace: String,
    /// Contract governing the claim.
    pub contract: String,
    /// Matched context name.
    pub context: String,
    /// Resolved allocation name.
    pub allocation: String,
    /// Resolved service name.
    pub service: String,
    /// Component name, or `#root` for the service-level instance.
    pub component: String,
    /// Target cluster name.
    pub cluster: String,
}

impl ComponentInstanceKey {
    /// Creates the root key for a service-level instance.
    #[must_use]
    pub fn root(
        namespace: impl Into<String>,
        contract: impl Into<String>,
        context: impl Into<String>,
        allocation: impl Into<String>,
        service: impl Into<String>,
        cluster: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            contract: contract.into(),
            context: context.into(),
            allocation: allocation.into(),
            service: service.into(),
            component: COMPONENT_ROOT_NAME.to_string(),
            cluster: cluster.into(),
        }
    }

    /// Creates a key for a named component of the same placement.
    #[must_use]
    pub fn with_component(&self, component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            ..self.clone()
        }
    }

    /// Returns true when this is a service-level root instance.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.component == COMPONENT_ROOT_NAME
    }

    /// Returns the serialized string form.
    #[must_use]
    pub fn as_string(&self) -> String {
        [
            self.namespace.as_str(),
            self.contract.as_str(),
            self.context.as_str(),
            self.allocation.as_str(),
            self.service.as_str(),
            self.component.as_str(),
            self.cluster.as_str(),
        ]
        .join(&KEY_SEPARATOR.to_string())
    }

    /// Returns a name usable for deployments inside the target cluster.
    #[must_use]
    pub fn deploy_name(&self) -> String {
        let component = if self.is_root() { "root" } else { self.component.as_str() };
        format!("{}-{}-{}-{}", self.service, self.context, self.allocation, component)
    }

    /// Parses a serialized key back into its tuple.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] when the field count is wrong or a field is
    /// empty.
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        let fields: Vec<&str> = key.split(KEY_SEPARATOR).collect();
        if fields.len() != KEY_FIELDS {
            return Err(KeyError::FieldCount {
                key: key.to_string(),
            });
        }
        if fields.iter().any(|field| field.is_empty()) {
            return Err(KeyError::EmptyField {
                key: key.to_string(),
            });
        }

        Ok(Self {
            namespace: fields[0].to_string(),
            contract: fields[1].to_string(),
            context: fields[2].to_string(),
            allocation: fields[3].to_string(),
            service: fields[4].to_string(),
            component: fields[5].to_string(),
            cluster: fields[6].to_string(),
        })
    }
}

impl fmt::Display for ComponentInstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a representative root key.
    fn sample_root() -> ComponentInstanceKey {
        ComponentInstanceKey::root("main", "web-contract", "prod", "primary", "web", "k1")
    }

    #[test]
    fn serialized_key_round_trips() {
        let key = sample_root().with_component("backend");
        let parsed = ComponentInstanceKey::parse(&key.as_string()).expect("parse");
        assert_eq!(parsed, key);
    }

    #[test]
    fn root_marker_round_trips() {
        let key = sample_root();
        assert!(key.is_root());

        let parsed = ComponentInstanceKey::parse(&key.as_string()).expect("parse");
        assert!(parsed.is_root());
        assert_eq!(parsed.component, COMPONENT_ROOT_NAME);
    }

    #[test]
    fn parse_rejects_wrong_field_counts() {
        assert!(matches!(
            ComponentInstanceKey::parse("a:b:c"),
            Err(KeyError::FieldCount { .. })
        ));
        assert!(matches!(
            ComponentInstanceKey::parse("a:b:c:d:e:f:g:h"),
            Err(KeyError::FieldCount { .. })
        ));
    }

    #[test]
    fn parse_rejects_empty_fields() {
        assert!(matches!(
            ComponentInstanceKey::parse("main::prod:primary:web:#root:k1"),
            Err(KeyError::EmptyField { .. })
        ));
    }

    #[test]
    fn deploy_name_avoids_the_root_marker() {
        assert_eq!(sample_root().deploy_name(), "web-prod-primary-root");
        assert_eq!(
            sample_root().with_component("db").deploy_name(),
            "web-prod-primary-db"
        );
    }
}
