// crates/placer-core/src/core/params.rs
// ============================================================================
// Module: Nested Parameter Trees
// Description: Nested code and discovery parameters with deep comparison.
// Purpose: Carry rendered component parameters and detect fan-in conflicts.
// Dependencies: label-logic, serde_json
// ============================================================================

//! ## Overview
//! Code and discovery parameters are arbitrary JSON trees whose string
//! leaves may contain `{{label}}` templates. Rendering substitutes labels
//! throughout the tree; comparison is deep equality with an empty object and
//! an absent tree treated as equal, so repeated contributions from different
//! claims only conflict when the rendered values genuinely differ.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use label_logic::ExpressionCache;
use label_logic::ParseError;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Nested Parameters
// ============================================================================

/// Nested parameter tree for code and discovery parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NestedParams(pub Value);

impl NestedParams {
    /// Creates an empty parameter tree.
    #[must_use]
    pub fn new() -> Self {
        Self(Value::Null)
    }

    /// Returns true when the tree carries no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Deep equality with empty and absent trees treated as equal.
    #[must_use]
    pub fn deep_equal(&self, other: &Self) -> bool {
        if self.is_empty() && other.is_empty() {
            return true;
        }
        self.0 == other.0
    }

    /// Produces a structured diff of two trees for conflict reporting.
    ///
    /// Each entry maps a `/`-separated path to the differing existing and
    /// new values.
    #[must_use]
    pub fn diff(&self, other: &Self) -> Value {
        let mut entries = serde_json::Map::new();
        diff_values("", &self.0, &other.0, &mut entries);
        Value::Object(entries)
    }

    /// Renders every string leaf as a label template.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when a string leaf is a malformed template.
    pub fn render(
        &self,
        labels: &BTreeMap<String, String>,
        cache: &ExpressionCache,
    ) -> Result<Self, ParseError> {
        Ok(Self(render_value(&self.0, labels, cache)?))
    }
}

impl PartialEq for NestedParams {
    fn eq(&self, other: &Self) -> bool {
        self.deep_equal(other)
    }
}

impl From<Value> for NestedParams {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

/// Recursively renders string leaves through the template cache.
fn render_value(
    value: &Value,
    labels: &BTreeMap<String, String>,
    cache: &ExpressionCache,
) -> Result<Value, ParseError> {
    match value {
        Value::String(text) => {
            let template = cache.template(text)?;
            Ok(Value::String(template.render(labels)))
        }
        Value::Array(items) => {
            let mut rendered = Vec::with_capacity(items.len());
            for item in items {
                rendered.push(render_value(item, labels, cache)?);
            }
            Ok(Value::Array(rendered))
        }
        Value::Object(map) => {
            let mut rendered = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                rendered.insert(key.clone(), render_value(item, labels, cache)?);
            }
            Ok(Value::Object(rendered))
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => Ok(value.clone()),
    }
}

/// Recursively collects differing paths between two JSON values.
fn diff_values(path: &str, existing: &Value, new: &Value, out: &mut serde_json::Map<String, Value>) {
    match (existing, new) {
        (Value::Object(left), Value::Object(right)) => {
            for (key, left_value) in left {
                let child = join_path(path, key);
                match right.get(key) {
                    Some(right_value) => diff_values(&child, left_value, right_value, out),
                    None => {
                        out.insert(child, json!({"existing": left_value, "new": Value::Null}));
                    }
                }
            }
            for (key, right_value) in right {
                if !left.contains_key(key) {
                    out.insert(
                        join_path(path, key),
                        json!({"existing": Value::Null, "new": right_value}),
                    );
                }
            }
        }
        _ => {
            if existing != new {
                let key = if path.is_empty() { "/".to_string() } else { path.to_string() };
                out.insert(key, json!({"existing": existing, "new": new}));
            }
        }
    }
}

/// Joins a parent path with a child key.
fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() { key.to_string() } else { format!("{path}/{key}") }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
