// crates/label-logic/src/template.rs
// ============================================================================
// Module: Label String Templates
// Description: Parse and render `{{key}}` templates over label maps.
// Purpose: Support dynamic allocation names derived from labels.
// Dependencies: crate::error
// ============================================================================

//! ## Overview
//! Templates interleave literal text with `{{key}}` placeholders. Rendering
//! substitutes each placeholder with the label's value, or the empty string
//! when the key is absent. Only malformed placeholders are errors; rendering
//! itself is total.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ParseError;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum allowed template source size in bytes.
const MAX_TEMPLATE_INPUT_BYTES: usize = 4 * 1024;

// ============================================================================
// SECTION: Template
// ============================================================================

/// Template segment: literal text or a label placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Segment {
    /// Literal text copied verbatim.
    Literal(String),
    /// Placeholder substituted with a label value.
    Placeholder(String),
}

/// Compiled string template.
///
/// # Invariants
/// - Segments appear in source order; rendering concatenates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Ordered template segments.
    segments: Vec<Segment>,
}

impl Template {
    /// Returns true when the template contains no placeholders.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.segments.iter().all(|segment| matches!(segment, Segment::Literal(_)))
    }

    /// Renders the template against a label map.
    ///
    /// Placeholders whose key is absent render as the empty string.
    #[must_use]
    pub fn render(&self, labels: &BTreeMap<String, String>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(key) => {
                    if let Some(value) = labels.get(key) {
                        out.push_str(value);
                    }
                }
            }
        }
        out
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses template source into a compiled [`Template`].
///
/// # Errors
///
/// Returns [`ParseError`] for oversized input, unterminated placeholders, or
/// placeholders that are not a single label key.
pub fn parse_template(input: &str) -> Result<Template, ParseError> {
    if input.len() > MAX_TEMPLATE_INPUT_BYTES {
        return Err(ParseError::InputTooLarge {
            max_bytes: MAX_TEMPLATE_INPUT_BYTES,
            actual_bytes: input.len(),
        });
    }

    let mut segments = Vec::new();
    let mut rest = input;
    let mut position = 0;

    while let Some(open) = rest.find("{{") {
        if open > 0 {
            segments.push(Segment::Literal(rest[.. open].to_string()));
        }

        let after_open = &rest[open + 2 ..];
        let Some(close) = after_open.find("}}") else {
            return Err(ParseError::UnterminatedPlaceholder {
                position: position + open,
            });
        };

        let raw = &after_open[.. close];
        let key = raw.trim();
        if key.is_empty() || !is_label_key(key) {
            return Err(ParseError::InvalidPlaceholder {
                raw: raw.to_string(),
                position: position + open,
            });
        }
        segments.push(Segment::Placeholder(key.to_string()));

        let consumed = open + 2 + close + 2;
        position += consumed;
        rest = &rest[consumed ..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }

    Ok(Template {
        segments,
    })
}

/// Returns true when the string is a well-formed label key.
fn is_label_key(key: &str) -> bool {
    key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
}
