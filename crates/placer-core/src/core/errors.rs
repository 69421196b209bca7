// crates/placer-core/src/core/errors.rs
// ============================================================================
// Module: Detailed Errors
// Description: Error wrapper carrying a structured details map.
// Purpose: Attach machine-readable context to engine errors.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! `ErrorWithDetails` pairs a human-readable message with a structured
//! details map (for example, the conflicting parameter trees and their
//! diff). The message always renders; the details render only when the
//! event log runs in debug mode, keeping operator output readable while
//! preserving full diagnostics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Error With Details
// ============================================================================

/// Error carrying a structured details map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ErrorWithDetails {
    /// Human-readable error message.
    pub message: String,
    /// Structured diagnostic details.
    pub details: Value,
}

impl ErrorWithDetails {
    /// Creates a detailed error.
    #[must_use]
    pub fn new(message: impl Into<String>, details: Value) -> Self {
        Self {
            message: message.into(),
            details,
        }
    }

    /// Creates a detailed error with no details payload.
    #[must_use]
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Value::Null,
        }
    }
}
