// crates/label-logic/src/error.rs
// ============================================================================
// Module: Label Logic Errors
// Description: Parse errors for criteria expressions and templates.
// Purpose: Provide spanned, structured diagnostics for untrusted input.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Parse errors carry byte offsets into the original source so policy
//! authors can locate mistakes. Evaluation itself is total and produces no
//! errors; everything here is syntactic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Parse Errors
// ============================================================================

/// Errors produced while parsing criteria expressions or templates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Input was empty or contained only whitespace.
    #[error("expression is empty")]
    EmptyInput,
    /// Input exceeded the configured size limit.
    #[error("expression exceeds size limit: {actual_bytes} bytes (max {max_bytes})")]
    InputTooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual input length in bytes.
        actual_bytes: usize,
    },
    /// Input exceeded the configured nesting depth.
    #[error("expression nesting exceeds limit: depth {actual_depth} (max {max_depth}) at {position}")]
    NestingTooDeep {
        /// Maximum allowed nesting depth.
        max_depth: usize,
        /// Depth reached when the error occurred.
        actual_depth: usize,
        /// Byte offset in the original input.
        position: usize,
    },
    /// Unexpected token encountered during parsing.
    #[error("unexpected token `{found}` at {position}, expected {expected}")]
    UnexpectedToken {
        /// Human-friendly expectation summary.
        expected: &'static str,
        /// The token that was actually seen.
        found: String,
        /// Byte offset in the original input.
        position: usize,
    },
    /// String literal was not terminated.
    #[error("unterminated string literal starting at {position}")]
    UnterminatedString {
        /// Byte offset where the literal starts.
        position: usize,
    },
    /// Numeric literal failed to parse or overflowed.
    #[error("invalid number `{raw}` at {position}")]
    InvalidNumber {
        /// The raw numeric text.
        raw: String,
        /// Byte offset in the original input.
        position: usize,
    },
    /// Unexpected trailing input after a complete expression.
    #[error("unexpected trailing input at {position}")]
    TrailingInput {
        /// Byte offset where the unexpected input begins.
        position: usize,
    },
    /// Template placeholder was not closed with `}}`.
    #[error("unterminated template placeholder starting at {position}")]
    UnterminatedPlaceholder {
        /// Byte offset where the placeholder opens.
        position: usize,
    },
    /// Template placeholder did not contain a single label key.
    #[error("invalid template placeholder `{raw}` at {position}")]
    InvalidPlaceholder {
        /// Raw placeholder contents.
        raw: String,
        /// Byte offset where the placeholder opens.
        position: usize,
    },
}
