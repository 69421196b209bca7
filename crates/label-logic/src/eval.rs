// crates/label-logic/src/eval.rs
// ============================================================================
// Module: Criteria Evaluation
// Description: Evaluate compiled criteria expressions over label maps.
// Purpose: Provide total, deterministic predicate evaluation.
// Dependencies: crate::ast
// ============================================================================

//! ## Overview
//! Evaluation is total: a predicate that references a label key absent from
//! the map evaluates to `false` as a whole, mirroring how the placement
//! engine treats unmatched criteria. Equality is string equality; ordered
//! comparisons use integer semantics when both operands parse as integers
//! and lexicographic ordering otherwise.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::ast::CompareOp;
use crate::ast::Expr;

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Evaluates a compiled criteria expression against a label map.
///
/// Returns `false` when the expression references a label key that is absent
/// from the map.
#[must_use]
pub fn evaluate(expr: &Expr, labels: &BTreeMap<String, String>) -> bool {
    eval_bool(expr, labels).unwrap_or(false)
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Operand value during evaluation.
enum Operand<'a> {
    /// String value (label values and string literals).
    Str(&'a str),
    /// Integer literal.
    Int(i64),
}

impl Operand<'_> {
    /// Renders the operand as a string slice for equality tests.
    fn as_str(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Self::Str(value) => std::borrow::Cow::Borrowed(value),
            Self::Int(value) => std::borrow::Cow::Owned(value.to_string()),
        }
    }

    /// Returns the integer form when the operand parses as an integer.
    fn as_int(&self) -> Option<i64> {
        match self {
            Self::Str(value) => value.parse().ok(),
            Self::Int(value) => Some(*value),
        }
    }
}

/// Evaluates a boolean expression; `None` signals a missing label reference.
fn eval_bool(expr: &Expr, labels: &BTreeMap<String, String>) -> Option<bool> {
    match expr {
        // A bare identifier is shorthand for `ident == 'true'`.
        Expr::Ident(name) => Some(labels.get(name)? == "true"),
        Expr::Str(value) => Some(value == "true"),
        Expr::Int(value) => Some(*value != 0),
        Expr::Not(inner) => Some(!eval_bool(inner, labels)?),
        Expr::And(parts) => {
            for part in parts {
                if !eval_bool(part, labels)? {
                    return Some(false);
                }
            }
            Some(true)
        }
        Expr::Or(parts) => {
            for part in parts {
                if eval_bool(part, labels)? {
                    return Some(true);
                }
            }
            Some(false)
        }
        Expr::Compare {
            op,
            lhs,
            rhs,
        } => {
            let lhs = eval_operand(lhs, labels)?;
            let rhs = eval_operand(rhs, labels)?;
            Some(compare(*op, &lhs, &rhs))
        }
        Expr::In {
            needle,
            haystack,
        } => {
            let needle = eval_operand(needle, labels)?;
            for member in haystack {
                let member = eval_operand(member, labels)?;
                if needle.as_str() == member.as_str() {
                    return Some(true);
                }
            }
            Some(false)
        }
    }
}

/// Resolves an operand expression; `None` signals a missing label reference.
fn eval_operand<'a>(
    expr: &'a Expr,
    labels: &'a BTreeMap<String, String>,
) -> Option<Operand<'a>> {
    match expr {
        Expr::Ident(name) => labels.get(name).map(|value| Operand::Str(value)),
        Expr::Str(value) => Some(Operand::Str(value)),
        Expr::Int(value) => Some(Operand::Int(*value)),
        _ => None,
    }
}

/// Applies a comparison operator to two operands.
fn compare(op: CompareOp, lhs: &Operand<'_>, rhs: &Operand<'_>) -> bool {
    match op {
        CompareOp::Eq => lhs.as_str() == rhs.as_str(),
        CompareOp::Ne => lhs.as_str() != rhs.as_str(),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let ordering = ordered(lhs, rhs);
            match op {
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Ge => ordering != Ordering::Less,
                CompareOp::Eq | CompareOp::Ne => false,
            }
        }
    }
}

/// Orders two operands: integer ordering when both parse, lexicographic
/// otherwise.
fn ordered(lhs: &Operand<'_>, rhs: &Operand<'_>) -> Ordering {
    match (lhs.as_int(), rhs.as_int()) {
        (Some(lhs), Some(rhs)) => lhs.cmp(&rhs),
        _ => lhs.as_str().cmp(&rhs.as_str()),
    }
}
