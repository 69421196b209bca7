// crates/label-logic/src/ast.rs
// ============================================================================
// Module: Label Expression AST
// Description: Abstract syntax tree for label criteria expressions.
// Purpose: Provide a stable, serializable compiled form for criteria.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The AST is the compiled form of a criteria expression. It is produced by
//! the parser, cached by source text, and evaluated against label maps. The
//! tree is immutable once built; evaluation never mutates it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Comparison Operators
// ============================================================================

/// Comparison operator applied between two operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    /// Equality (string comparison).
    Eq,
    /// Inequality (string comparison).
    Ne,
    /// Less-than (integer when both sides parse, lexicographic otherwise).
    Lt,
    /// Less-than-or-equal.
    Le,
    /// Greater-than.
    Gt,
    /// Greater-than-or-equal.
    Ge,
}

impl CompareOp {
    /// Returns the operator's source form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

// ============================================================================
// SECTION: Expression Tree
// ============================================================================

/// Compiled criteria expression.
///
/// # Invariants
/// - `And` and `Or` carry at least two children (the parser collapses
///   single-child chains).
/// - `In` haystacks contain only operand expressions (idents or literals).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Label reference; evaluates to the label's value.
    Ident(String),
    /// String literal.
    Str(String),
    /// Integer literal.
    Int(i64),
    /// Logical negation.
    Not(Box<Expr>),
    /// Logical conjunction.
    And(Vec<Expr>),
    /// Logical disjunction.
    Or(Vec<Expr>),
    /// Binary comparison between two operands.
    Compare {
        /// Comparison operator.
        op: CompareOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Set membership test.
    In {
        /// Candidate operand.
        needle: Box<Expr>,
        /// Members to test against.
        haystack: Vec<Expr>,
    },
}

impl Expr {
    /// Collects the label keys referenced by this expression.
    #[must_use]
    pub fn referenced_keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    /// Walks the tree and appends referenced label keys.
    fn collect_keys<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Ident(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Self::Str(_) | Self::Int(_) => {}
            Self::Not(inner) => inner.collect_keys(out),
            Self::And(parts) | Self::Or(parts) => {
                for part in parts {
                    part.collect_keys(out);
                }
            }
            Self::Compare {
                lhs,
                rhs,
                ..
            } => {
                lhs.collect_keys(out);
                rhs.collect_keys(out);
            }
            Self::In {
                needle,
                haystack,
            } => {
                needle.collect_keys(out);
                for member in haystack {
                    member.collect_keys(out);
                }
            }
        }
    }
}
