// crates/label-logic/src/cache.rs
// ============================================================================
// Module: Expression Compile Cache
// Description: Concurrent cache from source text to compiled forms.
// Purpose: Parse each criteria or template string at most once per engine.
// Dependencies: crate::{ast, error, parser, template}
// ============================================================================

//! ## Overview
//! The cache maps criteria and template source text to their compiled forms
//! behind reader/writer locks. Readers share; a compile miss takes the write
//! lock, re-checks the entry, and inserts exactly once, so concurrent misses
//! on the same key compile a single time. Parse failures are not cached;
//! policy validation rejects them long before hot paths re-parse.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use crate::ast::Expr;
use crate::error::ParseError;
use crate::parser::parse_expression;
use crate::template::Template;
use crate::template::parse_template;

// ============================================================================
// SECTION: Expression Cache
// ============================================================================

/// Concurrent cache of compiled criteria expressions and templates.
#[derive(Debug, Default)]
pub struct ExpressionCache {
    /// Compiled criteria keyed by source text.
    exprs: RwLock<HashMap<String, Arc<Expr>>>,
    /// Compiled templates keyed by source text.
    templates: RwLock<HashMap<String, Arc<Template>>>,
}

impl ExpressionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled expression for the source, compiling on miss.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the source fails to parse.
    pub fn expression(&self, source: &str) -> Result<Arc<Expr>, ParseError> {
        if let Some(expr) = self.read_expr(source) {
            return Ok(expr);
        }

        let compiled = Arc::new(parse_expression(source)?);
        let mut guard = self.exprs.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let entry = guard.entry(source.to_string()).or_insert(compiled);
        Ok(Arc::clone(entry))
    }

    /// Returns the compiled template for the source, compiling on miss.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the source fails to parse.
    pub fn template(&self, source: &str) -> Result<Arc<Template>, ParseError> {
        if let Some(template) = self.read_template(source) {
            return Ok(template);
        }

        let compiled = Arc::new(parse_template(source)?);
        let mut guard = self.templates.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let entry = guard.entry(source.to_string()).or_insert(compiled);
        Ok(Arc::clone(entry))
    }

    /// Returns the number of cached expressions.
    #[must_use]
    pub fn expression_count(&self) -> usize {
        self.exprs.read().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    /// Looks up a compiled expression under the read lock.
    fn read_expr(&self, source: &str) -> Option<Arc<Expr>> {
        self.exprs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(source)
            .map(Arc::clone)
    }

    /// Looks up a compiled template under the read lock.
    fn read_template(&self, source: &str) -> Option<Arc<Template>> {
        self.templates
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(source)
            .map(Arc::clone)
    }
}
