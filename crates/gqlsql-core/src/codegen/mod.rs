//! Dialect backend (spec.md §4.4): renders a compiled [`crate::qcode::QCode`]
//! into either dialect-specific SQL text ([`select_sql`], [`mutation_sql`])
//! or a MongoDB pipeline DSL document ([`mongo`]).
//!
//! Every renderer here is pure: given the same `QCode` and dialect, it
//! always emits the same text and parameter order (spec.md §5).

pub mod mongo;
pub mod mutation_sql;
pub mod select_sql;

use crate::qcode::ScalarValue;

/// A fully rendered statement: SQL text with ordinal placeholders already
/// in place, plus the parameter values in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    /// The SQL text.
    pub sql: String,
    /// Bind parameter values, in placeholder order (1-based).
    pub params: Vec<ScalarValue>,
}

/// Render a SQL string literal, doubling embedded single quotes.
///
/// Shared by the select and mutation renderers for the handful of places
/// that must embed a literal directly (JSON object keys, `__typename`)
/// rather than bind it as a parameter.
#[must_use]
pub fn sql_string_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
