//! Dialect capability set for the `gqlsql` query-compiler core.
//!
//! This crate owns everything that differs between back ends: identifier
//! quoting, placeholder syntax, JSON aggregation, pagination clauses,
//! upsert forms, and GIS function names. It never touches a socket — the
//! host is responsible for handing the rendered SQL text and parameter
//! list to a driver (spec.md §1, Out of scope).
//!
//! Dialect dispatch is capability-based (a trait with one method per
//! concern) rather than a `match dialect_enum` sprinkled through the
//! codegen layer: a new dialect is a new `impl Dialect`, not a new `if`
//! branch in every emission function.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dialect;
pub mod mssql;
pub mod mysql;
pub mod operator;
pub mod oracle;
pub mod postgres;
pub mod sqlite;

pub use dialect::{Dialect, MutationStrategy, SqlDialectKind};
pub use operator::Operator;

/// Quote a (possibly schema-qualified) identifier using a dialect's quote
/// character, escaping any embedded quote character by doubling it.
///
/// Shared by every dialect implementation in this crate — only the quote
/// character itself varies.
#[must_use]
pub fn quote_with(quote: char, ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 2);
    out.push(quote);
    for c in ident.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_with_escapes_embedded_quote() {
        assert_eq!(quote_with('"', "user"), "\"user\"");
        assert_eq!(quote_with('"', "weird\"name"), "\"weird\"\"name\"");
        assert_eq!(quote_with('`', "order"), "`order`");
    }
}
