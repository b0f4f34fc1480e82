//! The `Dialect` capability trait.
//!
//! Every method here corresponds to one axis on which the five SQL back
//! ends (and, by omission, MongoDB) actually differ. Shared emission logic
//! in `gqlsql-core::codegen` stays free of `match dialect` branches; when a
//! feature truly diverges, a new method is added here rather than an `if`
//! at each call site (spec.md §9, Design Notes).

use gqlsql_error::{CompileError, Result};

use crate::operator::Operator;

/// Which of the five SQL back ends a [`Dialect`] implementation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialectKind {
    /// PostgreSQL.
    Postgres,
    /// MySQL / MariaDB.
    MySql,
    /// SQLite.
    Sqlite,
    /// Microsoft SQL Server.
    MsSql,
    /// Oracle Database.
    Oracle,
}

impl SqlDialectKind {
    /// Lowercase name, used in error messages and cache fingerprints.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
            Self::MsSql => "mssql",
            Self::Oracle => "oracle",
        }
    }
}

impl std::fmt::Display for SqlDialectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a dialect emits a tree of nested mutations (spec.md §4.4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStrategy {
    /// Topologically ordered CTEs, each `RETURNING` into the next (PostgreSQL).
    CtePipeline,
    /// A transaction script with session variables capturing each
    /// mutation's primary key for the next statement to consume.
    LinearScript,
}

/// Capability set describing how to render SQL for one back end.
///
/// Implementations are stateless and `Send + Sync`; the compiler core
/// selects one by [`SqlDialectKind`] and holds it for the lifetime of a
/// compilation.
pub trait Dialect: Send + Sync {
    /// Which back end this implementation targets.
    fn kind(&self) -> SqlDialectKind;

    /// Quote an identifier (table, column, or alias) for safe embedding in
    /// generated SQL.
    fn quote_ident(&self, ident: &str) -> String;

    /// Render the `n`th (1-based) bind parameter placeholder.
    fn placeholder(&self, index: usize) -> String;

    /// How this dialect executes a tree of nested mutations.
    fn mutation_strategy(&self) -> MutationStrategy;

    /// `true` if the dialect supports `WITH RECURSIVE` (or equivalent).
    fn supports_recursive_cte(&self) -> bool;

    /// The recursive-CTE introducer keyword, if supported.
    fn recursive_cte_keyword(&self) -> Option<&'static str>;

    /// Render a JSON object constructor from `(key_literal, value_expr)` pairs.
    fn json_object(&self, pairs: &[(String, String)]) -> String;

    /// Render a JSON array aggregation wrapping `inner_expr`.
    fn json_agg(&self, inner_expr: &str) -> String;

    /// Render an `ORDER BY` + pagination tail from an optional limit/offset.
    fn pagination_clause(&self, limit: Option<i64>, offset: Option<i64>) -> String;

    /// Render an upsert clause body (e.g. `ON CONFLICT (...) DO UPDATE SET
    /// ...`, `ON DUPLICATE KEY UPDATE ...`, or a `MERGE` statement body).
    ///
    /// # Errors
    /// Returns [`CompileError::DialectUnsupported`] if this dialect has no
    /// native upsert form at all.
    fn upsert_clause(&self, conflict_cols: &[String], update_cols: &[String]) -> Result<String>;

    /// `RETURNING <cols>` clause text, or `None` for dialects that capture
    /// the primary key a different way (`LAST_INSERT_ID()`, `OUTPUT INTO`).
    fn returning_clause(&self, cols: &[String]) -> Option<String>;

    /// Statement(s) that capture the primary key of the row just
    /// inserted/updated into a session variable named `var_name`, used by
    /// the [`MutationStrategy::LinearScript`] emission path.
    fn capture_primary_key(&self, var_name: &str, pk_col: &str) -> String;

    /// Map a spatial [`Operator`] to this dialect's function/operator name.
    ///
    /// # Errors
    /// Returns [`CompileError::DialectUnsupported`] if the dialect has no
    /// equivalent (GIS coverage varies widely per spec.md §9).
    fn gis_function(&self, op: Operator) -> Result<&'static str> {
        Err(CompileError::dialect_unsupported(
            format!("{op:?}"),
            self.kind().as_str(),
        ))
    }

    /// Render `column <op> <placeholder>` for a scalar comparison operator.
    ///
    /// # Errors
    /// Returns [`CompileError::DialectUnsupported`] for spatial operators —
    /// callers must route those through [`Dialect::gis_function`] instead.
    fn comparison_sql(&self, column_sql: &str, op: Operator, placeholder: &str) -> Result<String> {
        if let Some(infix) = op.sql_infix() {
            return Ok(format!("{column_sql} {infix} {placeholder}"));
        }
        match op {
            Operator::Like => Ok(format!("{column_sql} LIKE {placeholder}")),
            Operator::Ilike => Ok(self.ilike_sql(column_sql, placeholder)),
            Operator::Contains => Ok(format!("{column_sql} LIKE {placeholder}")),
            Operator::IsNull => Ok(format!("{column_sql} IS NULL")),
            _ => Err(CompileError::dialect_unsupported(
                format!("{op:?} as a scalar comparison"),
                self.kind().as_str(),
            )),
        }
    }

    /// Render a case-insensitive `LIKE`. Dialects without native `ILIKE`
    /// wrap both sides in `LOWER(...)`.
    fn ilike_sql(&self, column_sql: &str, placeholder: &str) -> String {
        format!("LOWER({column_sql}) LIKE LOWER({placeholder})")
    }

    /// Render `column IN (<placeholders>)`, optionally negated.
    fn in_list_sql(&self, column_sql: &str, placeholders: &[String], negate: bool) -> String {
        let kw = if negate { "NOT IN" } else { "IN" };
        format!("{column_sql} {kw} ({})", placeholders.join(", "))
    }
}
