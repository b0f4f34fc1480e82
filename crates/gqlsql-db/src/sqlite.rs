//! SQLite dialect: embedded, single-writer, native `RETURNING` since 3.35.

use gqlsql_error::{CompileError, Result};

use crate::dialect::{Dialect, MutationStrategy, SqlDialectKind};
use crate::operator::Operator;
use crate::quote_with;

/// SQLite [`Dialect`] implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn kind(&self) -> SqlDialectKind {
        SqlDialectKind::Sqlite
    }

    fn quote_ident(&self, ident: &str) -> String {
        quote_with('"', ident)
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn mutation_strategy(&self) -> MutationStrategy {
        MutationStrategy::LinearScript
    }

    fn supports_recursive_cte(&self) -> bool {
        true
    }

    fn recursive_cte_keyword(&self) -> Option<&'static str> {
        Some("WITH RECURSIVE")
    }

    fn json_object(&self, pairs: &[(String, String)]) -> String {
        let inner = pairs
            .iter()
            .map(|(k, v)| format!("'{k}', {v}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("json_object({inner})")
    }

    fn json_agg(&self, inner_expr: &str) -> String {
        format!("json_group_array({inner_expr})")
    }

    fn pagination_clause(&self, limit: Option<i64>, offset: Option<i64>) -> String {
        match (limit, offset) {
            (Some(n), Some(m)) => format!("LIMIT {n} OFFSET {m}"),
            (Some(n), None) => format!("LIMIT {n}"),
            (None, Some(m)) => format!("LIMIT -1 OFFSET {m}"),
            (None, None) => String::new(),
        }
    }

    fn upsert_clause(&self, conflict_cols: &[String], update_cols: &[String]) -> Result<String> {
        let set_list = update_cols
            .iter()
            .map(|c| format!("{c} = excluded.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "ON CONFLICT ({}) DO UPDATE SET {set_list}",
            conflict_cols.join(", ")
        ))
    }

    fn returning_clause(&self, cols: &[String]) -> Option<String> {
        Some(format!("RETURNING {}", cols.join(", ")))
    }

    fn capture_primary_key(&self, var_name: &str, _pk_col: &str) -> String {
        // SQLite has no session variables; the linear-script emitter binds
        // this as a host-side placeholder fed by `last_insert_rowid()`.
        format!("-- {var_name} := last_insert_rowid()")
    }

    fn gis_function(&self, op: Operator) -> Result<&'static str> {
        Err(CompileError::dialect_unsupported(
            format!("{op:?}"),
            self.kind().as_str(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_uses_excluded() {
        let d = SqliteDialect;
        let sql = d.upsert_clause(&["id".into()], &["name".into()]).unwrap();
        assert_eq!(sql, "ON CONFLICT (id) DO UPDATE SET name = excluded.name");
    }

    #[test]
    fn returning_supported() {
        let d = SqliteDialect;
        assert_eq!(d.returning_clause(&["id".into()]), Some("RETURNING id".to_string()));
    }

    #[test]
    fn no_native_gis() {
        let d = SqliteDialect;
        assert!(d.gis_function(Operator::StContains).is_err());
    }
}
