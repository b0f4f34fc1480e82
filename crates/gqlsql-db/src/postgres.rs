//! PostgreSQL dialect: the primary target, full feature set.

use gqlsql_error::Result;

use crate::dialect::{Dialect, MutationStrategy, SqlDialectKind};
use crate::operator::Operator;
use crate::quote_with;

/// PostgreSQL [`Dialect`] implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn kind(&self) -> SqlDialectKind {
        SqlDialectKind::Postgres
    }

    fn quote_ident(&self, ident: &str) -> String {
        quote_with('"', ident)
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn mutation_strategy(&self) -> MutationStrategy {
        MutationStrategy::CtePipeline
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
        format!("json_build_object({inner})")
    }

    fn json_agg(&self, inner_expr: &str) -> String {
        format!("coalesce(json_agg({inner_expr}), '[]'::json)")
    }

    fn pagination_clause(&self, limit: Option<i64>, offset: Option<i64>) -> String {
        let mut clause = String::new();
        if let Some(n) = limit {
            clause.push_str(&format!("LIMIT {n}"));
        }
        if let Some(m) = offset {
            if !clause.is_empty() {
                clause.push(' ');
            }
            clause.push_str(&format!("OFFSET {m}"));
        }
        clause
    }

    fn upsert_clause(&self, conflict_cols: &[String], update_cols: &[String]) -> Result<String> {
        let set_list = update_cols
            .iter()
            .map(|c| format!("{c} = EXCLUDED.{c}"))
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

    fn capture_primary_key(&self, var_name: &str, pk_col: &str) -> String {
        // Unused under the CTE pipeline strategy: every mutation's result is
        // addressed by CTE name, not a session variable. Kept for API
        // symmetry with the linear-script dialects and for tests.
        format!("-- {var_name} captured via RETURNING {pk_col} in the owning CTE")
    }

    fn gis_function(&self, op: Operator) -> Result<&'static str> {
        match op {
            Operator::StDwithin => Ok("ST_DWithin"),
            Operator::StWithin => Ok("ST_Within"),
            Operator::StContains => Ok("ST_Contains"),
            Operator::StIntersects => Ok("ST_Intersects"),
            Operator::StCovers => Ok("ST_Covers"),
            Operator::StCoveredBy => Ok("ST_CoveredBy"),
            Operator::StTouches => Ok("ST_Touches"),
            Operator::StOverlaps => Ok("ST_Overlaps"),
            Operator::Near => Ok("<->"),
            _ => Err(gqlsql_error::CompileError::dialect_unsupported(
                format!("{op:?}"),
                self.kind().as_str(),
            )),
        }
    }

    fn ilike_sql(&self, column_sql: &str, placeholder: &str) -> String {
        format!("{column_sql} ILIKE {placeholder}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_placeholders() {
        let d = PostgresDialect;
        assert_eq!(d.quote_ident("users"), "\"users\"");
        assert_eq!(d.placeholder(3), "$3");
    }

    #[test]
    fn upsert_renders_on_conflict() {
        let d = PostgresDialect;
        let sql = d
            .upsert_clause(&["id".into()], &["name".into(), "email".into()])
            .unwrap();
        assert_eq!(sql, "ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, email = EXCLUDED.email");
    }

    #[test]
    fn pagination_both_present() {
        let d = PostgresDialect;
        assert_eq!(d.pagination_clause(Some(10), Some(20)), "LIMIT 10 OFFSET 20");
        assert_eq!(d.pagination_clause(Some(10), None), "LIMIT 10");
    }

    #[test]
    fn gis_maps_known_functions() {
        let d = PostgresDialect;
        assert_eq!(d.gis_function(Operator::StContains).unwrap(), "ST_Contains");
    }
}
