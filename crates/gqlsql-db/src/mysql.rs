//! MySQL/MariaDB dialect: linear-script mutations, `LAST_INSERT_ID()` capture.

use gqlsql_error::{CompileError, Result};

use crate::dialect::{Dialect, MutationStrategy, SqlDialectKind};
use crate::operator::Operator;
use crate::quote_with;

/// MySQL/MariaDB [`Dialect`] implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn kind(&self) -> SqlDialectKind {
        SqlDialectKind::MySql
    }

    fn quote_ident(&self, ident: &str) -> String {
        quote_with('`', ident)
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
        format!("JSON_OBJECT({inner})")
    }

    fn json_agg(&self, inner_expr: &str) -> String {
        format!("JSON_ARRAYAGG({inner_expr})")
    }

    fn pagination_clause(&self, limit: Option<i64>, offset: Option<i64>) -> String {
        match (limit, offset) {
            (Some(n), Some(m)) => format!("LIMIT {m}, {n}"),
            (Some(n), None) => format!("LIMIT {n}"),
            (None, Some(m)) => format!("LIMIT {m}, 18446744073709551615"),
            (None, None) => String::new(),
        }
    }

    fn upsert_clause(&self, _conflict_cols: &[String], update_cols: &[String]) -> Result<String> {
        let set_list = update_cols
            .iter()
            .map(|c| format!("{c} = VALUES({c})"))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("ON DUPLICATE KEY UPDATE {set_list}"))
    }

    fn returning_clause(&self, _cols: &[String]) -> Option<String> {
        None
    }

    fn capture_primary_key(&self, var_name: &str, _pk_col: &str) -> String {
        format!("SET {var_name} = LAST_INSERT_ID()")
    }

    fn gis_function(&self, op: Operator) -> Result<&'static str> {
        match op {
            Operator::StContains => Ok("ST_Contains"),
            Operator::StWithin => Ok("ST_Within"),
            Operator::StIntersects => Ok("ST_Intersects"),
            Operator::StTouches => Ok("ST_Touches"),
            Operator::StOverlaps => Ok("ST_Overlaps"),
            _ => Err(CompileError::dialect_unsupported(
                format!("{op:?}"),
                self.kind().as_str(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_uses_values_form() {
        let d = MySqlDialect;
        let sql = d.upsert_clause(&[], &["name".into()]).unwrap();
        assert_eq!(sql, "ON DUPLICATE KEY UPDATE name = VALUES(name)");
    }

    #[test]
    fn capture_uses_last_insert_id() {
        let d = MySqlDialect;
        assert_eq!(d.capture_primary_key("@m1", "id"), "SET @m1 = LAST_INSERT_ID()");
    }

    #[test]
    fn unsupported_gis_operator_errors() {
        let d = MySqlDialect;
        assert!(d.gis_function(Operator::StCovers).is_err());
    }
}
