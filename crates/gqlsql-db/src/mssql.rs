//! Microsoft SQL Server dialect: `OUTPUT INTO` capture, `MERGE` upsert.

use gqlsql_error::{CompileError, Result};

use crate::dialect::{Dialect, MutationStrategy, SqlDialectKind};
use crate::operator::Operator;
use crate::quote_with;

/// Microsoft SQL Server [`Dialect`] implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct MsSqlDialect;

impl Dialect for MsSqlDialect {
    fn kind(&self) -> SqlDialectKind {
        SqlDialectKind::MsSql
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@p{index}")
    }

    fn mutation_strategy(&self) -> MutationStrategy {
        MutationStrategy::LinearScript
    }

    fn supports_recursive_cte(&self) -> bool {
        true
    }

    fn recursive_cte_keyword(&self) -> Option<&'static str> {
        Some("WITH")
    }

    fn json_object(&self, pairs: &[(String, String)]) -> String {
        let inner = pairs
            .iter()
            .map(|(k, v)| format!("'{k}': {v}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("JSON_OBJECT({inner})")
    }

    fn json_agg(&self, inner_expr: &str) -> String {
        format!("(SELECT {inner_expr} FOR JSON PATH)")
    }

    fn pagination_clause(&self, limit: Option<i64>, offset: Option<i64>) -> String {
        let m = offset.unwrap_or(0);
        match limit {
            Some(n) => format!("OFFSET {m} ROWS FETCH NEXT {n} ROWS ONLY"),
            None => format!("OFFSET {m} ROWS"),
        }
    }

    fn upsert_clause(&self, conflict_cols: &[String], update_cols: &[String]) -> Result<String> {
        let on_clause = conflict_cols
            .iter()
            .map(|c| format!("target.{c} = source.{c}"))
            .collect::<Vec<_>>()
            .join(" AND ");
        let set_list = update_cols
            .iter()
            .map(|c| format!("target.{c} = source.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "MERGE INTO target USING source ON ({on_clause}) WHEN MATCHED THEN UPDATE SET {set_list} WHEN NOT MATCHED THEN INSERT DEFAULT VALUES"
        ))
    }

    fn returning_clause(&self, _cols: &[String]) -> Option<String> {
        None
    }

    fn capture_primary_key(&self, var_name: &str, pk_col: &str) -> String {
        format!("OUTPUT INSERTED.{pk_col} INTO {var_name}")
    }

    fn gis_function(&self, op: Operator) -> Result<&'static str> {
        match op {
            Operator::StWithin => Ok("STWithin"),
            Operator::StContains => Ok("STContains"),
            Operator::StIntersects => Ok("STIntersects"),
            Operator::StTouches => Ok("STTouches"),
            Operator::StOverlaps => Ok("STOverlaps"),
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
    fn brackets_quote_and_escape() {
        let d = MsSqlDialect;
        assert_eq!(d.quote_ident("order"), "[order]");
        assert_eq!(d.quote_ident("weird]name"), "[weird]]name]");
    }

    #[test]
    fn pagination_always_has_offset() {
        let d = MsSqlDialect;
        assert_eq!(d.pagination_clause(Some(10), None), "OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY");
    }

    #[test]
    fn capture_uses_output_into() {
        let d = MsSqlDialect;
        assert_eq!(d.capture_primary_key("@m1", "id"), "OUTPUT INSERTED.id INTO @m1");
    }
}
