//! Oracle Database dialect: `RETURNING ... INTO`, SDO spatial operators.

use gqlsql_error::{CompileError, Result};

use crate::dialect::{Dialect, MutationStrategy, SqlDialectKind};
use crate::operator::Operator;
use crate::quote_with;

/// Oracle Database [`Dialect`] implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct OracleDialect;

impl Dialect for OracleDialect {
    fn kind(&self) -> SqlDialectKind {
        SqlDialectKind::Oracle
    }

    fn quote_ident(&self, ident: &str) -> String {
        quote_with('"', ident)
    }

    fn placeholder(&self, index: usize) -> String {
        format!(":{index}")
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
            .map(|(k, v)| format!("'{k}' VALUE {v}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("JSON_OBJECT({inner})")
    }

    fn json_agg(&self, inner_expr: &str) -> String {
        format!("JSON_ARRAYAGG({inner_expr})")
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
            "MERGE INTO target USING source ON ({on_clause}) WHEN MATCHED THEN UPDATE SET {set_list} WHEN NOT MATCHED THEN INSERT VALUES (DEFAULT)"
        ))
    }

    fn returning_clause(&self, cols: &[String]) -> Option<String> {
        Some(format!("RETURNING {} INTO", cols.join(", ")))
    }

    fn capture_primary_key(&self, var_name: &str, pk_col: &str) -> String {
        format!("RETURNING {pk_col} INTO {var_name}")
    }

    fn gis_function(&self, op: Operator) -> Result<&'static str> {
        match op {
            Operator::StDwithin => Ok("SDO_WITHIN_DISTANCE"),
            Operator::StContains | Operator::StOverlaps | Operator::StTouches => {
                Ok("SDO_RELATE")
            }
            Operator::StIntersects => Ok("SDO_ANYINTERACT"),
            _ => Err(CompileError::dialect_unsupported(
                format!("{op:?}"),
                self.kind().as_str(),
            )),
        }
    }
}
