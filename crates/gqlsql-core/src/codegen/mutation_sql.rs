//! Mutation SQL synthesis (spec.md §4.4.2): renders a tree of [`Mutate`]
//! nodes into either a single topologically-ordered CTE pipeline
//! (Postgres's [`MutationStrategy::CtePipeline`]) or a linear script of
//! statements threading captured primary keys through session variables
//! (the other four dialects' [`MutationStrategy::LinearScript`]), per
//! [`Dialect::mutation_strategy`].
//!
//! Both strategies finish by re-selecting the root mutation's row(s) by
//! primary key, so the response is shaped by the same field tree a plain
//! query would use (spec.md §4.3.2 "the mutation response reuses the
//! read-select grammar").

use gqlsql_db::{Dialect, MutationStrategy, SqlDialectKind};

use gqlsql_error::Result;

use crate::compiler::mutate::topo_sort;
use crate::qcode::{Mutate, MutateKind, QCode, ScalarValue};
use crate::schema::{SchemaCatalog, Table};

use super::select_sql::{render_select_doc, render_where_expr};
use super::RenderedQuery;

struct Ctx<'a> {
    qcode: &'a QCode,
    schema: &'a SchemaCatalog,
    dialect: &'a dyn Dialect,
}

/// Render every mutation rooted at `qcode.roots` into one statement (or
/// script) for `dialect`.
///
/// # Errors
/// Returns [`CompileError::UnknownEntity`] if a mutate node names a table
/// absent from `schema`, or whatever [`render_where_expr`]/dialect
/// methods surface for an unsupported filter or upsert form.
pub fn render_mutation(qcode: &QCode, schema: &SchemaCatalog, dialect: &dyn Dialect) -> Result<RenderedQuery> {
    let strategy = dialect.mutation_strategy();
    let _span = tracing::debug_span!(
        "codegen",
        dialect = %dialect.kind(),
        mutations = qcode.mutates.len(),
        strategy = ?strategy,
    )
    .entered();

    let ctx = Ctx { qcode, schema, dialect };
    let ids: Vec<usize> = (0..qcode.mutates.len()).collect();
    let order = topo_sort(&qcode.mutates, &ids);

    let rendered = match strategy {
        MutationStrategy::CtePipeline => render_cte_pipeline(&ctx, &order),
        MutationStrategy::LinearScript => render_linear_script(&ctx, &order),
    }?;
    tracing::debug!(params = rendered.params.len(), "rendered mutation");
    Ok(rendered)
}

fn render_cte_pipeline(ctx: &Ctx<'_>, order: &[usize]) -> Result<RenderedQuery> {
    let mut params = Vec::new();
    let mut ctes = Vec::with_capacity(order.len());
    for &id in order {
        let mutate = &ctx.qcode.mutates[id];
        let table = ctx.schema.find_table(&mutate.table, None)?;
        let stmt = render_mutate_statement(ctx, mutate, table, true, &mut params)?;
        ctes.push(format!("m{id} AS ({stmt})"));
    }

    // `qcode.roots` names root *mutate* ids for a mutation operation
    // (spec.md §6 compiler entry point) — unlike a query, where it names
    // root select ids. Only the first root's response is bound to
    // `action_var_name`; multi-root mutations beyond the first are
    // executed for effect via their own CTE but not re-selected here.
    let Some(&root_id) = ctx.qcode.roots.first() else {
        return Ok(RenderedQuery { sql: String::new(), params });
    };
    let root = &ctx.qcode.mutates[root_id];
    let table = ctx.schema.find_table(&root.table, None)?;
    let select = ctx.qcode.select(root.select_id);
    let pk = table.primary_key().name.clone();
    let extra = format!(
        "{}.{} IN (SELECT {} FROM m{root_id})",
        ctx.dialect.quote_ident(&select.alias),
        ctx.dialect.quote_ident(&pk),
        ctx.dialect.quote_ident(&pk),
    );
    let doc = render_select_doc(ctx.qcode, ctx.schema, ctx.dialect, root.select_id, Some(extra), &mut params)?;

    let action_key = ctx.qcode.action_var_name.clone().unwrap_or_else(|| "result".to_string());
    let pairs = [(action_key, doc)];
    let sql = format!(
        "WITH {} SELECT {} AS {}",
        ctes.join(", "),
        ctx.dialect.json_object(&pairs),
        ctx.dialect.quote_ident("__root"),
    );
    Ok(RenderedQuery { sql, params })
}

/// Render each mutate node as its own statement, joined by `;`, since
/// the linear-script dialects have no single-statement CTE form that
/// can both write and thread a captured key forward (spec.md §4.4.2).
/// The final statement re-selects the root row via the session variable
/// captured along the way.
fn render_linear_script(ctx: &Ctx<'_>, order: &[usize]) -> Result<RenderedQuery> {
    let mut params = Vec::new();
    let mut statements = Vec::with_capacity(order.len() + 1);
    for &id in order {
        let mutate = &ctx.qcode.mutates[id];
        let table = ctx.schema.find_table(&mutate.table, None)?;
        let stmt = render_mutate_statement(ctx, mutate, table, false, &mut params)?;
        statements.push(stmt);
        let pk = table.primary_key().name.clone();
        statements.push(ctx.dialect.capture_primary_key(&var_ref(ctx.dialect, &mutate.capture_var), &pk));
    }

    let Some(&root_id) = ctx.qcode.roots.first() else {
        return Ok(RenderedQuery { sql: statements.join(";\n"), params });
    };
    let root = &ctx.qcode.mutates[root_id];
    let table = ctx.schema.find_table(&root.table, None)?;
    let select = ctx.qcode.select(root.select_id);
    let pk = table.primary_key().name.clone();
    let extra = format!(
        "{}.{} = {}",
        ctx.dialect.quote_ident(&select.alias),
        ctx.dialect.quote_ident(&pk),
        var_ref(ctx.dialect, &root.capture_var),
    );
    let doc = render_select_doc(ctx.qcode, ctx.schema, ctx.dialect, root.select_id, Some(extra), &mut params)?;
    let action_key = ctx.qcode.action_var_name.clone().unwrap_or_else(|| "result".to_string());
    let pairs = [(action_key, doc)];
    statements.push(format!("SELECT {} AS {}", ctx.dialect.json_object(&pairs), ctx.dialect.quote_ident("__root")));

    Ok(RenderedQuery { sql: statements.join(";\n"), params })
}

/// How a dialect spells a reference to a previously captured session
/// variable. Not part of [`Dialect`] — it is a pure naming convention,
/// not a behavioral axis, and the capture statements already establish
/// each dialect's variable syntax (`@var` for MySQL/MSSQL, `:var` for
/// Oracle PL/SQL, a host-bound placeholder for SQLite).
fn var_ref(dialect: &dyn Dialect, capture_var: &str) -> String {
    match dialect.kind() {
        SqlDialectKind::MySql | SqlDialectKind::MsSql => format!("@{capture_var}"),
        SqlDialectKind::Oracle => format!(":{capture_var}"),
        SqlDialectKind::Sqlite => format!("/* host-bound: {capture_var} */"),
        SqlDialectKind::Postgres => capture_var.to_string(),
    }
}

fn render_mutate_statement(
    ctx: &Ctx<'_>,
    mutate: &Mutate,
    table: &Table,
    qualify: bool,
    params: &mut Vec<ScalarValue>,
) -> Result<String> {
    match mutate.kind {
        MutateKind::Insert | MutateKind::Upsert => render_insert(ctx, mutate, table, params),
        MutateKind::Update | MutateKind::Connect => render_update(ctx, mutate, table, qualify, params),
        MutateKind::Delete | MutateKind::Disconnect => render_delete(ctx, mutate, table, qualify, params),
        MutateKind::Keyword | MutateKind::None => Ok("SELECT 1".to_string()),
    }
}

fn render_insert(ctx: &Ctx<'_>, mutate: &Mutate, table: &Table, params: &mut Vec<ScalarValue>) -> Result<String> {
    let mut cols = Vec::with_capacity(mutate.cols.len() + mutate.rcols.len());
    let mut values = Vec::with_capacity(mutate.cols.len() + mutate.rcols.len());
    for assign in &mutate.cols {
        cols.push(ctx.dialect.quote_ident(&assign.column));
        values.push(push_param(ctx.dialect, params, assign.value.clone()));
    }
    for rcol in &mutate.rcols {
        cols.push(ctx.dialect.quote_ident(&rcol.column));
        values.push(captured_value_ref(ctx, rcol.source_mutate_id)?);
    }

    let quoted_table = ctx.dialect.quote_ident(&table.name);
    let mut sql = if cols.is_empty() {
        format!("INSERT INTO {quoted_table} DEFAULT VALUES")
    } else {
        format!("INSERT INTO {quoted_table} ({}) VALUES ({})", cols.join(", "), values.join(", "))
    };

    if mutate.kind == MutateKind::Upsert {
        let conflict_cols = vec![table.primary_key().name.clone()];
        let update_cols: Vec<String> = mutate.cols.iter().map(|c| c.column.clone()).collect();
        sql.push(' ');
        sql.push_str(&ctx.dialect.upsert_clause(&conflict_cols, &update_cols)?);
    }

    if let Some(returning) = ctx.dialect.returning_clause(&[table.primary_key().name.clone()]) {
        sql.push(' ');
        sql.push_str(&returning);
    }
    Ok(sql)
}

fn render_update(ctx: &Ctx<'_>, mutate: &Mutate, table: &Table, qualify: bool, params: &mut Vec<ScalarValue>) -> Result<String> {
    let pk = table.primary_key().name.clone();
    let mut set_list = Vec::with_capacity(mutate.cols.len() + mutate.rcols.len() + 1);
    for assign in &mutate.cols {
        let placeholder = push_param(ctx.dialect, params, assign.value.clone());
        set_list.push(format!("{} = {placeholder}", ctx.dialect.quote_ident(&assign.column)));
    }
    for rcol in &mutate.rcols {
        let value_ref = captured_value_ref(ctx, rcol.source_mutate_id)?;
        set_list.push(format!("{} = {value_ref}", ctx.dialect.quote_ident(&rcol.column)));
    }
    if set_list.is_empty() {
        set_list.push(format!("{0} = {0}", ctx.dialect.quote_ident(&pk)));
    }

    let select = ctx.qcode.select(mutate.select_id);
    let quoted_table = ctx.dialect.quote_ident(&table.name);
    let target = if qualify {
        format!("{quoted_table} AS {}", ctx.dialect.quote_ident(&select.alias))
    } else {
        quoted_table
    };
    let mut sql = format!("UPDATE {target} SET {}", set_list.join(", "));

    let where_sql = render_where_expr(ctx.qcode, ctx.schema, ctx.dialect, mutate.select_id, &mutate.where_expr, qualify, params)?;
    if where_sql != "(1=1)" {
        sql.push_str(&format!(" WHERE {where_sql}"));
    }
    if let Some(returning) = ctx.dialect.returning_clause(&[pk]) {
        sql.push(' ');
        sql.push_str(&returning);
    }
    Ok(sql)
}

fn render_delete(ctx: &Ctx<'_>, mutate: &Mutate, table: &Table, qualify: bool, params: &mut Vec<ScalarValue>) -> Result<String> {
    let select = ctx.qcode.select(mutate.select_id);
    let quoted_table = ctx.dialect.quote_ident(&table.name);
    let target = if qualify {
        format!("{quoted_table} AS {}", ctx.dialect.quote_ident(&select.alias))
    } else {
        quoted_table
    };
    let mut sql = format!("DELETE FROM {target}");
    let where_sql = render_where_expr(ctx.qcode, ctx.schema, ctx.dialect, mutate.select_id, &mutate.where_expr, qualify, params)?;
    if where_sql != "(1=1)" {
        sql.push_str(&format!(" WHERE {where_sql}"));
    }
    Ok(sql)
}

fn captured_value_ref(ctx: &Ctx<'_>, source_mutate_id: usize) -> Result<String> {
    let source = &ctx.qcode.mutates[source_mutate_id];
    Ok(match ctx.dialect.mutation_strategy() {
        MutationStrategy::CtePipeline => {
            let source_table = ctx.schema.find_table(&source.table, None)?;
            format!("(SELECT {} FROM m{source_mutate_id})", ctx.dialect.quote_ident(&source_table.primary_key().name))
        }
        MutationStrategy::LinearScript => var_ref(ctx.dialect, &source.capture_var),
    })
}

fn push_param(dialect: &dyn Dialect, params: &mut Vec<ScalarValue>, value: ScalarValue) -> String {
    params.push(value);
    dialect.placeholder(params.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qcode::{ColAssign, ColumnRef, Expression, MutateKind, QCodeBuilder, QCodeKind, NO_PARENT};
    use crate::schema::{Column, ColumnType, TableKind};
    use gqlsql_db::mysql::MySqlDialect;
    use gqlsql_db::postgres::PostgresDialect;
    use gqlsql_db::Operator;
    use std::collections::HashMap;

    fn products_table() -> Table {
        Table {
            schema: "public".into(),
            name: "products".into(),
            kind: TableKind::Base,
            primary_key_index: 0,
            columns: vec![
                Column { name: "id".into(), ty: ColumnType::Int, nullable: false, is_array: false, default: None, fk: None, unique: true, blocked_by_default: false },
                Column { name: "name".into(), ty: ColumnType::Text, nullable: false, is_array: false, default: None, fk: None, unique: false, blocked_by_default: false },
            ],
            relationships: HashMap::new(),
            full_text_columns: vec![],
        }
    }

    fn schema() -> SchemaCatalog {
        SchemaCatalog::new(vec![products_table()], vec![])
    }

    fn insert_qcode() -> QCode {
        let mut b = QCodeBuilder::default();
        let select = b.new_select(NO_PARENT, "products", "products");
        let m = b.new_mutate(NO_PARENT, select, "products", MutateKind::Insert);
        b.mutate_mut(m).cols.push(ColAssign { column: "name".into(), value: ScalarValue::String("Widget".into()) });
        b.finish(QCodeKind::Mutation, Some("products_result".to_string()), vec![select])
    }

    #[test]
    fn postgres_insert_renders_as_cte_with_returning() {
        let qcode = insert_qcode();
        let schema = schema();
        let rendered = render_mutation(&qcode, &schema, &PostgresDialect).unwrap();
        assert!(rendered.sql.starts_with("WITH m0 AS (INSERT INTO"));
        assert!(rendered.sql.contains("RETURNING"));
        assert!(rendered.sql.contains("IN (SELECT"));
        assert_eq!(rendered.params, vec![ScalarValue::String("Widget".into())]);
    }

    #[test]
    fn mysql_insert_renders_as_linear_script() {
        let qcode = insert_qcode();
        let schema = schema();
        let rendered = render_mutation(&qcode, &schema, &MySqlDialect).unwrap();
        assert!(rendered.sql.contains("INSERT INTO"));
        assert!(rendered.sql.contains("LAST_INSERT_ID()"));
        assert!(rendered.sql.contains("@m0_pk"));
    }

    #[test]
    fn update_with_filter_binds_where_clause() {
        let mut b = QCodeBuilder::default();
        let select = b.new_select(NO_PARENT, "products", "products");
        let m = b.new_mutate(NO_PARENT, select, "products", MutateKind::Update);
        b.mutate_mut(m).cols.push(ColAssign { column: "name".into(), value: ScalarValue::String("New".into()) });
        b.mutate_mut(m).where_expr = Expression::Cmp {
            op: Operator::Eq,
            left: ColumnRef { select_id: select, column: "id".into() },
            right: ScalarValue::Int(7),
        };
        let qcode = b.finish(QCodeKind::Mutation, Some("result".to_string()), vec![select]);

        let schema = schema();
        let rendered = render_mutation(&qcode, &schema, &PostgresDialect).unwrap();
        assert!(rendered.sql.contains("UPDATE \"products\" AS \"products_0\" SET"));
        assert!(rendered.sql.contains("WHERE \"products_0\".\"id\" = $2"));
    }
}
