//! Select SQL synthesis (spec.md §4.4.1): renders a read [`QCode`] tree
//! into one statement whose sole output column is a JSON object, using
//! correlated subqueries for nested relations.
//!
//! Every row is built via `Dialect::json_object`/`json_agg` rather than
//! any one back end's automatic row-to-json behavior (Postgres's
//! `json_agg(t)` over a whole record, for instance) — that keeps one
//! emission path working across all five dialects instead of branching
//! per back end.

use gqlsql_db::{Dialect, Operator};

use gqlsql_error::{CompileError, EntityKind, Result};

use crate::cursor::{keyset_comparison_dir, CursorDirection};
use crate::qcode::{ColumnRef, Expression, Field, FieldKind, QCode, ScalarValue, Select, SortDirection};
use crate::schema::{SchemaCatalog, Table};

use super::{sql_string_literal, RenderedQuery};

struct Ctx<'a> {
    qcode: &'a QCode,
    schema: &'a SchemaCatalog,
    dialect: &'a dyn Dialect,
    /// `false` renders bare column names instead of `alias.column` —
    /// used by [`render_where_expr`] for the linear-script mutation
    /// dialects, whose `UPDATE`/`DELETE` statements target the table
    /// directly with no alias declared.
    qualify: bool,
}

/// A resolved FK join between a parent and child select, derived from
/// whichever table's column actually carries the foreign key (spec.md
/// §3.1; the same direction-inference rule [`crate::compiler::mutate`]
/// uses for nested-mutation dependency ordering).
struct Correlation {
    parent_alias: String,
    parent_column: String,
    child_alias: String,
    child_column: String,
}

/// Render every root select in `qcode` into one statement: a JSON object
/// keyed by each root's response key (spec.md §4.4.1 "root wrapping").
///
/// # Errors
/// Returns [`CompileError::DialectUnsupported`] if a node needs a
/// dialect feature `dialect` lacks (a GIS function, a recursive CTE),
/// or [`CompileError::UnknownEntity`]/[`CompileError::InvalidArgument`]
/// if a relationship cannot be correlated (no direct FK between the
/// two tables — many-to-many and embedded relationships are not yet
/// joined by this renderer).
pub fn render_query(qcode: &QCode, schema: &SchemaCatalog, dialect: &dyn Dialect) -> Result<RenderedQuery> {
    let _span = tracing::debug_span!("codegen", dialect = %dialect.kind(), roots = qcode.roots.len()).entered();

    let ctx = Ctx { qcode, schema, dialect, qualify: true };
    let mut params = Vec::new();
    let mut pairs = Vec::with_capacity(qcode.roots.len());
    for &root_id in &qcode.roots {
        let select = qcode.select(root_id);
        let expr = render_node(&ctx, root_id, None, None, &mut params)?;
        pairs.push((select.field_name.clone(), expr));
    }
    let root_alias = dialect.quote_ident("__root");
    let sql = format!("SELECT {} AS {root_alias}", dialect.json_object(&pairs));
    tracing::debug!(params = params.len(), "rendered select query");
    Ok(RenderedQuery { sql, params })
}

fn render_node(
    ctx: &Ctx<'_>,
    select_id: usize,
    correlation: Option<Correlation>,
    extra_condition: Option<String>,
    params: &mut Vec<ScalarValue>,
) -> Result<String> {
    let select = ctx.qcode.select(select_id);
    let table = ctx.schema.find_table(&select.table, None)?;

    let doc_expr = render_row_object(ctx, select, params)?;
    let quoted_table = ctx.dialect.quote_ident(&table.name);
    let quoted_alias = ctx.dialect.quote_ident(&select.alias);

    let mut conditions = Vec::new();
    if let Some(corr) = &correlation {
        conditions.push(format!(
            "{}.{} = {}.{}",
            ctx.dialect.quote_ident(&corr.child_alias),
            ctx.dialect.quote_ident(&corr.child_column),
            ctx.dialect.quote_ident(&corr.parent_alias),
            ctx.dialect.quote_ident(&corr.parent_column),
        ));
    }
    if let Some(extra) = extra_condition {
        conditions.push(extra);
    }
    let where_sql = render_expr(ctx, select_id, &select.where_expr, params)?;
    if where_sql != "(1=1)" {
        conditions.push(where_sql);
    }
    if let Some(keyset) = render_keyset_predicate(ctx, select, params)? {
        conditions.push(keyset);
    }
    let where_clause = if conditions.is_empty() { String::new() } else { format!(" WHERE {}", conditions.join(" AND ")) };

    let distinct_kw = if select.distinct_on.is_empty() { "" } else { "DISTINCT " };
    let group_clause = if select.group_by.is_empty() {
        String::new()
    } else {
        let cols = select
            .group_by
            .iter()
            .map(|c| format!("{quoted_alias}.{}", ctx.dialect.quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        format!(" GROUP BY {cols}")
    };

    let order_clause = render_order_by(ctx, select);
    let (limit, offset) = resolve_paging(select);
    let pagination = ctx.dialect.pagination_clause(limit, offset);
    let tail: String = [order_clause, pagination]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let tail = if tail.is_empty() { String::new() } else { format!(" {tail}") };

    let inner =
        format!("SELECT {distinct_kw}{doc_expr} AS doc FROM {quoted_table} AS {quoted_alias}{where_clause}{group_clause}{tail}");

    if select.is_singleton {
        let limit_one = ctx.dialect.pagination_clause(Some(1), None);
        Ok(format!("(SELECT doc FROM ({inner}) AS {quoted_alias}_row {limit_one})"))
    } else {
        Ok(format!("(SELECT {} FROM ({inner}) AS {quoted_alias}_page)", ctx.dialect.json_agg("doc")))
    }
}

fn render_row_object(ctx: &Ctx<'_>, select: &Select, params: &mut Vec<ScalarValue>) -> Result<String> {
    let mut pairs = Vec::with_capacity(select.fields.len());
    for field in &select.fields {
        let value = render_field_value(ctx, select, field, params)?;
        pairs.push((field.response_key.clone(), value));
    }
    Ok(ctx.dialect.json_object(&pairs))
}

fn render_field_value(ctx: &Ctx<'_>, select: &Select, field: &Field, params: &mut Vec<ScalarValue>) -> Result<String> {
    let alias = ctx.dialect.quote_ident(&select.alias);
    match &field.kind {
        FieldKind::Column { column } => Ok(format!("{alias}.{}", ctx.dialect.quote_ident(column))),
        FieldKind::Function { function, arg_column, .. } => {
            let arg = match arg_column {
                Some(col) => format!("{alias}.{}", ctx.dialect.quote_ident(col)),
                None => "*".to_string(),
            };
            Ok(format!("{function}({arg})"))
        }
        FieldKind::JsonPath { column, path } => Ok(render_json_path(ctx, &alias, column, path)),
        FieldKind::Relation { relation_id } => {
            let parent_table = ctx.schema.find_table(&select.table, None)?;
            let child = ctx.qcode.select(*relation_id);
            let child_table = ctx.schema.find_table(&child.table, None)?;
            let correlation = resolve_correlation(parent_table, &select.alias, child_table, &child.alias)?;
            render_node(ctx, *relation_id, Some(correlation), None, params)
        }
        FieldKind::Typename => Ok(sql_string_literal(&select.table)),
        FieldKind::Cursor => {
            // Minted host-side from this row's `order_by` column values
            // once the query executes (spec.md §4.5) — AEAD sealing is
            // not something a SQL expression can do inline.
            Ok("NULL".to_string())
        }
    }
}

fn render_json_path(ctx: &Ctx<'_>, alias: &str, column: &str, path: &[String]) -> String {
    // `->>` chaining covers Postgres, SQLite, and (via a compatible
    // operator) MySQL; MSSQL/Oracle need `JSON_VALUE`-style calls
    // instead. Left as a follow-up (DESIGN.md): this renderer targets
    // the common case rather than a per-dialect JSON-path method.
    let mut expr = format!("{alias}.{}", ctx.dialect.quote_ident(column));
    for seg in path {
        expr.push_str("->>");
        expr.push_str(&sql_string_literal(seg));
    }
    expr
}

fn resolve_correlation(parent_table: &Table, parent_alias: &str, child_table: &Table, child_alias: &str) -> Result<Correlation> {
    if let Some(fk_col) = child_table.columns.iter().find(|c| c.fk.as_ref().is_some_and(|fk| fk.table == parent_table.name)) {
        let fk = fk_col.fk.as_ref().expect("find matched on fk.is_some");
        return Ok(Correlation {
            parent_alias: parent_alias.to_string(),
            parent_column: fk.column.clone(),
            child_alias: child_alias.to_string(),
            child_column: fk_col.name.clone(),
        });
    }
    if let Some(fk_col) = parent_table.columns.iter().find(|c| c.fk.as_ref().is_some_and(|fk| fk.table == child_table.name)) {
        let fk = fk_col.fk.as_ref().expect("find matched on fk.is_some");
        return Ok(Correlation {
            parent_alias: parent_alias.to_string(),
            parent_column: fk_col.name.clone(),
            child_alias: child_alias.to_string(),
            child_column: fk.column.clone(),
        });
    }
    Err(CompileError::invalid_argument(
        &parent_table.name,
        &child_table.name,
        "no direct foreign key links these tables; many-to-many and embedded relationships need a join-table-aware codegen pass",
    ))
}

fn render_expr(ctx: &Ctx<'_>, anchor_select_id: usize, expr: &Expression, params: &mut Vec<ScalarValue>) -> Result<String> {
    match expr {
        Expression::Nop => Ok("(1=1)".to_string()),
        Expression::And(items) => combine(ctx, anchor_select_id, items, "AND", "(1=1)", params),
        Expression::Or(items) => combine(ctx, anchor_select_id, items, "OR", "(1=0)", params),
        Expression::Not(inner) => Ok(format!("NOT ({})", render_expr(ctx, anchor_select_id, inner, params)?)),
        Expression::Cmp { op, left, right } => render_cmp(ctx, *op, left, right, params),
        Expression::In { col, list, negate } => {
            let column_sql = render_column_ref(ctx, col);
            let placeholders: Vec<String> = list.iter().map(|v| push_param(ctx, params, v.clone())).collect();
            Ok(ctx.dialect.in_list_sql(&column_sql, &placeholders, *negate))
        }
        Expression::Null { col, negate } => {
            let column_sql = render_column_ref(ctx, col);
            Ok(format!("{column_sql} IS {}NULL", if *negate { "NOT " } else { "" }))
        }
        Expression::Geo { op, col, params: geo_params } => {
            let func = ctx.dialect.gis_function(*op)?;
            let column_sql = render_column_ref(ctx, col);
            let placeholders: Vec<String> = geo_params.iter().map(|v| push_param(ctx, params, v.clone())).collect();
            Ok(format!("{func}({column_sql}, {})", placeholders.join(", ")))
        }
        Expression::JsonPath { col, path, op, value } => {
            let alias = ctx.dialect.quote_ident(&ctx.qcode.select(col.select_id).alias);
            let column_sql = render_json_path(ctx, &alias, &col.column, path);
            let placeholder = push_param(ctx, params, value.clone());
            ctx.dialect.comparison_sql(&column_sql, *op, &placeholder)
        }
        Expression::Exists { join_chain, inner } => render_exists(ctx, anchor_select_id, join_chain, inner, params),
        Expression::Var(name) => Err(CompileError::invalid_argument(
            "<where>",
            name,
            "an unresolved row-filter variable reached codegen; role row filters must be fully bound before compilation",
        )),
    }
}

fn combine(ctx: &Ctx<'_>, anchor_select_id: usize, items: &[Expression], joiner: &str, empty: &str, params: &mut Vec<ScalarValue>) -> Result<String> {
    if items.is_empty() {
        return Ok(empty.to_string());
    }
    let rendered = items
        .iter()
        .map(|e| render_expr(ctx, anchor_select_id, e, params))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("({})", rendered.join(&format!(" {joiner} "))))
}

fn render_cmp(ctx: &Ctx<'_>, op: Operator, left: &ColumnRef, right: &ScalarValue, params: &mut Vec<ScalarValue>) -> Result<String> {
    let column_sql = render_column_ref(ctx, left);
    match (op, right) {
        (Operator::Eq, ScalarValue::Null) => return Ok(format!("{column_sql} IS NULL")),
        (Operator::Neq, ScalarValue::Null) => return Ok(format!("{column_sql} IS NOT NULL")),
        _ => {}
    }
    let placeholder = push_param(ctx, params, right.clone());
    ctx.dialect.comparison_sql(&column_sql, op, &placeholder)
}

fn render_column_ref(ctx: &Ctx<'_>, col: &ColumnRef) -> String {
    if !ctx.qualify {
        return ctx.dialect.quote_ident(&col.column);
    }
    let select = ctx.qcode.select(col.select_id);
    format!("{}.{}", ctx.dialect.quote_ident(&select.alias), ctx.dialect.quote_ident(&col.column))
}

/// Render a standalone filter expression as SQL, for reuse by the
/// mutation renderer's `UPDATE`/`DELETE` `WHERE` clauses (spec.md
/// §4.4.2). `qualify` controls whether column refs get an
/// `alias.column` prefix (Postgres's aliased CTE statements) or a bare
/// `column` (the linear-script dialects' unaliased statements).
///
/// # Errors
/// Propagates whatever [`render_expr`] returns for the same expression
/// tree (unsupported dialect feature, unresolved row-filter variable).
pub(crate) fn render_where_expr(
    qcode: &QCode,
    schema: &SchemaCatalog,
    dialect: &dyn Dialect,
    anchor_select_id: usize,
    expr: &Expression,
    qualify: bool,
    params: &mut Vec<ScalarValue>,
) -> Result<String> {
    let ctx = Ctx { qcode, schema, dialect, qualify };
    render_expr(&ctx, anchor_select_id, expr, params)
}

/// Render one select node's row-document expression standalone, for
/// reuse by the mutation renderer's post-write response select (spec.md
/// §4.4.2): the row just written is re-selected by primary key so the
/// response is shaped by the same field tree a plain query would use.
///
/// # Errors
/// See [`render_query`].
pub(crate) fn render_select_doc(
    qcode: &QCode,
    schema: &SchemaCatalog,
    dialect: &dyn Dialect,
    select_id: usize,
    extra_condition: Option<String>,
    params: &mut Vec<ScalarValue>,
) -> Result<String> {
    let ctx = Ctx { qcode, schema, dialect, qualify: true };
    render_node(&ctx, select_id, None, extra_condition, params)
}

fn push_param(ctx: &Ctx<'_>, params: &mut Vec<ScalarValue>, value: ScalarValue) -> String {
    params.push(value);
    ctx.dialect.placeholder(params.len())
}

fn render_exists(
    ctx: &Ctx<'_>,
    anchor_select_id: usize,
    join_chain: &[String],
    inner: &Expression,
    params: &mut Vec<ScalarValue>,
) -> Result<String> {
    let anchor = ctx.qcode.select(anchor_select_id);
    let mut current_table = ctx.schema.find_table(&anchor.table, None)?;
    let mut current_alias = anchor.alias.clone();
    let mut hops: Vec<(&Table, String, Correlation)> = Vec::new();

    for (i, field_name) in join_chain.iter().enumerate() {
        let rel = current_table
            .find_relationship(field_name)
            .ok_or_else(|| CompileError::unknown(EntityKind::Relationship, format!("{}.{field_name}", current_table.name)))?;
        let target_name = rel.target_table().ok_or_else(|| {
            CompileError::invalid_argument(&current_table.name, field_name, "relationship has no joinable target table")
        })?;
        let target_table = ctx.schema.find_table(target_name, None)?;
        let target_alias = format!("{}_{target_name}_{i}", anchor.alias);
        let corr = resolve_correlation(current_table, &current_alias, target_table, &target_alias)?;
        hops.push((target_table, target_alias.clone(), corr));
        current_table = target_table;
        current_alias = target_alias;
    }

    if hops.is_empty() {
        return Err(CompileError::invalid_argument("<where>", "exists", "join chain must name at least one relationship"));
    }

    let mut from_clauses = Vec::new();
    let mut on_conditions = Vec::new();
    for (table, alias, corr) in &hops {
        from_clauses.push(format!("{} AS {}", ctx.dialect.quote_ident(&table.name), ctx.dialect.quote_ident(alias)));
        on_conditions.push(format!(
            "{}.{} = {}.{}",
            ctx.dialect.quote_ident(&corr.child_alias),
            ctx.dialect.quote_ident(&corr.child_column),
            ctx.dialect.quote_ident(&corr.parent_alias),
            ctx.dialect.quote_ident(&corr.parent_column),
        ));
    }
    on_conditions.push(render_expr(ctx, anchor_select_id, inner, params)?);
    Ok(format!("EXISTS (SELECT 1 FROM {} WHERE {})", from_clauses.join(", "), on_conditions.join(" AND ")))
}

fn render_order_by(ctx: &Ctx<'_>, select: &Select) -> String {
    if select.order_by.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = select
        .order_by
        .iter()
        .map(|(col, dir)| {
            let col_sql = format!("{}.{}", ctx.dialect.quote_ident(&select.alias), ctx.dialect.quote_ident(col));
            let dir_sql = match dir {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!("{col_sql} {dir_sql}")
        })
        .collect();
    format!("ORDER BY {}", parts.join(", "))
}

fn resolve_paging(select: &Select) -> (Option<i64>, Option<i64>) {
    if select.paging.is_active() {
        (select.paging.first.or(select.paging.last), None)
    } else {
        (select.limit, select.offset)
    }
}

fn render_keyset_predicate(ctx: &Ctx<'_>, select: &Select, params: &mut Vec<ScalarValue>) -> Result<Option<String>> {
    let (tuple, dir) = match (&select.paging.after, &select.paging.before) {
        (Some(v), _) => (v, CursorDirection::Forward),
        (None, Some(v)) => (v, CursorDirection::Backward),
        (None, None) => return Ok(None),
    };
    if select.order_by.len() != tuple.len() {
        return Err(CompileError::invalid_argument(
            &select.table,
            "before/after",
            "cursor tuple arity does not match order_by",
        ));
    }

    let cmp = keyset_comparison_dir(&select.order_by, dir);
    let mut clauses = Vec::with_capacity(select.order_by.len());
    for i in 0..select.order_by.len() {
        let mut parts = Vec::with_capacity(i + 1);
        for (j, (col, _)) in select.order_by.iter().enumerate().take(i) {
            let col_sql = format!("{}.{}", ctx.dialect.quote_ident(&select.alias), ctx.dialect.quote_ident(col));
            let placeholder = push_param(ctx, params, tuple[j].clone());
            parts.push(format!("{col_sql} = {placeholder}"));
        }
        let (col, _) = &select.order_by[i];
        let col_sql = format!("{}.{}", ctx.dialect.quote_ident(&select.alias), ctx.dialect.quote_ident(col));
        let placeholder = push_param(ctx, params, tuple[i].clone());
        parts.push(format!("{col_sql} {cmp} {placeholder}"));
        clauses.push(format!("({})", parts.join(" AND ")));
    }
    Ok(Some(format!("({})", clauses.join(" OR "))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qcode::{Field, FieldKind, Join, Paging, QCodeBuilder, QCodeKind, NO_PARENT};
    use crate::schema::{Column, ColumnType, ForeignKey, FkAction, Relationship, TableKind};
    use gqlsql_db::postgres::PostgresDialect;
    use std::collections::HashMap;

    fn schema() -> SchemaCatalog {
        let mut products_rels = HashMap::new();
        products_rels.insert("owner".to_string(), Relationship::OneToOne { to_table: "users".into() });
        let products = Table {
            schema: "public".into(),
            name: "products".into(),
            kind: TableKind::Base,
            primary_key_index: 0,
            columns: vec![
                Column { name: "id".into(), ty: ColumnType::Int, nullable: false, is_array: false, default: None, fk: None, unique: true, blocked_by_default: false },
                Column { name: "owner_id".into(), ty: ColumnType::Int, nullable: false, is_array: false, default: None, fk: Some(ForeignKey { table: "users".into(), column: "id".into(), on_delete: FkAction::Cascade, on_update: FkAction::NoAction }), unique: false, blocked_by_default: false },
                Column { name: "price".into(), ty: ColumnType::Float, nullable: false, is_array: false, default: None, fk: None, unique: false, blocked_by_default: false },
            ],
            relationships: products_rels,
            full_text_columns: vec![],
        };
        let users = Table {
            schema: "public".into(),
            name: "users".into(),
            kind: TableKind::Base,
            primary_key_index: 0,
            columns: vec![
                Column { name: "id".into(), ty: ColumnType::Int, nullable: false, is_array: false, default: None, fk: None, unique: true, blocked_by_default: false },
                Column { name: "name".into(), ty: ColumnType::Text, nullable: false, is_array: false, default: None, fk: None, unique: false, blocked_by_default: false },
            ],
            relationships: HashMap::new(),
            full_text_columns: vec![],
        };
        SchemaCatalog::new(vec![products, users], vec![])
    }

    #[test]
    fn renders_simple_select_with_limit() {
        let mut b = QCodeBuilder::default();
        let root = b.new_select(NO_PARENT, "products", "products");
        b.select_mut(root).fields.push(Field { id: 0, response_key: "id".into(), kind: FieldKind::Column { column: "id".into() } });
        b.select_mut(root).limit = Some(5);
        let qcode = b.finish(QCodeKind::Query, None, vec![root]);

        let schema = schema();
        let dialect = PostgresDialect;
        let rendered = render_query(&qcode, &schema, &dialect).unwrap();
        assert!(rendered.sql.contains("json_build_object"));
        assert!(rendered.sql.contains("LIMIT 5"));
        assert!(rendered.params.is_empty());
    }

    #[test]
    fn renders_nested_relation_as_correlated_subquery() {
        let mut b = QCodeBuilder::default();
        let root = b.new_select(NO_PARENT, "products", "products");
        let child = b.new_select(root as i64, "users", "owner");
        b.select_mut(child).is_singleton = true;
        b.select_mut(child).fields.push(Field { id: 0, response_key: "name".into(), kind: FieldKind::Column { column: "name".into() } });
        b.select_mut(root).joins.push(Join { child_select_id: child, field_name: "owner".into() });
        b.select_mut(root).fields.push(Field { id: 0, response_key: "owner".into(), kind: FieldKind::Relation { relation_id: child } });
        let qcode = b.finish(QCodeKind::Query, None, vec![root]);

        let schema = schema();
        let dialect = PostgresDialect;
        let rendered = render_query(&qcode, &schema, &dialect).unwrap();
        assert!(rendered.sql.contains("\"users\" AS \"users_1\""));
        assert!(rendered.sql.contains("\"users_1\".\"id\" = \"products_0\".\"owner_id\""));
    }

    #[test]
    fn renders_where_filter_as_bound_parameter() {
        let mut b = QCodeBuilder::default();
        let root = b.new_select(NO_PARENT, "products", "products");
        b.select_mut(root).fields.push(Field { id: 0, response_key: "id".into(), kind: FieldKind::Column { column: "id".into() } });
        b.select_mut(root).where_expr = Expression::Cmp {
            op: Operator::Gt,
            left: ColumnRef { select_id: root, column: "price".into() },
            right: ScalarValue::Float(9.99),
        };
        let qcode = b.finish(QCodeKind::Query, None, vec![root]);

        let schema = schema();
        let dialect = PostgresDialect;
        let rendered = render_query(&qcode, &schema, &dialect).unwrap();
        assert!(rendered.sql.contains("\"products_0\".\"price\" > $1"));
        assert_eq!(rendered.params, vec![ScalarValue::Float(9.99)]);
    }

    #[test]
    fn keyset_pagination_compares_after_cursor_tuple() {
        let mut b = QCodeBuilder::default();
        let root = b.new_select(NO_PARENT, "products", "products");
        b.select_mut(root).fields.push(Field { id: 0, response_key: "id".into(), kind: FieldKind::Column { column: "id".into() } });
        b.select_mut(root).order_by = vec![("id".to_string(), SortDirection::Asc)];
        b.select_mut(root).paging = Paging { after: Some(vec![ScalarValue::Int(10)]), ..Default::default() };
        let qcode = b.finish(QCodeKind::Query, None, vec![root]);

        let schema = schema();
        let dialect = PostgresDialect;
        let rendered = render_query(&qcode, &schema, &dialect).unwrap();
        assert!(rendered.sql.contains("\"products_0\".\"id\" > $1"));
    }

    #[test]
    fn unjoinable_relation_is_an_error() {
        let mut b = QCodeBuilder::default();
        let root = b.new_select(NO_PARENT, "products", "products");
        let child = b.new_select(root as i64, "products", "siblings");
        b.select_mut(root).fields.push(Field { id: 0, response_key: "siblings".into(), kind: FieldKind::Relation { relation_id: child } });
        let qcode = b.finish(QCodeKind::Query, None, vec![root]);

        // `products` carries no FK to itself, so correlating this
        // self-relation has no direct-FK path to infer.
        let err = render_query(&qcode, &schema(), &PostgresDialect).unwrap_err();
        assert!(matches!(err, CompileError::InvalidArgument { .. }));
    }
}
