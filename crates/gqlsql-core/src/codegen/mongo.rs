//! MongoDB pipeline DSL backend (spec.md §4.4.3): the one dialect that
//! does not emit SQL text at all. A [`MongoCommand`] is a full DSL
//! replacement — `operation`, `collection`, an aggregation `pipeline`,
//! and (for writes) a `raw_document` placeholder resolved by the driver
//! at execution time — consumed by a companion Mongo driver rather than
//! a SQL connection pool.
//!
//! `Dialect` has no Mongo implementation (its capability set is entirely
//! SQL-shaped: identifier quoting, placeholders, upsert clauses); this
//! module stands alongside [`super::select_sql`]/[`super::mutation_sql`]
//! rather than behind the `Dialect` trait.

use serde_json::{json, Value};

use gqlsql_db::Operator;

use gqlsql_error::{CompileError, Result};

use crate::qcode::{ColumnRef, Expression, Field, FieldKind, Mutate, MutateKind, QCode, ScalarValue, Select};
use crate::schema::{SchemaCatalog, Table};

/// A single rendered Mongo DSL document (spec.md §4.4.3 wire shape).
#[derive(Debug, Clone, PartialEq)]
pub struct MongoCommand {
    /// `"aggregate"` for reads; `"insertOne"`/`"insertMany"`/`"updateOne"`/`"deleteOne"` for writes.
    pub operation: String,
    /// Target collection name.
    pub collection: String,
    /// The root GraphQL field name this command answers.
    pub field_name: String,
    /// Aggregation stages (empty for a bare write).
    pub pipeline: Vec<Value>,
    /// Placeholder naming the bound parameter carrying the write payload,
    /// e.g. `"$1"`. `None` for reads.
    pub raw_document: Option<String>,
    /// Pipeline re-run after a write to shape the response document.
    pub return_pipeline: Option<Vec<Value>>,
    /// Bound values, in `raw_document`/placeholder order.
    pub params: Vec<ScalarValue>,
}

/// Render every root select in `qcode` into one `aggregate` command.
///
/// Only the first root is rendered: the wire shape (spec.md §4.4.3) names
/// a single `collection`/`field_name` pair per command, unlike the SQL
/// backends' one-statement-many-roots `json_build_object` wrapping.
///
/// # Errors
/// Returns [`CompileError::UnknownEntity`]/[`CompileError::InvalidArgument`]
/// under the same conditions as [`super::select_sql::render_query`].
pub fn render_query(qcode: &QCode, schema: &SchemaCatalog) -> Result<MongoCommand> {
    let _span = tracing::debug_span!("codegen", dialect = "mongo").entered();

    let Some(&root_id) = qcode.roots.first() else {
        return Err(CompileError::invalid_argument("<query>", "roots", "operation has no root selection"));
    };
    let select = qcode.select(root_id);
    let table = schema.find_table(&select.table, None)?;
    let mut params = Vec::new();
    let pipeline = build_pipeline(qcode, schema, select, &mut params)?;
    tracing::debug!(collection = %table.name, stages = pipeline.len(), "rendered aggregate pipeline");
    Ok(MongoCommand {
        operation: "aggregate".to_string(),
        collection: table.name.clone(),
        field_name: select.field_name.clone(),
        pipeline,
        raw_document: None,
        return_pipeline: None,
        params,
    })
}

fn build_pipeline(qcode: &QCode, schema: &SchemaCatalog, select: &Select, params: &mut Vec<ScalarValue>) -> Result<Vec<Value>> {
    let mut stages = Vec::new();

    let match_doc = render_filter(qcode, &select.where_expr, params)?;
    if match_doc != json!({}) {
        stages.push(json!({ "$match": match_doc }));
    }

    for field in &select.fields {
        if let FieldKind::Relation { relation_id } = &field.kind {
            let child = qcode.select(*relation_id);
            let parent_table = schema.find_table(&select.table, None)?;
            let child_table = schema.find_table(&child.table, None)?;
            stages.push(render_lookup(qcode, schema, parent_table, child_table, child, field, params)?);
        }
    }

    if !select.order_by.is_empty() {
        let mut sort = serde_json::Map::new();
        for (col, dir) in &select.order_by {
            let dir_val = match dir {
                crate::qcode::SortDirection::Asc => 1,
                crate::qcode::SortDirection::Desc => -1,
            };
            sort.insert(mongo_field(col), json!(dir_val));
        }
        stages.push(json!({ "$sort": sort }));
    }

    if let Some(offset) = select.offset {
        stages.push(json!({ "$skip": offset }));
    }
    if let Some(limit) = select.limit.or(select.paging.first).or(select.paging.last) {
        stages.push(json!({ "$limit": limit }));
    }

    stages.push(json!({ "$project": render_projection(select) }));
    Ok(stages)
}

fn render_lookup(
    qcode: &QCode,
    schema: &SchemaCatalog,
    parent_table: &Table,
    child_table: &Table,
    child: &Select,
    field: &Field,
    params: &mut Vec<ScalarValue>,
) -> Result<Value> {
    let (local_field, foreign_field) = resolve_correlation(parent_table, child_table)?;
    let inner_pipeline = build_pipeline(qcode, schema, child, params)?;
    Ok(json!({
        "$lookup": {
            "from": child_table.name,
            "localField": mongo_field(&local_field),
            "foreignField": mongo_field(&foreign_field),
            "pipeline": inner_pipeline,
            "as": field.response_key,
        }
    }))
}

/// Map a GraphQL relationship to the local/foreign column pair Mongo's
/// `$lookup` needs, using the same direct-FK direction inference the SQL
/// backend's `resolve_correlation` uses (spec.md §3.1).
fn resolve_correlation(parent_table: &Table, child_table: &Table) -> Result<(String, String)> {
    if let Some(fk_col) = child_table.columns.iter().find(|c| c.fk.as_ref().is_some_and(|fk| fk.table == parent_table.name)) {
        let fk = fk_col.fk.as_ref().expect("find matched on fk.is_some");
        return Ok((fk.column.clone(), fk_col.name.clone()));
    }
    if let Some(fk_col) = parent_table.columns.iter().find(|c| c.fk.as_ref().is_some_and(|fk| fk.table == child_table.name)) {
        let fk = fk_col.fk.as_ref().expect("find matched on fk.is_some");
        return Ok((fk_col.name.clone(), fk.column.clone()));
    }
    Err(CompileError::invalid_argument(
        &parent_table.name,
        &child_table.name,
        "no direct foreign key links these collections; many-to-many and embedded relationships need a join-aware pipeline",
    ))
}

fn render_projection(select: &Select) -> Value {
    let mut proj = serde_json::Map::new();
    proj.insert("_id".to_string(), json!(0));
    for field in &select.fields {
        match &field.kind {
            FieldKind::Column { column } if column == "id" => {
                proj.insert(field.response_key.clone(), json!("$_id"));
            }
            FieldKind::Column { column } => {
                proj.insert(field.response_key.clone(), json!(format!("${column}")));
            }
            FieldKind::JsonPath { column, path } => {
                proj.insert(field.response_key.clone(), json!(format!("${column}.{}", path.join("."))));
            }
            FieldKind::Relation { .. } => {
                proj.insert(field.response_key.clone(), json!(format!("${}", field.response_key)));
            }
            FieldKind::Typename => {
                proj.insert(field.response_key.clone(), json!(select.table));
            }
            FieldKind::Function { function, arg_column, .. } => {
                let target = arg_column.as_deref().unwrap_or("_id");
                proj.insert(field.response_key.clone(), json!({ format!("${function}"): format!("${target}") }));
            }
            FieldKind::Cursor => {
                // Minted host-side once the page executes, same as the
                // SQL backends (spec.md §4.5).
                proj.insert(field.response_key.clone(), json!(Value::Null));
            }
        }
    }
    Value::Object(proj)
}

/// GraphQL `id` maps to Mongo's `_id` (spec.md §4.4.3); every other
/// column name passes through unchanged.
fn mongo_field(column: &str) -> String {
    if column == "id" {
        "_id".to_string()
    } else {
        column.to_string()
    }
}

fn render_filter(qcode: &QCode, expr: &Expression, params: &mut Vec<ScalarValue>) -> Result<Value> {
    match expr {
        Expression::Nop => Ok(json!({})),
        Expression::And(items) => {
            let rendered = items.iter().map(|e| render_filter(qcode, e, params)).collect::<Result<Vec<_>>>()?;
            Ok(json!({ "$and": rendered }))
        }
        Expression::Or(items) => {
            let rendered = items.iter().map(|e| render_filter(qcode, e, params)).collect::<Result<Vec<_>>>()?;
            Ok(json!({ "$or": rendered }))
        }
        Expression::Not(inner) => Ok(json!({ "$nor": [render_filter(qcode, inner, params)?] })),
        Expression::Cmp { op, left, right } => render_cmp(left, *op, right, params),
        Expression::In { col, list, negate } => {
            let op = if *negate { "$nin" } else { "$in" };
            let values: Vec<Value> = list.iter().map(scalar_to_json).collect();
            params.extend(list.iter().cloned());
            Ok(json!({ mongo_field(&col.column): { op: values } }))
        }
        Expression::Null { col, negate } => Ok(json!({ mongo_field(&col.column): { "$exists": *negate, "$eq": Value::Null } })),
        Expression::Geo { op, col, params: geo_params } => render_geo(*op, col, geo_params, params),
        Expression::JsonPath { col, path, op, value } => {
            let field = format!("{}.{}", mongo_field(&col.column), path.join("."));
            params.push(value.clone());
            Ok(json!({ field: { mongo_op(*op)?: scalar_to_json(value) } }))
        }
        Expression::Exists { join_chain, inner } => {
            // `$lookup` + a nested `$match` is the Mongo analogue of a SQL
            // `EXISTS` subquery, but threading it through a filter
            // position (rather than a pipeline stage) needs the same
            // join-aware machinery `render_lookup` uses for projected
            // relations. Not produced by the compiler today; provisioned
            // for role row-filters that reach across a relationship.
            let _ = (join_chain, inner, qcode);
            Err(CompileError::invalid_argument(
                "<where>",
                "exists",
                "cross-collection exists filters are not yet lowered to a $lookup/$match stage",
            ))
        }
        Expression::Var(name) => Err(CompileError::invalid_argument(
            "<where>",
            name,
            "an unresolved row-filter variable reached codegen; role row filters must be fully bound before compilation",
        )),
    }
}

fn render_cmp(col: &ColumnRef, op: Operator, value: &ScalarValue, params: &mut Vec<ScalarValue>) -> Result<Value> {
    let field = mongo_field(&col.column);
    if matches!((op, value), (Operator::Eq, ScalarValue::Null)) {
        return Ok(json!({ field: Value::Null }));
    }
    if matches!((op, value), (Operator::Neq, ScalarValue::Null)) {
        return Ok(json!({ field: { "$ne": Value::Null } }));
    }
    params.push(value.clone());
    Ok(json!({ field: { mongo_op(op)?: scalar_to_json(value) } }))
}

fn mongo_op(op: Operator) -> Result<&'static str> {
    Ok(match op {
        Operator::Eq => "$eq",
        Operator::Neq => "$ne",
        Operator::Gt => "$gt",
        Operator::Gte => "$gte",
        Operator::Lt => "$lt",
        Operator::Lte => "$lte",
        Operator::Like | Operator::Ilike | Operator::Contains => "$regex",
        _ => {
            return Err(CompileError::dialect_unsupported(format!("{op:?}"), "mongo"));
        }
    })
}

fn render_geo(op: Operator, col: &ColumnRef, geo_params: &[ScalarValue], params: &mut Vec<ScalarValue>) -> Result<Value> {
    let field = mongo_field(&col.column);
    let coords: Vec<Value> = geo_params.iter().map(scalar_to_json).collect();
    params.extend(geo_params.iter().cloned());
    match op {
        Operator::StWithin | Operator::StContains | Operator::StCovers | Operator::StCoveredBy => {
            Ok(json!({ field: { "$geoWithin": { "$geometry": { "type": "Polygon", "coordinates": coords } } } }))
        }
        Operator::StDwithin | Operator::Near => {
            Ok(json!({ field: { "$near": { "$geometry": { "type": "Point", "coordinates": coords } } } }))
        }
        Operator::StIntersects => Ok(json!({ field: { "$geoIntersects": { "$geometry": { "type": "Polygon", "coordinates": coords } } } })),
        _ => Err(CompileError::dialect_unsupported(format!("{op:?}"), "mongo")),
    }
}

fn scalar_to_json(value: &ScalarValue) -> Value {
    match value {
        ScalarValue::Int(i) => json!(i),
        ScalarValue::Float(f) => json!(f),
        ScalarValue::String(s) => json!(s),
        ScalarValue::Bool(b) => json!(b),
        ScalarValue::Null => Value::Null,
        ScalarValue::Variable(name) => json!(format!("${name}")),
        ScalarValue::List(items) => Value::Array(items.iter().map(scalar_to_json).collect()),
    }
}

/// Render the single root mutation in `qcode` as one write command,
/// followed by a `return_pipeline` that re-fetches the written
/// document(s) so the response is shaped by the same field tree a plain
/// query would use (spec.md §4.4.2, §4.4.3).
///
/// # Errors
/// Returns [`CompileError::UnknownEntity`] if a mutate node names a
/// collection absent from `schema`, or [`CompileError::InvalidArgument`]
/// for a nested/nested-FK mutation shape this backend does not lower
/// (only a single root write is supported; dependent child mutations are
/// spec.md's SQL-only CTE/linear-script territory).
pub fn render_mutation(qcode: &QCode, schema: &SchemaCatalog) -> Result<MongoCommand> {
    let _span = tracing::debug_span!("codegen", dialect = "mongo").entered();

    let Some(&root_id) = qcode.roots.first() else {
        return Err(CompileError::invalid_argument("<mutation>", "roots", "operation has no root mutation"));
    };
    let mutate = &qcode.mutates[root_id];
    let table = schema.find_table(&mutate.table, None)?;
    let select = qcode.select(mutate.select_id);

    let (operation, raw_document, mut params) = render_write_document(mutate)?;
    tracing::debug!(collection = %table.name, operation = %operation, "rendered write command");

    let filter = if mutate.kind == MutateKind::Insert || mutate.kind == MutateKind::Upsert {
        json!({ "_id": "$inserted_id" })
    } else {
        render_filter(qcode, &mutate.where_expr, &mut params)?
    };
    let mut return_pipeline = vec![json!({ "$match": filter })];
    return_pipeline.extend(build_pipeline(qcode, schema, select, &mut params)?);

    Ok(MongoCommand {
        operation,
        collection: table.name.clone(),
        field_name: select.field_name.clone(),
        pipeline: Vec::new(),
        raw_document: Some(raw_document),
        return_pipeline: Some(return_pipeline),
        params,
    })
}

fn render_write_document(mutate: &Mutate) -> Result<(String, String, Vec<ScalarValue>)> {
    let operation = match mutate.kind {
        MutateKind::Insert | MutateKind::Upsert => {
            if mutate.is_multi {
                "insertMany"
            } else {
                "insertOne"
            }
        }
        MutateKind::Update | MutateKind::Connect => "updateOne",
        MutateKind::Delete | MutateKind::Disconnect => "deleteOne",
        MutateKind::Keyword | MutateKind::None => {
            return Err(CompileError::invalid_argument(&mutate.table, "mutation", "no-op mutation has no Mongo write form"));
        }
    };
    if !mutate.rcols.is_empty() {
        return Err(CompileError::invalid_argument(
            &mutate.table,
            "mutation",
            "FK assignments sourced from a sibling mutation's captured key need a host-side two-step write under this backend",
        ));
    }

    let mut doc = serde_json::Map::new();
    for assign in &mutate.cols {
        doc.insert(mongo_field(&assign.column), scalar_to_json(&assign.value));
    }

    // The driver resolves `raw_document` against the bound parameter at
    // index 1 (spec.md §4.4.3 "raw_document placeholder"), binding the
    // whole payload as one JSON value so an allowlist-cached plan serves
    // varying payloads without recompiling.
    let payload = serde_json::to_string(&Value::Object(doc)).unwrap_or_default();
    Ok((operation.to_string(), "$1".to_string(), vec![ScalarValue::String(payload)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qcode::{ColAssign, Join, QCodeBuilder, QCodeKind, NO_PARENT};
    use crate::schema::{Column, ColumnType, ForeignKey, FkAction, Relationship, TableKind};
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
                Column { name: "name".into(), ty: ColumnType::Text, nullable: false, is_array: false, default: None, fk: None, unique: false, blocked_by_default: false },
            ],
            relationships: products_rels,
            full_text_columns: vec![],
        };
        let users = Table {
            schema: "public".into(),
            name: "users".into(),
            kind: TableKind::Base,
            primary_key_index: 0,
            columns: vec![Column { name: "id".into(), ty: ColumnType::Int, nullable: false, is_array: false, default: None, fk: None, unique: true, blocked_by_default: false }],
            relationships: HashMap::new(),
            full_text_columns: vec![],
        };
        SchemaCatalog::new(vec![products, users], vec![])
    }

    #[test]
    fn renders_aggregate_with_id_to_object_id_projection() {
        let mut b = QCodeBuilder::default();
        let root = b.new_select(NO_PARENT, "products", "products");
        b.select_mut(root).fields.push(Field { id: 0, response_key: "id".into(), kind: FieldKind::Column { column: "id".into() } });
        let qcode = b.finish(QCodeKind::Query, None, vec![root]);

        let cmd = render_query(&qcode, &schema()).unwrap();
        assert_eq!(cmd.operation, "aggregate");
        assert_eq!(cmd.collection, "products");
        let project = cmd.pipeline.last().unwrap();
        assert_eq!(project["$project"]["id"], json!("$_id"));
    }

    #[test]
    fn renders_relation_as_lookup_stage() {
        let mut b = QCodeBuilder::default();
        let root = b.new_select(NO_PARENT, "products", "products");
        let child = b.new_select(root as i64, "users", "owner");
        b.select_mut(child).fields.push(Field { id: 0, response_key: "id".into(), kind: FieldKind::Column { column: "id".into() } });
        b.select_mut(root).joins.push(Join { child_select_id: child, field_name: "owner".into() });
        b.select_mut(root).fields.push(Field { id: 0, response_key: "owner".into(), kind: FieldKind::Relation { relation_id: child } });
        let qcode = b.finish(QCodeKind::Query, None, vec![root]);

        let cmd = render_query(&qcode, &schema()).unwrap();
        let lookup = cmd.pipeline.iter().find(|s| s.get("$lookup").is_some()).unwrap();
        assert_eq!(lookup["$lookup"]["from"], json!("users"));
        assert_eq!(lookup["$lookup"]["localField"], json!("owner_id"));
        assert_eq!(lookup["$lookup"]["foreignField"], json!("_id"));
    }

    #[test]
    fn renders_insert_as_write_command_with_return_pipeline() {
        let mut b = QCodeBuilder::default();
        let select = b.new_select(NO_PARENT, "products", "products");
        b.select_mut(select).fields.push(Field { id: 0, response_key: "id".into(), kind: FieldKind::Column { column: "id".into() } });
        let m = b.new_mutate(NO_PARENT, select, "products", MutateKind::Insert);
        b.mutate_mut(m).cols.push(ColAssign { column: "name".into(), value: ScalarValue::String("Widget".into()) });
        let qcode = b.finish(QCodeKind::Mutation, Some("result".to_string()), vec![m]);

        let cmd = render_mutation(&qcode, &schema()).unwrap();
        assert_eq!(cmd.operation, "insertOne");
        assert_eq!(cmd.raw_document.as_deref(), Some("$1"));
        assert!(cmd.return_pipeline.is_some());
    }
}
