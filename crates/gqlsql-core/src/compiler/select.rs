//! Select compilation (spec.md §4.3.1): lowers a field whose name
//! resolves to a table into a [`Select`] node, recursively compiling
//! nested relations, columns, functions, and filter/order/paging
//! arguments.

use gqlsql_db::Operator;

use gqlsql_error::{CompileError, Result};

use crate::ast::{FieldSelection, Selection, Value};
use crate::compiler::variables::VariableResolver;
use crate::cursor::{self, CursorSecretRing};
use crate::qcode::{
    AggregateFn, ColumnRef, Expression, Field, FieldKind, Paging, QCodeBuilder, ScalarValue,
    SortDirection,
};
use crate::schema::{ColumnType, SchemaCatalog};

/// Shared state threaded through select compilation.
pub struct SelectCtx<'a, 'b, 'src> {
    /// The schema every field and filter is resolved against.
    pub schema: &'a SchemaCatalog,
    /// Resolves GraphQL values/variables to [`ScalarValue`]s.
    pub resolver: &'a mut VariableResolver<'b, 'src>,
    /// Cursor key material, needed only when a query uses `first`/`last`/`before`/`after`.
    pub cursor_ring: Option<&'a CursorSecretRing>,
}

/// Compile a field whose name resolves to a table into a new [`Select`]
/// node under `parent_id`, returning its id.
///
/// # Errors
/// Propagates [`CompileError`] from schema resolution, argument
/// validation, or nested compilation.
pub fn compile_select(
    builder: &mut QCodeBuilder,
    ctx: &mut SelectCtx<'_, '_, '_>,
    parent_id: i64,
    table_name: &str,
    field: &FieldSelection<'_>,
) -> Result<usize> {
    let table = ctx.schema.find_table(table_name, None)?.clone();
    let select_id = builder.new_select(parent_id, table.name.clone(), field.response_key().to_string());

    let mut order_by = Vec::new();
    let mut limit = None;
    let mut offset = None;
    let mut distinct_on = Vec::new();
    let mut paging = Paging::default();
    let mut where_expr = Expression::Nop;
    let mut is_singleton = false;

    for arg in &field.arguments {
        match arg.name {
            "where" => {
                where_expr = compile_where_value(ctx, select_id, &table, &arg.value)?;
            }
            "order_by" => {
                order_by = compile_order_by(&arg.value)?;
            }
            "limit" => {
                limit = Some(compile_int_arg(ctx, field.name, "limit", &arg.value)?);
            }
            "offset" => {
                offset = Some(compile_int_arg(ctx, field.name, "offset", &arg.value)?);
            }
            "first" => {
                paging.first = Some(compile_int_arg(ctx, field.name, "first", &arg.value)?);
            }
            "last" => {
                paging.last = Some(compile_int_arg(ctx, field.name, "last", &arg.value)?);
            }
            "distinct" => {
                distinct_on = compile_string_list(&arg.value)?;
            }
            "id" => {
                is_singleton = true;
                let pk = table.primary_key().name.clone();
                let value = ctx.resolver.resolve(&arg.value)?;
                let id_expr = Expression::Cmp {
                    op: Operator::Eq,
                    left: ColumnRef { select_id, column: pk },
                    right: value,
                };
                where_expr = and_exprs(where_expr, id_expr);
            }
            "search" | "find" => {
                // `search:`/`find:` select a pre-configured column or a
                // recursive-CTE direction; both are host-schema
                // configuration concerns resolved at codegen time, not
                // structural QCode shape, so they pass through as
                // metadata on the select's field_name only.
            }
            "before" | "after" => {
                let token = string_literal(&arg.value).ok_or_else(|| {
                    CompileError::invalid_argument(field.name, arg.name, "cursor must be a string")
                })?;
                if !token.is_empty() {
                    let ring = ctx.cursor_ring.ok_or_else(|| {
                        CompileError::invalid_argument(field.name, arg.name, "no cursor secret configured")
                    })?;
                    let expected_arity = order_by.len().max(1);
                    let (values, _) = cursor::decode(ring, token, expected_arity)?;
                    if arg.name == "before" {
                        paging.before = Some(values);
                    } else {
                        paging.after = Some(values);
                    }
                }
            }
            other => {
                return Err(CompileError::invalid_argument(field.name, other, "unrecognized argument"));
            }
        }
    }

    if paging.is_active() && order_by.is_empty() {
        return Err(CompileError::invalid_argument(
            field.name,
            "order_by",
            "cursor paging requires an order_by clause",
        ));
    }

    let mut aggregation_mask = false;
    let mut fields = Vec::new();
    compile_nested_selections(builder, ctx, select_id, &table, &field.selection_set, &mut fields, &mut aggregation_mask)?;

    let select = builder.select_mut(select_id);
    select.where_expr = where_expr;
    select.order_by = order_by;
    select.limit = limit;
    select.offset = offset;
    select.paging = paging;
    select.distinct_on = distinct_on;
    select.is_singleton = is_singleton;
    select.aggregation_mask = aggregation_mask;
    select.fields = fields;
    if aggregation_mask {
        let group_by = select
            .fields
            .iter()
            .filter_map(|f| match &f.kind {
                FieldKind::Column { column } => Some(column.clone()),
                _ => None,
            })
            .collect();
        select.group_by = group_by;
    }

    Ok(select_id)
}

#[allow(clippy::too_many_arguments)]
fn compile_nested_selections(
    builder: &mut QCodeBuilder,
    ctx: &mut SelectCtx<'_, '_, '_>,
    select_id: usize,
    table: &crate::schema::Table,
    selections: &[Selection<'_>],
    out_fields: &mut Vec<Field>,
    aggregation_mask: &mut bool,
) -> Result<()> {
    for sel in selections {
        let Selection::Field(f) = sel else {
            // Inline fragments/spreads are resolved by the fragment
            // inliner before this stage runs; polymorphic `...on Table`
            // selections are handled by the codegen layer's union
            // branch, not here (spec.md §4.4.1).
            continue;
        };

        let response_key = f.response_key().to_string();

        if f.name == "__typename" {
            out_fields.push(Field { id: out_fields.len(), response_key, kind: FieldKind::Typename });
            continue;
        }

        if let Some((agg, col)) = AggregateFn::parse_field(f.name) {
            table.find_column(col).ok_or_else(|| {
                CompileError::unknown(gqlsql_error::EntityKind::Column, format!("{}.{col}", table.name))
            })?;
            *aggregation_mask = true;
            out_fields.push(Field {
                id: out_fields.len(),
                response_key,
                kind: FieldKind::Function {
                    function: agg.sql_name().to_string(),
                    aggregate: Some(agg),
                    arg_column: Some(col.to_string()),
                },
            });
            continue;
        }

        if let Some(col) = table.find_column(f.name) {
            if col.ty == ColumnType::Json && !f.selection_set.is_empty() {
                let path = f.selection_set.iter().filter_map(selection_leaf_name).collect();
                out_fields.push(Field {
                    id: out_fields.len(),
                    response_key,
                    kind: FieldKind::JsonPath { column: col.name.clone(), path },
                });
            } else {
                out_fields.push(Field {
                    id: out_fields.len(),
                    response_key,
                    kind: FieldKind::Column { column: col.name.clone() },
                });
            }
            continue;
        }

        if let Some(rel) = table.find_relationship(f.name) {
            let Some(target_table) = rel.target_table() else {
                // Embedded JSON relationships project through a json path,
                // not a child select.
                let path = f.selection_set.iter().filter_map(selection_leaf_name).collect();
                out_fields.push(Field {
                    id: out_fields.len(),
                    response_key,
                    kind: FieldKind::JsonPath { column: f.name.to_string(), path },
                });
                continue;
            };
            let target_table = target_table.to_string();
            let child_id = compile_select(builder, ctx, select_id as i64, &target_table, f)?;
            builder.select_mut(select_id).joins.push(crate::qcode::Join {
                child_select_id: child_id,
                field_name: f.name.to_string(),
            });
            out_fields.push(Field {
                id: out_fields.len(),
                response_key,
                kind: FieldKind::Relation { relation_id: child_id },
            });
            continue;
        }

        if ctx.schema.find_function(f.name).is_ok() {
            out_fields.push(Field {
                id: out_fields.len(),
                response_key,
                kind: FieldKind::Function { function: f.name.to_string(), aggregate: None, arg_column: None },
            });
            continue;
        }

        return Err(CompileError::unknown(
            gqlsql_error::EntityKind::Column,
            format!("{}.{}", table.name, f.name),
        ));
    }
    Ok(())
}

fn selection_leaf_name(sel: &Selection<'_>) -> Option<String> {
    match sel {
        Selection::Field(f) => Some(f.name.to_string()),
        _ => None,
    }
}

pub(crate) fn compile_where_value(
    ctx: &mut SelectCtx<'_, '_, '_>,
    select_id: usize,
    table: &crate::schema::Table,
    value: &Value<'_>,
) -> Result<Expression> {
    let Value::Object(pairs) = value else {
        return Err(CompileError::invalid_argument(&table.name, "where", "where must be an object"));
    };

    let mut clauses = Vec::new();
    for (key, val) in pairs {
        clauses.push(compile_where_entry(ctx, select_id, table, key, val)?);
    }
    Ok(match clauses.len() {
        0 => Expression::Nop,
        1 => clauses.into_iter().next().unwrap(),
        _ => Expression::And(clauses),
    })
}

fn compile_where_entry(
    ctx: &mut SelectCtx<'_, '_, '_>,
    select_id: usize,
    table: &crate::schema::Table,
    key: &str,
    val: &Value<'_>,
) -> Result<Expression> {
    match key {
        "and" => {
            let Value::List(items) = val else {
                return Err(CompileError::invalid_argument(&table.name, "and", "must be a list"));
            };
            let mut out = Vec::new();
            for item in items {
                out.push(compile_where_value(ctx, select_id, table, item)?);
            }
            Ok(Expression::And(out))
        }
        "or" => {
            let Value::List(items) = val else {
                return Err(CompileError::invalid_argument(&table.name, "or", "must be a list"));
            };
            let mut out = Vec::new();
            for item in items {
                out.push(compile_where_value(ctx, select_id, table, item)?);
            }
            Ok(Expression::Or(out))
        }
        "not" => {
            let inner = compile_where_value(ctx, select_id, table, val)?;
            Ok(Expression::Not(Box::new(inner)))
        }
        col_key => compile_column_where(ctx, select_id, table, col_key, val),
    }
}

fn compile_column_where(
    ctx: &mut SelectCtx<'_, '_, '_>,
    select_id: usize,
    table: &crate::schema::Table,
    key: &str,
    val: &Value<'_>,
) -> Result<Expression> {
    let has_arrow_path = key.contains("->");
    let has_path_suffix = key.ends_with("_path") && !has_arrow_path;
    if has_arrow_path && has_path_suffix {
        return Err(CompileError::invalid_argument(
            &table.name,
            key,
            "ambiguous JSON-path filter: both 'col->path' and 'col_path' forms present",
        ));
    }

    let column_name = key.split("->").next().unwrap_or(key);
    let column = table.find_column(column_name).ok_or_else(|| {
        CompileError::unknown(gqlsql_error::EntityKind::Column, format!("{}.{column_name}", table.name))
    })?;
    let col_ref = ColumnRef { select_id, column: column.name.clone() };

    let Value::Object(ops) = val else {
        let resolved = ctx.resolver.resolve(val)?;
        return Ok(Expression::Cmp { op: Operator::Eq, left: col_ref, right: resolved });
    };

    let mut clauses = Vec::new();
    for (op_key, op_val) in ops {
        let op = Operator::from_str(op_key).ok_or_else(|| {
            CompileError::invalid_argument(&table.name, *op_key, "unrecognized comparison operator")
        })?;

        if op.is_spatial() {
            let Value::List(params) = op_val else {
                return Err(CompileError::invalid_argument(&table.name, *op_key, "GIS operator expects a parameter list"));
            };
            let params = params.iter().map(|p| ctx.resolver.resolve(p)).collect::<Result<Vec<_>>>()?;
            clauses.push(Expression::Geo { op, col: col_ref.clone(), params });
            continue;
        }

        if matches!(op, Operator::IsNull) {
            let negate = matches!(ctx.resolver.resolve(op_val)?, ScalarValue::Bool(false));
            clauses.push(Expression::Null { col: col_ref.clone(), negate });
            continue;
        }

        if op.expects_list() {
            let Value::List(items) = op_val else {
                return Err(CompileError::invalid_argument(&table.name, *op_key, "expects a list value"));
            };
            if items.is_empty() {
                return Err(CompileError::invalid_argument(&table.name, *op_key, "list must not be empty"));
            }
            let list = items.iter().map(|v| ctx.resolver.resolve(v)).collect::<Result<Vec<_>>>()?;
            clauses.push(Expression::In { col: col_ref.clone(), list, negate: matches!(op, Operator::NotIn) });
            continue;
        }

        let resolved = ctx.resolver.resolve(op_val)?;
        clauses.push(Expression::Cmp { op, left: col_ref.clone(), right: resolved });
    }

    Ok(match clauses.len() {
        0 => Expression::Nop,
        1 => clauses.into_iter().next().unwrap(),
        _ => Expression::And(clauses),
    })
}

fn compile_order_by(value: &Value<'_>) -> Result<Vec<(String, SortDirection)>> {
    let Value::List(items) = value else {
        return Err(CompileError::invalid_argument("<select>", "order_by", "must be a list"));
    };
    let mut out = Vec::new();
    for item in items {
        let Value::Object(pairs) = item else {
            return Err(CompileError::invalid_argument("<select>", "order_by", "each entry must be an object"));
        };
        for (col, dir) in pairs {
            let direction = match dir {
                Value::Enum("asc") => SortDirection::Asc,
                Value::Enum("desc") => SortDirection::Desc,
                _ => {
                    return Err(CompileError::invalid_argument(
                        "<select>",
                        "order_by",
                        "direction must be 'asc' or 'desc'",
                    ))
                }
            };
            out.push(((*col).to_string(), direction));
        }
    }
    Ok(out)
}

fn compile_string_list(value: &Value<'_>) -> Result<Vec<String>> {
    let Value::List(items) = value else {
        return Err(CompileError::invalid_argument("<select>", "distinct", "must be a list"));
    };
    items
        .iter()
        .map(|v| match v {
            Value::Enum(s) => Ok((*s).to_string()),
            Value::String(s) => Ok(s.clone()),
            _ => Err(CompileError::invalid_argument("<select>", "distinct", "entries must be names")),
        })
        .collect()
}

fn compile_int_arg(ctx: &mut SelectCtx<'_, '_, '_>, field: &str, arg: &str, value: &Value<'_>) -> Result<i64> {
    match ctx.resolver.resolve(value)? {
        ScalarValue::Int(n) => Ok(n),
        _ => Err(CompileError::invalid_argument(field, arg, "must resolve to an integer")),
    }
}

fn string_literal(value: &Value<'_>) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn and_exprs(a: Expression, b: Expression) -> Expression {
    match a {
        Expression::Nop => b,
        other => Expression::And(vec![other, b]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::schema::{Column, ColumnType, ForeignKey, FkAction, Relationship, Table, TableKind};
    use std::collections::HashMap;

    fn sample_schema() -> SchemaCatalog {
        let users = Table {
            schema: "public".into(),
            name: "users".into(),
            kind: TableKind::Base,
            primary_key_index: 0,
            columns: vec![
                Column { name: "id".into(), ty: ColumnType::Int, nullable: false, is_array: false, default: None, fk: None, unique: true, blocked_by_default: false },
                Column { name: "full_name".into(), ty: ColumnType::Text, nullable: false, is_array: false, default: None, fk: None, unique: false, blocked_by_default: false },
            ],
            relationships: HashMap::new(),
            full_text_columns: vec![],
        };
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
        SchemaCatalog::new(vec![users, products], vec![])
    }

    #[test]
    fn compiles_nested_relation_with_limit_and_order() {
        let doc = parse("{ products(limit: 3, order_by: [{id: asc}]) { id owner { id fullName: full_name } } }").unwrap();
        let schema = sample_schema();
        let defs = vec![];
        let bindings = HashMap::new();
        let mut resolver = VariableResolver::new(&defs, &bindings);
        let mut ctx = SelectCtx { schema: &schema, resolver: &mut resolver, cursor_ring: None };
        let mut builder = QCodeBuilder::default();

        let Selection::Field(f) = &doc.operations[0].selection_set[0] else { panic!() };
        let id = compile_select(&mut builder, &mut ctx, crate::qcode::NO_PARENT, "products", f).unwrap();
        let qcode = builder.finish(crate::qcode::QCodeKind::Query, None, vec![id]);

        let root = &qcode.selects[0];
        assert_eq!(root.limit, Some(3));
        assert_eq!(root.order_by, vec![("id".to_string(), SortDirection::Asc)]);
        assert_eq!(root.joins.len(), 1);
        let child = &qcode.selects[root.joins[0].child_select_id];
        assert_eq!(child.table, "users");
    }

    #[test]
    fn id_shorthand_forces_singleton_and_filter() {
        let doc = parse("{ products(id: 7) { id } }").unwrap();
        let schema = sample_schema();
        let defs = vec![];
        let bindings = HashMap::new();
        let mut resolver = VariableResolver::new(&defs, &bindings);
        let mut ctx = SelectCtx { schema: &schema, resolver: &mut resolver, cursor_ring: None };
        let mut builder = QCodeBuilder::default();
        let Selection::Field(f) = &doc.operations[0].selection_set[0] else { panic!() };
        let id = compile_select(&mut builder, &mut ctx, crate::qcode::NO_PARENT, "products", f).unwrap();
        let qcode = builder.finish(crate::qcode::QCodeKind::Query, None, vec![id]);
        assert!(qcode.selects[0].is_singleton);
        assert!(matches!(qcode.selects[0].where_expr, Expression::Cmp { .. }));
    }

    #[test]
    fn empty_in_list_is_invalid_argument() {
        let doc = parse("{ products(where: {id: {in: []}}) { id } }").unwrap();
        let schema = sample_schema();
        let defs = vec![];
        let bindings = HashMap::new();
        let mut resolver = VariableResolver::new(&defs, &bindings);
        let mut ctx = SelectCtx { schema: &schema, resolver: &mut resolver, cursor_ring: None };
        let mut builder = QCodeBuilder::default();
        let Selection::Field(f) = &doc.operations[0].selection_set[0] else { panic!() };
        let err = compile_select(&mut builder, &mut ctx, crate::qcode::NO_PARENT, "products", f).unwrap_err();
        assert!(matches!(err, CompileError::InvalidArgument { .. }));
    }

    #[test]
    fn cursor_paging_without_order_by_is_rejected() {
        let doc = parse("{ products(first: 1) { id } }").unwrap();
        let schema = sample_schema();
        let defs = vec![];
        let bindings = HashMap::new();
        let mut resolver = VariableResolver::new(&defs, &bindings);
        let mut ctx = SelectCtx { schema: &schema, resolver: &mut resolver, cursor_ring: None };
        let mut builder = QCodeBuilder::default();
        let Selection::Field(f) = &doc.operations[0].selection_set[0] else { panic!() };
        let err = compile_select(&mut builder, &mut ctx, crate::qcode::NO_PARENT, "products", f).unwrap_err();
        assert!(matches!(err, CompileError::InvalidArgument { .. }));
    }
}
