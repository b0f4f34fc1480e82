//! Mutate compilation (spec.md §4.3.2): lowers a mutation root field into
//! a tree of [`Mutate`] nodes, one per table touched, ordered by FK
//! dependency.

use gqlsql_error::{CompileError, Result};

use crate::ast::{FieldSelection, Value};
use crate::compiler::select::{compile_select, compile_where_value, SelectCtx};
use crate::qcode::{ColAssign, Expression, MutateKind, QCodeBuilder, RelColAssign};
use crate::schema::{SchemaCatalog, Table};

/// Compile a mutation root field into a tree of [`crate::qcode::Mutate`]
/// nodes plus the [`crate::qcode::Select`] used to materialize its
/// response shape, returning the root mutate id.
///
/// # Errors
/// Returns [`CompileError::InvalidArgument`] if the root carries zero or
/// more than one of `insert`/`update`/`upsert`/`delete`, or if a
/// dependency cycle is detected among nested mutations.
pub fn compile_mutate(
    builder: &mut QCodeBuilder,
    ctx: &mut SelectCtx<'_, '_, '_>,
    field: &FieldSelection<'_>,
) -> Result<usize> {
    let table_name = field.name;
    let table = ctx.schema.find_table(table_name, None)?.clone();

    let action = root_action(field)?;
    let where_value = field.arguments.iter().find(|a| a.name == "where" || a.name == "id");

    let select_id = compile_select(builder, ctx, crate::qcode::NO_PARENT, table_name, field)?;

    let mutate_id = builder.new_mutate(crate::qcode::NO_PARENT, select_id, table.name.clone(), action.kind);
    if let Some(arg) = where_value {
        let where_expr = compile_mutate_filter(ctx, select_id, &table, arg.name, &arg.value)?;
        builder.mutate_mut(mutate_id).where_expr = where_expr;
    }

    if let Value::Object(pairs) = &action.payload {
        compile_payload(builder, ctx, &table, mutate_id, pairs)?;
    } else if let Value::List(items) = &action.payload {
        builder.mutate_mut(mutate_id).is_multi = true;
        if items.len() > 1 {
            builder.mutate_mut(mutate_id).is_json_batch = true;
        }
        for item in items {
            if let Value::Object(pairs) = item {
                compile_payload(builder, ctx, &table, mutate_id, pairs)?;
            }
        }
    }

    check_acyclic(builder, mutate_id)?;
    Ok(mutate_id)
}

struct RootAction<'src> {
    kind: MutateKind,
    payload: Value<'src>,
}

fn root_action<'src>(field: &FieldSelection<'src>) -> Result<RootAction<'src>> {
    let mut found = Vec::new();
    for arg in &field.arguments {
        let kind = match arg.name {
            "insert" => Some(MutateKind::Insert),
            "update" => Some(MutateKind::Update),
            "upsert" => Some(MutateKind::Upsert),
            "delete" => Some(MutateKind::Delete),
            _ => None,
        };
        if let Some(kind) = kind {
            found.push((kind, arg.value.clone()));
        }
    }

    match found.len() {
        1 => {
            let (kind, payload) = found.into_iter().next().unwrap();
            Ok(RootAction { kind, payload })
        }
        0 => Err(CompileError::invalid_argument(
            field.name,
            "insert|update|upsert|delete",
            "a mutation root must carry exactly one mutation action",
        )),
        _ => Err(CompileError::invalid_argument(
            field.name,
            "insert|update|upsert|delete",
            "a mutation root must carry exactly one mutation action, found multiple",
        )),
    }
}

fn compile_mutate_filter(
    ctx: &mut SelectCtx<'_, '_, '_>,
    select_id: usize,
    table: &Table,
    arg_name: &str,
    value: &Value<'_>,
) -> Result<Expression> {
    if arg_name == "id" {
        let pk = table.primary_key().name.clone();
        let resolved = ctx.resolver.resolve(value)?;
        return Ok(Expression::Cmp {
            op: gqlsql_db::Operator::Eq,
            left: crate::qcode::ColumnRef { select_id, column: pk },
            right: resolved,
        });
    }
    // `where:` on a mutation root shares the read select's where-object
    // grammar; the root select compiled just above gives us the select_id
    // these column refs resolve against.
    compile_where_value(ctx, select_id, table, value)
}

fn compile_payload(
    builder: &mut QCodeBuilder,
    ctx: &mut SelectCtx<'_, '_, '_>,
    table: &Table,
    mutate_id: usize,
    pairs: &[(&str, Value<'_>)],
) -> Result<()> {
    for (key, value) in pairs {
        match *key {
            "connect" | "disconnect" => {
                compile_connect_disconnect(builder, ctx, table, mutate_id, key, value)?;
            }
            _ => {
                if let Some(col) = table.find_column(key) {
                    let resolved = ctx.resolver.resolve(value)?;
                    builder.mutate_mut(mutate_id).cols.push(ColAssign { column: col.name.clone(), value: resolved });
                } else if let Some(rel) = table.find_relationship(key) {
                    let Some(target_table_name) = rel.target_table() else { continue };
                    let target_table = ctx.schema.find_table(target_table_name, None)?.clone();
                    compile_nested_mutation(builder, ctx, &target_table, mutate_id, value)?;
                } else {
                    return Err(CompileError::unknown(
                        gqlsql_error::EntityKind::Column,
                        format!("{}.{key}", table.name),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn compile_nested_mutation(
    builder: &mut QCodeBuilder,
    ctx: &mut SelectCtx<'_, '_, '_>,
    target_table: &Table,
    parent_mutate_id: usize,
    value: &Value<'_>,
) -> Result<()> {
    let parent_select_id = builder.mutate(parent_mutate_id).select_id;
    let child_id = builder.new_mutate(parent_mutate_id as i64, parent_select_id, target_table.name.clone(), MutateKind::Update);

    // Child-to-parent FK: if the target table holds the FK back to the
    // parent's table, the parent must exist first, so the child depends
    // on the parent (spec.md §4.3.2 dependency rule). Otherwise the
    // parent depends on the child (the child must be inserted before the
    // parent can reference it).
    let child_has_fk_to_parent = target_table
        .columns
        .iter()
        .any(|c| c.fk.as_ref().is_some_and(|fk| fk.table == builder.mutate(parent_mutate_id).table));

    if child_has_fk_to_parent {
        builder.mutate_mut(child_id).depends_on.push(parent_mutate_id);
        builder.mutate_mut(child_id).rcols.push(RelColAssign {
            column: format!("{}_id", builder.mutate(parent_mutate_id).table.trim_end_matches('s')),
            source_mutate_id: parent_mutate_id,
        });
    } else {
        builder.mutate_mut(parent_mutate_id).depends_on.push(child_id);
    }

    if let Value::Object(pairs) = value {
        compile_payload(builder, ctx, target_table, child_id, pairs)?;
    } else if let Value::List(items) = value {
        builder.mutate_mut(child_id).is_multi = true;
        for item in items {
            if let Value::Object(pairs) = item {
                compile_payload(builder, ctx, target_table, child_id, pairs)?;
            }
        }
    }
    Ok(())
}

fn compile_connect_disconnect(
    builder: &mut QCodeBuilder,
    ctx: &mut SelectCtx<'_, '_, '_>,
    table: &Table,
    parent_mutate_id: usize,
    key: &str,
    value: &Value<'_>,
) -> Result<()> {
    let Value::Object(_) = value else {
        return Err(CompileError::invalid_argument(&table.name, key, "must be a filter object"));
    };
    let kind = if key == "connect" { MutateKind::Connect } else { MutateKind::Disconnect };
    let parent_select_id = builder.mutate(parent_mutate_id).select_id;
    let node_id = builder.new_mutate(parent_mutate_id as i64, parent_select_id, table.name.clone(), kind);
    builder.mutate_mut(node_id).depends_on.push(parent_mutate_id);

    if let Value::Object(pairs) = value {
        for (k, v) in pairs {
            if let Some(col) = table.find_column(k) {
                let resolved = ctx.resolver.resolve(v)?;
                builder.mutate_mut(node_id).cols.push(ColAssign { column: col.name.clone(), value: resolved });
            }
        }
    }
    Ok(())
}

fn check_acyclic(builder: &QCodeBuilder, root: usize) -> Result<()> {
    fn visit(mutates: &[crate::qcode::Mutate], id: usize, visiting: &mut Vec<usize>, done: &mut Vec<bool>) -> Result<()> {
        if done[id] {
            return Ok(());
        }
        if visiting.contains(&id) {
            return Err(CompileError::invalid_argument(
                &mutates[id].table,
                "depends_on",
                "mutation dependency graph contains a cycle",
            ));
        }
        visiting.push(id);
        for &dep in &mutates[id].depends_on {
            visit(mutates, dep, visiting, done)?;
        }
        visiting.pop();
        done[id] = true;
        Ok(())
    }

    let mutates = builder.mutates();
    let mut done = vec![false; mutates.len()];
    let mut visiting = Vec::new();
    for id in 0..mutates.len() {
        visit(mutates, id, &mut visiting, &mut done)?;
    }
    let _ = root;
    Ok(())
}

/// Topologically sort `mutate_ids` by `depends_on`, tie-broken by
/// declared field order (spec.md §5 ordering guarantee).
#[must_use]
pub fn topo_sort(mutates: &[crate::qcode::Mutate], mutate_ids: &[usize]) -> Vec<usize> {
    let mut remaining: Vec<usize> = mutate_ids.to_vec();
    let mut placed = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(mutate_ids.len());

    while !remaining.is_empty() {
        let mut progressed = false;
        remaining.retain(|&id| {
            let ready = mutates[id].depends_on.iter().all(|d| placed.contains(d) || !mutate_ids.contains(d));
            if ready {
                out.push(id);
                placed.insert(id);
                progressed = true;
                false
            } else {
                true
            }
        });
        if !progressed {
            // A cycle would have been caught by `check_acyclic`; this is
            // a defensive fallback that preserves declaration order.
            out.extend(remaining.drain(..));
            break;
        }
    }
    out
}
