//! Authorization rewriter (spec.md §4.3.3).
//!
//! Folds a resolved role's column blocklist, function blocklist, and row
//! filter into an already-compiled [`QCode`], and gates mutations against
//! a read-only database. All failures here are terminal — the compiler
//! does not retry or downgrade an authorization error (spec.md §7).

use std::collections::HashSet;

use gqlsql_error::{CompileError, Result};

use crate::qcode::{Expression, FieldKind, QCode, QCodeKind, Select};

/// A role's authorization rules, resolved once at configuration time
/// (spec.md §4.3.3) and reused across every compilation under that role.
#[derive(Debug, Clone, Default)]
pub struct RoleRules {
    /// Role name, echoed into every error this role produces.
    pub name: String,
    /// `table.column` pairs this role may never read or write.
    pub blocked_columns: HashSet<String>,
    /// Function names this role may never call.
    pub blocked_functions: HashSet<String>,
    /// `true` if this role may call no database function at all.
    pub disable_functions: bool,
    /// A row filter AND-ed into every `Select.where` on a table this role
    /// touches, pre-parsed once at configuration time (a GraphQL fragment
    /// string, per spec.md, but represented here already as an [`Expression`]).
    pub row_filters: std::collections::HashMap<String, Expression>,
}

/// Apply `role`'s rules to `qcode` in place.
///
/// # Errors
/// Returns [`CompileError::Auth`] on the first blocked column, blocked
/// function, or (for mutations) read-only violation encountered.
pub fn apply(qcode: &mut QCode, role: &RoleRules, database_read_only: bool) -> Result<()> {
    if database_read_only && qcode.kind == QCodeKind::Mutation {
        return Err(CompileError::read_only(role.name.clone()));
    }

    for select in &mut qcode.selects {
        check_fields(select, role)?;
        if let Some(filter) = role.row_filters.get(&select.table) {
            merge_row_filter(select, filter.clone());
        }
    }

    if role.disable_functions {
        for select in &qcode.selects {
            if select.fields.iter().any(|f| matches!(f.kind, FieldKind::Function { .. })) {
                return Err(CompileError::all_functions_blocked(role.name.clone()));
            }
        }
    }

    Ok(())
}

fn check_fields(select: &Select, role: &RoleRules) -> Result<()> {
    for field in &select.fields {
        match &field.kind {
            FieldKind::Column { column } | FieldKind::JsonPath { column, .. } => {
                let key = format!("{}.{}", select.table, column);
                if role.blocked_columns.contains(&key) {
                    return Err(CompileError::column_blocked(key, role.name.clone()));
                }
            }
            FieldKind::Function { function, arg_column, .. } => {
                if role.blocked_functions.contains(function) {
                    return Err(CompileError::function_blocked(function.clone(), role.name.clone()));
                }
                if let Some(col) = arg_column {
                    let key = format!("{}.{}", select.table, col);
                    if role.blocked_columns.contains(&key) {
                        return Err(CompileError::column_blocked(key, role.name.clone()));
                    }
                }
            }
            FieldKind::Relation { .. } | FieldKind::Typename | FieldKind::Cursor => {}
        }
    }
    Ok(())
}

fn merge_row_filter(select: &mut Select, filter: Expression) {
    let existing = std::mem::replace(&mut select.where_expr, Expression::Nop);
    select.where_expr = match existing {
        Expression::Nop => filter,
        other => Expression::And(vec![other, filter]),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qcode::{Field, QCodeBuilder, NO_PARENT};

    fn qcode_with_price_field() -> QCode {
        let mut b = QCodeBuilder::default();
        let root = b.new_select(NO_PARENT, "products", "products");
        b.select_mut(root).fields.push(Field {
            id: 0,
            response_key: "price".into(),
            kind: FieldKind::Column { column: "price".into() },
        });
        b.finish(QCodeKind::Query, None, vec![root])
    }

    #[test]
    fn blocked_column_fails_compilation() {
        let mut qcode = qcode_with_price_field();
        let mut role = RoleRules { name: "anon".into(), ..Default::default() };
        role.blocked_columns.insert("products.price".into());
        let err = apply(&mut qcode, &role, false).unwrap_err();
        assert_eq!(err.to_string(), "db column blocked: products.price (role: 'anon')");
    }

    #[test]
    fn blocked_column_under_an_aggregate_still_fails_compilation() {
        let mut b = QCodeBuilder::default();
        let root = b.new_select(NO_PARENT, "products", "products");
        b.select_mut(root).fields.push(Field {
            id: 0,
            response_key: "sum_price".into(),
            kind: FieldKind::Function { function: "sum".into(), aggregate: Some(crate::qcode::AggregateFn::Sum), arg_column: Some("price".into()) },
        });
        let mut qcode = b.finish(QCodeKind::Query, None, vec![root]);
        let mut role = RoleRules { name: "anon".into(), ..Default::default() };
        role.blocked_columns.insert("products.price".into());
        let err = apply(&mut qcode, &role, false).unwrap_err();
        assert_eq!(err.to_string(), "db column blocked: products.price (role: 'anon')");
    }

    #[test]
    fn allowed_column_passes() {
        let mut qcode = qcode_with_price_field();
        let role = RoleRules { name: "admin".into(), ..Default::default() };
        assert!(apply(&mut qcode, &role, false).is_ok());
    }

    #[test]
    fn mutation_against_read_only_database_fails_regardless_of_role() {
        let mut b = QCodeBuilder::default();
        let mut qcode = b.finish(QCodeKind::Mutation, None, vec![]);
        let role = RoleRules { name: "admin".into(), ..Default::default() };
        let err = apply(&mut qcode, &role, true).unwrap_err();
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn row_filter_is_and_ed_into_existing_where() {
        let mut qcode = qcode_with_price_field();
        qcode.selects[0].where_expr = Expression::Nop;
        let mut role = RoleRules { name: "anon".into(), ..Default::default() };
        role.row_filters.insert("products".into(), Expression::Not(Box::new(Expression::Nop)));
        apply(&mut qcode, &role, false).unwrap();
        assert!(matches!(qcode.selects[0].where_expr, Expression::Not(_)));
    }
}
