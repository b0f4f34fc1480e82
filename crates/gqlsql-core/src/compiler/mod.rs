//! Top-level compiler entry point (spec.md §6): lexes, parses, inlines
//! fragments, lowers each operation's root fields into [`QCode`], and
//! applies authorization — the full pipeline short of dialect codegen.

pub mod mutate;
pub mod select;
pub mod variables;

use std::collections::HashMap;

use gqlsql_error::{CompileError, Result};

use crate::ast::{FieldSelection, OperationKind, Selection};
use crate::authz::{self, RoleRules};
use crate::config::CompilerConfig;
use crate::cursor::CursorSecretRing;
use crate::fragments::inline_fragments;
use crate::parser::parse;
use crate::qcode::{QCode, QCodeBuilder, QCodeKind, NO_PARENT};
use crate::schema::SchemaCatalog;
use mutate::compile_mutate;
use select::{compile_select, SelectCtx};
use variables::VariableResolver;

/// A request to compile one GraphQL operation (spec.md §6).
pub struct CompileRequest<'a> {
    /// Raw GraphQL source text, possibly containing more than one operation.
    pub query_text: &'a str,
    /// If the document declares multiple named operations, selects which
    /// to compile; ignored (and optional) for single-operation documents.
    pub operation_name: Option<&'a str>,
    /// Host-supplied variable bindings, keyed by declared variable name.
    pub variables: &'a HashMap<String, serde_json::Value>,
    /// The resolved role's authorization rules.
    pub role: &'a RoleRules,
    /// Cursor key material; required only if the operation paginates.
    pub cursor_ring: Option<&'a CursorSecretRing>,
}

/// A top-level compiler, holding only configuration and schema —
/// no mutable state survives a single [`Compiler::compile`] call
/// (spec.md §5's synchronous/pure concurrency model).
#[derive(Debug, Clone)]
pub struct Compiler {
    config: CompilerConfig,
    schema: SchemaCatalog,
}

impl Compiler {
    /// Build a compiler targeting `schema` under `config`.
    #[must_use]
    pub fn new(config: CompilerConfig, schema: SchemaCatalog) -> Self {
        Self { config, schema }
    }

    /// Compile one GraphQL operation end to end: lex, parse, inline
    /// fragments, lower to [`QCode`], then apply `req.role`'s
    /// authorization rules.
    ///
    /// # Errors
    /// Returns any [`CompileError`] raised by lexing, parsing, fragment
    /// inlining, lowering, or authorization. The first error encountered
    /// is returned; the compiler does not accumulate or retry.
    pub fn compile(&self, req: &CompileRequest<'_>) -> Result<QCode> {
        let _span = tracing::info_span!(
            "compile",
            role = %req.role.name,
            dialect = %self.config.dialect,
        )
        .entered();

        if req.query_text.trim().is_empty() {
            return Err(CompileError::parse(0, "a GraphQL operation", "empty document"));
        }

        if self.config.trace_phases {
            tracing::debug!("lex + parse");
        }
        let doc = parse(req.query_text)?;
        let operation = select_operation(&doc, req.operation_name)?;

        if self.config.trace_phases {
            tracing::debug!(operation = ?operation.kind, "inline fragments");
        }
        let selection_set = inline_fragments(&doc, operation)?;

        if let Some(limit) = self.config.max_complexity {
            // Complexity is computed once lowering finishes; nothing to
            // check before that, so this only documents the config field
            // is honored below via `QCode::complexity`.
            let _ = limit;
        }

        if self.config.trace_phases {
            tracing::debug!("lower to QCode");
        }
        let mut resolver = VariableResolver::new(&operation.variable_defs, req.variables);
        let mut ctx = SelectCtx { schema: &self.schema, resolver: &mut resolver, cursor_ring: req.cursor_ring };
        let mut builder = QCodeBuilder::default();

        let kind = match operation.kind {
            OperationKind::Query | OperationKind::Subscription => QCodeKind::Query,
            OperationKind::Mutation => QCodeKind::Mutation,
        };

        let mut roots = Vec::new();
        let mut action_var_name = None;
        for sel in &selection_set {
            let Selection::Field(field) = sel else {
                return Err(CompileError::invalid_argument(
                    "<root>",
                    "selection",
                    "a root selection must be a plain field, not an inline fragment or spread",
                ));
            };
            let root_id = compile_root_field(&mut builder, &mut ctx, kind, field)?;
            if kind == QCodeKind::Mutation && action_var_name.is_none() {
                action_var_name = Some(format!("{}_result", field.response_key()));
            }
            roots.push(root_id);
        }

        if roots.is_empty() {
            return Err(CompileError::parse(0, "at least one root field", "empty selection set"));
        }

        let mut qcode = builder.finish(kind, action_var_name, roots);

        if let Some(max) = self.config.max_complexity {
            if qcode.complexity > max {
                return Err(CompileError::invalid_argument(
                    "<root>",
                    "complexity",
                    format!("query complexity {} exceeds configured maximum {max}", qcode.complexity),
                ));
            }
        }

        qcode.needs_user = qcode.needs_user || ctx.resolver.needs_user;

        if self.config.trace_phases {
            tracing::debug!(table_count = qcode.selects.len() + qcode.mutates.len(), "authorize");
        }
        authz::apply(&mut qcode, req.role, self.config.read_only)?;

        tracing::info!(complexity = qcode.complexity, "compilation complete");
        Ok(qcode)
    }
}

fn select_operation<'doc, 'src>(
    doc: &'doc crate::ast::Document<'src>,
    operation_name: Option<&str>,
) -> Result<&'doc crate::ast::Operation<'src>> {
    match operation_name {
        Some(name) => doc
            .operations
            .iter()
            .find(|op| op.name == Some(name))
            .ok_or_else(|| CompileError::parse(0, "a declared operation name", name.to_string())),
        None => doc
            .operations
            .first()
            .ok_or_else(|| CompileError::parse(0, "an operation", "document declares none")),
    }
}

fn compile_root_field(
    builder: &mut QCodeBuilder,
    ctx: &mut SelectCtx<'_, '_, '_>,
    kind: QCodeKind,
    field: &FieldSelection<'_>,
) -> Result<usize> {
    match kind {
        QCodeKind::Query | QCodeKind::Subscription => compile_select(builder, ctx, NO_PARENT, field.name, field),
        QCodeKind::Mutation => compile_mutate(builder, ctx, field),
    }
}
