//! GraphQL query-compiler core.
//!
//! Translates a GraphQL operation, a schema catalog, and a resolved
//! role's authorization rules into [`qcode::QCode`] — a flat,
//! dialect-agnostic intermediate representation — then renders that IR
//! into dialect-specific SQL or a MongoDB pipeline DSL via [`codegen`].
//!
//! # Pipeline
//!
//! ```text
//! source text
//!   -> lexer::lex
//!   -> parser::parse
//!   -> fragments::inline_fragments
//!   -> compiler::Compiler::compile   (QCode, per operation)
//!   -> authz::apply                  (folded into the above)
//!   -> codegen::*                    (dialect SQL / Mongo DSL)
//! ```
//!
//! Compilation is synchronous and allocates no shared mutable state
//! beyond a single [`compiler::Compiler::compile`] call (spec.md §5);
//! callers that want cross-request reuse wrap it in [`cache::QueryCache`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod ast;
pub mod authz;
pub mod cache;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod cursor;
pub mod fragments;
pub mod lexer;
pub mod parser;
pub mod qcode;
pub mod schema;

pub use authz::RoleRules;
pub use compiler::{CompileRequest, Compiler};
pub use config::CompilerConfig;
pub use cursor::CursorSecretRing;
pub use qcode::QCode;
pub use schema::SchemaCatalog;
