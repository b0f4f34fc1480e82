//! Compiler configuration (SPEC_FULL §B), modeled on
//! `fraiseql-core::compiler::CompilerConfig`.

use gqlsql_db::SqlDialectKind;

/// Configuration for one [`crate::compiler::Compiler`] instance.
///
/// Cloned cheaply and shared across threads — the compiler itself holds
/// no mutable state beyond what a single `compile()` call owns locally
/// (spec.md §5).
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Target SQL dialect. Document-store (MongoDB) targets bypass this
    /// and call [`crate::codegen::mongo`] directly.
    pub dialect: SqlDialectKind,
    /// `true` if the target database is read-only; any mutation then
    /// fails with [`gqlsql_error::CompileError::read_only`] regardless of role.
    pub read_only: bool,
    /// Reject the query if its static complexity score exceeds this,
    /// rather than letting the host decide post hoc. `None` disables the check.
    pub max_complexity: Option<u32>,
    /// Single-flight prepared-query cache capacity (entries).
    pub cache_capacity: usize,
    /// `true` to enable `tracing` span/event emission at each compilation
    /// phase boundary (lex, parse, lower, authorize, codegen).
    pub trace_phases: bool,
}

impl CompilerConfig {
    /// A config targeting PostgreSQL with tracing on and a generous cache.
    #[must_use]
    pub fn postgres() -> Self {
        Self {
            dialect: SqlDialectKind::Postgres,
            read_only: false,
            max_complexity: None,
            cache_capacity: 1024,
            trace_phases: true,
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self::postgres()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_postgres_and_is_writable() {
        let cfg = CompilerConfig::default();
        assert_eq!(cfg.dialect, SqlDialectKind::Postgres);
        assert!(!cfg.read_only);
    }
}
