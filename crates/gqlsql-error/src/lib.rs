//! Error taxonomy for the `gqlsql` query-compiler core.
//!
//! The compiler never retries and never swallows a structural error: it
//! returns the first one encountered with enough context to pinpoint the
//! offending GraphQL byte range. Authorization errors are terminal and are
//! never caught-and-ignored by a host.
//!
//! # Error hierarchy
//!
//! ```text
//! CompileError
//! ├── Lex             - malformed source bytes
//! ├── Parse           - malformed token stream
//! ├── UnknownEntity    - table/column/function/fragment not in the catalog
//! ├── InvalidArgument  - well-typed but semantically invalid argument
//! ├── Auth             - column/function/table block, read-only gate
//! ├── Type             - variable or literal type mismatch
//! ├── Cursor           - tampered or malformed pagination cursor
//! └── DialectUnsupported - feature the target dialect cannot express
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use thiserror::Error;

/// Result type alias used throughout the compiler core.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Kind of schema entity that failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EntityKind {
    /// A table or view.
    Table,
    /// A column on a table.
    Column,
    /// A callable SQL function.
    Function,
    /// A named GraphQL fragment.
    Fragment,
    /// A relationship between two tables.
    Relationship,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Table => "table",
            Self::Column => "column",
            Self::Function => "function",
            Self::Fragment => "fragment",
            Self::Relationship => "relationship",
        };
        write!(f, "{s}")
    }
}

/// Authorization failure kind (spec §7 `AuthError`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AuthErrorKind {
    /// A field's column is in the role's blocklist.
    ColumnBlocked,
    /// A called function is blocked, or all functions are disabled for the role.
    FunctionBlocked,
    /// The role has no access to the table at all.
    TableBlocked,
    /// A mutation was attempted against a database marked read-only.
    ReadOnly,
}

/// Cursor validation failure kind (spec §7 `CursorError`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CursorErrorKind {
    /// The authentication tag did not verify; the token was forged or corrupted.
    Tampered,
    /// The decoded tuple has a different arity than the `order_by` clause expects.
    ArityMismatch,
    /// A decoded value's type does not match the expected column type.
    TypeMismatch,
}

/// The unified error type returned by `compile`.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Malformed source bytes at the lexer stage.
    #[error("lex error at byte {offset}: {reason}")]
    Lex {
        /// Byte offset into the source where the failure was detected.
        offset: usize,
        /// Human-readable reason.
        reason: String,
    },

    /// Malformed token stream at the parser stage.
    #[error("parse error at byte {offset}: expected {expected}, got {got}")]
    Parse {
        /// Byte offset of the offending token.
        offset:   usize,
        /// What the grammar expected at this position.
        expected: String,
        /// What was actually found.
        got:      String,
    },

    /// A table, column, function, fragment, or relationship referenced by
    /// the query does not exist in the schema catalog.
    #[error("unknown {kind}: '{name}'")]
    UnknownEntity {
        /// Kind of entity that failed to resolve.
        kind: EntityKind,
        /// The name that was looked up.
        name: String,
    },

    /// An argument is well-formed JSON/GraphQL but semantically invalid
    /// (e.g. an empty `in` list, a non-object `where` expression).
    #[error("invalid argument '{arg}' on field '{field}': {reason}")]
    InvalidArgument {
        /// Field the argument was attached to.
        field:  String,
        /// Argument name.
        arg:    String,
        /// Why it is invalid.
        reason: String,
    },

    /// Role-based authorization rejected the query.
    #[error("{}", auth_message(*kind, entity, role))]
    Auth {
        /// Which authorization rule fired.
        kind:   AuthErrorKind,
        /// The blocked entity (e.g. `"products.price"`, `"products"`, or a function name).
        entity: String,
        /// The role the query was compiled under.
        role:   String,
    },

    /// A variable or literal's runtime type does not match the column or
    /// variable-definition type it is bound to.
    #[error("type error at {at}: expected {expected}, got {got}")]
    Type {
        /// Expected GraphQL/SQL type name.
        expected: String,
        /// Type actually supplied.
        got:      String,
        /// Location (field path or variable name) of the mismatch.
        at:       String,
    },

    /// A pagination cursor failed to decode.
    #[error("cursor error: {kind:?}")]
    Cursor {
        /// Which validation step failed.
        kind: CursorErrorKind,
    },

    /// The target dialect cannot express a requested feature.
    #[error("dialect '{dialect}' does not support: {feature}")]
    DialectUnsupported {
        /// The unsupported feature (e.g. `"st_covers"`, `"array-column join"`).
        feature: String,
        /// The dialect that was targeted.
        dialect: String,
    },
}

fn auth_message(kind: AuthErrorKind, entity: &str, role: &str) -> String {
    match kind {
        AuthErrorKind::ColumnBlocked => format!("db column blocked: {entity} (role: '{role}')"),
        AuthErrorKind::FunctionBlocked => {
            if entity.is_empty() {
                format!("all db functions blocked (role: '{role}')")
            } else {
                format!("db function blocked: {entity} (role: '{role}')")
            }
        }
        AuthErrorKind::TableBlocked => format!("db table blocked: {entity} (role: '{role}')"),
        AuthErrorKind::ReadOnly => {
            format!("mutation rejected: database is read-only (role: '{role}')")
        }
    }
}

impl CompileError {
    /// Construct a [`CompileError::Lex`].
    #[must_use]
    pub fn lex(offset: usize, reason: impl Into<String>) -> Self {
        Self::Lex { offset, reason: reason.into() }
    }

    /// Construct a [`CompileError::Parse`].
    #[must_use]
    pub fn parse(offset: usize, expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::Parse { offset, expected: expected.into(), got: got.into() }
    }

    /// Construct a [`CompileError::UnknownEntity`].
    #[must_use]
    pub fn unknown(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::UnknownEntity { kind, name: name.into() }
    }

    /// Construct a [`CompileError::InvalidArgument`].
    #[must_use]
    pub fn invalid_argument(
        field: impl Into<String>,
        arg: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument { field: field.into(), arg: arg.into(), reason: reason.into() }
    }

    /// Construct a column-blocked [`CompileError::Auth`].
    #[must_use]
    pub fn column_blocked(column: impl Into<String>, role: impl Into<String>) -> Self {
        Self::Auth { kind: AuthErrorKind::ColumnBlocked, entity: column.into(), role: role.into() }
    }

    /// Construct a function-blocked [`CompileError::Auth`].
    #[must_use]
    pub fn function_blocked(function: impl Into<String>, role: impl Into<String>) -> Self {
        Self::Auth {
            kind:   AuthErrorKind::FunctionBlocked,
            entity: function.into(),
            role:   role.into(),
        }
    }

    /// Construct an all-functions-blocked [`CompileError::Auth`].
    #[must_use]
    pub fn all_functions_blocked(role: impl Into<String>) -> Self {
        Self::Auth { kind: AuthErrorKind::FunctionBlocked, entity: String::new(), role: role.into() }
    }

    /// Construct a read-only-database [`CompileError::Auth`].
    #[must_use]
    pub fn read_only(role: impl Into<String>) -> Self {
        Self::Auth { kind: AuthErrorKind::ReadOnly, entity: String::new(), role: role.into() }
    }

    /// Construct a [`CompileError::Type`].
    #[must_use]
    pub fn type_mismatch(
        expected: impl Into<String>,
        got: impl Into<String>,
        at: impl Into<String>,
    ) -> Self {
        Self::Type { expected: expected.into(), got: got.into(), at: at.into() }
    }

    /// Construct a [`CompileError::Cursor`].
    #[must_use]
    pub const fn cursor(kind: CursorErrorKind) -> Self {
        Self::Cursor { kind }
    }

    /// Construct a [`CompileError::DialectUnsupported`].
    #[must_use]
    pub fn dialect_unsupported(feature: impl Into<String>, dialect: impl Into<String>) -> Self {
        Self::DialectUnsupported { feature: feature.into(), dialect: dialect.into() }
    }

    /// Stable machine-readable error code, independent of the `Display` message.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Lex { .. } => "LEX_ERROR",
            Self::Parse { .. } => "PARSE_ERROR",
            Self::UnknownEntity { .. } => "UNKNOWN_ENTITY",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Auth { kind, .. } => match kind {
                AuthErrorKind::ColumnBlocked => "AUTH_COLUMN_BLOCKED",
                AuthErrorKind::FunctionBlocked => "AUTH_FUNCTION_BLOCKED",
                AuthErrorKind::TableBlocked => "AUTH_TABLE_BLOCKED",
                AuthErrorKind::ReadOnly => "AUTH_READ_ONLY",
            },
            Self::Type { .. } => "TYPE_ERROR",
            Self::Cursor { kind } => match kind {
                CursorErrorKind::Tampered => "CURSOR_TAMPERED",
                CursorErrorKind::ArityMismatch => "CURSOR_ARITY_MISMATCH",
                CursorErrorKind::TypeMismatch => "CURSOR_TYPE_MISMATCH",
            },
            Self::DialectUnsupported { .. } => "DIALECT_UNSUPPORTED",
        }
    }

    /// `true` for [`CompileError::Auth`] variants — callers must surface these
    /// verbatim and must not retry or downgrade them.
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}
