//! Schema catalog contract (spec.md §3.1).
//!
//! The catalog is produced by a schema-discovery subsystem that is out of
//! scope for this crate (spec.md §1); this module only defines the
//! frozen, read-only shape the QCode compiler queries against, modeled on
//! `fraiseql-core::schema::CompiledSchema`'s `find_*` lookup surface.

use std::collections::HashMap;

use gqlsql_error::{CompileError, EntityKind, Result};

/// What a [`Table`] actually is in the underlying database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// An ordinary base table.
    Base,
    /// A view.
    View,
    /// A table synthesized at query time (e.g. a remote-API binding).
    Virtual,
    /// A JSON document embedded inside a parent row.
    Json,
}

/// `ON DELETE` / `ON UPDATE` referential action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FkAction {
    /// `NO ACTION` / `RESTRICT`.
    NoAction,
    /// `CASCADE`.
    Cascade,
    /// `SET NULL`.
    SetNull,
    /// `SET DEFAULT`.
    SetDefault,
}

/// A foreign-key reference on a [`Column`].
#[derive(Debug, Clone)]
pub struct ForeignKey {
    /// Referenced table name.
    pub table: String,
    /// Referenced column name.
    pub column: String,
    /// `ON DELETE` behavior.
    pub on_delete: FkAction,
    /// `ON UPDATE` behavior.
    pub on_update: FkAction,
}

/// A column's SQL-level type, coarsened to what the compiler needs to
/// distinguish (JSON-path eligibility, array handling, literal typing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Integer family (`int`, `bigint`, `smallint`).
    Int,
    /// Floating-point family (`float`, `double`, `numeric`).
    Float,
    /// Text family (`text`, `varchar`, `char`).
    Text,
    /// `bool`/`boolean`.
    Bool,
    /// `uuid`.
    Uuid,
    /// Date/time family.
    Timestamp,
    /// `json`/`jsonb`, or `nvarchar(max)` under MSSQL (spec.md §4.3.1).
    Json,
    /// A PostGIS-style geometry/geography column.
    Geometry,
}

/// A single table column (spec.md §3.1).
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column type.
    pub ty: ColumnType,
    /// `true` if the column accepts `NULL`.
    pub nullable: bool,
    /// `true` if the column is itself an array type.
    pub is_array: bool,
    /// Default value expression, unparsed.
    pub default: Option<String>,
    /// Foreign key this column carries, if any.
    pub fk: Option<ForeignKey>,
    /// `true` if a unique constraint covers this column alone.
    pub unique: bool,
    /// `true` if this column is blocked for every role unless explicitly allowed.
    pub blocked_by_default: bool,
}

/// Directed edge between two tables (spec.md §3.1).
#[derive(Debug, Clone)]
pub enum Relationship {
    /// A one-to-one FK relationship.
    OneToOne { to_table: String },
    /// A one-to-many FK relationship (the FK lives on the child, `to_table`).
    OneToMany { to_table: String },
    /// A many-to-many relationship through a join table.
    ManyToMany { to_table: String, via_table: String },
    /// A JSON document embedded at `json_path` within the parent row.
    Embedded { json_path: String },
    /// A self-referential parent/child edge (recursive CTE candidate).
    Recursive { to_table: String },
    /// A polymorphic relationship discriminated by `type_column`.
    Polymorphic { to_table: String, type_column: String },
}

impl Relationship {
    /// The table this relationship points at, where that is well defined.
    #[must_use]
    pub fn target_table(&self) -> Option<&str> {
        match self {
            Self::OneToOne { to_table }
            | Self::OneToMany { to_table }
            | Self::ManyToMany { to_table, .. }
            | Self::Recursive { to_table }
            | Self::Polymorphic { to_table, .. } => Some(to_table),
            Self::Embedded { .. } => None,
        }
    }
}

/// A callable SQL function (spec.md §3.1).
#[derive(Debug, Clone)]
pub struct Function {
    /// Function name.
    pub name: String,
    /// Ordered parameter list.
    pub params: Vec<FunctionParam>,
    /// `true` if the function returns a row set rather than a scalar.
    pub returns_row: bool,
    /// The SQL type name of the return value (or row type name).
    pub return_type: String,
}

/// A single function parameter.
#[derive(Debug, Clone)]
pub struct FunctionParam {
    /// Parameter name.
    pub name: String,
    /// Parameter SQL type name.
    pub ty: String,
}

/// A table, view, or virtual/JSON entity (spec.md §3.1).
#[derive(Debug, Clone)]
pub struct Table {
    /// Schema (namespace) the table lives in, e.g. `public`.
    pub schema: String,
    /// Table name.
    pub name: String,
    /// What kind of entity this is.
    pub kind: TableKind,
    /// Index of the primary-key column within `columns`.
    pub primary_key_index: usize,
    /// Columns in declaration order.
    pub columns: Vec<Column>,
    /// Named relationships keyed by the GraphQL field name that exposes them.
    pub relationships: HashMap<String, Relationship>,
    /// Column names eligible for full-text `search:` filtering.
    pub full_text_columns: Vec<String>,
}

impl Table {
    /// The table's primary-key column.
    #[must_use]
    pub fn primary_key(&self) -> &Column {
        &self.columns[self.primary_key_index]
    }

    /// Find a column by name.
    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Find a relationship by the GraphQL field name that exposes it.
    #[must_use]
    pub fn find_relationship(&self, field_name: &str) -> Option<&Relationship> {
        self.relationships.get(field_name)
    }
}

/// The frozen, read-only schema snapshot the compiler resolves every
/// field against (spec.md §3.1, §5 "read-mostly snapshot").
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    tables: HashMap<String, Table>,
    functions: HashMap<String, Function>,
}

impl SchemaCatalog {
    /// Build a catalog from its constituent tables and functions.
    #[must_use]
    pub fn new(tables: Vec<Table>, functions: Vec<Function>) -> Self {
        Self {
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
            functions: functions.into_iter().map(|f| (f.name.clone(), f)).collect(),
        }
    }

    /// Look up a table by name, optionally disambiguating by schema.
    ///
    /// # Errors
    /// Returns [`CompileError::UnknownEntity`] if no table with that name exists.
    pub fn find_table(&self, name: &str, schema: Option<&str>) -> Result<&Table> {
        self.tables
            .get(name)
            .filter(|t| match schema {
                Some(s) => t.schema == s,
                None => true,
            })
            .ok_or_else(|| CompileError::unknown(EntityKind::Table, name))
    }

    /// Look up a column on a named table.
    ///
    /// # Errors
    /// Returns [`CompileError::UnknownEntity`] if the table or column does not exist.
    pub fn find_column(&self, table: &str, name: &str) -> Result<&Column> {
        self.find_table(table, None)?
            .find_column(name)
            .ok_or_else(|| CompileError::unknown(EntityKind::Column, format!("{table}.{name}")))
    }

    /// Look up a callable function by name.
    ///
    /// # Errors
    /// Returns [`CompileError::UnknownEntity`] if no function with that name exists.
    pub fn find_function(&self, name: &str) -> Result<&Function> {
        self.functions
            .get(name)
            .ok_or_else(|| CompileError::unknown(EntityKind::Function, name))
    }

    /// Find the shortest sequence of relationships connecting `src_table`
    /// to `dst_table`, preferring direct edges over join-table hops
    /// (spec.md §3.1 invariant). Returns the field-name path, each entry
    /// naming the relationship field to traverse from the current table.
    ///
    /// # Errors
    /// Returns [`CompileError::UnknownEntity`] if no path exists.
    pub fn find_path(&self, src_table: &str, dst_table: &str) -> Result<Vec<String>> {
        use std::collections::VecDeque;

        if src_table == dst_table {
            return Ok(Vec::new());
        }

        let mut queue: VecDeque<(String, Vec<String>)> = VecDeque::new();
        let mut visited = std::collections::HashSet::new();
        queue.push_back((src_table.to_string(), Vec::new()));
        visited.insert(src_table.to_string());

        while let Some((current, path)) = queue.pop_front() {
            let Some(table) = self.tables.get(&current) else { continue };
            // Direct edges first: iterate relationships in a stable order
            // and prefer non-join-table variants, matching the invariant
            // that `find_path` favors direct edges over join-table hops.
            let mut edges: Vec<(&String, &Relationship)> = table.relationships.iter().collect();
            edges.sort_by_key(|(name, rel)| (matches!(rel, Relationship::ManyToMany { .. }), (*name).clone()));

            for (field_name, rel) in edges {
                let Some(target) = rel.target_table() else { continue };
                let mut next_path = path.clone();
                next_path.push(field_name.clone());
                if target == dst_table {
                    return Ok(next_path);
                }
                if visited.insert(target.to_string()) {
                    queue.push_back((target.to_string(), next_path));
                }
            }
        }

        Err(CompileError::unknown(
            EntityKind::Relationship,
            format!("{src_table} -> {dst_table}"),
        ))
    }
}
