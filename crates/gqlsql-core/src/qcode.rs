//! QCode: the flat, arena-indexed intermediate representation (spec.md
//! §3.3). `Select`, `Mutate`, and `Field` live in contiguous `Vec`s and
//! reference each other by `u32`/`usize` index rather than pointers —
//! this mirrors the teacher's general preference for index-addressed
//! arenas over pointer trees (spec.md §9 Design Notes), applied here to
//! a per-query IR rather than the teacher's schema-authoring IR.

use serde::{Deserialize, Serialize};

use gqlsql_db::Operator;

/// Sentinel `parent_id` for a root [`Select`] or [`Mutate`] node.
pub const NO_PARENT: i64 = -1;

/// Sort direction for `order_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    /// `asc`
    Asc,
    /// `desc`
    Desc,
}

/// An aggregate function recognized on a `<fn>_<col>` field name
/// (spec.md §4.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFn {
    /// `count_*`
    Count,
    /// `sum_*`
    Sum,
    /// `avg_*`
    Avg,
    /// `min_*`
    Min,
    /// `max_*`
    Max,
    /// `stddev_*`
    StdDev,
    /// `variance_*`
    Variance,
}

impl AggregateFn {
    /// Parse a `<fn>_<col>` field name into its aggregate and target column.
    #[must_use]
    pub fn parse_field(field_name: &str) -> Option<(Self, &str)> {
        const PREFIXES: [(&str, AggregateFn); 7] = [
            ("count_", AggregateFn::Count),
            ("sum_", AggregateFn::Sum),
            ("avg_", AggregateFn::Avg),
            ("min_", AggregateFn::Min),
            ("max_", AggregateFn::Max),
            ("stddev_", AggregateFn::StdDev),
            ("variance_", AggregateFn::Variance),
        ];
        for (prefix, kind) in PREFIXES {
            if let Some(col) = field_name.strip_prefix(prefix) {
                if !col.is_empty() {
                    return Some((kind, col));
                }
            }
        }
        None
    }

    /// The SQL aggregate function name.
    #[must_use]
    pub const fn sql_name(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::StdDev => "stddev",
            Self::Variance => "variance",
        }
    }
}

/// A single field within a [`Select`] (spec.md §3.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    /// This field's position within its select's `fields` vector,
    /// stable across a compilation.
    pub id: usize,
    /// The response key (alias or name) this field projects under.
    pub response_key: String,
    /// What this field resolves to.
    pub kind: FieldKind,
}

/// Discriminant of what a [`Field`] resolves to (spec.md §3.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldKind {
    /// A plain column projection.
    Column {
        /// Underlying column name.
        column: String,
    },
    /// An aggregate or scalar SQL function call.
    Function {
        /// Function name.
        function: String,
        /// Aggregate kind, if this is a `<fn>_<col>` aggregate field.
        aggregate: Option<AggregateFn>,
        /// The column the function is applied to, e.g. `price` in
        /// `sum_price` or the sole argument of a scalar function call.
        /// `None` for a niladic function (`count_*` with no target column
        /// is still `Some` via `AggregateFn::parse_field`; genuinely
        /// argument-less functions leave this `None`).
        arg_column: Option<String>,
    },
    /// A JSON-path projection (`col->path` / `col->>path`).
    JsonPath {
        /// Base column.
        column: String,
        /// Dotted path segments into the JSON document.
        path: Vec<String>,
    },
    /// A nested relation, materialized as a child [`Select`].
    Relation {
        /// Index of the child select in `QCode::selects`.
        relation_id: usize,
    },
    /// `__typename`.
    Typename,
    /// The synthetic `<field>_cursor` companion field (spec.md §4.5).
    Cursor,
}

/// A scalar value bound into an [`Expression`] or mutation payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ScalarValue {
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    String(String),
    /// Boolean literal.
    Bool(bool),
    /// SQL `NULL`.
    Null,
    /// An unresolved named bind parameter (spec.md §4.3.4).
    Variable(String),
    /// A list of scalars, for `in`/`nin` and array columns.
    List(Vec<ScalarValue>),
}

/// A reference to a column, possibly through a join chain to a related table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRef {
    /// The select whose table owns this column.
    pub select_id: usize,
    /// Column name.
    pub column: String,
}

/// A boolean/comparison expression tree (spec.md §3.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expression {
    /// Always true; the default empty `where:`.
    Nop,
    /// Logical AND of sub-expressions.
    And(Vec<Expression>),
    /// Logical OR of sub-expressions.
    Or(Vec<Expression>),
    /// Logical negation.
    Not(Box<Expression>),
    /// A scalar comparison.
    Cmp {
        /// Comparison operator.
        op: Operator,
        /// Left-hand column reference.
        left: ColumnRef,
        /// Right-hand literal or variable.
        right: ScalarValue,
    },
    /// `column IN (list)` / `NOT IN`.
    In {
        /// Column reference.
        col: ColumnRef,
        /// Candidate values.
        list: Vec<ScalarValue>,
        /// `true` for `nin`.
        negate: bool,
    },
    /// `column IS [NOT] NULL`.
    Null {
        /// Column reference.
        col: ColumnRef,
        /// `true` for `IS NOT NULL`.
        negate: bool,
    },
    /// A nested-table existence check, e.g. a relationship filter.
    Exists {
        /// Field names to traverse from the anchor select to the related table.
        join_chain: Vec<String>,
        /// The predicate evaluated against the related table.
        inner: Box<Expression>,
    },
    /// A GIS predicate.
    Geo {
        /// Spatial operator.
        op: Operator,
        /// Column reference to the geometry column.
        col: ColumnRef,
        /// Operator parameters (e.g. `[lon, lat, radius_m]`).
        params: Vec<ScalarValue>,
    },
    /// A JSON-path comparison.
    JsonPath {
        /// Base JSON column.
        col: ColumnRef,
        /// Path into the document.
        path: Vec<String>,
        /// Comparison operator.
        op: Operator,
        /// Comparison value.
        value: ScalarValue,
    },
    /// An unresolved variable standing in for an entire sub-expression
    /// (used by role row-filters before binding).
    Var(String),
}

/// A lateral/correlated join to a child [`Select`] (spec.md §3.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Join {
    /// Child select index.
    pub child_select_id: usize,
    /// The relationship field name that produced this join.
    pub field_name: String,
}

/// Cursor-pagination arguments attached to a [`Select`] (spec.md §4.3.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paging {
    /// Opaque decoded `before` cursor tuple, if supplied.
    pub before: Option<Vec<ScalarValue>>,
    /// Opaque decoded `after` cursor tuple, if supplied.
    pub after: Option<Vec<ScalarValue>>,
    /// Forward page size.
    pub first: Option<i64>,
    /// Backward page size.
    pub last: Option<i64>,
}

impl Paging {
    /// `true` if any paging argument was supplied.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.before.is_some() || self.after.is_some() || self.first.is_some() || self.last.is_some()
    }
}

/// A read node in QCode (spec.md §3.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Select {
    /// Index of this select within `QCode::selects`.
    pub id: usize,
    /// Parent select index, or [`NO_PARENT`] for a root.
    pub parent_id: i64,
    /// Target table name.
    pub table: String,
    /// SQL alias assigned to this select (derived from `(table, id)`).
    pub alias: String,
    /// The GraphQL field name (response key) this select was compiled from.
    pub field_name: String,
    /// Projected fields, in selection order.
    pub fields: Vec<Field>,
    /// Filter expression.
    pub where_expr: Expression,
    /// `order_by:` column/direction pairs.
    pub order_by: Vec<(String, SortDirection)>,
    /// Implicit `GROUP BY` columns, forced on by aggregate fields.
    pub group_by: Vec<String>,
    /// `limit:` argument.
    pub limit: Option<i64>,
    /// `offset:` argument.
    pub offset: Option<i64>,
    /// Cursor-pagination arguments.
    pub paging: Paging,
    /// Child joins.
    pub joins: Vec<Join>,
    /// `distinct:` column list.
    pub distinct_on: Vec<String>,
    /// `true` if any field triggers aggregation.
    pub aggregation_mask: bool,
    /// `true` if `id:` shorthand was used, forcing a singleton result.
    pub is_singleton: bool,
}

impl Select {
    fn new(id: usize, parent_id: i64, table: String, field_name: String) -> Self {
        let alias = format!("{table}_{id}");
        Self {
            id,
            parent_id,
            table,
            alias,
            field_name,
            fields: Vec::new(),
            where_expr: Expression::Nop,
            order_by: Vec::new(),
            group_by: Vec::new(),
            limit: None,
            offset: None,
            paging: Paging::default(),
            joins: Vec::new(),
            distinct_on: Vec::new(),
            aggregation_mask: false,
            is_singleton: false,
        }
    }
}

/// A single column assignment in an [`Mutate`] payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColAssign {
    /// Column name.
    pub column: String,
    /// Assigned value.
    pub value: ScalarValue,
}

/// A foreign-key assignment sourced from a dependency mutation's captured
/// primary key, rather than a literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelColAssign {
    /// FK column on this mutation's table.
    pub column: String,
    /// The [`Mutate`] node whose captured primary key supplies the value.
    pub source_mutate_id: usize,
}

/// Kind of write a [`Mutate`] node performs (spec.md §3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutateKind {
    /// `INSERT`.
    Insert,
    /// `UPDATE`.
    Update,
    /// `INSERT ... ON CONFLICT/DUPLICATE/MERGE`.
    Upsert,
    /// `DELETE`.
    Delete,
    /// Set an FK to point at an existing row.
    Connect,
    /// Clear an FK pointing at a related row.
    Disconnect,
    /// A reserved keyword action with no row effect of its own.
    Keyword,
    /// No-op placeholder (used for empty nested objects).
    None,
}

/// A write node in QCode (spec.md §3.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mutate {
    /// Index of this mutation within `QCode::mutates`.
    pub id: usize,
    /// Parent mutation index, or [`NO_PARENT`] for a root.
    pub parent_id: i64,
    /// The [`Select`] used to materialize this mutation's response shape.
    pub select_id: usize,
    /// Target table.
    pub table: String,
    /// Kind of write.
    pub kind: MutateKind,
    /// Literal column assignments.
    pub cols: Vec<ColAssign>,
    /// FK assignments sourced from a dependency's captured primary key.
    pub rcols: Vec<RelColAssign>,
    /// Filter for `update`/`delete`/`connect`/`disconnect`.
    pub where_expr: Expression,
    /// Other [`Mutate`] node ids that must execute before this one.
    pub depends_on: Vec<usize>,
    /// `true` when the payload was a list (batch write).
    pub is_multi: bool,
    /// `true` when the batch should be bound as one JSON parameter and
    /// unnested via `json_to_recordset`/`JSON_TABLE`/`OPENJSON`.
    pub is_json_batch: bool,
    /// Session-variable name this mutation's primary key is captured
    /// into, under the linear-script emission strategy.
    pub capture_var: String,
}

/// The complete compiled representation of one GraphQL operation
/// (spec.md §3.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QCode {
    /// Operation kind this QCode was compiled from.
    pub kind: QCodeKind,
    /// The mutation's declared response-binding variable name, if any.
    pub action_var_name: Option<String>,
    /// Every select node, indexed by `Select::id`.
    pub selects: Vec<Select>,
    /// Every mutate node, indexed by `Mutate::id`.
    pub mutates: Vec<Mutate>,
    /// Root select ids, in declaration order (supports multi-alias queries).
    pub roots: Vec<usize>,
    /// Polymorphic-union mutation groups, keyed by a unify key derived
    /// from the shared root alias.
    pub munions: std::collections::HashMap<String, Vec<usize>>,
    /// `true` if any bound variable was `$user_id`/`$user_id_raw`/`$user_id_provider`.
    pub needs_user: bool,
    /// Static complexity score (node count × depth), for hosts that want
    /// to reject expensive queries before compilation finishes (SPEC_FULL §C).
    pub complexity: u32,
}

impl QCode {
    /// Borrow a select by id. Panics if `id` is out of range, which would
    /// indicate a bug in the compiler that produced this `QCode` rather
    /// than a condition callers need to handle.
    #[must_use]
    pub fn select(&self, id: usize) -> &Select {
        &self.selects[id]
    }
}

/// Which GraphQL operation kind a [`QCode`] was compiled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QCodeKind {
    /// A read.
    Query,
    /// A write.
    Mutation,
    /// A subscription (compiled like a query; execution transport is out of scope).
    Subscription,
}

/// Builds up a [`QCode`] during compilation, owning the arenas that
/// `Select`/`Mutate` nodes index into.
#[derive(Debug, Default)]
pub struct QCodeBuilder {
    selects: Vec<Select>,
    mutates: Vec<Mutate>,
    needs_user: bool,
}

impl QCodeBuilder {
    /// Allocate a new [`Select`] node and return its id.
    pub fn new_select(&mut self, parent_id: i64, table: impl Into<String>, field_name: impl Into<String>) -> usize {
        let id = self.selects.len();
        self.selects.push(Select::new(id, parent_id, table.into(), field_name.into()));
        id
    }

    /// Borrow a select mutably by id.
    pub fn select_mut(&mut self, id: usize) -> &mut Select {
        &mut self.selects[id]
    }

    /// Borrow a select by id.
    #[must_use]
    pub fn select(&self, id: usize) -> &Select {
        &self.selects[id]
    }

    /// Allocate a new [`Mutate`] node and return its id.
    pub fn new_mutate(
        &mut self,
        parent_id: i64,
        select_id: usize,
        table: impl Into<String>,
        kind: MutateKind,
    ) -> usize {
        let id = self.mutates.len();
        let capture_var = format!("m{id}_pk");
        self.mutates.push(Mutate {
            id,
            parent_id,
            select_id,
            table: table.into(),
            kind,
            cols: Vec::new(),
            rcols: Vec::new(),
            where_expr: Expression::Nop,
            depends_on: Vec::new(),
            is_multi: false,
            is_json_batch: false,
            capture_var,
        });
        id
    }

    /// Borrow a mutate mutably by id.
    pub fn mutate_mut(&mut self, id: usize) -> &mut Mutate {
        &mut self.mutates[id]
    }

    /// Borrow a mutate by id.
    #[must_use]
    pub fn mutate(&self, id: usize) -> &Mutate {
        &self.mutates[id]
    }

    /// Borrow the full mutate arena, e.g. for topological sorting.
    #[must_use]
    pub fn mutates(&self) -> &[Mutate] {
        &self.mutates
    }

    /// Mark that a `$user_id*` variable was referenced.
    pub fn mark_needs_user(&mut self) {
        self.needs_user = true;
    }

    /// Finish building, computing a static complexity score and topo
    /// order stability, and produce the finished [`QCode`].
    #[must_use]
    pub fn finish(self, kind: QCodeKind, action_var_name: Option<String>, roots: Vec<usize>) -> QCode {
        let complexity = complexity_score(&self.selects, &roots);
        QCode {
            kind,
            action_var_name,
            selects: self.selects,
            mutates: self.mutates,
            roots,
            munions: std::collections::HashMap::new(),
            needs_user: self.needs_user,
            complexity,
        }
    }
}

fn complexity_score(selects: &[Select], roots: &[usize]) -> u32 {
    fn walk(selects: &[Select], id: usize, depth: u32) -> u32 {
        let select = &selects[id];
        let mut score = (select.fields.len() as u32 + 1) * depth.max(1);
        for join in &select.joins {
            score += walk(selects, join.child_select_id, depth + 1);
        }
        score
    }
    roots.iter().map(|&id| walk(selects, id, 1)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_field_name_parses() {
        assert_eq!(AggregateFn::parse_field("sum_price"), Some((AggregateFn::Sum, "price")));
        assert_eq!(AggregateFn::parse_field("price"), None);
    }

    #[test]
    fn builder_allocates_indexed_selects() {
        let mut b = QCodeBuilder::default();
        let root = b.new_select(NO_PARENT, "products", "products");
        let child = b.new_select(root as i64, "users", "owner");
        b.select_mut(root).joins.push(Join { child_select_id: child, field_name: "owner".into() });
        let qcode = b.finish(QCodeKind::Query, None, vec![root]);
        assert_eq!(qcode.selects.len(), 2);
        assert_eq!(qcode.selects[0].joins[0].child_select_id, 1);
    }

    #[test]
    fn paging_is_active_only_when_set() {
        let p = Paging::default();
        assert!(!p.is_active());
        let p2 = Paging { first: Some(1), ..Default::default() };
        assert!(p2.is_active());
    }
}
