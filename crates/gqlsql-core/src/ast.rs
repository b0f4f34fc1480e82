//! GraphQL abstract syntax tree (spec.md §3.2).
//!
//! Borrows identifier and literal text from the source for the lifetime of
//! a single compilation; the fragment inliner and QCode compiler both
//! operate directly on this borrowed form rather than an owned copy.

use indexmap::IndexMap;

/// Operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// `query`
    Query,
    /// `mutation`
    Mutation,
    /// `subscription`
    Subscription,
}

/// A parsed GraphQL document: a sequence of operations plus named
/// fragment definitions, keyed by name for O(1) lookup during inlining.
#[derive(Debug, Clone)]
pub struct Document<'src> {
    /// All operations declared in the document.
    pub operations: Vec<Operation<'src>>,
    /// Named fragment definitions, keyed by name.
    pub fragments: IndexMap<&'src str, FragmentDef<'src>>,
}

/// `fragment Name on Type { ... }`.
#[derive(Debug, Clone)]
pub struct FragmentDef<'src> {
    /// Fragment name.
    pub name: &'src str,
    /// The type condition (`on Type`).
    pub on_type: &'src str,
    /// The fragment's selection set.
    pub selection_set: Vec<Selection<'src>>,
}

/// A single GraphQL operation (spec.md §3.2).
#[derive(Debug, Clone)]
pub struct Operation<'src> {
    /// `query` | `mutation` | `subscription`.
    pub kind: OperationKind,
    /// Operation name, if given.
    pub name: Option<&'src str>,
    /// Declared variables (`$name: Type = default`).
    pub variable_defs: Vec<VarDef<'src>>,
    /// Directives attached to the operation itself.
    pub directives: Vec<Directive<'src>>,
    /// The operation's top-level selection set.
    pub selection_set: Vec<Selection<'src>>,
}

/// `$name: Type = default`.
#[derive(Debug, Clone)]
pub struct VarDef<'src> {
    /// Variable name, without the leading `$`.
    pub name: &'src str,
    /// Declared GraphQL type (e.g. `Int`, `[ID!]!`).
    pub ty: &'src str,
    /// Default value, if any.
    pub default: Option<Value<'src>>,
}

/// A directive application, e.g. `@skip(ifRole: "anon")`.
#[derive(Debug, Clone)]
pub struct Directive<'src> {
    /// Directive name, without the leading `@`.
    pub name: &'src str,
    /// Argument list.
    pub arguments: Vec<Argument<'src>>,
}

/// A single `name: value` argument pair.
#[derive(Debug, Clone)]
pub struct Argument<'src> {
    /// Argument name.
    pub name: &'src str,
    /// Argument value.
    pub value: Value<'src>,
}

/// One entry of a selection set (spec.md §3.2 `Selection`).
#[derive(Debug, Clone)]
pub enum Selection<'src> {
    /// A plain field selection, possibly aliased and with nested selections.
    Field(FieldSelection<'src>),
    /// `... on Type { ... }`.
    InlineFragment {
        /// The type condition, if given (untyped inline fragments are legal GraphQL).
        on_type: Option<&'src str>,
        /// Directives on the inline fragment itself.
        directives: Vec<Directive<'src>>,
        /// Nested selection set.
        selection_set: Vec<Selection<'src>>,
    },
    /// `...FragmentName`.
    FragmentSpread {
        /// The referenced fragment's name.
        name: &'src str,
        /// Directives on the spread itself.
        directives: Vec<Directive<'src>>,
    },
}

/// A field selection: `alias: name(arg: val) @directive { ... }`.
#[derive(Debug, Clone)]
pub struct FieldSelection<'src> {
    /// Response alias, if distinct from `name`.
    pub alias: Option<&'src str>,
    /// Field name as it appears in the GraphQL argument surface.
    pub name: &'src str,
    /// Arguments, in GraphQL argument names unique within the field (spec invariant).
    pub arguments: Vec<Argument<'src>>,
    /// Directives attached to this field.
    pub directives: Vec<Directive<'src>>,
    /// Nested selection set; empty for leaf scalar fields.
    pub selection_set: Vec<Selection<'src>>,
}

impl<'src> FieldSelection<'src> {
    /// The response key: the alias if present, else the field name.
    #[must_use]
    pub fn response_key(&self) -> &'src str {
        self.alias.unwrap_or(self.name)
    }
}

/// A GraphQL value literal or variable reference (spec.md §3.2).
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'src> {
    /// Integer literal, already validated by the lexer.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String or block-string literal, with escapes already decoded.
    String(String),
    /// Boolean literal.
    Bool(bool),
    /// `null`.
    Null,
    /// An enum value (bare name not matching `true`/`false`/`null`).
    Enum(&'src str),
    /// `[ ... ]`.
    List(Vec<Value<'src>>),
    /// `{ key: value, ... }`.
    Object(Vec<(&'src str, Value<'src>)>),
    /// `$name` — resolved against the enclosing operation's `variable_defs`.
    Variable(&'src str),
}

impl<'src> Value<'src> {
    /// Look up a key in an object value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value<'src>> {
        match self {
            Self::Object(pairs) => pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// `true` if this value is a bare `Object`.
    #[must_use]
    pub const fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }
}
