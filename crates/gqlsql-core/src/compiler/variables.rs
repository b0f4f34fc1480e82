//! Variable resolution (spec.md §4.3.4).

use std::collections::HashMap;

use gqlsql_error::Result;

use crate::ast::{Value, VarDef};
use crate::qcode::ScalarValue;

/// The three special parameters that flip `QCode::needs_user` (spec.md §4.3.4).
pub const USER_VARS: [&str; 3] = ["user_id", "user_id_raw", "user_id_provider"];

/// Resolves GraphQL `Value`s against the operation's declared variables
/// and the host-supplied bindings.
pub struct VariableResolver<'a, 'src> {
    defs: HashMap<&'src str, &'a VarDef<'src>>,
    bindings: &'a HashMap<String, serde_json::Value>,
    /// Set to `true` if a `$user_id*` variable was referenced anywhere.
    pub needs_user: bool,
}

impl<'a, 'src> VariableResolver<'a, 'src> {
    /// Build a resolver over `var_defs` and the host-supplied `bindings`.
    #[must_use]
    pub fn new(var_defs: &'a [VarDef<'src>], bindings: &'a HashMap<String, serde_json::Value>) -> Self {
        Self {
            defs: var_defs.iter().map(|d| (d.name, d)).collect(),
            bindings,
            needs_user: false,
        }
    }

    /// Resolve a GraphQL value, substituting variables per spec.md §4.3.4:
    /// present bindings are inlined for shape-checking but still emitted
    /// as a named bind parameter by the codegen layer so prepared plans
    /// cache; absent-with-default uses the default; absent-and-no-default
    /// is left as a named parameter.
    pub fn resolve(&mut self, value: &Value<'src>) -> Result<ScalarValue> {
        match value {
            Value::Int(n) => Ok(ScalarValue::Int(*n)),
            Value::Float(f) => Ok(ScalarValue::Float(*f)),
            Value::String(s) => Ok(ScalarValue::String(s.clone())),
            Value::Bool(b) => Ok(ScalarValue::Bool(*b)),
            Value::Null => Ok(ScalarValue::Null),
            Value::Enum(e) => Ok(ScalarValue::String((*e).to_string())),
            Value::List(items) => {
                let resolved = items.iter().map(|v| self.resolve(v)).collect::<Result<Vec<_>>>()?;
                Ok(ScalarValue::List(resolved))
            }
            Value::Object(_) => Ok(ScalarValue::Null),
            Value::Variable(name) => self.resolve_variable(name),
        }
    }

    fn resolve_variable(&mut self, name: &str) -> Result<ScalarValue> {
        if USER_VARS.contains(&name) {
            self.needs_user = true;
        }

        if let Some(json) = self.bindings.get(name) {
            return Ok(json_to_scalar(json));
        }

        if let Some(def) = self.defs.get(name) {
            if let Some(default) = &def.default {
                return self.resolve(default);
            }
        }

        Ok(ScalarValue::Variable(name.to_string()))
    }
}

fn json_to_scalar(json: &serde_json::Value) -> ScalarValue {
    match json {
        serde_json::Value::Null => ScalarValue::Null,
        serde_json::Value::Bool(b) => ScalarValue::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                ScalarValue::Int(i)
            } else {
                ScalarValue::Float(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => ScalarValue::String(s.clone()),
        serde_json::Value::Array(items) => ScalarValue::List(items.iter().map(json_to_scalar).collect()),
        serde_json::Value::Object(_) => ScalarValue::Null,
    }
}
