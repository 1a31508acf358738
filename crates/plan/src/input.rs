// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step input specification and resolution.
//!
//! A step's `input` is one of: a literal value, an in-process closure over
//! the run context, or a serialisable templating object with reserved keys
//! (`_fromSteps`, `_path`, `_join`) that builds values from prior step
//! outputs. The templating form exists so inputs stay JSON-serialisable
//! for plans travelling across process boundaries.

use crate::condition::get_at_path;
use cadre_core::RunContext;
use serde::de::Error as DeError;
use serde::ser::Error as SerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

pub const FROM_STEPS_KEY: &str = "_fromSteps";
pub const PATH_KEY: &str = "_path";
pub const JOIN_KEY: &str = "_join";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("template key {key} must be {expected}")]
    MalformedTemplate {
        key: &'static str,
        expected: &'static str,
    },
}

/// Closure form of a step input.
pub type ContextValueFn = Arc<dyn Fn(&RunContext) -> Value + Send + Sync>;

/// A step's `input` field.
#[derive(Clone)]
pub enum InputSpec {
    /// Used verbatim.
    Literal(Value),
    /// Built from prior step outputs at execution time.
    Template(InputTemplate),
    /// In-process closure; rejected by serialisation.
    Context(ContextValueFn),
}

impl InputSpec {
    pub fn from_fn(f: impl Fn(&RunContext) -> Value + Send + Sync + 'static) -> Self {
        InputSpec::Context(Arc::new(f))
    }

    /// Classify a JSON value: objects carrying `_fromSteps` are templates,
    /// everything else is a literal.
    pub fn from_value(value: Value) -> Result<Self, ResolveError> {
        if let Value::Object(map) = &value {
            if map.contains_key(FROM_STEPS_KEY) {
                if let Value::Object(map) = value {
                    return InputTemplate::from_object(map).map(InputSpec::Template);
                }
            }
        }
        Ok(InputSpec::Literal(value))
    }

    /// Resolve to a concrete value against the run context.
    pub fn resolve(&self, ctx: &RunContext) -> Value {
        match self {
            InputSpec::Literal(v) => v.clone(),
            InputSpec::Template(t) => t.resolve(ctx),
            InputSpec::Context(f) => f(ctx),
        }
    }
}

impl std::fmt::Debug for InputSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSpec::Literal(v) => write!(f, "Literal({v})"),
            InputSpec::Template(t) => write!(f, "Template({t:?})"),
            InputSpec::Context(_) => f.write_str("Context(<closure>)"),
        }
    }
}

impl PartialEq for InputSpec {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (InputSpec::Literal(a), InputSpec::Literal(b)) => a == b,
            (InputSpec::Template(a), InputSpec::Template(b)) => a == b,
            // Closures are never considered equal
            _ => false,
        }
    }
}

impl From<Value> for InputSpec {
    fn from(v: Value) -> Self {
        match InputSpec::from_value(v.clone()) {
            Ok(spec) => spec,
            // Malformed templates fall back to literal use
            Err(_) => InputSpec::Literal(v),
        }
    }
}

impl Serialize for InputSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            InputSpec::Literal(v) => v.serialize(serializer),
            InputSpec::Template(t) => t.to_value().serialize(serializer),
            InputSpec::Context(_) => Err(S::Error::custom(
                "closure-valued input cannot be serialised; use the _fromSteps template form",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for InputSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        InputSpec::from_value(value).map_err(D::Error::custom)
    }
}

/// Templating object selecting prior step outputs.
///
/// `_fromSteps` names the source steps; `_path` applies a dot path into
/// each selected output; `_join` concatenates the string renderings with a
/// separator. Remaining keys pass through into the resolved value.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTemplate {
    pub from_steps: Vec<String>,
    pub path: Option<String>,
    pub join: Option<String>,
    pub extra: Map<String, Value>,
}

impl InputTemplate {
    pub fn new(from_steps: Vec<String>) -> Self {
        Self {
            from_steps,
            path: None,
            join: None,
            extra: Map::new(),
        }
    }

    cadre_core::fluent! {
        set extra: Map<String, Value>;
        opt path: String;
        opt join: String;
    }

    fn from_object(mut map: Map<String, Value>) -> Result<Self, ResolveError> {
        let from_steps = match map.remove(FROM_STEPS_KEY) {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s),
                    _ => Err(ResolveError::MalformedTemplate {
                        key: FROM_STEPS_KEY,
                        expected: "an array of step ids",
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => {
                return Err(ResolveError::MalformedTemplate {
                    key: FROM_STEPS_KEY,
                    expected: "an array of step ids",
                })
            }
        };
        let path = match map.remove(PATH_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(_) => {
                return Err(ResolveError::MalformedTemplate {
                    key: PATH_KEY,
                    expected: "a dot-path string",
                })
            }
        };
        let join = match map.remove(JOIN_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(_) => {
                return Err(ResolveError::MalformedTemplate {
                    key: JOIN_KEY,
                    expected: "a separator string",
                })
            }
        };
        Ok(Self {
            from_steps,
            path,
            join,
            extra: map,
        })
    }

    /// Serialise back to the wire object form.
    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        map.insert(
            FROM_STEPS_KEY.to_string(),
            Value::Array(self.from_steps.iter().map(|s| Value::String(s.clone())).collect()),
        );
        if let Some(path) = &self.path {
            map.insert(PATH_KEY.to_string(), Value::String(path.clone()));
        }
        if let Some(join) = &self.join {
            map.insert(JOIN_KEY.to_string(), Value::String(join.clone()));
        }
        Value::Object(map)
    }

    /// Resolve against the run context.
    ///
    /// Selected outputs missing from the context resolve to null. With
    /// `_join`, the result is the joined string; otherwise it is the array
    /// of selected values (or the single value when one step is named).
    /// Pass-through keys wrap the computed value in an object, merging
    /// object results and placing scalars under `"value"`.
    pub fn resolve(&self, ctx: &RunContext) -> Value {
        let selected: Vec<Value> = self
            .from_steps
            .iter()
            .map(|id| {
                ctx.steps
                    .get(id)
                    .and_then(|v| get_at_path(v, self.path.as_deref()))
                    .cloned()
                    .unwrap_or(Value::Null)
            })
            .collect();

        let computed = if let Some(sep) = &self.join {
            let parts: Vec<String> = selected.iter().map(render_fragment).collect();
            Value::String(parts.join(sep))
        } else if selected.len() == 1 {
            selected.into_iter().next().unwrap_or(Value::Null)
        } else {
            Value::Array(selected)
        };

        if self.extra.is_empty() {
            return computed;
        }
        let mut map = self.extra.clone();
        match computed {
            Value::Object(fields) => {
                for (k, v) in fields {
                    map.insert(k, v);
                }
            }
            other => {
                map.insert("value".to_string(), other);
            }
        }
        Value::Object(map)
    }
}

/// String rendering used by `_join`: strings verbatim, everything else as
/// compact JSON.
fn render_fragment(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "input_tests.rs"]
mod tests;
