// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conditions for `condition` steps.
//!
//! Three forms: a boolean literal, an in-process closure over the run
//! context, and the serialisable step-field form built with [`when_step`].
//! Only the first and last survive (de)serialisation.

use cadre_core::RunContext;
use serde::de::Error as DeError;
use serde::ser::Error as SerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use std::sync::Arc;

/// Comparison applied to the value selected by a [`StepFieldCondition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepFieldOp {
    Eq,
    Neq,
    Truthy,
    Falsy,
    Exists,
    NotExists,
}

cadre_core::wire_name! {
    StepFieldOp {
        Eq => "eq",
        Neq => "neq",
        Truthy => "truthy",
        Falsy => "falsy",
        Exists => "exists",
        NotExists => "notExists",
    }
}

/// Serialisable condition referencing a prior step's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFieldCondition {
    pub step_id: String,
    /// Dot path into the step output (e.g. `payload.approved`).
    /// Absent means the whole output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub op: StepFieldOp,
    /// Comparison operand for `eq` / `neq`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Wire tag distinguishing step-field conditions from other objects.
pub const STEP_FIELD_TAG: &str = "stepField";

impl StepFieldCondition {
    /// Serialise including the `type` tag, matching the wire form.
    pub fn to_value(&self) -> Value {
        let mut obj = json!({
            "type": STEP_FIELD_TAG,
            "stepId": self.step_id,
            "op": self.op.to_string(),
        });
        if let (Some(map), Some(path)) = (obj.as_object_mut(), &self.path) {
            map.insert("path".to_string(), json!(path));
        }
        if let (Some(map), Some(value)) = (obj.as_object_mut(), &self.value) {
            map.insert("value".to_string(), value.clone());
        }
        obj
    }

    /// Evaluate against the run context.
    ///
    /// A missing step or path selects "absent", which is distinct from an
    /// explicit null: `eq`/`neq` compare absent only to an absent operand,
    /// while `exists` requires present and non-null.
    pub fn evaluate(&self, ctx: &RunContext) -> bool {
        let root = ctx.steps.get(&self.step_id);
        let selected = root.and_then(|v| get_at_path(v, self.path.as_deref()));
        match self.op {
            StepFieldOp::Eq => selected == self.value.as_ref(),
            StepFieldOp::Neq => selected != self.value.as_ref(),
            StepFieldOp::Truthy => selected.is_some_and(is_truthy),
            StepFieldOp::Falsy => !selected.is_some_and(is_truthy),
            StepFieldOp::Exists => selected.is_some_and(|v| !v.is_null()),
            StepFieldOp::NotExists => !selected.is_some_and(|v| !v.is_null()),
        }
    }
}

/// Build a serialisable condition that checks a prior step's output.
///
/// `path` is a dot path into the output (`"payload.approved"`); omit it to
/// use the whole output. `value` applies to `eq`/`neq` only.
pub fn when_step(
    step_id: impl Into<String>,
    path: impl Into<Option<String>>,
    op: StepFieldOp,
    value: impl Into<Option<Value>>,
) -> StepFieldCondition {
    StepFieldCondition {
        step_id: step_id.into(),
        path: path.into(),
        op,
        value: value.into(),
    }
}

/// Value at a dot path (e.g. `payload.approved`), or the whole value when
/// the path is absent. Returns `None` when any segment is missing.
pub fn get_at_path<'a>(value: &'a Value, path: Option<&str>) -> Option<&'a Value> {
    let Some(path) = path else {
        return Some(value);
    };
    if path.is_empty() {
        return Some(value);
    }
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Loose truthiness over JSON values: null, false, 0, and "" are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

type ContextBoolFn = Arc<dyn Fn(&RunContext) -> bool + Send + Sync>;

/// A `condition` step's `if` field.
#[derive(Clone)]
pub enum Condition {
    Literal(bool),
    StepField(StepFieldCondition),
    /// In-process closure; rejected by serialisation.
    Context(ContextBoolFn),
}

impl Condition {
    pub fn from_fn(f: impl Fn(&RunContext) -> bool + Send + Sync + 'static) -> Self {
        Condition::Context(Arc::new(f))
    }

    pub fn evaluate(&self, ctx: &RunContext) -> bool {
        match self {
            Condition::Literal(b) => *b,
            Condition::StepField(cond) => cond.evaluate(ctx),
            Condition::Context(f) => f(ctx),
        }
    }
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Literal(b) => write!(f, "Literal({b})"),
            Condition::StepField(c) => write!(f, "StepField({c:?})"),
            Condition::Context(_) => f.write_str("Context(<closure>)"),
        }
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Condition::Literal(a), Condition::Literal(b)) => a == b,
            (Condition::StepField(a), Condition::StepField(b)) => a == b,
            // Closures are never considered equal
            _ => false,
        }
    }
}

impl From<bool> for Condition {
    fn from(b: bool) -> Self {
        Condition::Literal(b)
    }
}

impl From<StepFieldCondition> for Condition {
    fn from(c: StepFieldCondition) -> Self {
        Condition::StepField(c)
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Condition::Literal(b) => serializer.serialize_bool(*b),
            Condition::StepField(c) => c.to_value().serialize(serializer),
            Condition::Context(_) => Err(S::Error::custom(
                "closure-valued condition cannot be serialised; use the stepField form",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Bool(b) => Ok(Condition::Literal(b)),
            Value::Object(_) => {
                if let Some(tag) = value.get("type").and_then(Value::as_str) {
                    if tag != STEP_FIELD_TAG {
                        return Err(D::Error::custom(format!(
                            "unknown condition type: {tag:?}"
                        )));
                    }
                }
                serde_json::from_value::<StepFieldCondition>(value)
                    .map(Condition::StepField)
                    .map_err(D::Error::custom)
            }
            other => Err(D::Error::custom(format!(
                "condition must be a boolean or a stepField object, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "condition_tests.rs"]
mod tests;
