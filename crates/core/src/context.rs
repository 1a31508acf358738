// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Accumulative per-run context.
//!
//! Every step that produces an output appends it here; later steps resolve
//! their inputs against `steps`, `previous`, and `all`. The context is
//! persisted with the run record so resumed invocations see exactly what
//! earlier invocations wrote.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to a step, by id when the step declared one, by position
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepRef {
    Index(usize),
    Id(String),
}

impl std::fmt::Display for StepRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepRef::Index(i) => write!(f, "#{i}"),
            StepRef::Id(id) => f.write_str(id),
        }
    }
}

impl From<usize> for StepRef {
    fn from(i: usize) -> Self {
        StepRef::Index(i)
    }
}

impl From<&str> for StepRef {
    fn from(s: &str) -> Self {
        StepRef::Id(s.to_string())
    }
}

/// A step error collected under `continue_on_error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: StepRef,
    pub error: Value,
}

/// Accumulative context available to step input functions and conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunContext {
    /// The original start input.
    pub input: Value,
    /// Outputs keyed by step id, in completion order.
    pub steps: IndexMap<String, Value>,
    /// Output of the most recently completed step.
    pub previous: Value,
    /// All step outputs in completion order.
    pub all: Vec<Value>,
    /// Step errors collected when the plan sets `continue_on_error`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<StepFailure>,
    /// Initial messages from the start request, passed through to agents.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Value>,
}

impl RunContext {
    pub fn new(input: Value, messages: Vec<Value>) -> Self {
        Self {
            input,
            messages,
            ..Self::default()
        }
    }

    /// Record a completed step output: `steps[id]` (when the step has an
    /// id), append to `all`, and set `previous`.
    pub fn record_output(&mut self, id: Option<&str>, output: Value) {
        if let Some(id) = id {
            self.steps.insert(id.to_string(), output.clone());
        }
        self.all.push(output.clone());
        self.previous = output;
    }

    /// Record a step failure under `continue_on_error`.
    pub fn record_error(&mut self, step: impl Into<StepRef>, error: Value) {
        self.errors.push(StepFailure {
            step: step.into(),
            error,
        });
    }

    /// Output of a prior step by id, if recorded.
    pub fn output_of(&self, id: &str) -> Option<&Value> {
        self.steps.get(id)
    }

    /// Whether a step id already has a recorded output. Used on resume to
    /// skip steps the interpreter completed in an earlier invocation.
    pub fn has_output(&self, id: &str) -> bool {
        self.steps.contains_key(id)
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
