// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step variants.
//!
//! Steps are tagged by `type` on the wire. New kinds are added by
//! extending the enum and the interpreter's dispatch; unknown kinds fail
//! deserialisation, so malformed plans are rejected at submission time.

use crate::condition::Condition;
use crate::duration::DurationSpec;
use crate::input::InputSpec;
use crate::poll::WorkerPollConfig;
use cadre_core::RunContext;
use serde::de::Error as DeError;
use serde::ser::Error as SerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::sync::Arc;

/// Status written by an injected `_statusUpdate` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPhase {
    Paused,
    Running,
}

cadre_core::wire_name! {
    StatusPhase {
        Paused => "paused",
        Running => "running",
    }
}

type ContextTokenFn = Arc<dyn Fn(&RunContext) -> String + Send + Sync>;

/// A hook step's token: a literal string or an in-process token function.
#[derive(Clone)]
pub enum TokenSpec {
    Literal(String),
    /// In-process closure; rejected by serialisation.
    Context(ContextTokenFn),
}

impl TokenSpec {
    pub fn from_fn(f: impl Fn(&RunContext) -> String + Send + Sync + 'static) -> Self {
        TokenSpec::Context(Arc::new(f))
    }

    pub fn resolve(&self, ctx: &RunContext) -> String {
        match self {
            TokenSpec::Literal(s) => s.clone(),
            TokenSpec::Context(f) => f(ctx),
        }
    }
}

impl std::fmt::Debug for TokenSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSpec::Literal(s) => write!(f, "Literal({s:?})"),
            TokenSpec::Context(_) => f.write_str("Context(<closure>)"),
        }
    }
}

impl PartialEq for TokenSpec {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TokenSpec::Literal(a), TokenSpec::Literal(b)) => a == b,
            // Closures are never considered equal
            _ => false,
        }
    }
}

impl From<&str> for TokenSpec {
    fn from(s: &str) -> Self {
        TokenSpec::Literal(s.to_string())
    }
}

impl From<String> for TokenSpec {
    fn from(s: String) -> Self {
        TokenSpec::Literal(s)
    }
}

impl Serialize for TokenSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TokenSpec::Literal(s) => serializer.serialize_str(s),
            TokenSpec::Context(_) => Err(S::Error::custom(
                "closure-valued hook token cannot be serialised; supply hookTokens at start",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for TokenSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(TokenSpec::Literal(s)),
            other => Err(D::Error::custom(format!(
                "hook token must be a string, got {other}"
            ))),
        }
    }
}

fn default_true() -> bool {
    true
}

fn is_true(b: &bool) -> bool {
    *b
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A node in a plan; the smallest unit the interpreter executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Step {
    /// In-process synchronous callee resolved by path.
    Agent {
        agent: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<InputSpec>,
        /// Blocking by default.
        #[serde(rename = "await", default = "default_true", skip_serializing_if = "is_true")]
        awaited: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Pause point awaiting an external signal.
    Hook {
        token: TokenSpec,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Pause for a fixed duration.
    Sleep { duration: DurationSpec },
    /// Branch on a condition; inner outputs flow into the same context.
    Condition {
        #[serde(rename = "if")]
        condition: Condition,
        then: Vec<Step>,
        #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Vec<Step>>,
    },
    /// Execute children concurrently; join order is by child index.
    Parallel { steps: Vec<Step> },
    /// Out-of-process callee dispatched through the queue.
    Worker {
        worker: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<InputSpec>,
        /// Fire-and-forget by default.
        #[serde(rename = "await", default, skip_serializing_if = "is_false")]
        awaited: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(rename = "workerPoll", default, skip_serializing_if = "Option::is_none")]
        worker_poll: Option<WorkerPollConfig>,
    },
    /// Start a child run of another plan.
    Workflow {
        workflow: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<InputSpec>,
        /// Blocking by default.
        #[serde(rename = "await", default = "default_true", skip_serializing_if = "is_true")]
        awaited: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Internal: set run status around pause points. Auto-injected by the
    /// normaliser; accepted on the wire for pre-normalised plans.
    #[serde(rename = "_statusUpdate")]
    StatusUpdate {
        status: StatusPhase,
        #[serde(rename = "hookToken", default, skip_serializing_if = "Option::is_none")]
        hook_token: Option<String>,
    },
}

impl Step {
    /// The step's declared id, when it has one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Step::Agent { id, .. } | Step::Hook { id, .. } | Step::Worker { id, .. }
            | Step::Workflow { id, .. } => id.as_deref(),
            Step::Sleep { .. } | Step::Condition { .. } | Step::Parallel { .. }
            | Step::StatusUpdate { .. } => None,
        }
    }

    /// Whether this step suspends the run when reached.
    pub fn is_pause_point(&self) -> bool {
        matches!(self, Step::Hook { .. } | Step::Sleep { .. })
    }

    /// Wire tag for logging and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Agent { .. } => "agent",
            Step::Hook { .. } => "hook",
            Step::Sleep { .. } => "sleep",
            Step::Condition { .. } => "condition",
            Step::Parallel { .. } => "parallel",
            Step::Worker { .. } => "worker",
            Step::Workflow { .. } => "workflow",
            Step::StatusUpdate { .. } => "_statusUpdate",
        }
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
