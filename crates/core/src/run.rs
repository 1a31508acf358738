// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run record and status state machine.
//!
//! A run is one execution of a plan. Status moves along
//! `pending → running → (paused ⇄ running) → completed | failed`;
//! terminal statuses are absorbing.

use crate::context::{RunContext, StepRef};
use crate::id::RunId;
use crate::signal::Signal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Whether moving from `self` to `to` is a legal transition.
    pub fn can_transition(&self, to: RunStatus) -> bool {
        use RunStatus::*;
        match (self, to) {
            (Pending, Running) | (Pending, Failed) => true,
            (Running, Paused) | (Running, Completed) | (Running, Failed) => true,
            (Paused, Running) | (Paused, Failed) => true,
            _ => false,
        }
    }
}

crate::wire_name! {
    RunStatus {
        Pending => "pending",
        Running => "running",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Rejected status transition (terminal runs are immutable).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("run {run_id} is {from}, cannot transition to {to}")]
pub struct StatusConflict {
    pub run_id: RunId,
    pub from: RunStatus,
    pub to: RunStatus,
}

/// Error recorded on a failed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    /// The step that failed, by id or position.
    pub step: StepRef,
    pub message: String,
}

impl RunFailure {
    pub fn new(step: impl Into<StepRef>, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "step {}: {}", self.step, self.message)
    }
}

/// Configuration for creating a new run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub id: RunId,
    pub execution_id: String,
    pub plan_id: Option<String>,
    pub input: Value,
    pub messages: Vec<Value>,
    /// Caller-chosen hook tokens keyed by hook step id.
    pub hook_tokens: HashMap<String, String>,
}

impl RunConfig {
    pub fn new(id: RunId, execution_id: impl Into<String>) -> Self {
        Self {
            id,
            execution_id: execution_id.into(),
            plan_id: None,
            input: Value::Null,
            messages: Vec::new(),
            hook_tokens: HashMap::new(),
        }
    }

    crate::fluent! {
        set input: Value;
        set messages: Vec<Value>;
        set hook_tokens: HashMap<String, String>;
        opt plan_id: String;
    }
}

/// One execution of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub run_id: RunId,
    /// Caller-supplied execution identifier from the start request.
    pub execution_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    pub status: RunStatus,
    /// Index of the step the interpreter will (re-)evaluate next.
    pub current_step: usize,
    pub context: RunContext,
    /// Caller-chosen hook tokens keyed by hook step id.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub hook_tokens: HashMap<String, String>,
    /// Token the run is paused on, when paused at a hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting_hook_token: Option<String>,
    /// Tokens already consumed by a resume, for idempotent re-signals.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolved_tokens: Vec<String>,
    /// Signal accepted by a resume but not yet consumed by the hook step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_signal: Option<Signal>,
    /// Absolute epoch-ms wake time, when paused on a sleep timer.
    /// Consumed by the sleep step when the interpreter re-enters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wake_at: Option<u64>,
    /// Absolute epoch-ms deadline for the hook the run is paused on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_deadline: Option<u64>,
    /// Absolute epoch-ms deadline from the plan-level timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<u64>,
    /// Serialised plan snapshot for re-entry from another request.
    /// Absent for in-process plans carrying closures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Soft cancellation flag, observed between steps and in poll loops.
    #[serde(default)]
    pub cancel_requested: bool,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
}

impl Run {
    pub fn new(config: RunConfig, epoch_ms: u64) -> Self {
        Self {
            run_id: config.id,
            execution_id: config.execution_id,
            plan_id: config.plan_id,
            status: RunStatus::Pending,
            current_step: 0,
            context: RunContext::new(config.input, config.messages),
            hook_tokens: config.hook_tokens,
            waiting_hook_token: None,
            resolved_tokens: Vec::new(),
            pending_signal: None,
            wake_at: None,
            hook_deadline: None,
            deadline: None,
            plan: None,
            error: None,
            result: None,
            cancel_requested: false,
            created_at: epoch_ms,
            updated_at: epoch_ms,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to a new status, enforcing monotonicity. A transition to the
    /// current status is a no-op.
    pub fn transition(&mut self, to: RunStatus, epoch_ms: u64) -> Result<(), StatusConflict> {
        if self.status == to {
            return Ok(());
        }
        if !self.status.can_transition(to) {
            return Err(StatusConflict {
                run_id: self.run_id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = epoch_ms;
        if to.is_terminal() {
            if self.completed_at.is_none() {
                self.completed_at = Some(epoch_ms);
            }
            self.waiting_hook_token = None;
            self.hook_deadline = None;
            self.wake_at = None;
            self.pending_signal = None;
        } else if !matches!(to, RunStatus::Paused) {
            // wake_at survives the resume so the sleep step can consume it
            self.waiting_hook_token = None;
            self.hook_deadline = None;
        }
        Ok(())
    }

    /// Pause the run on a hook token.
    pub fn pause_on_hook(
        &mut self,
        token: impl Into<String>,
        epoch_ms: u64,
    ) -> Result<(), StatusConflict> {
        self.transition(RunStatus::Paused, epoch_ms)?;
        self.waiting_hook_token = Some(token.into());
        self.wake_at = None;
        Ok(())
    }

    /// Set the hook timeout deadline while paused on a hook.
    pub fn set_hook_deadline(&mut self, deadline: u64) {
        self.hook_deadline = Some(deadline);
    }

    /// Pause the run on a sleep timer firing at `wake_at`.
    pub fn pause_on_timer(&mut self, wake_at: u64, epoch_ms: u64) -> Result<(), StatusConflict> {
        self.transition(RunStatus::Paused, epoch_ms)?;
        self.waiting_hook_token = None;
        self.wake_at = Some(wake_at);
        Ok(())
    }

    /// Complete the run with a final result.
    pub fn complete(&mut self, result: Value, epoch_ms: u64) -> Result<(), StatusConflict> {
        self.transition(RunStatus::Completed, epoch_ms)?;
        self.result = Some(result);
        Ok(())
    }

    /// Fail the run, recording the failing step.
    pub fn fail(&mut self, failure: RunFailure, epoch_ms: u64) -> Result<(), StatusConflict> {
        self.transition(RunStatus::Failed, epoch_ms)?;
        self.error = Some(failure);
        Ok(())
    }

    /// Whether a resume with `token` was already consumed.
    pub fn token_resolved(&self, token: &str) -> bool {
        self.resolved_tokens.iter().any(|t| t == token)
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
