// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan: an ordered sequence of steps plus run-level settings.

use crate::duration::DurationSpec;
use crate::poll::WorkerPollConfig;
use crate::step::{StatusPhase, Step};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Default hook timeout: 7 days.
pub const DEFAULT_HOOK_TIMEOUT_MS: u64 = 604_800_000;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("plan has no steps")]
    Empty,
    #[error("duplicate step id: {0:?}")]
    DuplicateStepId(String),
    #[error("step id must not be empty")]
    EmptyStepId,
    #[error("hook steps cannot appear inside parallel blocks")]
    HookInParallel,
}

/// An immutable, serialisable description of steps and conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub steps: Vec<Step>,
    /// How long a hook may stay paused before the run fails. Default 7d.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_timeout: Option<DurationSpec>,
    /// Collect step errors instead of failing fast.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub continue_on_error: bool,
    /// Wall-clock bound for the whole run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<DurationSpec>,
    /// Plan-level poll defaults for awaited workers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_poll: Option<WorkerPollConfig>,
}

impl Plan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            id: None,
            steps,
            hook_timeout: None,
            continue_on_error: false,
            timeout: None,
            worker_poll: None,
        }
    }

    /// Validate the plan: step ids unique across the whole plan
    /// (including condition branches and parallel blocks) and never
    /// empty; hooks may not appear inside parallel blocks, since a
    /// parallel child cannot suspend the run on its own.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.steps.is_empty() {
            return Err(PlanError::Empty);
        }
        let mut seen = HashSet::new();
        check_ids(&self.steps, &mut seen)?;
        check_parallel(&self.steps, false)
    }

    /// Whether `_statusUpdate` steps are already present at the top level.
    pub fn is_normalised(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s, Step::StatusUpdate { .. }))
    }

    /// Inject `_statusUpdate{paused}` / `_statusUpdate{running}` around
    /// top-level hook and sleep steps.
    ///
    /// Idempotent: a plan that already contains `_statusUpdate` steps is
    /// returned unchanged. Does not recurse into condition branches or
    /// parallel blocks; the interpreter pauses on step entry there.
    pub fn normalise(self) -> Self {
        if self.is_normalised() || !self.steps.iter().any(Step::is_pause_point) {
            return self;
        }
        let mut steps = Vec::with_capacity(self.steps.len() * 2);
        for step in self.steps {
            let pause = step.is_pause_point();
            if pause {
                steps.push(Step::StatusUpdate {
                    status: StatusPhase::Paused,
                    hook_token: None,
                });
            }
            steps.push(step);
            if pause {
                steps.push(Step::StatusUpdate {
                    status: StatusPhase::Running,
                    hook_token: None,
                });
            }
        }
        Self { steps, ..self }
    }

    /// Resolved hook timeout in milliseconds.
    pub fn hook_timeout_ms(&self) -> u64 {
        self.hook_timeout
            .as_ref()
            .and_then(|d| d.to_millis().ok())
            .unwrap_or(DEFAULT_HOOK_TIMEOUT_MS)
    }

    /// Resolved plan timeout in milliseconds, when set.
    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout.as_ref().and_then(|d| d.to_millis().ok())
    }
}

fn check_parallel(steps: &[Step], inside_parallel: bool) -> Result<(), PlanError> {
    for step in steps {
        match step {
            Step::Hook { .. } if inside_parallel => return Err(PlanError::HookInParallel),
            Step::Condition { then, otherwise, .. } => {
                check_parallel(then, inside_parallel)?;
                if let Some(otherwise) = otherwise {
                    check_parallel(otherwise, inside_parallel)?;
                }
            }
            Step::Parallel { steps } => check_parallel(steps, true)?,
            _ => {}
        }
    }
    Ok(())
}

fn check_ids(steps: &[Step], seen: &mut HashSet<String>) -> Result<(), PlanError> {
    for step in steps {
        if let Some(id) = step.id() {
            if id.is_empty() {
                return Err(PlanError::EmptyStepId);
            }
            if !seen.insert(id.to_string()) {
                return Err(PlanError::DuplicateStepId(id.to_string()));
            }
        }
        match step {
            Step::Condition { then, otherwise, .. } => {
                check_ids(then, seen)?;
                if let Some(otherwise) = otherwise {
                    check_ids(otherwise, seen)?;
                }
            }
            Step::Parallel { steps } => check_ids(steps, seen)?,
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
