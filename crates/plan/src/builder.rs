// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fluent plan builder for in-process callers.
//!
//! Mirrors the raw JSON form but admits closures for `input`, `token`, and
//! `if`. `build()` normalises the plan, so builder output is ready to run
//! or to serialise (closures permitting).

use crate::condition::Condition;
use crate::duration::DurationSpec;
use crate::input::InputSpec;
use crate::plan::Plan;
use crate::poll::WorkerPollConfig;
use crate::step::{Step, TokenSpec};

/// Per-step options shared by agent/worker/workflow/hook steps.
#[derive(Debug, Clone, Default)]
pub struct StepOpts {
    pub id: Option<String>,
    pub awaited: Option<bool>,
    pub worker_poll: Option<WorkerPollConfig>,
}

impl StepOpts {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn awaited(mut self, awaited: bool) -> Self {
        self.awaited = Some(awaited);
        self
    }

    pub fn worker_poll(mut self, poll: WorkerPollConfig) -> Self {
        self.worker_poll = Some(poll);
        self
    }
}

/// Fluent builder producing a normalised [`Plan`].
#[derive(Debug, Clone, Default)]
pub struct PlanBuilder {
    id: Option<String>,
    steps: Vec<Step>,
    hook_timeout: Option<DurationSpec>,
    continue_on_error: bool,
    timeout: Option<DurationSpec>,
    worker_poll: Option<WorkerPollConfig>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn hook_timeout(mut self, timeout: impl Into<DurationSpec>) -> Self {
        self.hook_timeout = Some(timeout.into());
        self
    }

    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn timeout(mut self, timeout: impl Into<DurationSpec>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    pub fn worker_poll(mut self, poll: WorkerPollConfig) -> Self {
        self.worker_poll = Some(poll);
        self
    }

    /// Append a raw step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// In-process agent call. Blocking unless `opts.awaited` says otherwise.
    pub fn agent(
        mut self,
        path: impl Into<String>,
        input: impl Into<Option<InputSpec>>,
        opts: StepOpts,
    ) -> Self {
        self.steps.push(Step::Agent {
            agent: path.into(),
            input: input.into(),
            awaited: opts.awaited.unwrap_or(true),
            id: opts.id,
        });
        self
    }

    /// Pause for an external signal carrying `token`.
    pub fn hook(mut self, token: impl Into<TokenSpec>, opts: StepOpts) -> Self {
        self.steps.push(Step::Hook {
            token: token.into(),
            id: opts.id,
        });
        self
    }

    /// Pause for a fixed duration.
    pub fn sleep(mut self, duration: impl Into<DurationSpec>) -> Self {
        self.steps.push(Step::Sleep {
            duration: duration.into(),
        });
        self
    }

    /// Branch on a condition.
    pub fn condition(
        mut self,
        condition: impl Into<Condition>,
        then: Vec<Step>,
        otherwise: impl Into<Option<Vec<Step>>>,
    ) -> Self {
        self.steps.push(Step::Condition {
            condition: condition.into(),
            then,
            otherwise: otherwise.into(),
        });
        self
    }

    /// Run children concurrently.
    pub fn parallel(mut self, steps: Vec<Step>) -> Self {
        self.steps.push(Step::Parallel { steps });
        self
    }

    /// Queue-backed worker call. Fire-and-forget unless `opts.awaited`.
    pub fn worker(
        mut self,
        worker_id: impl Into<String>,
        input: impl Into<Option<InputSpec>>,
        opts: StepOpts,
    ) -> Self {
        self.steps.push(Step::Worker {
            worker: worker_id.into(),
            input: input.into(),
            awaited: opts.awaited.unwrap_or(false),
            id: opts.id,
            worker_poll: opts.worker_poll,
        });
        self
    }

    /// Child run of another plan. Blocking unless `opts.awaited` says
    /// otherwise.
    pub fn workflow(
        mut self,
        workflow_id: impl Into<String>,
        input: impl Into<Option<InputSpec>>,
        opts: StepOpts,
    ) -> Self {
        self.steps.push(Step::Workflow {
            workflow: workflow_id.into(),
            input: input.into(),
            awaited: opts.awaited.unwrap_or(true),
            id: opts.id,
        });
        self
    }

    /// Finish, normalising pause points.
    pub fn build(self) -> Plan {
        Plan {
            id: self.id,
            steps: self.steps,
            hook_timeout: self.hook_timeout,
            continue_on_error: self.continue_on_error,
            timeout: self.timeout,
            worker_poll: self.worker_poll,
        }
        .normalise()
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
