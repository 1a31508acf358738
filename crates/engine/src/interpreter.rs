// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step execution.
//!
//! `drive` re-enters a run under its mutex and walks the plan from
//! `current_step`. Steps whose ids already have recorded outputs are
//! skipped, so a resumed invocation never re-executes completed work;
//! anonymous steps inside nested blocks may re-run, which is the
//! documented at-least-once model.

use crate::engine::Engine;
use crate::error::EngineError;
use crate::plans::plan_hash;
use crate::snapshot::RunSnapshot;
use cadre_core::{Clock, Run, RunConfig, RunFailure, RunId, RunStatus, StepRef};
use cadre_dispatch::DispatchOptions;
use cadre_plan::{
    DurationSpec, InputSpec, Plan, ResolvedPoll, StatusPhase, Step, TokenSpec, WorkerPollConfig,
};
use futures_util::future::{join_all, try_join_all, BoxFuture};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;

/// Sleeps at or below this run inline instead of persisting a timer.
pub(crate) const INLINE_SLEEP_MS: u64 = 1_000;
/// Poll cadence for awaited child runs.
pub(crate) const CHILD_RUN_POLL_MS: u64 = 250;

pub(crate) enum Flow {
    Continue,
    Paused,
}

/// A step failure: fails the run unless the plan collects errors.
#[derive(Debug)]
pub(crate) struct StepError {
    pub step: StepRef,
    pub message: String,
}

impl StepError {
    fn new(step: impl Into<StepRef>, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            message: message.into(),
        }
    }
}

fn step_ref_for(step: &Step, index: usize) -> StepRef {
    match step.id() {
        Some(id) => StepRef::Id(id.to_string()),
        None => StepRef::Index(index),
    }
}

/// Context deltas produced by one parallel child, applied after the join.
struct ChildDelta {
    index: usize,
    new_ids: Vec<(String, Value)>,
    new_all: Vec<Value>,
    new_errors: Vec<cadre_core::StepFailure>,
}

impl<C: Clock> Engine<C> {
    /// Re-enter a run and execute until it completes, pauses, or fails.
    pub async fn drive(&self, run_id: &str) -> Result<RunSnapshot, EngineError> {
        let lock = self.inner.locks.for_run(run_id);
        let _guard = lock.lock().await;

        let mut run = self.load(run_id).await?;
        if run.is_terminal() {
            return Ok(RunSnapshot::of(&run));
        }
        let plan = self.plan_for(&run)?;

        let now = self.inner.clock.epoch_ms();
        match run.status {
            RunStatus::Pending => run.transition(RunStatus::Running, now)?,
            RunStatus::Paused => {
                let wake_due = run.wake_at.is_some_and(|w| w <= now);
                if run.pending_signal.is_some() || wake_due {
                    run.transition(RunStatus::Running, now)?;
                } else {
                    // Still waiting on its signal or timer
                    return Ok(RunSnapshot::of(&run));
                }
            }
            RunStatus::Running => {}
            RunStatus::Completed | RunStatus::Failed => {}
        }

        let outcome = self.exec_plan(&plan, &mut run).await;
        let now = self.inner.clock.epoch_ms();
        match outcome {
            Ok(Flow::Continue) => {
                let result = run.context.previous.clone();
                run.complete(result, now)?;
                tracing::info!(run_id, steps = run.current_step, "run completed");
            }
            Ok(Flow::Paused) => {
                tracing::info!(
                    run_id,
                    step = run.current_step,
                    hook = run.waiting_hook_token.as_deref().unwrap_or(""),
                    wake_at = run.wake_at.unwrap_or(0),
                    "run suspended"
                );
            }
            Err(e) => {
                tracing::warn!(run_id, step = %e.step, error = %e.message, "run failed");
                run.fail(RunFailure::new(e.step, e.message), now)?;
            }
        }

        self.inner.runs.put(run.clone()).await?;
        if run.is_terminal() {
            self.finish_run(&run);
        }
        Ok(RunSnapshot::of(&run))
    }

    /// Top-level walk with `current_step` bookkeeping and a state flush
    /// after every completed step.
    async fn exec_plan(&self, plan: &Plan, run: &mut Run) -> Result<Flow, StepError> {
        let cancel = self.cancel_token(&run.run_id);
        while run.current_step < plan.steps.len() {
            let index = run.current_step;
            let step = &plan.steps[index];

            if run.cancel_requested || cancel.is_cancelled() {
                return Err(StepError::new(index, "cancelled"));
            }
            let now = self.inner.clock.epoch_ms();
            if run.deadline.is_some_and(|d| now > d) {
                return Err(StepError::new(index, "plan timeout exceeded"));
            }
            if let Some(id) = step.id() {
                if run.context.has_output(id) {
                    run.current_step = index + 1;
                    continue;
                }
            }

            let step_ref = step_ref_for(step, index);
            tracing::debug!(step = %step_ref, kind = step.kind(), "executing step");
            let flow = match self.exec_step(step, step_ref.clone(), run, plan, false).await {
                Ok(flow) => flow,
                Err(e) if plan.continue_on_error => {
                    run.context.record_error(e.step, json!(e.message));
                    Flow::Continue
                }
                Err(e) => return Err(e),
            };
            match flow {
                Flow::Continue => {
                    run.current_step = index + 1;
                    if let Err(e) = self.inner.runs.put(run.clone()).await {
                        return Err(StepError::new(step_ref, format!("state flush failed: {e}")));
                    }
                }
                Flow::Paused => return Ok(Flow::Paused),
            }
        }
        Ok(Flow::Continue)
    }

    fn exec_step<'a>(
        &'a self,
        step: &'a Step,
        step_ref: StepRef,
        run: &'a mut Run,
        plan: &'a Plan,
        in_parallel: bool,
    ) -> BoxFuture<'a, Result<Flow, StepError>> {
        Box::pin(async move {
            match step {
                Step::StatusUpdate { status, hook_token } => {
                    self.exec_status_update(*status, hook_token.as_deref(), run, &step_ref)
                }
                Step::Agent {
                    agent,
                    input,
                    awaited,
                    id,
                } => {
                    self.exec_agent(agent, input.as_ref(), *awaited, id.as_deref(), run, &step_ref)
                        .await
                }
                Step::Worker {
                    worker,
                    input,
                    awaited,
                    id,
                    worker_poll,
                } => {
                    self.exec_worker(
                        worker,
                        input.as_ref(),
                        *awaited,
                        id.as_deref(),
                        worker_poll.as_ref(),
                        run,
                        plan,
                        &step_ref,
                    )
                    .await
                }
                Step::Workflow {
                    workflow,
                    input,
                    awaited,
                    id,
                } => {
                    self.exec_workflow(workflow, input.as_ref(), *awaited, id.as_deref(), run, &step_ref)
                        .await
                }
                Step::Sleep { duration } => {
                    self.exec_sleep(duration, run, &step_ref, in_parallel).await
                }
                Step::Hook { token, id } => {
                    self.exec_hook(token, id.as_deref(), run, plan, &step_ref, in_parallel)
                        .await
                }
                Step::Condition {
                    condition,
                    then,
                    otherwise,
                } => {
                    let branch = if condition.evaluate(&run.context) {
                        then.as_slice()
                    } else {
                        otherwise.as_deref().unwrap_or(&[])
                    };
                    self.exec_sequence(branch, run, plan, in_parallel).await
                }
                Step::Parallel { steps } => {
                    self.exec_parallel(steps, run, plan).await
                }
            }
        })
    }

    fn exec_status_update(
        &self,
        phase: StatusPhase,
        hook_token: Option<&str>,
        run: &mut Run,
        step_ref: &StepRef,
    ) -> Result<Flow, StepError> {
        match phase {
            StatusPhase::Paused => {
                // The durable pause happens at the hook/sleep that follows;
                // only a pre-declared token is mirrored here.
                if let Some(token) = hook_token {
                    run.waiting_hook_token = Some(token.to_string());
                }
            }
            StatusPhase::Running => {
                if run.status == RunStatus::Paused {
                    let now = self.inner.clock.epoch_ms();
                    run.transition(RunStatus::Running, now)
                        .map_err(|e| StepError::new(step_ref.clone(), e.to_string()))?;
                }
            }
        }
        Ok(Flow::Continue)
    }

    async fn exec_agent(
        &self,
        agent: &str,
        input: Option<&InputSpec>,
        awaited: bool,
        id: Option<&str>,
        run: &mut Run,
        step_ref: &StepRef,
    ) -> Result<Flow, StepError> {
        let resolved = input.map(|i| i.resolve(&run.context)).unwrap_or(Value::Null);
        if awaited {
            let started = std::time::Instant::now();
            let output = self
                .inner
                .agents
                .call(
                    agent,
                    resolved,
                    run.context.messages.clone(),
                    self.inner.max_agent_depth,
                )
                .await
                .map_err(|e| StepError::new(step_ref.clone(), format!("agent {agent:?} failed: {e}")))?;
            tracing::debug!(
                agent,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "agent completed"
            );
            run.context.record_output(id, output);
        } else {
            let router = self.inner.agents.clone();
            let path = agent.to_string();
            let messages = run.context.messages.clone();
            let max_depth = self.inner.max_agent_depth;
            tokio::spawn(async move {
                if let Err(e) = router.call(&path, resolved, messages, max_depth).await {
                    tracing::warn!(agent = %path, error = %e, "fire-and-forget agent failed");
                }
            });
            run.context.record_output(id, json!({"status": "started"}));
        }
        Ok(Flow::Continue)
    }

    #[allow(clippy::too_many_arguments)]
    async fn exec_worker(
        &self,
        worker: &str,
        input: Option<&InputSpec>,
        awaited: bool,
        id: Option<&str>,
        worker_poll: Option<&WorkerPollConfig>,
        run: &mut Run,
        plan: &Plan,
        step_ref: &StepRef,
    ) -> Result<Flow, StepError> {
        let resolved = input.map(|i| i.resolve(&run.context)).unwrap_or(Value::Null);
        let options = DispatchOptions::default().request_id(run.run_id.to_string());
        let receipt = self
            .inner
            .dispatcher
            .dispatch(worker, resolved, options)
            .await
            .map_err(|e| StepError::new(step_ref.clone(), e.to_string()))?;

        if !awaited {
            run.context.record_output(
                id,
                json!({"jobId": receipt.job_id, "status": "queued"}),
            );
            return Ok(Flow::Continue);
        }

        let poll = ResolvedPoll::resolve(worker_poll, plan.worker_poll.as_ref());
        let output = self
            .await_worker_job(&receipt.job_id, poll, run)
            .await
            .map_err(|message| StepError::new(step_ref.clone(), message))?;
        run.context.record_output(id, output);
        Ok(Flow::Continue)
    }

    /// Poll the job store until the job is terminal. The run stays
    /// `running` while polling; this is an in-process wait, not a durable
    /// suspension.
    async fn await_worker_job(
        &self,
        job_id: &str,
        poll: ResolvedPoll,
        run: &Run,
    ) -> Result<Value, String> {
        let cancel = self.cancel_token(&run.run_id);
        let started = std::time::Instant::now();
        let mut attempts: u32 = 0;
        loop {
            match self.inner.jobs.get(job_id).await {
                Ok(Some(job)) if job.is_terminal() => {
                    return match job.error {
                        Some(e) => Err(format!("worker job {job_id} failed: {e}")),
                        None => Ok(job.output.unwrap_or(Value::Null)),
                    };
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(job_id, error = %e, "job poll failed"),
            }

            attempts += 1;
            let waited = started.elapsed().as_millis() as u64;
            if waited >= poll.timeout_ms || attempts >= poll.max_retries {
                return Err(format!(
                    "timed out waiting for worker job {job_id} after {waited}ms"
                ));
            }
            if run.cancel_requested || cancel.is_cancelled() {
                return Err("cancelled".to_string());
            }
            if run
                .deadline
                .is_some_and(|d| self.inner.clock.epoch_ms() > d)
            {
                return Err("plan timeout exceeded".to_string());
            }
            tokio::time::sleep(Duration::from_millis(poll.interval_ms)).await;
        }
    }

    async fn exec_workflow(
        &self,
        workflow: &str,
        input: Option<&InputSpec>,
        awaited: bool,
        id: Option<&str>,
        run: &mut Run,
        step_ref: &StepRef,
    ) -> Result<Flow, StepError> {
        let child_plan = self.inner.plans.get(workflow).ok_or_else(|| {
            StepError::new(step_ref.clone(), format!("unknown workflow: {workflow:?}"))
        })?;
        let resolved = input.map(|i| i.resolve(&run.context)).unwrap_or(Value::Null);

        let now = self.inner.clock.epoch_ms();
        let child_id = RunId::generate(now);
        let mut config = RunConfig::new(
            child_id.clone(),
            format!("{}::{}", run.execution_id, workflow),
        )
        .input(resolved)
        .messages(run.context.messages.clone());
        if let Some(plan_id) = child_plan.id.clone().or_else(|| plan_hash(&child_plan)) {
            config = config.plan_id(plan_id);
        }
        let mut child = Run::new(config, now);
        child.deadline = child_plan
            .timeout_ms()
            .map(|t| self.inner.clock.deadline_after_ms(t));
        match serde_json::to_value(&child_plan) {
            Ok(snapshot) => child.plan = Some(snapshot),
            Err(_) => {
                self.inner
                    .live_plans
                    .lock()
                    .insert(child_id.to_string(), child_plan.clone());
            }
        }
        self.inner
            .runs
            .create(child)
            .await
            .map_err(|e| StepError::new(step_ref.clone(), format!("child run create failed: {e}")))?;

        let engine = self.clone();
        let drive_id = child_id.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.drive(&drive_id).await {
                tracing::warn!(run_id = %drive_id, error = %e, "child run drive failed");
            }
        });

        if !awaited {
            // Fire-and-forget still hands back the run id for later polls
            run.context
                .record_output(id, json!({"runId": child_id, "status": "pending"}));
            return Ok(Flow::Continue);
        }

        let cancel = self.cancel_token(&run.run_id);
        loop {
            if let Ok(Some(child)) = self.inner.runs.get_run(&child_id).await {
                if child.is_terminal() {
                    if child.status == RunStatus::Failed {
                        let message = child
                            .error
                            .map(|e| e.to_string())
                            .unwrap_or_else(|| "child run failed".to_string());
                        return Err(StepError::new(
                            step_ref.clone(),
                            format!("workflow {workflow:?} failed: {message}"),
                        ));
                    }
                    run.context
                        .record_output(id, child.result.unwrap_or(Value::Null));
                    return Ok(Flow::Continue);
                }
            }
            if run.cancel_requested || cancel.is_cancelled() {
                return Err(StepError::new(step_ref.clone(), "cancelled"));
            }
            if run
                .deadline
                .is_some_and(|d| self.inner.clock.epoch_ms() > d)
            {
                return Err(StepError::new(step_ref.clone(), "plan timeout exceeded"));
            }
            tokio::time::sleep(Duration::from_millis(CHILD_RUN_POLL_MS)).await;
        }
    }

    async fn exec_sleep(
        &self,
        duration: &DurationSpec,
        run: &mut Run,
        step_ref: &StepRef,
        in_parallel: bool,
    ) -> Result<Flow, StepError> {
        let total_ms = duration
            .to_millis()
            .map_err(|e| StepError::new(step_ref.clone(), e.to_string()))?;
        let now = self.inner.clock.epoch_ms();

        if in_parallel {
            // Parallel children cannot suspend the run; wait inline,
            // bounded by the plan timeout like any other child work.
            tokio::time::sleep(Duration::from_millis(total_ms)).await;
            return Ok(Flow::Continue);
        }

        // A due timer set by an earlier invocation completes this step
        if let Some(wake) = run.wake_at {
            if wake <= now {
                run.wake_at = None;
                return Ok(Flow::Continue);
            }
        }

        let wake = run.wake_at.unwrap_or_else(|| now.saturating_add(total_ms));
        let remaining = wake.saturating_sub(now);
        if remaining <= INLINE_SLEEP_MS {
            tokio::time::sleep(Duration::from_millis(remaining)).await;
            run.wake_at = None;
            Ok(Flow::Continue)
        } else {
            run.pause_on_timer(wake, now)
                .map_err(|e| StepError::new(step_ref.clone(), e.to_string()))?;
            self.arm_timer(run.run_id.clone(), Duration::from_millis(remaining));
            Ok(Flow::Paused)
        }
    }

    async fn exec_hook(
        &self,
        token: &TokenSpec,
        id: Option<&str>,
        run: &mut Run,
        plan: &Plan,
        step_ref: &StepRef,
        in_parallel: bool,
    ) -> Result<Flow, StepError> {
        if in_parallel {
            return Err(StepError::new(
                step_ref.clone(),
                "hook steps cannot run inside parallel blocks",
            ));
        }

        // A resume already delivered the payload: consume and move on
        if let Some(signal) = run.pending_signal.take() {
            run.context.record_output(id, signal.payload);
            return Ok(Flow::Continue);
        }

        let resolved = id
            .and_then(|i| run.hook_tokens.get(i).cloned())
            .unwrap_or_else(|| token.resolve(&run.context));
        if resolved.is_empty() {
            return Err(StepError::new(step_ref.clone(), "hook token is empty"));
        }

        let now = self.inner.clock.epoch_ms();
        run.pause_on_hook(resolved.clone(), now)
            .map_err(|e| StepError::new(step_ref.clone(), e.to_string()))?;
        let timeout_ms = plan.hook_timeout_ms();
        run.set_hook_deadline(self.inner.clock.deadline_after_ms(timeout_ms));
        self.arm_hook_watchdog(
            run.run_id.clone(),
            resolved,
            Duration::from_millis(timeout_ms),
        );
        Ok(Flow::Paused)
    }

    /// Execute a nested block (condition branch) in the current frame.
    fn exec_sequence<'a>(
        &'a self,
        steps: &'a [Step],
        run: &'a mut Run,
        plan: &'a Plan,
        in_parallel: bool,
    ) -> BoxFuture<'a, Result<Flow, StepError>> {
        Box::pin(async move {
            let cancel = self.cancel_token(&run.run_id);
            for step in steps {
                if run.cancel_requested || cancel.is_cancelled() {
                    return Err(StepError::new(run.current_step, "cancelled"));
                }
                if let Some(id) = step.id() {
                    if run.context.has_output(id) {
                        continue;
                    }
                }
                let step_ref = step_ref_for(step, run.current_step);
                match self.exec_step(step, step_ref, run, plan, in_parallel).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Paused) => return Ok(Flow::Paused),
                    Err(e) if plan.continue_on_error => {
                        run.context.record_error(e.step, json!(e.message));
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(Flow::Continue)
        })
    }

    /// Fan out children against context snapshots; apply writes after the
    /// join in declared order so `previous` lands on the last-indexed
    /// child.
    async fn exec_parallel(
        &self,
        children: &[Step],
        run: &mut Run,
        plan: &Plan,
    ) -> Result<Flow, StepError> {
        let mut futures = Vec::with_capacity(children.len());
        for (child_index, child) in children.iter().enumerate() {
            let scratch = run.clone();
            futures.push(self.run_parallel_child(child, scratch, plan, child_index));
        }

        let mut deltas: Vec<ChildDelta> = if plan.continue_on_error {
            let mut collected = Vec::new();
            for result in join_all(futures).await {
                match result {
                    Ok(delta) => collected.push(delta),
                    Err(e) => run.context.record_error(e.step, json!(e.message)),
                }
            }
            collected
        } else {
            // Fail-fast: the first failure drops the remaining futures
            try_join_all(futures).await?
        };

        deltas.sort_by_key(|d| d.index);
        for delta in deltas {
            for (key, value) in delta.new_ids {
                run.context.steps.insert(key, value);
            }
            for value in delta.new_all {
                run.context.all.push(value.clone());
                run.context.previous = value;
            }
            run.context.errors.extend(delta.new_errors);
        }
        Ok(Flow::Continue)
    }

    async fn run_parallel_child(
        &self,
        step: &Step,
        mut scratch: Run,
        plan: &Plan,
        index: usize,
    ) -> Result<ChildDelta, StepError> {
        let child_ref = step_ref_for(step, index);
        let before_all = scratch.context.all.len();
        let before_errors = scratch.context.errors.len();
        let before_keys: HashSet<String> = scratch.context.steps.keys().cloned().collect();

        match self
            .exec_step(step, child_ref.clone(), &mut scratch, plan, true)
            .await?
        {
            Flow::Continue => {}
            Flow::Paused => {
                return Err(StepError::new(child_ref, "parallel children cannot pause"));
            }
        }

        Ok(ChildDelta {
            index,
            new_ids: scratch
                .context
                .steps
                .iter()
                .filter(|(key, _)| !before_keys.contains(key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            new_all: scratch.context.all[before_all..].to_vec(),
            new_errors: scratch.context.errors[before_errors..].to_vec(),
        })
    }
}

#[cfg(test)]
#[path = "interpreter_tests.rs"]
mod tests;
