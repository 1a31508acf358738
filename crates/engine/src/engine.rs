// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine: run lifecycle, signals, timers, and cancellation.
//!
//! Step execution itself lives in [`crate::interpreter`].

use crate::agents::AgentRouter;
use crate::error::EngineError;
use crate::plans::{plan_hash, PlanRegistry};
use crate::snapshot::RunSnapshot;
use cadre_core::{Clock, Run, RunConfig, RunFailure, RunId, RunStatus, Signal, SystemClock};
use cadre_dispatch::Dispatch;
use cadre_plan::Plan;
use cadre_store::{JobStore, RunLocks, RunStore};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default bound on agent-calls-agent depth.
pub const DEFAULT_MAX_AGENT_DEPTH: usize = 10;

/// Start request: a plan plus the caller's execution identity and input.
#[derive(Clone)]
pub struct StartRequest {
    pub plan: Plan,
    pub execution_id: String,
    pub input: Value,
    pub messages: Vec<Value>,
    /// Hook-step id → caller-chosen token.
    pub hook_tokens: HashMap<String, String>,
}

impl StartRequest {
    pub fn new(plan: Plan, execution_id: impl Into<String>) -> Self {
        Self {
            plan,
            execution_id: execution_id.into(),
            input: Value::Null,
            messages: Vec::new(),
            hook_tokens: HashMap::new(),
        }
    }

    cadre_core::fluent! {
        set input: Value;
        set messages: Vec<Value>;
        set hook_tokens: HashMap<String, String>;
    }
}

pub(crate) struct EngineInner<C: Clock> {
    pub(crate) runs: Arc<dyn RunStore>,
    pub(crate) jobs: Arc<dyn JobStore>,
    pub(crate) locks: RunLocks,
    pub(crate) dispatcher: Arc<dyn Dispatch>,
    pub(crate) agents: AgentRouter,
    pub(crate) plans: PlanRegistry,
    /// Plans carrying closures, resumable only in this process.
    pub(crate) live_plans: Mutex<HashMap<String, Plan>>,
    pub(crate) cancels: Mutex<HashMap<String, CancellationToken>>,
    pub(crate) clock: C,
    pub(crate) max_agent_depth: usize,
}

/// The orchestration engine. Cheap to clone; all state is shared.
pub struct Engine<C: Clock = SystemClock> {
    pub(crate) inner: Arc<EngineInner<C>>,
}

impl<C: Clock> Clone for Engine<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Clock> Engine<C> {
    pub fn new(
        runs: Arc<dyn RunStore>,
        jobs: Arc<dyn JobStore>,
        dispatcher: Arc<dyn Dispatch>,
        agents: AgentRouter,
        plans: PlanRegistry,
        clock: C,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                runs,
                jobs,
                locks: RunLocks::new(),
                dispatcher,
                agents,
                plans,
                live_plans: Mutex::new(HashMap::new()),
                cancels: Mutex::new(HashMap::new()),
                clock,
                max_agent_depth: DEFAULT_MAX_AGENT_DEPTH,
            }),
        }
    }

    pub fn agents(&self) -> &AgentRouter {
        &self.inner.agents
    }

    pub fn plans(&self) -> &PlanRegistry {
        &self.inner.plans
    }

    /// Start a new run and drive it until it completes, pauses, or fails.
    pub async fn start(&self, request: StartRequest) -> Result<RunSnapshot, EngineError> {
        if request.execution_id.trim().is_empty() {
            return Err(EngineError::Validation(
                "executionId is required".to_string(),
            ));
        }
        request.plan.validate()?;
        let plan = request.plan.normalise();

        let now = self.inner.clock.epoch_ms();
        let run_id = RunId::generate(now);
        let plan_id = plan.id.clone().or_else(|| plan_hash(&plan));

        let mut config = RunConfig::new(run_id.clone(), request.execution_id)
            .input(request.input)
            .messages(request.messages)
            .hook_tokens(request.hook_tokens);
        if let Some(plan_id) = plan_id {
            config = config.plan_id(plan_id);
        }
        let mut run = Run::new(config, now);
        run.deadline = plan
            .timeout_ms()
            .map(|t| self.inner.clock.deadline_after_ms(t));
        match serde_json::to_value(&plan) {
            Ok(snapshot) => run.plan = Some(snapshot),
            // Closure-carrying plans stay in-process
            Err(_) => {
                self.inner
                    .live_plans
                    .lock()
                    .insert(run_id.to_string(), plan.clone());
            }
        }

        self.inner.runs.create(run).await?;
        tracing::info!(run_id = %run_id, "run created");
        self.drive(&run_id).await
    }

    /// Current view of a run.
    pub async fn status(&self, run_id: &str) -> Result<RunSnapshot, EngineError> {
        let run = self.load(run_id).await?;
        Ok(RunSnapshot::of(&run))
    }

    /// Resume the paused run waiting on `token` with a payload.
    ///
    /// A second signal with an already-consumed token is a success no-op.
    pub async fn signal(&self, token: &str, payload: Value) -> Result<RunSnapshot, EngineError> {
        if let Some(found) = self.inner.runs.find_by_hook_token(token).await? {
            let run_id = found.run_id.clone();
            let resumed = {
                let lock = self.inner.locks.for_run(&run_id);
                let _guard = lock.lock().await;
                let mut run = self.load(&run_id).await?;
                if run.status == RunStatus::Paused
                    && run.waiting_hook_token.as_deref() == Some(token)
                {
                    let now = self.inner.clock.epoch_ms();
                    run.resolved_tokens.push(token.to_string());
                    run.pending_signal = Some(Signal::new(token, payload.clone(), now));
                    run.transition(RunStatus::Running, now)?;
                    self.inner.runs.put(run).await?;
                    true
                } else {
                    false
                }
            };
            if resumed {
                tracing::info!(run_id = %run_id, token, "hook resumed");
                return self.drive(&run_id).await;
            }
        }

        // Already consumed: report the run's current state
        if let Some(run) = self.inner.runs.find_by_resolved_token(token).await? {
            tracing::debug!(run_id = %run.run_id, token, "duplicate signal ignored");
            return Ok(RunSnapshot::of(&run));
        }

        Err(EngineError::TokenNotFound(token.to_string()))
    }

    /// Soft-cancel a run. In-process steps observe the flag between
    /// steps; awaited polls stop. Remote jobs continue independently.
    pub async fn cancel(&self, run_id: &str) -> Result<RunSnapshot, EngineError> {
        // Wake in-flight polls first so the run lock frees up
        self.cancel_token(run_id).cancel();

        let lock = self.inner.locks.for_run(run_id);
        let _guard = lock.lock().await;
        let mut run = self.load(run_id).await?;
        if run.is_terminal() {
            return Ok(RunSnapshot::of(&run));
        }
        let now = self.inner.clock.epoch_ms();
        run.cancel_requested = true;
        if run.status == RunStatus::Paused {
            // Idle runs fail immediately; nothing is executing
            run.fail(RunFailure::new(run.current_step, "cancelled"), now)?;
        }
        self.inner.runs.put(run.clone()).await?;
        if run.is_terminal() {
            self.finish_run(&run);
        }
        tracing::info!(run_id, "cancellation requested");
        Ok(RunSnapshot::of(&run))
    }

    /// Re-enter paused runs whose sleep timers are due. Returns how many
    /// were driven. Called by the host's timer tick; in-process timer
    /// tasks normally get there first.
    pub async fn resume_due_timers(&self) -> Result<usize, EngineError> {
        let now = self.inner.clock.epoch_ms();
        let due: Vec<Run> = self
            .inner
            .runs
            .list_by_status(RunStatus::Paused)
            .await?
            .into_iter()
            .filter(|r| r.wake_at.is_some_and(|w| w <= now))
            .collect();
        let count = due.len();
        for run in due {
            if let Err(e) = self.drive(&run.run_id).await {
                tracing::warn!(run_id = %run.run_id, error = %e, "timer re-entry failed");
            }
        }
        Ok(count)
    }

    /// Fail paused runs whose hook deadline has passed.
    pub async fn fail_overdue_hooks(&self) -> Result<usize, EngineError> {
        let now = self.inner.clock.epoch_ms();
        let overdue: Vec<Run> = self
            .inner
            .runs
            .list_by_status(RunStatus::Paused)
            .await?
            .into_iter()
            .filter(|r| r.hook_deadline.is_some_and(|d| d <= now))
            .collect();
        let mut failed = 0;
        for run in overdue {
            let token = run.waiting_hook_token.clone().unwrap_or_default();
            if self.fail_hook_if_still_waiting(&run.run_id, &token).await? {
                failed += 1;
            }
        }
        Ok(failed)
    }

    pub(crate) async fn load(&self, run_id: &str) -> Result<Run, EngineError> {
        self.inner
            .runs
            .get_run(run_id)
            .await?
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))
    }

    /// The plan for a run: live (closure) plans first, then the persisted
    /// snapshot.
    pub(crate) fn plan_for(&self, run: &Run) -> Result<Plan, EngineError> {
        if let Some(plan) = self.inner.live_plans.lock().get(run.run_id.as_str()) {
            return Ok(plan.clone());
        }
        let Some(snapshot) = &run.plan else {
            return Err(EngineError::Internal(format!(
                "plan unavailable for run {}",
                run.run_id
            )));
        };
        serde_json::from_value(snapshot.clone())
            .map_err(|e| EngineError::Internal(format!("stored plan unreadable: {e}")))
    }

    pub(crate) fn cancel_token(&self, run_id: &str) -> CancellationToken {
        let mut cancels = self.inner.cancels.lock();
        cancels
            .entry(run_id.to_string())
            .or_insert_with(CancellationToken::new)
            .clone()
    }

    /// Drop per-run bookkeeping once a run is terminal.
    pub(crate) fn finish_run(&self, run: &Run) {
        self.inner.cancels.lock().remove(run.run_id.as_str());
        self.inner.live_plans.lock().remove(run.run_id.as_str());
        self.inner.locks.release(&run.run_id);
    }

    /// Arm an in-process timer that re-enters the run after `delay`.
    pub(crate) fn arm_timer(&self, run_id: RunId, delay: Duration) {
        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = engine.drive(&run_id).await {
                tracing::warn!(run_id = %run_id, error = %e, "timer wake failed");
            }
        });
    }

    /// Arm the hook-timeout watchdog for a paused run.
    pub(crate) fn arm_hook_watchdog(&self, run_id: RunId, token: String, delay: Duration) {
        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match engine.fail_hook_if_still_waiting(&run_id, &token).await {
                Ok(true) => {}
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(run_id = %run_id, error = %e, "hook watchdog failed");
                }
            }
        });
    }

    async fn fail_hook_if_still_waiting(
        &self,
        run_id: &str,
        token: &str,
    ) -> Result<bool, EngineError> {
        let lock = self.inner.locks.for_run(run_id);
        let _guard = lock.lock().await;
        let mut run = self.load(run_id).await?;
        if run.status != RunStatus::Paused || run.waiting_hook_token.as_deref() != Some(token) {
            return Ok(false);
        }
        let now = self.inner.clock.epoch_ms();
        run.fail(
            RunFailure::new(run.current_step, "hook timed out waiting for signal"),
            now,
        )?;
        self.inner.runs.put(run.clone()).await?;
        self.finish_run(&run);
        tracing::warn!(run_id, token, "hook timed out");
        Ok(true)
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
