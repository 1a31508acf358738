// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::agents::{AgentContext, AgentError, AgentHandler, AgentRouter};
use crate::snapshot::RunSnapshot;
use async_trait::async_trait;
use cadre_core::{RunStatus, SystemClock};
use cadre_dispatch::{Dispatch, Dispatcher, LocalQueue};
use cadre_plan::Plan;
use cadre_store::MemoryStore;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct ConstAgent(Value);

#[async_trait]
impl AgentHandler for ConstAgent {
    async fn call(&self, _ctx: &AgentContext, _input: Value) -> Result<Value, AgentError> {
        Ok(self.0.clone())
    }
}

struct CountingAgent(Arc<AtomicUsize>);

#[async_trait]
impl AgentHandler for CountingAgent {
    async fn call(&self, _ctx: &AgentContext, _input: Value) -> Result<Value, AgentError> {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({"calls": n}))
    }
}

struct Bed {
    engine: Engine<SystemClock>,
    counter: Arc<AtomicUsize>,
}

fn bed() -> Bed {
    let store = Arc::new(MemoryStore::new());
    let (queue, _rx) = LocalQueue::new();
    let dispatcher: Arc<dyn Dispatch> = Arc::new(Dispatcher::new(Arc::new(queue)));
    let agents = AgentRouter::new();
    agents.register("now", Arc::new(ConstAgent(json!({"now": 1}))));
    let counter = Arc::new(AtomicUsize::new(0));
    agents.register("counting", Arc::new(CountingAgent(counter.clone())));
    let engine = Engine::new(
        store.clone(),
        store,
        dispatcher,
        agents,
        PlanRegistry::new(),
        SystemClock,
    );
    Bed { engine, counter }
}

fn plan(value: Value) -> Plan {
    serde_json::from_value(value).unwrap()
}

fn hook_plan() -> Plan {
    plan(json!({
        "steps": [
            {"type": "agent", "agent": "counting", "id": "t1"},
            {"type": "hook", "token": "placeholder", "id": "h"},
            {"type": "agent", "agent": "now", "id": "t2"},
        ],
    }))
}

async fn start_paused(engine: &Engine<SystemClock>, execution_id: &str) -> RunSnapshot {
    let request = StartRequest::new(hook_plan(), execution_id)
        .hook_tokens(std::collections::HashMap::from([(
            "h".to_string(),
            "tok1".to_string(),
        )]));
    let snapshot = engine.start(request).await.unwrap();
    assert_eq!(snapshot.status, RunStatus::Paused);
    snapshot
}

#[tokio::test]
async fn sequential_with_hook_pauses_then_resumes() {
    // §8 scenario 1 end to end
    let bed = bed();
    let paused = start_paused(&bed.engine, "exec-1").await;
    assert_eq!(paused.hook_token(), Some("tok1"));
    assert!(paused.context.steps.contains_key("t1"));
    assert!(!paused.context.steps.contains_key("t2"));

    let resumed = bed.engine.signal("tok1", json!({"ok": true})).await.unwrap();
    assert_eq!(resumed.status, RunStatus::Completed);
    assert_eq!(resumed.context.steps["h"], json!({"ok": true}));
    assert!(resumed.context.steps.contains_key("t2"));
}

#[tokio::test]
async fn resume_does_not_reexecute_completed_steps() {
    let bed = bed();
    let paused = start_paused(&bed.engine, "exec-1").await;
    assert_eq!(bed.counter.load(Ordering::SeqCst), 1);

    bed.engine.signal("tok1", json!({})).await.unwrap();
    // The counting agent before the hook ran exactly once
    assert_eq!(bed.counter.load(Ordering::SeqCst), 1);

    let done = bed.engine.status(&paused.run_id).await.unwrap();
    assert_eq!(done.context.steps["t1"], json!({"calls": 1}));
}

#[tokio::test]
async fn second_signal_with_the_same_token_is_a_noop() {
    // P3: signal uniqueness
    let bed = bed();
    start_paused(&bed.engine, "exec-1").await;

    let first = bed.engine.signal("tok1", json!({"n": 1})).await.unwrap();
    assert_eq!(first.status, RunStatus::Completed);

    let second = bed.engine.signal("tok1", json!({"n": 2})).await.unwrap();
    assert_eq!(second.status, RunStatus::Completed);
    // The first payload is what the hook recorded
    assert_eq!(second.context.steps["h"], json!({"n": 1}));
}

#[tokio::test]
async fn unknown_token_is_not_found() {
    let bed = bed();
    let err = bed.engine.signal("ghost", json!({})).await.unwrap_err();
    assert!(matches!(err, EngineError::TokenNotFound(_)));
}

#[tokio::test]
async fn status_of_unknown_run_is_not_found() {
    let bed = bed();
    let err = bed.engine.status("run-unknown").await.unwrap_err();
    assert!(matches!(err, EngineError::RunNotFound(_)));
}

#[tokio::test]
async fn start_requires_an_execution_id() {
    let bed = bed();
    let err = bed
        .engine
        .start(StartRequest::new(hook_plan(), "  "))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn start_rejects_invalid_plans() {
    let bed = bed();
    let bad = plan(json!({
        "steps": [
            {"type": "agent", "agent": "now", "id": "dup"},
            {"type": "agent", "agent": "now", "id": "dup"},
        ],
    }));
    let err = bed
        .engine
        .start(StartRequest::new(bad, "exec-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn plan_level_hook_tokens_win_over_step_tokens() {
    let bed = bed();
    let paused = start_paused(&bed.engine, "exec-1").await;
    // Step declared "placeholder" but the start request overrode it
    assert_eq!(paused.hook_token(), Some("tok1"));
}

#[tokio::test]
async fn cancelling_a_paused_run_fails_it() {
    let bed = bed();
    let paused = start_paused(&bed.engine, "exec-1").await;
    let cancelled = bed.engine.cancel(&paused.run_id).await.unwrap();
    assert_eq!(cancelled.status, RunStatus::Failed);
    assert!(cancelled.error.unwrap().message.contains("cancelled"));

    // Terminal runs stay terminal (P2); a late signal finds no waiter
    let err = bed.engine.signal("tok1", json!({})).await.unwrap_err();
    assert!(matches!(err, EngineError::TokenNotFound(_)));
}

#[tokio::test]
async fn cancel_on_a_terminal_run_is_a_noop() {
    let bed = bed();
    let done = bed
        .engine
        .start(StartRequest::new(
            plan(json!({"steps": [{"type": "agent", "agent": "now", "id": "t"}]})),
            "exec-1",
        ))
        .await
        .unwrap();
    assert_eq!(done.status, RunStatus::Completed);
    let again = bed.engine.cancel(&done.run_id).await.unwrap();
    assert_eq!(again.status, RunStatus::Completed);
}

#[tokio::test]
async fn hook_timeout_fails_the_paused_run() {
    let bed = bed();
    let request = StartRequest::new(
        plan(json!({
            "hookTimeout": 100,
            "steps": [{"type": "hook", "token": "tok-timeout", "id": "h"}],
        })),
        "exec-1",
    );
    let paused = bed.engine.start(request).await.unwrap();
    assert_eq!(paused.status, RunStatus::Paused);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let failed = bed.engine.status(&paused.run_id).await.unwrap();
    assert_eq!(failed.status, RunStatus::Failed);
    assert!(failed.error.unwrap().message.contains("timed out"));
}

#[tokio::test]
async fn overdue_hooks_are_failed_by_the_tick() {
    let bed = bed();
    let request = StartRequest::new(
        plan(json!({
            "hookTimeout": 1,
            "steps": [{"type": "hook", "token": "tok-tick", "id": "h"}],
        })),
        "exec-1",
    );
    let paused = bed.engine.start(request).await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    // The tick-based sweep covers hosts without the in-process watchdog
    let failed = bed.engine.fail_overdue_hooks().await.unwrap();
    // The watchdog may have won the race; either way the run is failed
    assert!(failed <= 1);
    let run = bed.engine.status(&paused.run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}

#[tokio::test]
async fn due_timers_resume_via_the_tick() {
    let bed = bed();
    let paused = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "steps": [
                    {"type": "sleep", "duration": 1200},
                    {"type": "agent", "agent": "now", "id": "after"},
                ],
            })),
            "exec-1",
        ))
        .await
        .unwrap();
    assert_eq!(paused.status, RunStatus::Paused);

    tokio::time::sleep(Duration::from_millis(1_300)).await;
    bed.engine.resume_due_timers().await.unwrap();
    let done = bed.engine.status(&paused.run_id).await.unwrap();
    assert_eq!(done.status, RunStatus::Completed);
}
