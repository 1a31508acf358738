// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::agents::{AgentContext, AgentError, AgentHandler, AgentRouter};
use crate::engine::StartRequest;
use crate::plans::PlanRegistry;
use async_trait::async_trait;
use cadre_core::{JobError, SystemClock};
use cadre_dispatch::{Dispatch, Dispatcher, LocalQueue};
use cadre_store::MemoryStore;
use cadre_worker::{JobContext, WorkerHandler, WorkerRegistry, WorkerRuntime};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct NowAgent;

#[async_trait]
impl AgentHandler for NowAgent {
    async fn call(&self, _ctx: &AgentContext, _input: Value) -> Result<Value, AgentError> {
        Ok(json!({"now": 1}))
    }
}

struct EchoAgent;

#[async_trait]
impl AgentHandler for EchoAgent {
    async fn call(&self, _ctx: &AgentContext, input: Value) -> Result<Value, AgentError> {
        Ok(input)
    }
}

struct ConstAgent(Value);

#[async_trait]
impl AgentHandler for ConstAgent {
    async fn call(&self, _ctx: &AgentContext, _input: Value) -> Result<Value, AgentError> {
        Ok(self.0.clone())
    }
}

struct FailingAgent;

#[async_trait]
impl AgentHandler for FailingAgent {
    async fn call(&self, _ctx: &AgentContext, _input: Value) -> Result<Value, AgentError> {
        Err(AgentError::from("agent blew up"))
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

struct QuickWorker;

#[async_trait]
impl WorkerHandler for QuickWorker {
    fn id(&self) -> &str {
        "quick"
    }

    async fn handle(&self, _ctx: &JobContext, _input: Value) -> Result<Value, JobError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(json!({"ok": 1}))
    }
}

struct StuckWorker;

#[async_trait]
impl WorkerHandler for StuckWorker {
    fn id(&self) -> &str {
        "stuck"
    }

    async fn handle(&self, _ctx: &JobContext, _input: Value) -> Result<Value, JobError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(Value::Null)
    }
}

struct BrokenWorker;

#[async_trait]
impl WorkerHandler for BrokenWorker {
    fn id(&self) -> &str {
        "broken"
    }

    async fn handle(&self, _ctx: &JobContext, _input: Value) -> Result<Value, JobError> {
        Err(JobError::new("worker blew up"))
    }
}

pub(crate) struct TestBed {
    pub engine: Engine<SystemClock>,
    pub store: Arc<MemoryStore<SystemClock>>,
    pub counter: Arc<AtomicUsize>,
    _consumer: tokio::task::JoinHandle<()>,
}

pub(crate) fn testbed() -> TestBed {
    let store = Arc::new(MemoryStore::new());
    let (queue, rx) = LocalQueue::new();
    let dispatcher: Arc<dyn Dispatch> = Arc::new(Dispatcher::new(Arc::new(queue)));

    let agents = AgentRouter::new();
    agents.register("now", Arc::new(NowAgent));
    agents.register("echo", Arc::new(EchoAgent));
    agents.register("fails", Arc::new(FailingAgent));
    agents.register("const-a", Arc::new(ConstAgent(json!({"content": "A"}))));
    agents.register("const-b", Arc::new(ConstAgent(json!({"content": "B"}))));
    agents.register("const-c", Arc::new(ConstAgent(json!({"content": "C"}))));
    agents.register(
        "approver",
        Arc::new(ConstAgent(json!({"payload": {"approved": true}}))),
    );
    agents.register(
        "rejecter",
        Arc::new(ConstAgent(json!({"payload": {"approved": false}}))),
    );
    let counter = Arc::new(AtomicUsize::new(0));
    agents.register("counting", Arc::new(CountingAgent(counter.clone())));

    let registry = WorkerRegistry::new();
    registry.register(Arc::new(QuickWorker));
    registry.register(Arc::new(StuckWorker));
    registry.register(Arc::new(BrokenWorker));
    let runtime = Arc::new(WorkerRuntime::new(
        registry,
        store.clone() as Arc<dyn cadre_store::JobStore>,
        dispatcher.clone(),
    ));
    let consumer = runtime.spawn_consumer(rx);

    let engine = Engine::new(
        store.clone(),
        store.clone(),
        dispatcher,
        agents,
        PlanRegistry::new(),
        SystemClock,
    );
    TestBed {
        engine,
        store,
        counter,
        _consumer: consumer,
    }
}

pub(crate) fn plan(value: Value) -> Plan {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn sequential_plan_completes_in_order() {
    let bed = testbed();
    let snapshot = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "steps": [
                    {"type": "agent", "agent": "const-a", "id": "s1"},
                    {"type": "agent", "agent": "const-b", "id": "s2"},
                ],
            })),
            "exec-1",
        ))
        .await
        .unwrap();

    assert_eq!(snapshot.status, RunStatus::Completed);
    assert_eq!(snapshot.context.steps["s1"], json!({"content": "A"}));
    assert_eq!(snapshot.context.previous, json!({"content": "B"}));
    assert_eq!(snapshot.result, Some(json!({"content": "B"})));
    assert_eq!(snapshot.context.all.len(), 2);
}

#[tokio::test]
async fn parallel_then_join_feeds_the_final_agent() {
    // §8 scenario 2: three parallel agents, then a templated join
    let bed = testbed();
    let snapshot = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "steps": [
                    {"type": "parallel", "steps": [
                        {"type": "agent", "agent": "const-a", "id": "c1"},
                        {"type": "agent", "agent": "const-b", "id": "c2"},
                        {"type": "agent", "agent": "const-c", "id": "c3"},
                    ]},
                    {"type": "agent", "agent": "echo", "id": "final", "input": {
                        "_fromSteps": ["c1", "c2", "c3"],
                        "_path": "content",
                        "_join": "\n",
                    }},
                ],
            })),
            "exec-2",
        ))
        .await
        .unwrap();

    assert_eq!(snapshot.status, RunStatus::Completed);
    assert_eq!(snapshot.context.steps["final"], json!("A\nB\nC"));
}

#[tokio::test]
async fn parallel_join_order_is_by_child_index() {
    // P5: previous is the last-indexed child regardless of completion time
    let bed = testbed();
    let snapshot = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "steps": [
                    {"type": "parallel", "steps": [
                        {"type": "worker", "worker": "quick", "await": true, "id": "slow",
                         "workerPoll": {"intervalMs": 20, "timeoutMs": 5000}},
                        {"type": "agent", "agent": "const-c", "id": "fast"},
                    ]},
                ],
            })),
            "exec-3",
        ))
        .await
        .unwrap();

    assert_eq!(snapshot.status, RunStatus::Completed);
    // "fast" completed long before "slow", but index order wins
    assert_eq!(snapshot.context.previous, json!({"content": "C"}));
    assert_eq!(snapshot.context.steps["slow"], json!({"ok": 1}));
}

#[tokio::test]
async fn condition_picks_then_branch_on_matching_field() {
    // §8 scenario 3
    let bed = testbed();
    let make = |agent: &str| {
        plan(json!({
            "steps": [
                {"type": "agent", "agent": agent, "id": "approval"},
                {"type": "condition",
                 "if": {"type": "stepField", "stepId": "approval", "path": "payload.approved", "op": "eq", "value": true},
                 "then": [{"type": "agent", "agent": "const-a", "id": "then-out"}],
                 "else": [{"type": "agent", "agent": "const-b", "id": "else-out"}]},
            ],
        }))
    };

    let approved = bed
        .engine
        .start(StartRequest::new(make("approver"), "exec-approved"))
        .await
        .unwrap();
    assert!(approved.context.steps.contains_key("then-out"));
    assert!(!approved.context.steps.contains_key("else-out"));

    let rejected = bed
        .engine
        .start(StartRequest::new(make("rejecter"), "exec-rejected"))
        .await
        .unwrap();
    assert!(rejected.context.steps.contains_key("else-out"));
    assert!(!rejected.context.steps.contains_key("then-out"));
}

#[tokio::test]
async fn awaited_worker_output_becomes_step_output() {
    // §8 scenario 4
    let bed = testbed();
    let snapshot = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "steps": [
                    {"type": "worker", "worker": "quick", "await": true, "id": "w",
                     "workerPoll": {"intervalMs": 50, "timeoutMs": 5000}},
                ],
            })),
            "exec-4",
        ))
        .await
        .unwrap();

    assert_eq!(snapshot.status, RunStatus::Completed);
    assert_eq!(snapshot.context.steps["w"], json!({"ok": 1}));
    assert_eq!(snapshot.context.previous["ok"], json!(1));
}

#[tokio::test]
async fn worker_poll_timeout_fails_the_run() {
    // §8 scenario 5, fail-fast variant
    let bed = testbed();
    let snapshot = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "steps": [
                    {"type": "worker", "worker": "stuck", "await": true, "id": "w",
                     "workerPoll": {"intervalMs": 50, "timeoutMs": 300}},
                ],
            })),
            "exec-5",
        ))
        .await
        .unwrap();

    assert_eq!(snapshot.status, RunStatus::Failed);
    let error = snapshot.error.unwrap();
    assert!(error.message.contains("timed out"));
}

#[tokio::test]
async fn worker_poll_timeout_is_collected_under_continue_on_error() {
    // §8 scenario 5, continueOnError variant
    let bed = testbed();
    let snapshot = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "continueOnError": true,
                "steps": [
                    {"type": "worker", "worker": "stuck", "await": true, "id": "w",
                     "workerPoll": {"intervalMs": 50, "timeoutMs": 300}},
                    {"type": "agent", "agent": "const-a", "id": "after"},
                ],
            })),
            "exec-6",
        ))
        .await
        .unwrap();

    assert_eq!(snapshot.status, RunStatus::Completed);
    assert_eq!(snapshot.context.errors.len(), 1);
    assert!(snapshot.context.steps.contains_key("after"));
}

#[tokio::test]
async fn fire_and_forget_worker_records_a_handle() {
    let bed = testbed();
    let snapshot = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "steps": [
                    {"type": "worker", "worker": "quick", "id": "handle"},
                ],
            })),
            "exec-7",
        ))
        .await
        .unwrap();

    assert_eq!(snapshot.status, RunStatus::Completed);
    let handle = &snapshot.context.steps["handle"];
    assert_eq!(handle["status"], json!("queued"));
    let job_id = handle["jobId"].as_str().unwrap().to_string();

    // The job eventually completes independently of the run
    tokio::time::sleep(Duration::from_millis(300)).await;
    let job = cadre_store::JobStore::get(bed.store.as_ref(), &job_id)
        .await
        .unwrap()
        .unwrap();
    assert!(job.is_terminal());
}

#[tokio::test]
async fn failed_worker_fails_the_step() {
    let bed = testbed();
    let snapshot = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "steps": [
                    {"type": "worker", "worker": "broken", "await": true, "id": "w",
                     "workerPoll": {"intervalMs": 20, "timeoutMs": 5000}},
                ],
            })),
            "exec-8",
        ))
        .await
        .unwrap();

    assert_eq!(snapshot.status, RunStatus::Failed);
    assert!(snapshot.error.unwrap().message.contains("worker blew up"));
}

#[tokio::test]
async fn agent_errors_fail_fast_by_default() {
    let bed = testbed();
    let snapshot = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "steps": [
                    {"type": "agent", "agent": "fails", "id": "bad"},
                    {"type": "agent", "agent": "const-a", "id": "never"},
                ],
            })),
            "exec-9",
        ))
        .await
        .unwrap();

    assert_eq!(snapshot.status, RunStatus::Failed);
    assert!(!snapshot.context.steps.contains_key("never"));
    let error = snapshot.error.unwrap();
    assert_eq!(error.step, cadre_core::StepRef::Id("bad".into()));
}

#[tokio::test]
async fn parallel_failure_cancels_fast_by_default() {
    let bed = testbed();
    let snapshot = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "steps": [
                    {"type": "parallel", "steps": [
                        {"type": "agent", "agent": "fails", "id": "bad"},
                        {"type": "worker", "worker": "quick", "await": true, "id": "slow",
                         "workerPoll": {"intervalMs": 20, "timeoutMs": 5000}},
                    ]},
                ],
            })),
            "exec-10",
        ))
        .await
        .unwrap();

    assert_eq!(snapshot.status, RunStatus::Failed);
    // The failed child's writes never landed
    assert!(!snapshot.context.steps.contains_key("slow"));
}

#[tokio::test]
async fn parallel_with_continue_on_error_settles_all_children() {
    let bed = testbed();
    let snapshot = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "continueOnError": true,
                "steps": [
                    {"type": "parallel", "steps": [
                        {"type": "agent", "agent": "const-a", "id": "c1"},
                        {"type": "agent", "agent": "fails", "id": "bad"},
                        {"type": "agent", "agent": "const-b", "id": "c3"},
                    ]},
                ],
            })),
            "exec-11",
        ))
        .await
        .unwrap();

    assert_eq!(snapshot.status, RunStatus::Completed);
    // Last successfully-completed child by index defines previous
    assert_eq!(snapshot.context.previous, json!({"content": "B"}));
    assert_eq!(snapshot.context.errors.len(), 1);
    assert_eq!(
        snapshot.context.errors[0].step,
        cadre_core::StepRef::Id("bad".into())
    );
}

#[tokio::test]
async fn short_sleeps_run_inline() {
    let bed = testbed();
    let started = std::time::Instant::now();
    let snapshot = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "steps": [
                    {"type": "sleep", "duration": 50},
                    {"type": "agent", "agent": "const-a", "id": "after"},
                ],
            })),
            "exec-12",
        ))
        .await
        .unwrap();

    assert_eq!(snapshot.status, RunStatus::Completed);
    assert!(started.elapsed() >= Duration::from_millis(45));
}

#[tokio::test]
async fn long_sleeps_pause_and_resume_via_timer() {
    let bed = testbed();
    let snapshot = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "steps": [
                    {"type": "sleep", "duration": 1500},
                    {"type": "agent", "agent": "const-a", "id": "after"},
                ],
            })),
            "exec-13",
        ))
        .await
        .unwrap();

    // The start invocation returns with the run suspended on a timer
    assert_eq!(snapshot.status, RunStatus::Paused);

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    let resumed = bed.engine.status(&snapshot.run_id).await.unwrap();
    assert_eq!(resumed.status, RunStatus::Completed);
    assert!(resumed.context.steps.contains_key("after"));
}

#[tokio::test]
async fn workflow_steps_run_child_plans() {
    let bed = testbed();
    bed.engine.plans().register(
        "child-flow",
        plan(json!({
            "steps": [{"type": "agent", "agent": "echo", "id": "inner", "input": {"from": "child"}}],
        })),
    );

    let awaited = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "steps": [
                    {"type": "workflow", "workflow": "child-flow", "id": "sub"},
                ],
            })),
            "exec-14",
        ))
        .await
        .unwrap();
    assert_eq!(awaited.status, RunStatus::Completed);
    assert_eq!(awaited.context.steps["sub"], json!({"from": "child"}));

    let fire_and_forget = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "steps": [
                    {"type": "workflow", "workflow": "child-flow", "await": false, "id": "sub"},
                ],
            })),
            "exec-15",
        ))
        .await
        .unwrap();
    assert_eq!(fire_and_forget.status, RunStatus::Completed);
    let child_run_id = fire_and_forget.context.steps["sub"]["runId"]
        .as_str()
        .unwrap()
        .to_string();

    // The reserved run id is pollable
    tokio::time::sleep(Duration::from_millis(300)).await;
    let child = bed.engine.status(&child_run_id).await.unwrap();
    assert_eq!(child.status, RunStatus::Completed);
}

#[tokio::test]
async fn unknown_workflow_fails_the_step() {
    let bed = testbed();
    let snapshot = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "steps": [{"type": "workflow", "workflow": "ghost", "id": "sub"}],
            })),
            "exec-16",
        ))
        .await
        .unwrap();
    assert_eq!(snapshot.status, RunStatus::Failed);
    assert!(snapshot.error.unwrap().message.contains("unknown workflow"));
}

#[tokio::test]
async fn plan_timeout_bounds_the_run() {
    let bed = testbed();
    let snapshot = bed
        .engine
        .start(StartRequest::new(
            plan(json!({
                "timeout": 20,
                "steps": [
                    {"type": "sleep", "duration": 100},
                    {"type": "agent", "agent": "const-a", "id": "late"},
                ],
            })),
            "exec-17",
        ))
        .await
        .unwrap();

    assert_eq!(snapshot.status, RunStatus::Failed);
    assert!(snapshot.error.unwrap().message.contains("plan timeout"));
}

#[tokio::test]
async fn closure_inputs_and_conditions_work_in_process() {
    use cadre_plan::{InputSpec, PlanBuilder, StepOpts};

    let bed = testbed();
    let built = PlanBuilder::new()
        .agent("const-a", None, StepOpts::id("first"))
        .condition(
            cadre_plan::Condition::from_fn(|ctx| ctx.steps["first"]["content"] == json!("A")),
            vec![serde_json::from_value(
                json!({"type": "agent", "agent": "echo", "id": "taken", "input": {"ok": true}}),
            )
            .unwrap()],
            None,
        )
        .agent(
            "echo",
            InputSpec::from_fn(|ctx| json!({"prev": ctx.previous})),
            StepOpts::id("mapped"),
        )
        .build();

    let snapshot = bed
        .engine
        .start(StartRequest::new(built, "exec-18"))
        .await
        .unwrap();

    assert_eq!(snapshot.status, RunStatus::Completed);
    assert_eq!(snapshot.context.steps["taken"], json!({"ok": true}));
    assert_eq!(
        snapshot.context.steps["mapped"],
        json!({"prev": {"ok": true}})
    );
}
