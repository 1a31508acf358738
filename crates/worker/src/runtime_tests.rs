// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::context::{DispatchWorkerOptions, DispatchWorkerOutcome};
use crate::handler::WorkerHandler;
use async_trait::async_trait;
use cadre_core::FakeClock;
use cadre_dispatch::{Dispatcher, LocalQueue, MessageContext};
use cadre_store::MemoryStore;
use serde_json::{json, Map};
use std::sync::atomic::{AtomicUsize, Ordering};

struct EchoWorker;

#[async_trait]
impl WorkerHandler for EchoWorker {
    fn id(&self) -> &str {
        "echo"
    }

    async fn handle(&self, _ctx: &JobContext, input: Value) -> Result<Value, JobError> {
        Ok(json!({"echo": input}))
    }
}

struct FailingWorker;

#[async_trait]
impl WorkerHandler for FailingWorker {
    fn id(&self) -> &str {
        "broken"
    }

    async fn handle(&self, _ctx: &JobContext, _input: Value) -> Result<Value, JobError> {
        Err(JobError::new("handler exploded").name("HandlerError"))
    }
}

struct CountingWorker(AtomicUsize);

#[async_trait]
impl WorkerHandler for CountingWorker {
    fn id(&self) -> &str {
        "counter"
    }

    async fn handle(&self, _ctx: &JobContext, _input: Value) -> Result<Value, JobError> {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({"executions": n}))
    }
}

struct PickyWorker;

#[async_trait]
impl WorkerHandler for PickyWorker {
    fn id(&self) -> &str {
        "picky"
    }

    async fn handle(&self, _ctx: &JobContext, _input: Value) -> Result<Value, JobError> {
        Ok(json!("not an object"))
    }

    fn check_output(&self, output: &Value) -> Result<(), String> {
        if output.is_object() {
            Ok(())
        } else {
            Err("expected an object".to_string())
        }
    }
}

struct Harness {
    runtime: Arc<WorkerRuntime<FakeClock>>,
    jobs: Arc<MemoryStore<FakeClock>>,
    registry: WorkerRegistry,
}

fn harness() -> Harness {
    let clock = FakeClock::new();
    let jobs = Arc::new(MemoryStore::with_clock(clock.clone()));
    let (queue, _rx) = LocalQueue::new();
    let dispatcher: Arc<dyn Dispatch> =
        Arc::new(Dispatcher::with_clock(Arc::new(queue), clock.clone()));
    let registry = WorkerRegistry::new();
    registry.register(Arc::new(EchoWorker));
    registry.register(Arc::new(FailingWorker));
    registry.register(Arc::new(PickyWorker));
    let runtime = Arc::new(WorkerRuntime::with_clock(
        registry.clone(),
        jobs.clone() as Arc<dyn JobStore>,
        dispatcher,
        clock,
    ));
    Harness {
        runtime,
        jobs,
        registry,
    }
}

fn message(worker_id: &str, job_id: &str) -> QueueMessage {
    QueueMessage {
        worker_id: worker_id.to_string(),
        job_id: job_id.to_string(),
        input: json!({"n": 1}),
        context: MessageContext::default(),
        webhook_url: None,
        metadata: Map::new(),
        timestamp: 1_000,
    }
}

#[tokio::test]
async fn successful_handler_completes_the_job() {
    let h = harness();
    let job = h.runtime.process(message("echo", "j1")).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.output, Some(json!({"echo": {"n": 1}})));
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn failing_handler_records_the_error_and_rethrows() {
    let h = harness();
    let err = h.runtime.process(message("broken", "j1")).await.unwrap_err();
    assert!(matches!(err, WorkerError::Handler { .. }));

    let job = h.jobs.get("j1").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_ref().unwrap().message, "handler exploded");
}

#[tokio::test]
async fn redelivery_short_circuits_on_terminal_jobs() {
    let h = harness();
    let counter = Arc::new(CountingWorker(AtomicUsize::new(0)));
    h.registry.register(counter.clone());

    let first = h.runtime.process(message("counter", "j1")).await.unwrap();
    assert_eq!(first.output, Some(json!({"executions": 1})));

    // Second delivery of the same jobId must not re-run the handler
    let second = h.runtime.process(message("counter", "j1")).await.unwrap();
    assert_eq!(second.output, Some(json!({"executions": 1})));
    assert_eq!(counter.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_worker_fails_the_job() {
    let h = harness();
    let err = h.runtime.process(message("ghost", "j1")).await.unwrap_err();
    assert!(matches!(err, WorkerError::UnknownWorker(_)));
    let job = h.jobs.get("j1").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
}

#[tokio::test]
async fn output_validation_failures_fail_the_job() {
    let h = harness();
    let err = h.runtime.process(message("picky", "j1")).await.unwrap_err();
    match err {
        WorkerError::Handler { error, .. } => {
            assert_eq!(error.name.as_deref(), Some("OutputValidationError"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

struct FanOutWorker;

#[async_trait]
impl WorkerHandler for FanOutWorker {
    fn id(&self) -> &str {
        "fan-out"
    }

    async fn handle(&self, ctx: &JobContext, input: Value) -> Result<Value, JobError> {
        let outcome = ctx
            .dispatch_worker("echo", input, DispatchWorkerOptions::default())
            .await
            .map_err(|e| JobError::new(e.to_string()))?;
        match outcome {
            DispatchWorkerOutcome::Queued(receipt) => Ok(json!({"child": receipt.job_id})),
            DispatchWorkerOutcome::Completed { .. } => Err(JobError::new("expected queued")),
        }
    }
}

#[tokio::test]
async fn worker_to_worker_dispatch_links_parent_and_child() {
    let clock = FakeClock::new();
    let jobs = Arc::new(MemoryStore::with_clock(clock.clone()));
    let (queue, mut rx) = LocalQueue::new();
    let dispatcher: Arc<dyn Dispatch> =
        Arc::new(Dispatcher::with_clock(Arc::new(queue), clock.clone()));
    let registry = WorkerRegistry::new();
    registry.register(Arc::new(FanOutWorker));
    registry.register(Arc::new(EchoWorker));
    let runtime = Arc::new(WorkerRuntime::with_clock(
        registry,
        jobs.clone() as Arc<dyn JobStore>,
        dispatcher,
        clock,
    ));

    let parent = runtime.process(message("fan-out", "parent-1")).await.unwrap();
    let child_ref = &parent.internal_jobs[0];
    assert_eq!(child_ref.worker_id, "echo");

    // The child message is on the queue with the parent recorded
    let child_message = rx.recv().await.unwrap();
    assert_eq!(child_message.job_id, child_ref.job_id);
    assert_eq!(
        child_message.metadata.get("parentJobId"),
        Some(&json!("parent-1"))
    );

    // Run the child and verify linkage end to end
    let child = runtime.process(child_message).await.unwrap();
    assert_eq!(child.parent_job_id(), Some("parent-1"));
    assert_eq!(child.status, JobStatus::Completed);
}

struct AwaitingWorker;

#[async_trait]
impl WorkerHandler for AwaitingWorker {
    fn id(&self) -> &str {
        "awaiting"
    }

    async fn handle(&self, ctx: &JobContext, input: Value) -> Result<Value, JobError> {
        let outcome = ctx
            .dispatch_worker(
                "echo",
                input,
                DispatchWorkerOptions::awaited()
                    .poll_interval_ms(10u64)
                    .poll_timeout_ms(5_000u64),
            )
            .await
            .map_err(|e| JobError::new(e.to_string()))?;
        match outcome {
            DispatchWorkerOutcome::Completed { output, .. } => Ok(output),
            DispatchWorkerOutcome::Queued(_) => Err(JobError::new("expected completion")),
        }
    }
}

#[tokio::test]
async fn awaited_child_jobs_return_their_output() {
    let clock = FakeClock::new();
    let jobs = Arc::new(MemoryStore::with_clock(clock.clone()));
    let (queue, rx) = LocalQueue::new();
    let dispatcher: Arc<dyn Dispatch> =
        Arc::new(Dispatcher::with_clock(Arc::new(queue), clock.clone()));
    let registry = WorkerRegistry::new();
    registry.register(Arc::new(AwaitingWorker));
    registry.register(Arc::new(EchoWorker));
    let runtime = Arc::new(WorkerRuntime::with_clock(
        registry,
        jobs.clone() as Arc<dyn JobStore>,
        dispatcher,
        clock,
    ));

    // Children are executed by the local consumer while the parent polls
    let consumer = runtime.clone().spawn_consumer(rx);

    let parent = runtime.process(message("awaiting", "parent-1")).await.unwrap();
    assert_eq!(parent.status, JobStatus::Completed);
    assert_eq!(parent.output, Some(json!({"echo": {"n": 1}})));
    consumer.abort();
}
