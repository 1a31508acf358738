// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request routing: wire requests → engine/store/dispatcher calls.

use cadre_core::{Job, JobStatus, JobUpdate, QueueStepStatus, SystemClock};
use cadre_dispatch::{Dispatch, DispatchOptions};
use cadre_engine::{Engine, EngineError, RunSnapshot, StartRequest};
use cadre_store::{JobStore, QueueJobStore, QueueStepUpdate, StoreError};
use cadre_wire::{ErrorKind, HookBody, Request, Response, RunBody, WebhookResult};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Poll cadence for `TriggerWorker` with `await`.
const TRIGGER_AWAIT_INTERVAL_MS: u64 = 500;
/// Wall-clock budget for `TriggerWorker` with `await`.
const TRIGGER_AWAIT_TIMEOUT_MS: u64 = 600_000;

/// Shared daemon context for all request handlers.
#[derive(Clone)]
pub struct DaemonCtx {
    pub engine: Engine<SystemClock>,
    pub jobs: Arc<dyn JobStore>,
    pub queue_jobs: Arc<dyn QueueJobStore>,
    pub dispatcher: Arc<dyn Dispatch>,
}

fn run_body(snapshot: RunSnapshot) -> Response {
    Response::Run(RunBody {
        run_id: snapshot.run_id.to_string(),
        status: snapshot.status,
        result: snapshot.result,
        error: snapshot.error,
        hook: snapshot.hook.map(|h| HookBody { token: h.token }),
        context: snapshot.context,
        created_at: snapshot.created_at,
        updated_at: snapshot.updated_at,
        completed_at: snapshot.completed_at,
    })
}

fn engine_error(e: EngineError) -> Response {
    let kind = match &e {
        EngineError::Validation(_) => ErrorKind::Validation,
        EngineError::RunNotFound(_) | EngineError::TokenNotFound(_) => ErrorKind::NotFound,
        EngineError::Conflict(_) => ErrorKind::Conflict,
        EngineError::Store(_) | EngineError::Internal(_) => ErrorKind::Internal,
    };
    Response::error(kind, e.to_string())
}

fn store_error(e: StoreError) -> Response {
    let kind = match &e {
        StoreError::NotFound(_) => ErrorKind::NotFound,
        StoreError::Conflict(_) => ErrorKind::Conflict,
        StoreError::Config(_) => ErrorKind::Validation,
        _ => ErrorKind::Internal,
    };
    Response::error(kind, e.to_string())
}

/// Handle one request. Never returns an Err; failures become
/// [`Response::Error`].
pub async fn handle(ctx: &DaemonCtx, request: Request) -> Response {
    match request {
        Request::Orchestrate {
            config,
            execution_id,
            hook_tokens,
            input,
            messages,
        } => {
            let request = StartRequest::new(config, execution_id)
                .input(input)
                .messages(messages)
                .hook_tokens(hook_tokens);
            match ctx.engine.start(request).await {
                Ok(snapshot) => run_body(snapshot),
                Err(e) => engine_error(e),
            }
        }

        Request::GetRun { run_id } => match ctx.engine.status(&run_id).await {
            Ok(snapshot) => run_body(snapshot),
            Err(e) => engine_error(e),
        },

        Request::Signal { token, payload } => {
            if token.is_empty() {
                return Response::error(ErrorKind::Validation, "token is required");
            }
            match ctx.engine.signal(&token, payload).await {
                Ok(snapshot) => Response::Signalled {
                    success: true,
                    run_id: snapshot.run_id.to_string(),
                },
                Err(e) => engine_error(e),
            }
        }

        Request::CancelRun { run_id } => match ctx.engine.cancel(&run_id).await {
            Ok(snapshot) => run_body(snapshot),
            Err(e) => engine_error(e),
        },

        Request::TriggerWorker {
            worker_id,
            input,
            awaited,
            job_id,
            webhook_url,
            delay_seconds,
            metadata,
        } => {
            trigger_worker(
                ctx,
                &worker_id,
                input,
                awaited,
                job_id,
                webhook_url,
                delay_seconds,
                metadata,
            )
            .await
        }

        Request::CreateWorkerJob {
            worker_id,
            job_id,
            input,
        } => {
            let now = now_ms();
            match ctx
                .jobs
                .upsert(Job::queued(&job_id, &worker_id, input, Map::new(), now))
                .await
            {
                Ok(job) => Response::Job(job),
                Err(e) => store_error(e),
            }
        }

        Request::UpdateWorkerJob {
            job_id,
            status,
            metadata,
            output,
            error,
            ..
        } => {
            let update = JobUpdate {
                status,
                output,
                error,
                metadata,
                ..JobUpdate::default()
            };
            match ctx.jobs.update(&job_id, update).await {
                Ok(job) => Response::Job(job),
                Err(e) => store_error(e),
            }
        }

        Request::WorkerWebhook {
            job_id,
            worker_id,
            status,
            output,
            error,
            metadata,
        } => worker_webhook(ctx, job_id, worker_id, status, output, error, metadata).await,

        Request::GetWorkerJob { job_id, .. } => match ctx.jobs.get(&job_id).await {
            Ok(Some(job)) => Response::Job(job),
            Ok(None) => Response::error(ErrorKind::NotFound, format!("job {job_id} not found")),
            Err(e) => store_error(e),
        },

        Request::ListWorkerJobs { worker_id } => {
            match ctx.jobs.list_jobs_by_worker(&worker_id).await {
                Ok(jobs) => Response::Jobs { jobs },
                Err(e) => store_error(e),
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn trigger_worker(
    ctx: &DaemonCtx,
    worker_id: &str,
    input: Value,
    awaited: bool,
    job_id: Option<String>,
    webhook_url: Option<String>,
    delay_seconds: Option<u64>,
    metadata: Map<String, Value>,
) -> Response {
    let mut options = DispatchOptions::default().metadata(metadata);
    if let Some(job_id) = job_id {
        options = options.job_id(job_id);
    }
    if let Some(url) = webhook_url {
        options = options.webhook_url(url);
    }
    // Delay applies to fire-and-forget only
    if !awaited {
        if let Some(secs) = delay_seconds {
            options = options.delay(Duration::from_secs(secs));
        }
    }

    let receipt = match ctx.dispatcher.dispatch(worker_id, input, options).await {
        Ok(receipt) => receipt,
        Err(e @ cadre_dispatch::DispatchError::InvalidDelay(_)) => {
            return Response::error(ErrorKind::Validation, e.to_string());
        }
        Err(e) => return Response::error(ErrorKind::Dispatch, e.to_string()),
    };

    if !awaited {
        return Response::Dispatched {
            job_id: receipt.job_id,
            status: receipt.status,
            message_id: Some(receipt.message_id.to_string()),
            output: None,
        };
    }

    let started = std::time::Instant::now();
    loop {
        match ctx.jobs.get(&receipt.job_id).await {
            Ok(Some(job)) if job.is_terminal() => {
                return match job.status {
                    JobStatus::Completed => Response::Dispatched {
                        job_id: receipt.job_id,
                        status: job.status,
                        message_id: Some(receipt.message_id.to_string()),
                        output: job.output,
                    },
                    _ => {
                        let message = job
                            .error
                            .map(|e| e.message)
                            .unwrap_or_else(|| "worker job failed".to_string());
                        Response::error(ErrorKind::Internal, message)
                    }
                };
            }
            Ok(_) => {}
            Err(e) => return store_error(e),
        }
        if started.elapsed().as_millis() as u64 >= TRIGGER_AWAIT_TIMEOUT_MS {
            return Response::error(
                ErrorKind::Timeout,
                format!("timed out waiting for job {}", receipt.job_id),
            );
        }
        tokio::time::sleep(Duration::from_millis(TRIGGER_AWAIT_INTERVAL_MS)).await;
    }
}

/// Completion callback intake. Applies the terminal state to the job
/// record (idempotently) and forwards queue-pipeline step updates when
/// the metadata names one.
async fn worker_webhook(
    ctx: &DaemonCtx,
    job_id: String,
    worker_id: String,
    status: WebhookResult,
    output: Option<Value>,
    error: Option<cadre_core::JobError>,
    metadata: Option<Map<String, Value>>,
) -> Response {
    let job_status = match status {
        WebhookResult::Success => JobStatus::Completed,
        WebhookResult::Error => JobStatus::Failed,
    };
    let update = JobUpdate {
        status: Some(job_status),
        output: output.clone(),
        error: error.clone(),
        metadata: metadata.clone(),
        ..JobUpdate::default()
    };
    match ctx.jobs.update(&job_id, update).await {
        Ok(_) => {}
        Err(StoreError::NotFound(_)) => {
            // A webhook can outrun the job record; create it terminal
            let now = now_ms();
            let mut job = Job::queued(
                &job_id,
                &worker_id,
                Value::Null,
                metadata.clone().unwrap_or_default(),
                now,
            );
            job.apply(
                JobUpdate {
                    status: Some(job_status),
                    output: output.clone(),
                    error: error.clone(),
                    ..JobUpdate::default()
                },
                now,
            );
            if let Err(e) = ctx.jobs.upsert(job).await {
                return store_error(e);
            }
        }
        Err(e) => return store_error(e),
    }

    // Queue pipelines identify their step through the job metadata
    if let Some(meta) = &metadata {
        let queue_job_id = meta.get("queueJobId").and_then(Value::as_str);
        let step_index = meta.get("stepIndex").and_then(Value::as_u64);
        if let (Some(queue_job_id), Some(step_index)) = (queue_job_id, step_index) {
            let step_status = match status {
                WebhookResult::Success => QueueStepStatus::Completed,
                WebhookResult::Error => QueueStepStatus::Failed,
            };
            let mut update = QueueStepUpdate::new(step_index as usize, step_status);
            if let Some(output) = output {
                update = update.output(output);
            }
            if let Some(error) = error {
                update = update.error(error);
            }
            if let Err(e) = ctx.queue_jobs.update_queue_step(queue_job_id, update).await {
                tracing::warn!(queue_job_id, error = %e, "queue step update failed");
            }
        }
    }

    Response::Ok
}

fn now_ms() -> u64 {
    use cadre_core::Clock;
    SystemClock.epoch_ms()
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
