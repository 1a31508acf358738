// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue-message processing.

use crate::context::JobContext;
use crate::error::WorkerError;
use crate::handler::WorkerRegistry;
use cadre_core::{Clock, Job, JobError, JobStatus, JobUpdate, SystemClock};
use cadre_dispatch::{Dispatch, QueueMessage, WebhookClient, WebhookPayload};
use cadre_store::JobStore;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;

/// Consumes queue messages and drives handlers through the job lifecycle.
pub struct WorkerRuntime<C: Clock = SystemClock> {
    registry: WorkerRegistry,
    jobs: Arc<dyn JobStore>,
    dispatcher: Arc<dyn Dispatch>,
    webhooks: WebhookClient,
    clock: C,
}

impl WorkerRuntime<SystemClock> {
    pub fn new(
        registry: WorkerRegistry,
        jobs: Arc<dyn JobStore>,
        dispatcher: Arc<dyn Dispatch>,
    ) -> Self {
        Self::with_clock(registry, jobs, dispatcher, SystemClock)
    }
}

impl<C: Clock> WorkerRuntime<C> {
    pub fn with_clock(
        registry: WorkerRegistry,
        jobs: Arc<dyn JobStore>,
        dispatcher: Arc<dyn Dispatch>,
        clock: C,
    ) -> Self {
        Self {
            registry,
            jobs,
            dispatcher,
            webhooks: WebhookClient::new(),
            clock,
        }
    }

    /// Process one queue message end to end.
    ///
    /// Returns the terminal job record on success. Handler failures are
    /// recorded on the job, the webhook fires, and the error is re-thrown
    /// so the queue's redelivery policy can retry.
    pub async fn process(&self, message: QueueMessage) -> Result<Job, WorkerError> {
        let span = tracing::info_span!(
            "worker_job",
            worker_id = %message.worker_id,
            job_id = %message.job_id,
            request_id = message.context.request_id.as_deref().unwrap_or(""),
        );
        self.process_inner(message).instrument(span).await
    }

    async fn process_inner(&self, message: QueueMessage) -> Result<Job, WorkerError> {
        // Idempotency: redelivered messages for finished jobs are acked
        // without re-running the handler.
        if let Some(existing) = self.jobs.get(&message.job_id).await? {
            if existing.is_terminal() {
                tracing::info!(status = %existing.status, "job already terminal, skipping");
                return Ok(existing);
            }
        }

        let now = self.clock.epoch_ms();
        self.jobs
            .upsert(Job::queued(
                &message.job_id,
                &message.worker_id,
                message.input.clone(),
                message.metadata.clone(),
                now,
            ))
            .await?;
        self.jobs
            .update(&message.job_id, JobUpdate::status(JobStatus::Running))
            .await?;

        let Some(handler) = self.registry.get(&message.worker_id) else {
            let error = JobError::new(format!("unknown worker: {}", message.worker_id))
                .name("DispatchError");
            let job = self.finish(&message, Err(&error)).await;
            self.fire_webhook(&message, &job).await;
            return Err(WorkerError::UnknownWorker(message.worker_id));
        };

        let ctx = JobContext::new(
            message.job_id.clone(),
            message.worker_id.clone(),
            message.context.request_id.clone(),
            Arc::clone(&self.jobs),
            Arc::clone(&self.dispatcher),
        );

        let started = std::time::Instant::now();
        let result = handler.handle(&ctx, message.input.clone()).await;
        let result = result.and_then(|output| match handler.check_output(&output) {
            Ok(()) => Ok(output),
            Err(reason) => Err(JobError::new(format!("output validation failed: {reason}"))
                .name("OutputValidationError")),
        });
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let job = match &result {
            Ok(output) => {
                tracing::info!(elapsed_ms, "handler completed");
                self.finish(&message, Ok(output)).await
            }
            Err(error) => {
                tracing::error!(elapsed_ms, error = %error, "handler failed");
                self.finish(&message, Err(error)).await
            }
        };

        self.fire_webhook(&message, &job).await;

        match result {
            Ok(_) => Ok(job),
            Err(error) => Err(WorkerError::Handler {
                job_id: message.job_id,
                error,
            }),
        }
    }

    /// Terminal write. Store failures log and fail open: the webhook
    /// still fires with the locally-built record, and idempotency keeps a
    /// later successful write from duplicating effects.
    async fn finish(&self, message: &QueueMessage, result: Result<&Value, &JobError>) -> Job {
        let update = match result {
            Ok(output) => JobUpdate::completed(output.clone()),
            Err(error) => JobUpdate::failed(error.clone()),
        };
        match self.jobs.update(&message.job_id, update.clone()).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(error = %e, "terminal job-store write failed");
                let mut job = Job::queued(
                    &message.job_id,
                    &message.worker_id,
                    message.input.clone(),
                    message.metadata.clone(),
                    self.clock.epoch_ms(),
                );
                job.status = JobStatus::Running;
                job.apply(update, self.clock.epoch_ms());
                job
            }
        }
    }

    async fn fire_webhook(&self, message: &QueueMessage, job: &Job) {
        if let Some(url) = &message.webhook_url {
            self.webhooks.notify(url, &WebhookPayload::from_job(job)).await;
        }
    }

    /// Consume a local queue until it closes (dev mode). Failed messages
    /// are logged; there is no redelivery locally.
    pub fn spawn_consumer(
        self: Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<QueueMessage>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = self.process(message).await {
                    tracing::warn!(error = %e, "local worker job failed");
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
