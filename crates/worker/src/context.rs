// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handler-facing job context.
//!
//! The context is the only channel between a handler and the rest of the
//! system: the job-store façade for its own record, lookups of other
//! jobs, and `dispatch_worker` for worker-to-worker calls (fire-and-forget
//! or awaited via job-store polling).

use crate::error::WorkerError;
use cadre_core::{InternalJobRef, Job, JobUpdate, PARENT_JOB_ID_KEY};
use cadre_dispatch::{Dispatch, DispatchOptions, DispatchReceipt};
use cadre_store::JobStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Default poll cadence for awaited worker-to-worker calls.
pub const DEFAULT_CHILD_POLL_INTERVAL_MS: u64 = 1_000;
/// Default wall-clock budget for awaited worker-to-worker calls.
pub const DEFAULT_CHILD_POLL_TIMEOUT_MS: u64 = 600_000;

/// Options for [`JobContext::dispatch_worker`].
#[derive(Clone, Default)]
pub struct DispatchWorkerOptions {
    /// Wait for the child to reach a terminal state.
    pub awaited: bool,
    pub job_id: Option<String>,
    pub webhook_url: Option<String>,
    pub metadata: Map<String, Value>,
    pub poll_interval_ms: Option<u64>,
    pub poll_timeout_ms: Option<u64>,
}

impl DispatchWorkerOptions {
    pub fn awaited() -> Self {
        Self {
            awaited: true,
            ..Self::default()
        }
    }

    cadre_core::fluent! {
        set metadata: Map<String, Value>;
        opt job_id: String;
        opt webhook_url: String;
        opt poll_interval_ms: u64;
        opt poll_timeout_ms: u64;
    }
}

/// Result of a worker-to-worker dispatch.
#[derive(Debug, Clone)]
pub enum DispatchWorkerOutcome {
    /// Fire-and-forget: the child is queued.
    Queued(DispatchReceipt),
    /// Awaited: the child completed with this output.
    Completed { job_id: String, output: Value },
}

/// Context handed to a [`crate::WorkerHandler`].
pub struct JobContext {
    job_id: String,
    worker_id: String,
    request_id: Option<String>,
    jobs: Arc<dyn JobStore>,
    dispatcher: Arc<dyn Dispatch>,
}

impl JobContext {
    pub fn new(
        job_id: impl Into<String>,
        worker_id: impl Into<String>,
        request_id: Option<String>,
        jobs: Arc<dyn JobStore>,
        dispatcher: Arc<dyn Dispatch>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            worker_id: worker_id.into(),
            request_id,
            jobs,
            dispatcher,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Merge a partial update into this job's record (progress, metadata).
    pub async fn update(&self, update: JobUpdate) -> Result<(), WorkerError> {
        self.jobs.update(&self.job_id, update).await?;
        Ok(())
    }

    /// This job's current record.
    pub async fn get(&self) -> Result<Option<Job>, WorkerError> {
        Ok(self.jobs.get(&self.job_id).await?)
    }

    /// Any job's record, e.g. a child dispatched earlier.
    pub async fn get_job(&self, job_id: &str) -> Result<Option<Job>, WorkerError> {
        Ok(self.jobs.get(job_id).await?)
    }

    /// Record a child reference on this job.
    pub async fn append_internal_job(&self, entry: InternalJobRef) -> Result<(), WorkerError> {
        self.jobs.append_internal_job(&self.job_id, entry).await?;
        Ok(())
    }

    /// Dispatch another worker from inside a handler.
    ///
    /// The child's metadata records this job as `parentJobId`, and the
    /// child lands in this job's `internal_jobs`. With `awaited`, polls
    /// the job store until the child is terminal and returns its output
    /// (or its error as a handler failure).
    pub async fn dispatch_worker(
        &self,
        worker_id: &str,
        input: Value,
        options: DispatchWorkerOptions,
    ) -> Result<DispatchWorkerOutcome, WorkerError> {
        let mut metadata = options.metadata.clone();
        metadata.insert(
            PARENT_JOB_ID_KEY.to_string(),
            Value::String(self.job_id.clone()),
        );

        let mut dispatch_options = DispatchOptions::default().metadata(metadata);
        if let Some(job_id) = options.job_id.clone() {
            dispatch_options = dispatch_options.job_id(job_id);
        }
        if let Some(url) = options.webhook_url.clone() {
            dispatch_options = dispatch_options.webhook_url(url);
        }
        if let Some(request_id) = self.request_id.clone() {
            dispatch_options = dispatch_options.request_id(request_id);
        }

        let receipt = self
            .dispatcher
            .dispatch(worker_id, input, dispatch_options)
            .await?;

        self.append_internal_job(InternalJobRef {
            job_id: receipt.job_id.clone(),
            worker_id: worker_id.to_string(),
        })
        .await?;

        if !options.awaited {
            return Ok(DispatchWorkerOutcome::Queued(receipt));
        }

        let interval =
            Duration::from_millis(options.poll_interval_ms.unwrap_or(DEFAULT_CHILD_POLL_INTERVAL_MS));
        let timeout_ms = options.poll_timeout_ms.unwrap_or(DEFAULT_CHILD_POLL_TIMEOUT_MS);
        let started = std::time::Instant::now();

        loop {
            if let Some(child) = self.jobs.get(&receipt.job_id).await? {
                if child.is_terminal() {
                    return match child.error {
                        Some(error) => Err(WorkerError::Handler {
                            job_id: receipt.job_id.clone(),
                            error,
                        }),
                        None => Ok(DispatchWorkerOutcome::Completed {
                            job_id: receipt.job_id.clone(),
                            output: child.output.unwrap_or(Value::Null),
                        }),
                    };
                }
            }
            let waited_ms = started.elapsed().as_millis() as u64;
            if waited_ms >= timeout_ms {
                return Err(WorkerError::AwaitTimeout {
                    job_id: receipt.job_id.clone(),
                    waited_ms,
                });
            }
            tokio::time::sleep(interval).await;
        }
    }
}
