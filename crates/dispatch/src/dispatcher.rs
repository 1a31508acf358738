// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker job dispatch.

use crate::env::{webhook_base_url, webhook_url_for};
use crate::error::DispatchError;
use crate::message::{MessageContext, QueueMessage};
use crate::queue::QueueAdapter;
use async_trait::async_trait;
use cadre_core::{Clock, JobId, JobStatus, MessageId, SystemClock};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Object-safe dispatch surface for callers that hold the dispatcher
/// behind a trait object (worker contexts, the interpreter).
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(
        &self,
        worker_id: &str,
        input: Value,
        options: DispatchOptions,
    ) -> Result<DispatchReceipt, DispatchError>;
}

/// Upper bound on per-message delay, matching the queue facility.
pub const MAX_DELAY_SECONDS: u64 = 900;

/// Options for a single dispatch.
#[derive(Default, Clone)]
pub struct DispatchOptions {
    /// Bring-your-own job id; generated when absent.
    pub job_id: Option<String>,
    /// Completion callback URL. Defaults from `WORKFLOW_WEBHOOK_BASE_URL`.
    pub webhook_url: Option<String>,
    /// Fire-and-forget delay (0–900s); callers that await leave this
    /// unset.
    pub delay: Option<Duration>,
    pub metadata: Map<String, Value>,
    pub request_id: Option<String>,
}

impl DispatchOptions {
    cadre_core::fluent! {
        set metadata: Map<String, Value>;
        opt job_id: String;
        opt webhook_url: String;
        opt delay: Duration;
        opt request_id: String;
    }
}

/// Result of a dispatch: the job is queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub message_id: MessageId,
    pub job_id: String,
    pub status: JobStatus,
}

/// Enqueues work for workers. Holds no state beyond the queue adapter.
pub struct Dispatcher<C: Clock = SystemClock> {
    queue: Arc<dyn QueueAdapter>,
    clock: C,
}

impl Dispatcher<SystemClock> {
    pub fn new(queue: Arc<dyn QueueAdapter>) -> Self {
        Self::with_clock(queue, SystemClock)
    }
}

impl<C: Clock> Dispatcher<C> {
    pub fn with_clock(queue: Arc<dyn QueueAdapter>, clock: C) -> Self {
        Self { queue, clock }
    }

    /// Build the queue message and enqueue it.
    pub async fn dispatch(
        &self,
        worker_id: &str,
        input: Value,
        options: DispatchOptions,
    ) -> Result<DispatchReceipt, DispatchError> {
        if let Some(delay) = options.delay {
            let secs = delay.as_secs();
            if secs > MAX_DELAY_SECONDS {
                return Err(DispatchError::InvalidDelay(secs));
            }
        }

        let now = self.clock.epoch_ms();
        let job_id = options
            .job_id
            .unwrap_or_else(|| JobId::generate(now).into_string());
        let webhook_url = options
            .webhook_url
            .or_else(|| webhook_base_url().map(|base| webhook_url_for(&base, worker_id)));
        let context = match options.request_id {
            Some(request_id) => MessageContext::with_request_id(request_id),
            None => MessageContext::default(),
        };

        let message = QueueMessage {
            worker_id: worker_id.to_string(),
            job_id: job_id.clone(),
            input,
            context,
            webhook_url,
            metadata: options.metadata,
            timestamp: now,
        };

        tracing::info!(
            worker_id,
            job_id = %job_id,
            delay_s = options.delay.map(|d| d.as_secs()).unwrap_or(0),
            "dispatching worker job"
        );
        let message_id = self.queue.send(message, options.delay).await?;

        Ok(DispatchReceipt {
            message_id,
            job_id,
            status: JobStatus::Queued,
        })
    }
}

#[async_trait]
impl<C: Clock> Dispatch for Dispatcher<C> {
    async fn dispatch(
        &self,
        worker_id: &str,
        input: Value,
        options: DispatchOptions,
    ) -> Result<DispatchReceipt, DispatchError> {
        Dispatcher::dispatch(self, worker_id, input, options).await
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
