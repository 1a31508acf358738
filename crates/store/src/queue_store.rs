// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue-pipeline store contract.

use crate::error::StoreError;
use async_trait::async_trait;
use cadre_core::{JobError, QueueJob, QueueJobStep, QueueStepStatus};
use serde_json::{Map, Value};

/// Partial update for one pipeline step.
#[derive(Debug, Clone)]
pub struct QueueStepUpdate {
    pub index: usize,
    pub status: QueueStepStatus,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub error: Option<JobError>,
}

impl QueueStepUpdate {
    pub fn new(index: usize, status: QueueStepStatus) -> Self {
        Self {
            index,
            status,
            input: None,
            output: None,
            error: None,
        }
    }

    cadre_core::fluent! {
        opt input: Value;
        opt output: Value;
        opt error: JobError;
    }
}

#[async_trait]
pub trait QueueJobStore: Send + Sync {
    /// Create the pipeline record if absent; an existing record keeps its
    /// steps, gaining the first step only when it has none.
    async fn upsert_initial(
        &self,
        queue_job_id: &str,
        queue_id: &str,
        first_step: QueueJobStep,
        metadata: Map<String, Value>,
    ) -> Result<(), StoreError>;

    async fn get_queue_job(&self, queue_job_id: &str) -> Result<Option<QueueJob>, StoreError>;

    /// Merge a step outcome; missing pipelines and unknown indexes are
    /// ignored (the original store treats both as stale webhooks).
    async fn update_queue_step(
        &self,
        queue_job_id: &str,
        update: QueueStepUpdate,
    ) -> Result<(), StoreError>;

    /// Append a queued follow-up step; ignored when the pipeline is
    /// missing.
    async fn append_queue_step(
        &self,
        queue_job_id: &str,
        step: QueueJobStep,
    ) -> Result<(), StoreError>;
}
