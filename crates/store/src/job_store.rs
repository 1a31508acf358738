// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker job store contract.
//!
//! The worker runtime, the dispatcher, and the orchestration interpreter
//! all talk to jobs through this trait; backends differ only in where the
//! records live.

use crate::error::StoreError;
use async_trait::async_trait;
use cadre_core::{InternalJobRef, Job, JobUpdate};

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create the record if absent; an existing record is returned
    /// unchanged (dispatch and redelivery both land here).
    async fn upsert(&self, job: Job) -> Result<Job, StoreError>;

    async fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError>;

    /// Merge a partial update into an existing record, refreshing
    /// `updated_at` and applying the terminal-once rules. `NotFound` when
    /// the record does not exist.
    async fn update(&self, job_id: &str, update: JobUpdate) -> Result<Job, StoreError>;

    /// Atomically append a child reference to the parent's
    /// `internal_jobs` list.
    async fn append_internal_job(
        &self,
        parent_job_id: &str,
        entry: InternalJobRef,
    ) -> Result<(), StoreError>;

    /// Jobs for a worker, most recent first.
    async fn list_jobs_by_worker(&self, worker_id: &str) -> Result<Vec<Job>, StoreError>;
}
