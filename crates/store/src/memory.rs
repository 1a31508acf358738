// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory backend: tests and local mode.

use crate::error::StoreError;
use crate::job_store::JobStore;
use crate::queue_store::{QueueJobStore, QueueStepUpdate};
use crate::run_store::RunStore;
use async_trait::async_trait;
use cadre_core::{
    Clock, InternalJobRef, Job, JobUpdate, QueueJob, QueueJobStep, Run, RunStatus, SystemClock,
};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Everything in one process. Worker-index order falls out of sorting by
/// `created_at` on read.
pub struct MemoryStore<C: Clock = SystemClock> {
    clock: C,
    ttl_ms: u64,
    jobs: Mutex<HashMap<String, Job>>,
    runs: Mutex<HashMap<String, Run>>,
    queue_jobs: Mutex<HashMap<String, QueueJob>>,
}

impl MemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            ttl_ms: crate::config::DEFAULT_TTL_SECONDS * 1_000,
            jobs: Mutex::new(HashMap::new()),
            runs: Mutex::new(HashMap::new()),
            queue_jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    /// Drop job records whose `updated_at` is older than the TTL.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.epoch_ms();
        let cutoff = now.saturating_sub(self.ttl_ms);
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|_, job| job.updated_at >= cutoff);
        before - jobs.len()
    }
}

#[async_trait]
impl<C: Clock> JobStore for MemoryStore<C> {
    async fn upsert(&self, job: Job) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.lock();
        let stored = jobs.entry(job.job_id.clone()).or_insert(job);
        Ok(stored.clone())
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.lock().get(job_id).cloned())
    }

    async fn update(&self, job_id: &str, update: JobUpdate) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(format!("job {job_id}")))?;
        job.apply(update, self.clock.epoch_ms());
        Ok(job.clone())
    }

    async fn append_internal_job(
        &self,
        parent_job_id: &str,
        entry: InternalJobRef,
    ) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(parent_job_id)
            .ok_or_else(|| StoreError::NotFound(format!("job {parent_job_id}")))?;
        job.internal_jobs.push(entry);
        job.updated_at = self.clock.epoch_ms();
        Ok(())
    }

    async fn list_jobs_by_worker(&self, worker_id: &str) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.lock();
        let mut matched: Vec<Job> = jobs
            .values()
            .filter(|j| j.worker_id == worker_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.job_id.cmp(&a.job_id)));
        Ok(matched)
    }
}

#[async_trait]
impl<C: Clock> RunStore for MemoryStore<C> {
    async fn create(&self, run: Run) -> Result<(), StoreError> {
        let mut runs = self.runs.lock();
        if runs.contains_key(run.run_id.as_str()) {
            return Err(StoreError::Conflict(format!("run {}", run.run_id)));
        }
        runs.insert(run.run_id.to_string(), run);
        Ok(())
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<Run>, StoreError> {
        Ok(self.runs.lock().get(run_id).cloned())
    }

    async fn put(&self, run: Run) -> Result<(), StoreError> {
        self.runs.lock().insert(run.run_id.to_string(), run);
        Ok(())
    }

    async fn list_by_status(&self, status: RunStatus) -> Result<Vec<Run>, StoreError> {
        let runs = self.runs.lock();
        let mut matched: Vec<Run> = runs.values().filter(|r| r.status == status).cloned().collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matched)
    }

    async fn find_by_hook_token(&self, token: &str) -> Result<Option<Run>, StoreError> {
        let runs = self.runs.lock();
        Ok(runs
            .values()
            .find(|r| {
                r.status == RunStatus::Paused && r.waiting_hook_token.as_deref() == Some(token)
            })
            .cloned())
    }

    async fn find_by_resolved_token(&self, token: &str) -> Result<Option<Run>, StoreError> {
        let runs = self.runs.lock();
        Ok(runs.values().find(|r| r.token_resolved(token)).cloned())
    }
}

#[async_trait]
impl<C: Clock> QueueJobStore for MemoryStore<C> {
    async fn upsert_initial(
        &self,
        queue_job_id: &str,
        queue_id: &str,
        first_step: QueueJobStep,
        metadata: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let mut queue_jobs = self.queue_jobs.lock();
        match queue_jobs.get_mut(queue_job_id) {
            Some(existing) => {
                if existing.steps.is_empty() {
                    existing.steps.push(first_step);
                }
                existing.updated_at = now;
            }
            None => {
                queue_jobs.insert(
                    queue_job_id.to_string(),
                    QueueJob::started(queue_job_id, queue_id, first_step, metadata, now),
                );
            }
        }
        Ok(())
    }

    async fn get_queue_job(&self, queue_job_id: &str) -> Result<Option<QueueJob>, StoreError> {
        Ok(self.queue_jobs.lock().get(queue_job_id).cloned())
    }

    async fn update_queue_step(
        &self,
        queue_job_id: &str,
        update: QueueStepUpdate,
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        if let Some(qj) = self.queue_jobs.lock().get_mut(queue_job_id) {
            qj.update_step(
                update.index,
                update.status,
                update.input,
                update.output,
                update.error,
                now,
            );
        }
        Ok(())
    }

    async fn append_queue_step(
        &self,
        queue_job_id: &str,
        step: QueueJobStep,
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        if let Some(qj) = self.queue_jobs.lock().get_mut(queue_job_id) {
            qj.append_step(step, now);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
