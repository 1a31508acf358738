// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document backend: one JSON document per record under the state dir.
//!
//! Layout:
//! ```text
//! <state_dir>/runs/<run_id>.json
//! <state_dir>/worker_jobs/<job_id>.json
//! <state_dir>/by-worker/<worker_id>/<job_id>     (index marker)
//! <state_dir>/queue_jobs/<queue_job_id>.json
//! ```
//!
//! Writes go through a temp file and rename so readers never see a torn
//! document. Mutations are serialised by a store-level async mutex; the
//! worker index is a marker file per job, so appends are atomic on their
//! own.

use crate::error::StoreError;
use crate::job_store::JobStore;
use crate::queue_store::{QueueJobStore, QueueStepUpdate};
use crate::run_store::RunStore;
use async_trait::async_trait;
use cadre_core::{
    Clock, InternalJobRef, Job, JobUpdate, QueueJob, QueueJobStep, Run, RunStatus, SystemClock,
};
use chrono::{TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct DocumentStore<C: Clock = SystemClock> {
    clock: C,
    ttl_ms: u64,
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl DocumentStore<SystemClock> {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_clock(root, SystemClock)
    }
}

impl<C: Clock> DocumentStore<C> {
    pub fn with_clock(root: impl Into<PathBuf>, clock: C) -> Self {
        Self {
            clock,
            ttl_ms: crate::config::DEFAULT_TTL_SECONDS * 1_000,
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    fn jobs_dir(&self) -> PathBuf {
        self.root.join("worker_jobs")
    }

    fn index_dir(&self, worker_id: &str) -> PathBuf {
        self.root.join("by-worker").join(file_key(worker_id))
    }

    fn queue_dir(&self) -> PathBuf {
        self.root.join("queue_jobs")
    }

    fn job_path(&self, job_id: &str) -> PathBuf {
        self.jobs_dir().join(format!("{}.json", file_key(job_id)))
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        self.runs_dir().join(format!("{}.json", file_key(run_id)))
    }

    fn queue_path(&self, id: &str) -> PathBuf {
        self.queue_dir().join(format!("{}.json", file_key(id)))
    }

    /// Delete job and queue documents whose `updated_at` is older than
    /// the TTL. Returns the number of documents removed.
    pub async fn sweep_expired(&self) -> Result<usize, StoreError> {
        let cutoff = self.clock.epoch_ms().saturating_sub(self.ttl_ms);
        let _guard = self.write_lock.lock().await;
        let mut removed = 0;

        for job in read_all::<Job>(&self.jobs_dir()).await? {
            if job.updated_at < cutoff {
                tokio::fs::remove_file(self.job_path(&job.job_id)).await.ok();
                tokio::fs::remove_file(self.index_dir(&job.worker_id).join(file_key(&job.job_id)))
                    .await
                    .ok();
                removed += 1;
            }
        }
        for qj in read_all::<QueueJob>(&self.queue_dir()).await? {
            if qj.updated_at < cutoff {
                tokio::fs::remove_file(self.queue_path(&qj.id)).await.ok();
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(
                removed,
                cutoff = %Utc.timestamp_millis_opt(cutoff as i64)
                    .single()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
                "expired documents swept"
            );
        }
        Ok(removed)
    }
}

/// File-name-safe rendering of an id. Ids are opaque caller strings, so
/// anything outside `[A-Za-z0-9._-]` maps to `_`.
fn file_key(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

async fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn read_all<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, StoreError> {
    let mut out = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match read_document::<T>(&path).await {
            Ok(Some(value)) => out.push(value),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable document");
            }
        }
    }
    Ok(out)
}

#[async_trait]
impl<C: Clock> JobStore for DocumentStore<C> {
    async fn upsert(&self, job: Job) -> Result<Job, StoreError> {
        let _guard = self.write_lock.lock().await;
        if let Some(existing) = read_document::<Job>(&self.job_path(&job.job_id)).await? {
            return Ok(existing);
        }
        write_document(&self.job_path(&job.job_id), &job).await?;
        let marker = self.index_dir(&job.worker_id).join(file_key(&job.job_id));
        if let Some(parent) = marker.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&marker, b"").await?;
        Ok(job)
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        read_document(&self.job_path(job_id)).await
    }

    async fn update(&self, job_id: &str, update: JobUpdate) -> Result<Job, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut job = read_document::<Job>(&self.job_path(job_id))
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("job {job_id}")))?;
        job.apply(update, self.clock.epoch_ms());
        write_document(&self.job_path(job_id), &job).await?;
        Ok(job)
    }

    async fn append_internal_job(
        &self,
        parent_job_id: &str,
        entry: InternalJobRef,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut job = read_document::<Job>(&self.job_path(parent_job_id))
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("job {parent_job_id}")))?;
        job.internal_jobs.push(entry);
        job.updated_at = self.clock.epoch_ms();
        write_document(&self.job_path(parent_job_id), &job).await
    }

    async fn list_jobs_by_worker(&self, worker_id: &str) -> Result<Vec<Job>, StoreError> {
        let mut jobs = Vec::new();
        let dir = self.index_dir(worker_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(jobs),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(job_id) = name.to_str() else { continue };
            if let Some(job) = read_document::<Job>(&self.jobs_dir().join(format!("{job_id}.json")))
                .await?
            {
                jobs.push(job);
            }
        }
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.job_id.cmp(&a.job_id)));
        Ok(jobs)
    }
}

#[async_trait]
impl<C: Clock> RunStore for DocumentStore<C> {
    async fn create(&self, run: Run) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.run_path(&run.run_id);
        if read_document::<Run>(&path).await?.is_some() {
            return Err(StoreError::Conflict(format!("run {}", run.run_id)));
        }
        write_document(&path, &run).await
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<Run>, StoreError> {
        read_document(&self.run_path(run_id)).await
    }

    async fn put(&self, run: Run) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        write_document(&self.run_path(&run.run_id), &run).await
    }

    async fn list_by_status(&self, status: RunStatus) -> Result<Vec<Run>, StoreError> {
        let mut runs: Vec<Run> = read_all::<Run>(&self.runs_dir())
            .await?
            .into_iter()
            .filter(|r| r.status == status)
            .collect();
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(runs)
    }

    async fn find_by_hook_token(&self, token: &str) -> Result<Option<Run>, StoreError> {
        Ok(read_all::<Run>(&self.runs_dir()).await?.into_iter().find(|r| {
            r.status == RunStatus::Paused && r.waiting_hook_token.as_deref() == Some(token)
        }))
    }

    async fn find_by_resolved_token(&self, token: &str) -> Result<Option<Run>, StoreError> {
        Ok(read_all::<Run>(&self.runs_dir())
            .await?
            .into_iter()
            .find(|r| r.token_resolved(token)))
    }
}

#[async_trait]
impl<C: Clock> QueueJobStore for DocumentStore<C> {
    async fn upsert_initial(
        &self,
        queue_job_id: &str,
        queue_id: &str,
        first_step: QueueJobStep,
        metadata: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let _guard = self.write_lock.lock().await;
        let path = self.queue_path(queue_job_id);
        let qj = match read_document::<QueueJob>(&path).await? {
            Some(mut existing) => {
                if existing.steps.is_empty() {
                    existing.steps.push(first_step);
                }
                existing.updated_at = now;
                existing
            }
            None => QueueJob::started(queue_job_id, queue_id, first_step, metadata, now),
        };
        write_document(&path, &qj).await
    }

    async fn get_queue_job(&self, queue_job_id: &str) -> Result<Option<QueueJob>, StoreError> {
        read_document(&self.queue_path(queue_job_id)).await
    }

    async fn update_queue_step(
        &self,
        queue_job_id: &str,
        update: QueueStepUpdate,
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let _guard = self.write_lock.lock().await;
        let path = self.queue_path(queue_job_id);
        if let Some(mut qj) = read_document::<QueueJob>(&path).await? {
            qj.update_step(
                update.index,
                update.status,
                update.input,
                update.output,
                update.error,
                now,
            );
            write_document(&path, &qj).await?;
        }
        Ok(())
    }

    async fn append_queue_step(
        &self,
        queue_job_id: &str,
        step: QueueJobStep,
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let _guard = self.write_lock.lock().await;
        let path = self.queue_path(queue_job_id);
        if let Some(mut qj) = read_document::<QueueJob>(&path).await? {
            qj.append_step(step, now);
            write_document(&path, &qj).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
