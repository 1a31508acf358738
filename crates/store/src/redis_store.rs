// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis backend.
//!
//! One hash per job for scalar fields; `internal_jobs` lives in a separate
//! list key so appends are a single atomic `RPUSH`; a set per worker
//! maintains the by-worker index. Runs and queue pipelines are stored as
//! JSON strings with secondary index keys for status and hook-token
//! lookups. TTL is enforced with `EXPIRE` on every write.

use crate::error::StoreError;
use crate::job_store::JobStore;
use crate::queue_store::{QueueJobStore, QueueStepUpdate};
use crate::run_store::RunStore;
use async_trait::async_trait;
use cadre_core::{
    Clock, InternalJobRef, Job, JobError, JobStatus, JobUpdate, QueueJob, QueueJobStep, Run,
    RunStatus, SystemClock,
};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub struct RedisStore<C: Clock = SystemClock> {
    manager: ConnectionManager,
    prefix: String,
    ttl_secs: i64,
    clock: C,
}

impl RedisStore<SystemClock> {
    /// Connect with the system clock.
    pub async fn connect(
        url: &str,
        prefix: impl Into<String>,
        ttl_secs: u64,
    ) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self {
            manager,
            prefix: prefix.into(),
            ttl_secs: ttl_secs as i64,
            clock: SystemClock,
        })
    }
}

impl<C: Clock> RedisStore<C> {
    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }

    fn job_key(&self, job_id: &str) -> String {
        format!("{}{}", self.prefix, job_id)
    }

    /// Separate list key for internal job refs; each RPUSH is atomic so
    /// appends never race the hash writes.
    fn internal_key(&self, job_id: &str) -> String {
        format!("{}{}:internal", self.prefix, job_id)
    }

    fn worker_index_key(&self, worker_id: &str) -> String {
        format!("{}by-worker:{}", self.prefix, worker_id)
    }

    fn run_key(&self, run_id: &str) -> String {
        format!("{}runs:{}", self.prefix, run_id)
    }

    fn run_status_key(&self, status: RunStatus) -> String {
        format!("{}runs:by-status:{}", self.prefix, status)
    }

    fn run_token_key(&self, token: &str) -> String {
        format!("{}runs:by-token:{}", self.prefix, token)
    }

    fn queue_key(&self, id: &str) -> String {
        format!("{}queue:{}", self.prefix, id)
    }

    async fn expire(&self, key: &str) -> Result<(), StoreError> {
        if self.ttl_secs > 0 {
            let mut conn = self.conn();
            let _: () = conn.expire(key, self.ttl_secs).await?;
        }
        Ok(())
    }

    async fn load_job(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        let mut conn = self.conn();
        let fields: HashMap<String, String> = conn.hgetall(self.job_key(job_id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let entries: Vec<String> = conn.lrange(self.internal_key(job_id), 0, -1).await?;
        let internal_jobs = entries
            .iter()
            .filter_map(|s| serde_json::from_str::<InternalJobRef>(s).ok())
            .collect();
        Ok(Some(job_from_fields(job_id, &fields, internal_jobs)))
    }

    async fn write_job_fields(
        &self,
        job_id: &str,
        items: Vec<(&'static str, String)>,
    ) -> Result<(), StoreError> {
        let key = self.job_key(job_id);
        let mut conn = self.conn();
        let _: () = conn.hset_multiple(&key, &items).await?;
        self.expire(&key).await
    }
}

fn job_from_fields(
    job_id: &str,
    fields: &HashMap<String, String>,
    internal_jobs: Vec<InternalJobRef>,
) -> Job {
    let parse_json = |name: &str| -> Option<Value> {
        fields.get(name).and_then(|s| serde_json::from_str(s).ok())
    };
    let parse_ms = |name: &str| -> Option<u64> { fields.get(name).and_then(|s| s.parse().ok()) };
    let status = fields
        .get("status")
        .and_then(|s| JobStatus::from_wire(s))
        .unwrap_or(JobStatus::Queued);
    Job {
        job_id: fields.get("jobId").cloned().unwrap_or_else(|| job_id.to_string()),
        worker_id: fields.get("workerId").cloned().unwrap_or_default(),
        status,
        input: parse_json("input").unwrap_or(Value::Null),
        output: parse_json("output"),
        error: fields
            .get("error")
            .and_then(|s| serde_json::from_str::<JobError>(s).ok()),
        metadata: parse_json("metadata")
            .and_then(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default(),
        internal_jobs,
        created_at: parse_ms("createdAt").unwrap_or_default(),
        updated_at: parse_ms("updatedAt").unwrap_or_default(),
        completed_at: parse_ms("completedAt"),
    }
}

fn job_to_fields(job: &Job) -> Result<Vec<(&'static str, String)>, StoreError> {
    let mut items = vec![
        ("jobId", job.job_id.clone()),
        ("workerId", job.worker_id.clone()),
        ("status", job.status.wire_name().to_string()),
        ("input", serde_json::to_string(&job.input)?),
        ("metadata", serde_json::to_string(&job.metadata)?),
        ("createdAt", job.created_at.to_string()),
        ("updatedAt", job.updated_at.to_string()),
    ];
    if let Some(output) = &job.output {
        items.push(("output", serde_json::to_string(output)?));
    }
    if let Some(error) = &job.error {
        items.push(("error", serde_json::to_string(error)?));
    }
    if let Some(completed_at) = job.completed_at {
        items.push(("completedAt", completed_at.to_string()));
    }
    Ok(items)
}

#[async_trait]
impl<C: Clock> JobStore for RedisStore<C> {
    async fn upsert(&self, job: Job) -> Result<Job, StoreError> {
        if let Some(existing) = self.load_job(&job.job_id).await? {
            return Ok(existing);
        }
        self.write_job_fields(&job.job_id, job_to_fields(&job)?).await?;
        let index = self.worker_index_key(&job.worker_id);
        let mut conn = self.conn();
        let _: () = conn.sadd(&index, &job.job_id).await?;
        self.expire(&index).await?;
        Ok(job)
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        self.load_job(job_id).await
    }

    async fn update(&self, job_id: &str, update: JobUpdate) -> Result<Job, StoreError> {
        let mut job = self
            .load_job(job_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("job {job_id}")))?;
        job.apply(update, self.clock.epoch_ms());
        self.write_job_fields(job_id, job_to_fields(&job)?).await?;
        Ok(job)
    }

    async fn append_internal_job(
        &self,
        parent_job_id: &str,
        entry: InternalJobRef,
    ) -> Result<(), StoreError> {
        let list_key = self.internal_key(parent_job_id);
        let main_key = self.job_key(parent_job_id);
        let payload = serde_json::to_string(&entry)?;
        let mut conn = self.conn();
        let _: () = conn.rpush(&list_key, payload).await?;
        let _: () = conn
            .hset(&main_key, "updatedAt", self.clock.epoch_ms().to_string())
            .await?;
        self.expire(&list_key).await?;
        self.expire(&main_key).await
    }

    async fn list_jobs_by_worker(&self, worker_id: &str) -> Result<Vec<Job>, StoreError> {
        let mut conn = self.conn();
        let ids: Vec<String> = conn.smembers(self.worker_index_key(worker_id)).await?;
        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(job) = self.load_job(&id).await? {
                jobs.push(job);
            }
        }
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.job_id.cmp(&a.job_id)));
        Ok(jobs)
    }
}

#[async_trait]
impl<C: Clock> RunStore for RedisStore<C> {
    async fn create(&self, run: Run) -> Result<(), StoreError> {
        let key = self.run_key(&run.run_id);
        let mut conn = self.conn();
        let existing: Option<String> = conn.get(&key).await?;
        if existing.is_some() {
            return Err(StoreError::Conflict(format!("run {}", run.run_id)));
        }
        self.put(run).await
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<Run>, StoreError> {
        let mut conn = self.conn();
        let raw: Option<String> = conn.get(self.run_key(run_id)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, run: Run) -> Result<(), StoreError> {
        let key = self.run_key(&run.run_id);
        let mut conn = self.conn();

        // Maintain the status index against the prior record. Token keys
        // outlive resolution so re-signals stay idempotent; TTL reaps them.
        let old: Option<String> = conn.get(&key).await?;
        if let Some(old) = old.and_then(|json| serde_json::from_str::<Run>(&json).ok()) {
            if old.status != run.status {
                let _: () = conn
                    .srem(self.run_status_key(old.status), old.run_id.as_str())
                    .await?;
            }
        }

        let json = serde_json::to_string(&run)?;
        let _: () = conn.set(&key, json).await?;
        let status_key = self.run_status_key(run.status);
        let _: () = conn.sadd(&status_key, run.run_id.as_str()).await?;
        let tokens = run
            .waiting_hook_token
            .iter()
            .chain(run.resolved_tokens.iter());
        for token in tokens {
            let token_key = self.run_token_key(token);
            let _: () = conn.set(&token_key, run.run_id.as_str()).await?;
            self.expire(&token_key).await?;
        }
        self.expire(&key).await?;
        self.expire(&status_key).await
    }

    async fn list_by_status(&self, status: RunStatus) -> Result<Vec<Run>, StoreError> {
        let mut conn = self.conn();
        let ids: Vec<String> = conn.smembers(self.run_status_key(status)).await?;
        let mut runs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(run) = self.get_run(&id).await? {
                if run.status == status {
                    runs.push(run);
                }
            }
        }
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(runs)
    }

    async fn find_by_hook_token(&self, token: &str) -> Result<Option<Run>, StoreError> {
        let mut conn = self.conn();
        let run_id: Option<String> = conn.get(self.run_token_key(token)).await?;
        let Some(run_id) = run_id else {
            return Ok(None);
        };
        Ok(self.get_run(&run_id).await?.filter(|r| {
            r.status == RunStatus::Paused && r.waiting_hook_token.as_deref() == Some(token)
        }))
    }

    async fn find_by_resolved_token(&self, token: &str) -> Result<Option<Run>, StoreError> {
        let mut conn = self.conn();
        let run_id: Option<String> = conn.get(self.run_token_key(token)).await?;
        let Some(run_id) = run_id else {
            return Ok(None);
        };
        Ok(self.get_run(&run_id)
            .await?
            .filter(|r| r.token_resolved(token)))
    }
}

#[async_trait]
impl<C: Clock> QueueJobStore for RedisStore<C> {
    async fn upsert_initial(
        &self,
        queue_job_id: &str,
        queue_id: &str,
        first_step: QueueJobStep,
        metadata: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let key = self.queue_key(queue_job_id);
        let mut conn = self.conn();
        let raw: Option<String> = conn.get(&key).await?;
        let qj = match raw.and_then(|json| serde_json::from_str::<QueueJob>(&json).ok()) {
            Some(mut existing) => {
                if existing.steps.is_empty() {
                    existing.steps.push(first_step);
                }
                existing.updated_at = now;
                existing
            }
            None => QueueJob::started(queue_job_id, queue_id, first_step, metadata, now),
        };
        let _: () = conn.set(&key, serde_json::to_string(&qj)?).await?;
        self.expire(&key).await
    }

    async fn get_queue_job(&self, queue_job_id: &str) -> Result<Option<QueueJob>, StoreError> {
        let mut conn = self.conn();
        let raw: Option<String> = conn.get(self.queue_key(queue_job_id)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn update_queue_step(
        &self,
        queue_job_id: &str,
        update: QueueStepUpdate,
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let key = self.queue_key(queue_job_id);
        let mut conn = self.conn();
        let raw: Option<String> = conn.get(&key).await?;
        let Some(mut qj) = raw.and_then(|json| serde_json::from_str::<QueueJob>(&json).ok())
        else {
            return Ok(());
        };
        qj.update_step(
            update.index,
            update.status,
            update.input,
            update.output,
            update.error,
            now,
        );
        let _: () = conn.set(&key, serde_json::to_string(&qj)?).await?;
        self.expire(&key).await
    }

    async fn append_queue_step(
        &self,
        queue_job_id: &str,
        step: QueueJobStep,
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let key = self.queue_key(queue_job_id);
        let mut conn = self.conn();
        let raw: Option<String> = conn.get(&key).await?;
        let Some(mut qj) = raw.and_then(|json| serde_json::from_str::<QueueJob>(&json).ok())
        else {
            return Ok(());
        };
        qj.append_step(step, now);
        let _: () = conn.set(&key, serde_json::to_string(&qj)?).await?;
        self.expire(&key).await
    }
}
