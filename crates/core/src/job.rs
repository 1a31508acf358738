// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker job record and its terminal-once state machine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status of a worker job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Enqueued, not yet picked up
    Queued,
    /// A worker is executing the handler
    Running,
    /// Handler returned successfully (terminal)
    Completed,
    /// Handler threw or the queue gave up (terminal)
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

crate::wire_name! {
    JobStatus {
        Queued => "queued",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Error recorded on a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            name: None,
        }
    }

    crate::fluent! {
        opt stack: String;
        opt name: String;
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Reference to a job dispatched by another job (worker-to-worker calls).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJobRef {
    pub job_id: String,
    pub worker_id: String,
}

/// Metadata key recording the direct parent of a child job.
pub const PARENT_JOB_ID_KEY: &str = "parentJobId";

/// A worker job: durable record from dispatch through terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: String,
    pub worker_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Children this job dispatched, in dispatch order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub internal_jobs: Vec<InternalJobRef>,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
}

impl Job {
    /// Create a fresh `queued` record, as written at dispatch time.
    pub fn queued(
        job_id: impl Into<String>,
        worker_id: impl Into<String>,
        input: Value,
        metadata: Map<String, Value>,
        epoch_ms: u64,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            worker_id: worker_id.into(),
            status: JobStatus::Queued,
            input,
            output: None,
            error: None,
            metadata,
            internal_jobs: Vec::new(),
            created_at: epoch_ms,
            updated_at: epoch_ms,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The direct parent recorded at dispatch time, if this is a child job.
    pub fn parent_job_id(&self) -> Option<&str> {
        self.metadata.get(PARENT_JOB_ID_KEY).and_then(Value::as_str)
    }

    /// Merge an update into this record.
    ///
    /// Transition rules:
    /// - a record already in a terminal state ignores further status,
    ///   output, and error writes (duplicate terminal writes are no-ops);
    /// - moving into a terminal state sets `completed_at` unless present;
    /// - an update carrying an error forces `failed` regardless of the
    ///   requested status;
    /// - metadata always merges key-by-key; progress fields land in
    ///   metadata.
    ///
    /// Returns `false` when the update was a terminal-state no-op.
    pub fn apply(&mut self, update: JobUpdate, epoch_ms: u64) -> bool {
        if self.status.is_terminal() && update.status.is_some() {
            return false;
        }

        if let Some(meta) = update.metadata {
            for (k, v) in meta {
                self.metadata.insert(k, v);
            }
        }
        if let Some(progress) = update.progress {
            self.metadata.insert("progress".to_string(), progress.into());
        }
        if let Some(msg) = update.progress_message {
            self.metadata.insert("progressMessage".to_string(), msg.into());
        }

        if let Some(output) = update.output {
            self.output = Some(output);
        }
        let has_error = update.error.is_some();
        if let Some(error) = update.error {
            self.error = Some(error);
        }

        if let Some(status) = update.status {
            self.status = if has_error { JobStatus::Failed } else { status };
            if self.status.is_terminal() && self.completed_at.is_none() {
                self.completed_at = Some(epoch_ms);
            }
        }

        self.updated_at = epoch_ms;
        true
    }
}

/// Partial update merged into a [`Job`] by [`Job::apply`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn completed(output: Value) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            output: Some(output),
            ..Self::default()
        }
    }

    pub fn failed(error: JobError) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error),
            ..Self::default()
        }
    }

    crate::fluent! {
        set metadata: Option<Map<String, Value>>;
    }
}

/// Test builder: a queued record with predictable timestamps, nudged
/// into the state a test needs.
#[cfg(any(test, feature = "test-support"))]
pub struct JobBuilder {
    job_id: String,
    worker_id: String,
    status: JobStatus,
    input: Value,
    metadata: Map<String, Value>,
}

#[cfg(any(test, feature = "test-support"))]
impl JobBuilder {
    crate::fluent! {
        set job_id: String;
        set worker_id: String;
        set input: Value;
        set metadata: Map<String, Value>;
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> Job {
        let mut job = Job::queued(self.job_id, self.worker_id, self.input, self.metadata, 1_000);
        job.status = self.status;
        job
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Job {
    /// Create a builder with test defaults.
    pub fn builder() -> JobBuilder {
        JobBuilder {
            job_id: "job-1000-testtest0".to_string(),
            worker_id: "echo".to_string(),
            status: JobStatus::Queued,
            input: Value::Null,
            metadata: Map::new(),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
