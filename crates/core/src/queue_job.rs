// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue-pipeline record: a chain of worker jobs executed in sequence,
//! tracked as one document so callers can poll the whole pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::job::JobError;

/// Status of one step inside a queue pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStepStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

crate::wire_name! {
    QueueStepStatus {
        Queued => "queued",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
}

/// One step of a queue pipeline: a worker job reference plus its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueJobStep {
    pub worker_id: String,
    pub worker_job_id: String,
    pub status: QueueStepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
}

impl QueueJobStep {
    pub fn queued(worker_id: impl Into<String>, worker_job_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            worker_job_id: worker_job_id.into(),
            status: QueueStepStatus::Queued,
            input: None,
            output: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// A queue pipeline record. The pipeline id doubles as the first worker
/// job's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueJob {
    pub id: String,
    pub queue_id: String,
    pub status: QueueStepStatus,
    pub steps: Vec<QueueJobStep>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
}

impl QueueJob {
    /// Create a running pipeline with its first step queued.
    pub fn started(
        id: impl Into<String>,
        queue_id: impl Into<String>,
        first_step: QueueJobStep,
        metadata: Map<String, Value>,
        epoch_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            queue_id: queue_id.into(),
            status: QueueStepStatus::Running,
            steps: vec![first_step],
            metadata,
            created_at: epoch_ms,
            updated_at: epoch_ms,
            completed_at: None,
        }
    }

    /// Append a queued follow-up step.
    pub fn append_step(&mut self, step: QueueJobStep, epoch_ms: u64) {
        self.steps.push(step);
        self.updated_at = epoch_ms;
    }

    /// Merge a step outcome at `index`.
    ///
    /// A failed step fails the whole pipeline; completing the final step
    /// completes it. `started_at`/`completed_at` are written once.
    /// Unknown indexes are ignored.
    pub fn update_step(
        &mut self,
        index: usize,
        status: QueueStepStatus,
        input: Option<Value>,
        output: Option<Value>,
        error: Option<JobError>,
        epoch_ms: u64,
    ) {
        let last_index = self.steps.len().saturating_sub(1);
        let Some(step) = self.steps.get_mut(index) else {
            return;
        };
        step.status = status;
        if input.is_some() {
            step.input = input;
        }
        if output.is_some() {
            step.output = output;
        }
        if error.is_some() {
            step.error = error;
        }
        match status {
            QueueStepStatus::Running => {
                step.started_at.get_or_insert(epoch_ms);
            }
            QueueStepStatus::Completed | QueueStepStatus::Failed => {
                step.completed_at.get_or_insert(epoch_ms);
            }
            QueueStepStatus::Queued => {}
        }

        if status == QueueStepStatus::Failed {
            self.status = QueueStepStatus::Failed;
            self.completed_at.get_or_insert(epoch_ms);
        } else if status == QueueStepStatus::Completed && index == last_index {
            self.status = QueueStepStatus::Completed;
            self.completed_at.get_or_insert(epoch_ms);
        }
        self.updated_at = epoch_ms;
    }

    /// Outputs of completed prior steps, for deriving the next step's input.
    pub fn previous_outputs(&self) -> Vec<(usize, &str, &Value)> {
        self.steps
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.output.as_ref().map(|o| (i, s.worker_id.as_str(), o)))
            .collect()
    }
}

#[cfg(test)]
#[path = "queue_job_tests.rs"]
mod tests;
