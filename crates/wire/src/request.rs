// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Requests accepted by the daemon.

use cadre_core::{JobError, JobStatus};
use cadre_plan::Plan;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::response::WebhookResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    /// Start an orchestration run.
    #[serde(rename_all = "camelCase")]
    Orchestrate {
        config: Plan,
        execution_id: String,
        #[serde(default)]
        hook_tokens: HashMap<String, String>,
        #[serde(default)]
        input: Value,
        #[serde(default)]
        messages: Vec<Value>,
    },
    /// Current status of a run.
    #[serde(rename_all = "camelCase")]
    GetRun { run_id: String },
    /// Resume a paused run by token.
    Signal { token: String, payload: Value },
    /// Soft-cancel a run.
    #[serde(rename_all = "camelCase")]
    CancelRun { run_id: String },
    /// Dispatch a worker job; with `await`, wait for its result.
    #[serde(rename_all = "camelCase")]
    TriggerWorker {
        worker_id: String,
        #[serde(default)]
        input: Value,
        #[serde(rename = "await", default)]
        awaited: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        webhook_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delay_seconds: Option<u64>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    /// Pre-create a job record before dispatching.
    #[serde(rename_all = "camelCase")]
    CreateWorkerJob {
        worker_id: String,
        job_id: String,
        #[serde(default)]
        input: Value,
    },
    /// Internal job update from a worker.
    #[serde(rename_all = "camelCase")]
    UpdateWorkerJob {
        worker_id: String,
        job_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<JobStatus>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Map<String, Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<JobError>,
    },
    /// Completion callback from a worker runtime.
    #[serde(rename_all = "camelCase")]
    WorkerWebhook {
        job_id: String,
        worker_id: String,
        status: WebhookResult,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<JobError>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Map<String, Value>>,
    },
    /// Full job record.
    #[serde(rename_all = "camelCase")]
    GetWorkerJob { worker_id: String, job_id: String },
    /// Jobs for a worker, most recent first.
    #[serde(rename_all = "camelCase")]
    ListWorkerJobs { worker_id: String },
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
