// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Responses returned by the daemon.

use crate::status::ErrorKind;
use cadre_core::{Job, JobStatus, RunContext, RunFailure, RunStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hook the run is waiting on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookBody {
    pub token: String,
}

/// Wire view of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunBody {
    pub run_id: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<HookBody>,
    #[serde(default)]
    pub context: RunContext,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
}

/// Webhook status field: `success` or `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookResult {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    /// A run snapshot (start / status / signal / cancel).
    Run(RunBody),
    /// Signal acknowledgement.
    #[serde(rename_all = "camelCase")]
    Signalled { success: bool, run_id: String },
    /// A dispatched job handle, with the output when awaited.
    #[serde(rename_all = "camelCase")]
    Dispatched {
        job_id: String,
        status: JobStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
    },
    /// A full job record.
    Job(Job),
    /// Jobs for a worker, most recent first.
    Jobs { jobs: Vec<Job> },
    /// Generic acknowledgement.
    Ok,
    /// A failure, with an HTTP-ish status code for REST gateways.
    Error {
        error: String,
        code: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
}

impl Response {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error {
            error: message.into(),
            code: kind.http_status(),
            stack: None,
        }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
