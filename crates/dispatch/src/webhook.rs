// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook delivery for terminal job transitions.
//!
//! Webhook failures are logged and swallowed; a completed job never fails
//! because its callback endpoint was down.

use cadre_core::{Job, JobError, JobStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Webhook status field: `success` or `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    Success,
    Error,
}

cadre_core::wire_name! {
    WebhookStatus {
        Success => "success",
        Error => "error",
    }
}

/// Payload posted on terminal transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub job_id: String,
    pub worker_id: String,
    pub status: WebhookStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl WebhookPayload {
    /// Payload for a job that just reached a terminal state.
    pub fn from_job(job: &Job) -> Self {
        let status = if job.status == JobStatus::Completed {
            WebhookStatus::Success
        } else {
            WebhookStatus::Error
        };
        Self {
            job_id: job.job_id.clone(),
            worker_id: job.worker_id.clone(),
            status,
            output: job.output.clone(),
            error: job.error.clone(),
            metadata: if job.metadata.is_empty() {
                None
            } else {
                Some(job.metadata.clone())
            },
        }
    }
}

#[derive(Clone, Default)]
pub struct WebhookClient {
    client: reqwest::Client,
}

impl WebhookClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// POST the payload. Failures are logged, never propagated.
    pub async fn notify(&self, url: &str, payload: &WebhookPayload) {
        let result = self.client.post(url).json(payload).send().await;
        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(url, job_id = %payload.job_id, "webhook delivered");
            }
            Ok(response) => {
                tracing::warn!(
                    url,
                    job_id = %payload.job_id,
                    status = %response.status(),
                    "webhook endpoint returned an error"
                );
            }
            Err(e) => {
                tracing::warn!(url, job_id = %payload.job_id, error = %e, "webhook delivery failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
