// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no queue configured for worker {worker_id:?} (set {env_var})")]
    UnknownWorkerQueue { worker_id: String, env_var: String },

    #[error("queue rejected message for worker {worker_id:?}: {reason}")]
    QueueRejected { worker_id: String, reason: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("delay {0}s out of range (0-900)")]
    InvalidDelay(u64),

    #[error("WORKER_BASE_URL is required for background workers")]
    MissingBaseUrl,

    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("local queue is closed")]
    QueueClosed,
}
