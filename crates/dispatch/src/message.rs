// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue message format.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Serialisable slice of the caller's context shipped with a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageContext {
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageContext {
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            extra: Map::new(),
        }
    }
}

/// The message a worker consumes from its queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub worker_id: String,
    pub job_id: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub context: MessageContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Dispatch time, epoch milliseconds.
    pub timestamp: u64,
}
