// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue adapters.
//!
//! `HttpQueue` posts messages to the per-worker queue URL (remote mode);
//! `LocalQueue` hands them to the in-process worker runtime over a channel
//! (dev mode), applying per-message delay itself.

use crate::env::{trigger_api_key, QueueUrlMap};
use crate::error::DispatchError;
use crate::message::QueueMessage;
use async_trait::async_trait;
use cadre_core::MessageId;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;

#[async_trait]
pub trait QueueAdapter: Send + Sync {
    /// Enqueue a message, optionally delayed. Returns the queue's message
    /// id.
    async fn send(
        &self,
        message: QueueMessage,
        delay: Option<Duration>,
    ) -> Result<MessageId, DispatchError>;
}

/// Remote mode: POST the message to the worker's queue URL.
pub struct HttpQueue {
    client: reqwest::Client,
    urls: QueueUrlMap,
    trigger_key: Option<String>,
}

impl HttpQueue {
    pub fn new(urls: QueueUrlMap) -> Self {
        Self {
            client: reqwest::Client::new(),
            urls,
            trigger_key: trigger_api_key(),
        }
    }

    pub fn with_trigger_key(mut self, key: impl Into<String>) -> Self {
        self.trigger_key = Some(key.into());
        self
    }
}

#[async_trait]
impl QueueAdapter for HttpQueue {
    async fn send(
        &self,
        message: QueueMessage,
        delay: Option<Duration>,
    ) -> Result<MessageId, DispatchError> {
        // Per-worker queue URL, falling back to the shared trigger
        // endpoint derived from WORKER_BASE_URL.
        let url = match self.urls.resolve(&message.worker_id) {
            Ok(url) => url,
            Err(missing) => crate::env::trigger_url().map_err(|_| missing)?,
        };
        let mut body = serde_json::Map::new();
        body.insert(
            "workerId".to_string(),
            serde_json::Value::String(message.worker_id.clone()),
        );
        if let Some(delay) = delay {
            body.insert("delaySeconds".to_string(), json!(delay.as_secs()));
        }
        body.insert("body".to_string(), serde_json::to_value(&message)?);

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.trigger_key {
            request = request.header("x-workers-trigger-key", key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DispatchError::QueueRejected {
                worker_id: message.worker_id,
                reason: format!("{status}: {text}"),
            });
        }

        let data: serde_json::Value = response.json().await.unwrap_or_default();
        let message_id = data
            .get("messageId")
            .and_then(serde_json::Value::as_str)
            .map(MessageId::from_string)
            .unwrap_or_else(|| MessageId::from_string(format!("trigger-{}", message.job_id)));
        Ok(message_id)
    }
}

/// Dev mode: deliver straight to the in-process worker runtime.
pub struct LocalQueue {
    tx: mpsc::UnboundedSender<QueueMessage>,
}

impl LocalQueue {
    /// Create the queue and the receiving end the worker runtime consumes.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<QueueMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl QueueAdapter for LocalQueue {
    async fn send(
        &self,
        message: QueueMessage,
        delay: Option<Duration>,
    ) -> Result<MessageId, DispatchError> {
        let id = MessageId::from_string(format!("local-{}", message.job_id));
        match delay.filter(|d| !d.is_zero()) {
            Some(delay) => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if tx.send(message).is_err() {
                        tracing::warn!("local queue receiver dropped before delayed delivery");
                    }
                });
            }
            None => {
                self.tx.send(message).map_err(|_| DispatchError::QueueClosed)?;
            }
        }
        Ok(id)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
