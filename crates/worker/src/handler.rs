// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker handler trait and registry.

use crate::context::JobContext;
use async_trait::async_trait;
use cadre_core::JobError;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// An out-of-process callee. One implementation per worker id.
#[async_trait]
pub trait WorkerHandler: Send + Sync {
    /// Stable worker id, used for queue routing and the job-store index.
    fn id(&self) -> &str;

    /// Execute the job. The context exposes the job-store façade and
    /// worker-to-worker dispatch.
    async fn handle(&self, ctx: &JobContext, input: Value) -> Result<Value, JobError>;

    /// Check handler output before the terminal write. Rejections fail
    /// the job with an output-validation error.
    fn check_output(&self, _output: &Value) -> Result<(), String> {
        Ok(())
    }
}

/// Worker-id → handler lookup.
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn WorkerHandler>>>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: Arc<dyn WorkerHandler>) {
        let id = handler.id().to_string();
        self.handlers.write().insert(id, handler);
    }

    pub fn get(&self, worker_id: &str) -> Option<Arc<dyn WorkerHandler>> {
        self.handlers.read().get(worker_id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handlers.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
