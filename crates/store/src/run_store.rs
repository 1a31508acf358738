// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run registry contract and per-run write serialisation.

use crate::error::StoreError;
use async_trait::async_trait;
use cadre_core::{Run, RunStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert a new run; `Conflict` when the id already exists.
    async fn create(&self, run: Run) -> Result<(), StoreError>;

    async fn get_run(&self, run_id: &str) -> Result<Option<Run>, StoreError>;

    /// Full-record write. Callers serialise writes per run through
    /// [`RunLocks`]; the store does not re-check transitions.
    async fn put(&self, run: Run) -> Result<(), StoreError>;

    async fn list_by_status(&self, status: RunStatus) -> Result<Vec<Run>, StoreError>;

    /// The paused run whose `waiting_hook_token` equals `token`, if any.
    async fn find_by_hook_token(&self, token: &str) -> Result<Option<Run>, StoreError>;

    /// The run that already consumed `token`, if any. Backs idempotent
    /// re-signals.
    async fn find_by_resolved_token(&self, token: &str) -> Result<Option<Run>, StoreError>;
}

/// Per-run mutexes guarding read-modify-write cycles against resume races.
///
/// The lock map lives beside the registry rather than inside it so every
/// backend gets the same serialisation for free.
#[derive(Clone, Default)]
pub struct RunLocks {
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl RunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex for a run, created on first use.
    pub fn for_run(&self, run_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(
            locks
                .entry(run_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    /// Drop the mutex for a terminal run.
    pub fn release(&self, run_id: &str) {
        self.locks.lock().remove(run_id);
    }
}
