// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker runtime errors.

use cadre_core::JobError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("unknown worker: {0:?}")]
    UnknownWorker(String),

    #[error("job {job_id} failed: {error}")]
    Handler { job_id: String, error: JobError },

    #[error("timed out waiting for job {job_id} after {waited_ms}ms")]
    AwaitTimeout { job_id: String, waited_ms: u64 },

    #[error("job {job_id} disappeared while awaited")]
    AwaitedJobMissing { job_id: String },

    #[error(transparent)]
    Store(#[from] cadre_store::StoreError),

    #[error(transparent)]
    Dispatch(#[from] cadre_dispatch::DispatchError),
}

impl WorkerError {
    /// Wire rendering of this error for job records.
    pub fn to_job_error(&self) -> JobError {
        match self {
            WorkerError::Handler { error, .. } => error.clone(),
            other => JobError::new(other.to_string()),
        }
    }
}
