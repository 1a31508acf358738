// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine errors surfaced to the API layer.
//!
//! Step-level failures (handler errors, dispatch failures, timeouts) are
//! recorded on the run as a [`cadre_core::RunFailure`] rather than raised
//! here; this enum covers the caller-facing taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("no paused run waiting on token {0:?}")]
    TokenNotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] cadre_store::StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<cadre_plan::PlanError> for EngineError {
    fn from(e: cadre_plan::PlanError) -> Self {
        EngineError::Validation(e.to_string())
    }
}

impl From<cadre_core::run::StatusConflict> for EngineError {
    fn from(e: cadre_core::run::StatusConflict) -> Self {
        EngineError::Conflict(e.to_string())
    }
}
