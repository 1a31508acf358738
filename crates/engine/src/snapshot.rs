// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API-facing view of a run.

use cadre_core::{Run, RunContext, RunFailure, RunId, RunStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hook the run is currently waiting on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookInfo {
    pub token: String,
}

/// What callers see from start / get status / signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub run_id: RunId,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<HookInfo>,
    pub context: RunContext,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
}

impl RunSnapshot {
    pub fn of(run: &Run) -> Self {
        Self {
            run_id: run.run_id.clone(),
            status: run.status,
            result: run.result.clone(),
            error: run.error.clone(),
            hook: run
                .waiting_hook_token
                .clone()
                .map(|token| HookInfo { token }),
            context: run.context.clone(),
            created_at: run.created_at,
            updated_at: run.updated_at,
            completed_at: run.completed_at,
        }
    }

    pub fn hook_token(&self) -> Option<&str> {
        self.hook.as_ref().map(|h| h.token.as_str())
    }
}
