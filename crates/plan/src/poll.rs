// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polling configuration for awaited worker steps.

use serde::{Deserialize, Serialize};

/// Default delay between polls of the job store.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
/// Default wall-clock budget for an awaited worker.
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 600_000;
/// Default cap on poll attempts.
pub const DEFAULT_POLL_MAX_RETRIES: u32 = 200;

/// Partial poll configuration attached to a step or a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerPollConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl WorkerPollConfig {
    cadre_core::fluent! {
        opt interval_ms: u64;
        opt timeout_ms: u64;
        opt max_retries: u32;
    }
}

/// Fully-resolved poll settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPoll {
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl Default for ResolvedPoll {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            max_retries: DEFAULT_POLL_MAX_RETRIES,
        }
    }
}

impl ResolvedPoll {
    /// Field-wise precedence: step overrides plan overrides runtime
    /// defaults.
    pub fn resolve(step: Option<&WorkerPollConfig>, plan: Option<&WorkerPollConfig>) -> Self {
        let pick_u64 = |f: fn(&WorkerPollConfig) -> Option<u64>, default: u64| {
            step.and_then(f).or_else(|| plan.and_then(f)).unwrap_or(default)
        };
        let pick_u32 = |f: fn(&WorkerPollConfig) -> Option<u32>, default: u32| {
            step.and_then(f).or_else(|| plan.and_then(f)).unwrap_or(default)
        };
        Self {
            interval_ms: pick_u64(|c| c.interval_ms, DEFAULT_POLL_INTERVAL_MS),
            timeout_ms: pick_u64(|c| c.timeout_ms, DEFAULT_POLL_TIMEOUT_MS),
            max_retries: pick_u32(|c| c.max_retries, DEFAULT_POLL_MAX_RETRIES),
        }
    }
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod tests;
