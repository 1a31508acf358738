// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for dispatch.
//!
//! Queue URLs come from `WORKER_QUEUE_URL_<UPPER_SNAKE(worker_id)>`; the
//! worker HTTP surface from `WORKER_BASE_URL`; webhook callbacks from
//! `WORKFLOW_WEBHOOK_BASE_URL`.

use crate::error::DispatchError;
use std::collections::HashMap;

/// `UPPER_SNAKE` rendering of a worker id for the env var suffix:
/// `data-processor` → `DATA_PROCESSOR`.
pub fn upper_snake(worker_id: &str) -> String {
    worker_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Env var name carrying a worker's queue URL.
pub fn queue_url_var(worker_id: &str) -> String {
    format!("WORKER_QUEUE_URL_{}", upper_snake(worker_id))
}

/// Worker-id → queue-URL resolution, env-derived by default with a fixed
/// map for tests.
#[derive(Debug, Clone, Default)]
pub struct QueueUrlMap {
    fixed: Option<HashMap<String, String>>,
}

impl QueueUrlMap {
    /// Resolve from the process environment at call time.
    pub fn from_env() -> Self {
        Self { fixed: None }
    }

    /// Resolve from a fixed map (tests and embedded setups).
    pub fn fixed(urls: HashMap<String, String>) -> Self {
        Self { fixed: Some(urls) }
    }

    pub fn resolve(&self, worker_id: &str) -> Result<String, DispatchError> {
        let found = match &self.fixed {
            Some(map) => map.get(worker_id).cloned(),
            None => std::env::var(queue_url_var(worker_id))
                .ok()
                .filter(|s| !s.is_empty()),
        };
        found.ok_or_else(|| DispatchError::UnknownWorkerQueue {
            worker_id: worker_id.to_string(),
            env_var: queue_url_var(worker_id),
        })
    }
}

/// Derive the `/workers/trigger` URL from a configured base.
///
/// Accepts a service root or a URL pointing at `/workers/trigger` or
/// `/workers/config` and normalizes back to the trigger endpoint,
/// dropping query and fragment.
pub fn normalize_trigger_url(raw: &str) -> Result<String, DispatchError> {
    let mut url = reqwest::Url::parse(raw).map_err(|e| DispatchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    url.set_query(None);
    url.set_fragment(None);

    let path = url.path().trim_end_matches('/');
    let base = path
        .strip_suffix("/workers/trigger")
        .or_else(|| path.strip_suffix("/workers/config"))
        .unwrap_or(path);
    url.set_path(&format!("{base}/workers/trigger"));
    Ok(url.to_string())
}

/// Full trigger URL from `WORKER_BASE_URL` (legacy fallbacks:
/// `WORKERS_TRIGGER_API_URL`, `WORKERS_CONFIG_API_URL`).
pub fn trigger_url() -> Result<String, DispatchError> {
    let raw = ["WORKER_BASE_URL", "WORKERS_TRIGGER_API_URL", "WORKERS_CONFIG_API_URL"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|s| !s.is_empty()))
        .ok_or(DispatchError::MissingBaseUrl)?;
    normalize_trigger_url(&raw)
}

/// Shared-secret header value for queue trigger POSTs.
pub fn trigger_api_key() -> Option<String> {
    std::env::var("WORKERS_TRIGGER_API_KEY").ok().filter(|s| !s.is_empty())
}

/// Base URL the dispatcher uses to construct per-job webhook callbacks.
pub fn webhook_base_url() -> Option<String> {
    std::env::var("WORKFLOW_WEBHOOK_BASE_URL").ok().filter(|s| !s.is_empty())
}

/// Webhook callback URL for a worker's completions.
pub fn webhook_url_for(base: &str, worker_id: &str) -> String {
    format!("{}/workers/{}/webhook", base.trim_end_matches('/'), worker_id)
}

/// Whether dispatch should run handlers inline in-process.
pub fn local_mode() -> bool {
    std::env::var("WORKERS_LOCAL_MODE")
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
