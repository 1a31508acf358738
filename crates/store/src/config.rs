// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend selection and TTL configuration from the environment.

use crate::error::StoreError;
use std::path::PathBuf;
use std::time::Duration;

/// Default job retention: 7 days.
pub const DEFAULT_TTL_SECONDS: u64 = 604_800;

/// Default key prefix for the redis backend.
pub const DEFAULT_REDIS_PREFIX: &str = "worker:jobs:";

/// Which storage backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// In-process map; tests and local mode.
    Memory,
    /// One JSON document per record under the state dir.
    Document,
    /// Redis hashes with per-worker index sets.
    Redis,
}

impl std::str::FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "document" => Ok(BackendKind::Document),
            "redis" => Ok(BackendKind::Redis),
            other => Err(StoreError::Config(format!(
                "unknown WORKER_DATABASE_TYPE: {other:?} (expected memory, document, or redis)"
            ))),
        }
    }
}

/// Storage configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: BackendKind,
    pub ttl: Duration,
    /// Root directory for the document backend.
    pub state_dir: PathBuf,
    /// Connection URL for the redis backend.
    pub redis_url: Option<String>,
    /// Key prefix for the redis backend.
    pub key_prefix: String,
}

impl StoreConfig {
    pub fn new(backend: BackendKind, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            state_dir: state_dir.into(),
            redis_url: None,
            key_prefix: DEFAULT_REDIS_PREFIX.to_string(),
        }
    }

    cadre_core::fluent! {
        set key_prefix: String;
        set ttl: Duration;
        opt redis_url: String;
    }

    /// Read `WORKER_DATABASE_TYPE`, `WORKER_JOBS_TTL_SECONDS`,
    /// `WORKER_REDIS_URL` / `REDIS_URL`, and `WORKER_REDIS_PREFIX`.
    /// Defaults to the document backend under `state_dir`.
    pub fn from_env(state_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let backend = match std::env::var("WORKER_DATABASE_TYPE") {
            Ok(kind) => kind.parse()?,
            Err(_) => BackendKind::Document,
        };
        let ttl_seconds = std::env::var("WORKER_JOBS_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TTL_SECONDS);
        let redis_url = std::env::var("WORKER_REDIS_URL")
            .or_else(|_| std::env::var("REDIS_URL"))
            .ok()
            .filter(|s| !s.is_empty());
        let key_prefix = std::env::var("WORKER_REDIS_PREFIX")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_REDIS_PREFIX.to_string());

        if backend == BackendKind::Redis && redis_url.is_none() {
            return Err(StoreError::Config(
                "WORKER_DATABASE_TYPE=redis requires WORKER_REDIS_URL".to_string(),
            ));
        }

        Ok(Self {
            backend,
            ttl: Duration::from_secs(ttl_seconds),
            state_dir: state_dir.into(),
            redis_url,
            key_prefix,
        })
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl.as_millis() as u64
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
