// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon assembly: storage, queue, worker runtime, engine, logging.

use crate::env;
use cadre_core::SystemClock;
use cadre_dispatch::{Dispatch, Dispatcher, HttpQueue, LocalQueue, QueueUrlMap};
use cadre_engine::{AgentRouter, Engine, PlanRegistry};
use cadre_store::{
    BackendKind, DocumentStore, JobStore, MemoryStore, QueueJobStore, RedisStore, RunStore,
    StoreConfig,
};
use cadre_worker::{WorkerRegistry, WorkerRuntime};
use fs2::FileExt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no usable state directory (set CADRE_STATE_DIR)")]
    NoStateDir,

    #[error("another daemon instance is already running")]
    AlreadyRunning,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] cadre_store::StoreError),
}

/// A fully-wired daemon, ready to serve.
pub struct Daemon {
    pub engine: Engine<SystemClock>,
    pub jobs: Arc<dyn JobStore>,
    pub queue_jobs: Arc<dyn QueueJobStore>,
    pub dispatcher: Arc<dyn Dispatch>,
    pub workers: WorkerRegistry,
    pub state_dir: PathBuf,
    /// Held for the daemon's lifetime; releasing it frees the instance
    /// lock.
    _lock_file: std::fs::File,
    /// Local-mode consumer task, when running with the in-process queue.
    consumer: Option<tokio::task::JoinHandle<()>>,
    /// Periodic sweep hook for the document backend.
    document_store: Option<Arc<DocumentStore>>,
    memory_store: Option<Arc<MemoryStore>>,
}

impl Daemon {
    /// Build from the environment. Registries start empty; embedders
    /// register agents, plans, and workers before serving.
    pub async fn build() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;
        std::fs::create_dir_all(&state_dir)?;

        let lock_path = state_dir.join("cadred.lock");
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| LifecycleError::AlreadyRunning)?;

        let config = StoreConfig::from_env(&state_dir)?;
        let workers = WorkerRegistry::new();

        let mut document_store = None;
        let mut memory_store = None;
        let (runs, jobs, queue_jobs): (
            Arc<dyn RunStore>,
            Arc<dyn JobStore>,
            Arc<dyn QueueJobStore>,
        ) = match config.backend {
            BackendKind::Memory => {
                let store = Arc::new(MemoryStore::new().ttl_ms(config.ttl_ms()));
                memory_store = Some(store.clone());
                (store.clone(), store.clone(), store)
            }
            BackendKind::Document => {
                let store = Arc::new(
                    DocumentStore::new(config.state_dir.join("store")).ttl_ms(config.ttl_ms()),
                );
                document_store = Some(store.clone());
                (store.clone(), store.clone(), store)
            }
            BackendKind::Redis => {
                let url = config.redis_url.clone().ok_or_else(|| {
                    cadre_store::StoreError::Config("redis backend requires a URL".to_string())
                })?;
                let store = Arc::new(
                    RedisStore::connect(&url, config.key_prefix.clone(), config.ttl.as_secs())
                        .await?,
                );
                (store.clone(), store.clone(), store)
            }
        };

        // Local mode runs handlers inline off an in-process queue; remote
        // mode posts to the per-worker queue URLs.
        let (dispatcher, consumer): (Arc<dyn Dispatch>, Option<tokio::task::JoinHandle<()>>) =
            if cadre_dispatch::env::local_mode() {
                let (queue, rx) = LocalQueue::new();
                let dispatcher: Arc<dyn Dispatch> = Arc::new(Dispatcher::new(Arc::new(queue)));
                let runtime = Arc::new(WorkerRuntime::new(
                    workers.clone(),
                    jobs.clone(),
                    dispatcher.clone(),
                ));
                let consumer = runtime.spawn_consumer(rx);
                (dispatcher, Some(consumer))
            } else {
                let queue = HttpQueue::new(QueueUrlMap::from_env());
                (Arc::new(Dispatcher::new(Arc::new(queue))), None)
            };

        let engine = Engine::new(
            runs,
            jobs.clone(),
            dispatcher.clone(),
            AgentRouter::new(),
            PlanRegistry::new(),
            SystemClock,
        );

        Ok(Self {
            engine,
            jobs,
            queue_jobs,
            dispatcher,
            workers,
            state_dir,
            _lock_file: lock_file,
            consumer,
            document_store,
            memory_store,
        })
    }

    /// One periodic maintenance pass: due timers, overdue hooks, TTL
    /// sweep.
    pub async fn tick(&self) {
        if let Err(e) = self.engine.resume_due_timers().await {
            tracing::warn!(error = %e, "timer sweep failed");
        }
        if let Err(e) = self.engine.fail_overdue_hooks().await {
            tracing::warn!(error = %e, "hook sweep failed");
        }
        if let Some(store) = &self.document_store {
            if let Err(e) = store.sweep_expired().await {
                tracing::warn!(error = %e, "ttl sweep failed");
            }
        }
        if let Some(store) = &self.memory_store {
            store.sweep_expired();
        }
    }

    /// Stop background work (the local consumer).
    pub fn shutdown(&self) {
        if let Some(consumer) = &self.consumer {
            consumer.abort();
        }
    }
}

/// Install the tracing subscriber: env-filtered stderr plus a rolling
/// file under the state dir.
pub fn init_tracing(state_dir: &std::path::Path) -> tracing_appender::non_blocking::WorkerGuard {
    let log_dir = state_dir.join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let appender = tracing_appender::rolling::daily(log_dir, "cadred.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();
    guard
}
