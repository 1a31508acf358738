// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cadre-worker: the out-of-process worker runtime.
//!
//! A worker process consumes queue messages, drives handlers through the
//! durable job lifecycle (idempotency check, queued → running → terminal),
//! fires completion webhooks, and re-throws handler failures so the
//! queue's redelivery policy can retry.

pub mod context;
pub mod error;
pub mod handler;
pub mod runtime;

pub use context::{DispatchWorkerOptions, DispatchWorkerOutcome, JobContext};
pub use error::WorkerError;
pub use handler::{WorkerHandler, WorkerRegistry};
pub use runtime::WorkerRuntime;
