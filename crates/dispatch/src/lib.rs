// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cadre-dispatch: enqueue worker jobs and deliver webhooks.
//!
//! The dispatcher resolves a per-worker queue URL from the environment and
//! posts the queue message to it; in local mode the message goes straight
//! to the in-process worker runtime over a channel. The dispatcher holds
//! no state beyond the env-derived queue URL map.

pub mod dispatcher;
pub mod env;
pub mod error;
pub mod message;
pub mod queue;
pub mod webhook;

pub use dispatcher::{Dispatch, DispatchOptions, DispatchReceipt, Dispatcher, MAX_DELAY_SECONDS};
pub use env::QueueUrlMap;
pub use error::DispatchError;
pub use message::{MessageContext, QueueMessage};
pub use queue::{HttpQueue, LocalQueue, QueueAdapter};
pub use webhook::{WebhookClient, WebhookPayload, WebhookStatus};
