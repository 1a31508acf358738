// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound signal resuming a paused run.
//!
//! Tokens are opaque strings chosen by the caller at start time (or by a
//! plan's token function). The runtime never mints tokens, so a signal can
//! arrive from any out-of-band channel that learned the token.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub token: String,
    pub payload: Value,
    pub created_at: u64,
}

impl Signal {
    pub fn new(token: impl Into<String>, payload: Value, epoch_ms: u64) -> Self {
        Self {
            token: token.into(),
            payload,
            created_at: epoch_ms,
        }
    }
}
