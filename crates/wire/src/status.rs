// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy and status-code mapping for REST gateways.

use serde::{Deserialize, Serialize};

/// Caller-facing error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Malformed plan, bad input, missing required fields.
    Validation,
    /// Unknown run, job, or signal token.
    NotFound,
    /// Mutating a terminal run, resuming a non-paused run.
    Conflict,
    /// Hook, sleep, poll, or plan timeout exceeded.
    Timeout,
    /// Queue unreachable or unknown worker queue URL.
    Dispatch,
    /// Storage failures and other internal errors.
    Internal,
}

cadre_core::wire_name! {
    ErrorKind {
        Validation => "validation",
        NotFound => "not_found",
        Conflict => "conflict",
        Timeout => "timeout",
        Dispatch => "dispatch",
        Internal => "internal",
    }
}

impl ErrorKind {
    /// The HTTP status a REST gateway should use for this class.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Timeout => 408,
            ErrorKind::Dispatch => 502,
            ErrorKind::Internal => 500,
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
