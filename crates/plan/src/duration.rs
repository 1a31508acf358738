// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Duration parsing for plan fields.
//!
//! Sleep durations, hook timeouts, and plan timeouts accept either raw
//! milliseconds or short text forms: `"500ms"`, `"30s"`, `"1m"` / `"1 min"`,
//! `"2h"`, `"7d"`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,
    #[error("invalid duration: {0:?}")]
    Invalid(String),
    #[error("unknown duration unit: {0:?}")]
    UnknownUnit(String),
}

/// A duration as it appears in a plan: raw milliseconds or text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationSpec {
    Millis(u64),
    Text(String),
}

impl DurationSpec {
    pub fn to_millis(&self) -> Result<u64, DurationError> {
        match self {
            DurationSpec::Millis(ms) => Ok(*ms),
            DurationSpec::Text(s) => parse_duration(s),
        }
    }
}

impl From<u64> for DurationSpec {
    fn from(ms: u64) -> Self {
        DurationSpec::Millis(ms)
    }
}

impl From<&str> for DurationSpec {
    fn from(s: &str) -> Self {
        DurationSpec::Text(s.to_string())
    }
}

impl From<String> for DurationSpec {
    fn from(s: String) -> Self {
        DurationSpec::Text(s)
    }
}

/// Parse a duration string into milliseconds.
///
/// Accepts an integer with an optional unit, separated by optional
/// whitespace. A bare number is milliseconds.
pub fn parse_duration(input: &str) -> Result<u64, DurationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationError::Empty);
    }

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| DurationError::Invalid(input.to_string()))?;

    let multiplier = match unit.trim() {
        "" | "ms" => 1,
        "s" | "sec" | "secs" | "second" | "seconds" => 1_000,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000,
        "d" | "day" | "days" => 86_400_000,
        other => return Err(DurationError::UnknownUnit(other.to_string())),
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| DurationError::Invalid(input.to_string()))
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod tests;
