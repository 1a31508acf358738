// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    validation = { ErrorKind::Validation, 400 },
    not_found = { ErrorKind::NotFound, 404 },
    conflict = { ErrorKind::Conflict, 409 },
    timeout = { ErrorKind::Timeout, 408 },
    dispatch = { ErrorKind::Dispatch, 502 },
    internal = { ErrorKind::Internal, 500 },
)]
fn status_codes(kind: ErrorKind, expected: u16) {
    assert_eq!(kind.http_status(), expected);
}

#[test]
fn kinds_render_snake_case() {
    assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
}
