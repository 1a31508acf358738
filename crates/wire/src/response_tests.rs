// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn run_response_serializes_with_wire_keys() {
    let response = Response::Run(RunBody {
        run_id: "run-1".to_string(),
        status: RunStatus::Paused,
        result: None,
        error: None,
        hook: Some(HookBody {
            token: "tok1".to_string(),
        }),
        context: RunContext::default(),
        created_at: 1_000,
        updated_at: 1_001,
        completed_at: None,
    });
    let v = serde_json::to_value(&response).unwrap();
    assert_eq!(v["type"], json!("run"));
    assert_eq!(v["runId"], json!("run-1"));
    assert_eq!(v["status"], json!("paused"));
    assert_eq!(v["hook"]["token"], json!("tok1"));

    let back: Response = serde_json::from_value(v).unwrap();
    assert_eq!(back, response);
}

#[test]
fn error_response_carries_the_status_code() {
    let response = Response::error(ErrorKind::NotFound, "run not found");
    match &response {
        Response::Error { error, code, stack } => {
            assert_eq!(error, "run not found");
            assert_eq!(*code, 404);
            assert!(stack.is_none());
        }
        other => panic!("wrong variant: {other:?}"),
    }
}

#[test]
fn dispatched_response_round_trips() {
    let response = Response::Dispatched {
        job_id: "job-1".to_string(),
        status: JobStatus::Queued,
        message_id: Some("msg-1".to_string()),
        output: None,
    };
    let v = serde_json::to_value(&response).unwrap();
    assert_eq!(v["type"], json!("dispatched"));
    assert_eq!(v["jobId"], json!("job-1"));
    let back: Response = serde_json::from_value(v).unwrap();
    assert_eq!(back, response);
}
