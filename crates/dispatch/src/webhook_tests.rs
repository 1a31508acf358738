// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cadre_core::JobUpdate;
use serde_json::json;

#[test]
fn completed_jobs_report_success() {
    let mut job = cadre_core::Job::builder().status(JobStatus::Running).build();
    job.apply(JobUpdate::completed(json!({"ok": 1})), 2_000);
    let payload = WebhookPayload::from_job(&job);
    assert_eq!(payload.status, WebhookStatus::Success);
    assert_eq!(payload.output, Some(json!({"ok": 1})));
    assert!(payload.error.is_none());
}

#[test]
fn failed_jobs_report_error() {
    let mut job = cadre_core::Job::builder().status(JobStatus::Running).build();
    job.apply(
        JobUpdate::failed(JobError::new("boom").name("HandlerError")),
        2_000,
    );
    let payload = WebhookPayload::from_job(&job);
    assert_eq!(payload.status, WebhookStatus::Error);
    assert_eq!(payload.error.as_ref().map(|e| e.message.as_str()), Some("boom"));
}

#[test]
fn payload_serializes_with_wire_field_names() {
    let job = cadre_core::Job::builder().build();
    let payload = WebhookPayload::from_job(&job);
    let v = serde_json::to_value(&payload).unwrap();
    assert!(v.get("jobId").is_some());
    assert!(v.get("workerId").is_some());
    assert_eq!(v["status"], json!("error"));

    let back: WebhookPayload = serde_json::from_value(v).unwrap();
    assert_eq!(back, payload);
}

#[tokio::test]
async fn delivery_failures_are_swallowed() {
    let client = WebhookClient::new();
    let job = cadre_core::Job::builder().build();
    // Nothing is listening on this port; notify must not panic or error.
    client
        .notify("http://127.0.0.1:9/unreachable", &WebhookPayload::from_job(&job))
        .await;
}
