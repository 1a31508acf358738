// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

fn meta(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn queued_record_has_creation_timestamps() {
    let job = Job::queued("j1", "echo", json!({"x": 1}), Map::new(), 5_000);
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.created_at, 5_000);
    assert_eq!(job.updated_at, 5_000);
    assert!(job.completed_at.is_none());
}

#[test]
fn completing_sets_completed_at_once() {
    let mut job = Job::builder().status(JobStatus::Running).build();
    assert!(job.apply(JobUpdate::completed(json!({"ok": 1})), 2_000));
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.completed_at, Some(2_000));
    assert_eq!(job.output, Some(json!({"ok": 1})));

    // A later duplicate terminal write must not move completed_at
    assert!(!job.apply(JobUpdate::completed(json!({"ok": 2})), 9_000));
    assert_eq!(job.completed_at, Some(2_000));
    assert_eq!(job.output, Some(json!({"ok": 1})));
}

#[test]
fn terminal_status_is_sticky() {
    let mut job = Job::builder().status(JobStatus::Running).build();
    job.apply(JobUpdate::failed(JobError::new("boom")), 2_000);
    assert_eq!(job.status, JobStatus::Failed);

    assert!(!job.apply(JobUpdate::status(JobStatus::Running), 3_000));
    assert_eq!(job.status, JobStatus::Failed);
    assert!(!job.apply(JobUpdate::completed(json!(1)), 3_000));
    assert_eq!(job.status, JobStatus::Failed);
}

#[test]
fn error_forces_failed_status() {
    let mut job = Job::builder().status(JobStatus::Running).build();
    let update = JobUpdate {
        status: Some(JobStatus::Completed),
        error: Some(JobError::new("handler threw")),
        ..JobUpdate::default()
    };
    job.apply(update, 2_000);
    assert_eq!(job.status, JobStatus::Failed);
}

#[test]
fn metadata_merges_key_by_key() {
    let mut job = Job::builder()
        .status(JobStatus::Running)
        .metadata(meta(&[("keep", json!(true)), ("swap", json!("old"))]))
        .build();
    let update = JobUpdate::default().metadata(Some(meta(&[("swap", json!("new"))])));
    job.apply(update, 2_000);
    assert_eq!(job.metadata["keep"], json!(true));
    assert_eq!(job.metadata["swap"], json!("new"));
}

#[test]
fn progress_lands_in_metadata() {
    let mut job = Job::builder().status(JobStatus::Running).build();
    let update = JobUpdate {
        progress: Some(0.5),
        progress_message: Some("halfway".to_string()),
        ..JobUpdate::default()
    };
    job.apply(update, 2_000);
    assert_eq!(job.metadata["progress"], json!(0.5));
    assert_eq!(job.metadata["progressMessage"], json!("halfway"));
}

#[test]
fn parent_job_id_reads_metadata() {
    let job = Job::builder()
        .metadata(meta(&[(PARENT_JOB_ID_KEY, json!("job-9"))]))
        .build();
    assert_eq!(job.parent_job_id(), Some("job-9"));
    assert_eq!(Job::builder().build().parent_job_id(), None);
}

#[parameterized(
    queued = { JobStatus::Queued, false },
    running = { JobStatus::Running, false },
    completed = { JobStatus::Completed, true },
    failed = { JobStatus::Failed, true },
)]
fn terminal_statuses(status: JobStatus, expected: bool) {
    assert_eq!(status.is_terminal(), expected);
}

#[parameterized(
    queued = { JobStatus::Queued },
    running = { JobStatus::Running },
    completed = { JobStatus::Completed },
    failed = { JobStatus::Failed },
)]
fn status_round_trips_through_wire_names(status: JobStatus) {
    assert_eq!(JobStatus::from_wire(status.wire_name()), Some(status));
    // Display and the wire name are the same string
    assert_eq!(status.to_string(), status.wire_name());
}

#[test]
fn unknown_wire_names_do_not_parse() {
    assert_eq!(JobStatus::from_wire("suspended"), None);
    assert_eq!(JobStatus::from_wire(""), None);
}

#[test]
fn job_serializes_with_camel_case_keys() {
    let job = Job::builder().build();
    let v = serde_json::to_value(&job).unwrap();
    assert!(v.get("jobId").is_some());
    assert!(v.get("workerId").is_some());
    assert!(v.get("createdAt").is_some());
}

#[test]
fn metadata_only_update_does_not_complete() {
    let mut job = Job::builder().status(JobStatus::Running).build();
    job.apply(
        JobUpdate::default().metadata(Some(meta(&[("k", json!(1))]))),
        2_000,
    );
    assert_eq!(job.status, JobStatus::Running);
    assert!(job.completed_at.is_none());
    assert_eq!(job.updated_at, 2_000);
}
