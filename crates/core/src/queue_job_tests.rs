// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn pipeline() -> QueueJob {
    QueueJob::started(
        "job-1",
        "video-pipeline",
        QueueJobStep::queued("extract", "job-1"),
        Map::new(),
        1_000,
    )
}

#[test]
fn started_pipeline_is_running_with_one_queued_step() {
    let qj = pipeline();
    assert_eq!(qj.status, QueueStepStatus::Running);
    assert_eq!(qj.steps.len(), 1);
    assert_eq!(qj.steps[0].status, QueueStepStatus::Queued);
}

#[test]
fn completing_a_middle_step_keeps_pipeline_running() {
    let mut qj = pipeline();
    qj.append_step(QueueJobStep::queued("transcode", "job-2"), 1_001);
    qj.update_step(0, QueueStepStatus::Completed, None, Some(json!({"f": 1})), None, 1_002);
    assert_eq!(qj.status, QueueStepStatus::Running);
    assert_eq!(qj.steps[0].completed_at, Some(1_002));
    assert!(qj.completed_at.is_none());
}

#[test]
fn completing_the_last_step_completes_the_pipeline() {
    let mut qj = pipeline();
    qj.update_step(0, QueueStepStatus::Completed, None, Some(json!(1)), None, 1_005);
    assert_eq!(qj.status, QueueStepStatus::Completed);
    assert_eq!(qj.completed_at, Some(1_005));
}

#[test]
fn a_failed_step_fails_the_pipeline() {
    let mut qj = pipeline();
    qj.append_step(QueueJobStep::queued("transcode", "job-2"), 1_001);
    qj.update_step(
        0,
        QueueStepStatus::Failed,
        None,
        None,
        Some(JobError::new("ffmpeg exploded")),
        1_002,
    );
    assert_eq!(qj.status, QueueStepStatus::Failed);
    assert_eq!(qj.completed_at, Some(1_002));
    assert_eq!(qj.steps[0].error.as_ref().unwrap().message, "ffmpeg exploded");
}

#[test]
fn started_at_and_completed_at_are_written_once() {
    let mut qj = pipeline();
    qj.update_step(0, QueueStepStatus::Running, None, None, None, 1_001);
    qj.update_step(0, QueueStepStatus::Running, None, None, None, 2_000);
    assert_eq!(qj.steps[0].started_at, Some(1_001));
    qj.update_step(0, QueueStepStatus::Completed, None, None, None, 3_000);
    qj.update_step(0, QueueStepStatus::Completed, None, None, None, 4_000);
    assert_eq!(qj.steps[0].completed_at, Some(3_000));
}

#[test]
fn unknown_index_is_ignored() {
    let mut qj = pipeline();
    qj.update_step(7, QueueStepStatus::Completed, None, None, None, 1_001);
    assert_eq!(qj.status, QueueStepStatus::Running);
}

#[test]
fn previous_outputs_lists_completed_steps_in_order() {
    let mut qj = pipeline();
    qj.append_step(QueueJobStep::queued("transcode", "job-2"), 1_001);
    qj.update_step(0, QueueStepStatus::Completed, None, Some(json!("a")), None, 1_002);
    let outs = qj.previous_outputs();
    assert_eq!(outs.len(), 1);
    assert_eq!(outs[0], (0, "extract", &json!("a")));
}
