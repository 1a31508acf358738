// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::condition::{when_step, StepFieldOp};
use crate::input::InputSpec;
use serde_json::json;

#[test]
fn builder_produces_a_normalised_plan() {
    let plan = PlanBuilder::new()
        .agent("now", InputSpec::Literal(json!({})), StepOpts::id("t1"))
        .hook("tok1", StepOpts::id("h"))
        .agent("now", InputSpec::Literal(json!({})), StepOpts::id("t2"))
        .build();

    let kinds: Vec<&str> = plan.steps.iter().map(Step::kind).collect();
    assert_eq!(
        kinds,
        vec!["agent", "_statusUpdate", "hook", "_statusUpdate", "agent"]
    );
    assert!(plan.validate().is_ok());
}

#[test]
fn worker_defaults_to_fire_and_forget() {
    let plan = PlanBuilder::new()
        .worker("transcode", None, StepOpts::id("w"))
        .build();
    match &plan.steps[0] {
        Step::Worker { awaited, .. } => assert!(!awaited),
        other => panic!("wrong step: {other:?}"),
    }
}

#[test]
fn worker_opts_carry_await_and_poll() {
    let plan = PlanBuilder::new()
        .worker(
            "transcode",
            None,
            StepOpts::id("w")
                .awaited(true)
                .worker_poll(WorkerPollConfig::default().interval_ms(50u64)),
        )
        .build();
    match &plan.steps[0] {
        Step::Worker { awaited, worker_poll, .. } => {
            assert!(awaited);
            assert_eq!(worker_poll.as_ref().and_then(|p| p.interval_ms), Some(50));
        }
        other => panic!("wrong step: {other:?}"),
    }
}

#[test]
fn condition_builder_wires_branches() {
    let plan = PlanBuilder::new()
        .agent("draft", None, StepOpts::id("approval"))
        .condition(
            when_step("approval", Some("payload.approved".to_string()), StepFieldOp::Eq, json!(true)),
            vec![Step::Agent {
                agent: "publish".into(),
                input: None,
                awaited: true,
                id: Some("pub".into()),
            }],
            vec![Step::Agent {
                agent: "revise".into(),
                input: None,
                awaited: true,
                id: Some("rev".into()),
            }],
        )
        .build();
    match &plan.steps[1] {
        Step::Condition { then, otherwise, .. } => {
            assert_eq!(then.len(), 1);
            assert!(otherwise.is_some());
        }
        other => panic!("wrong step: {other:?}"),
    }
}

#[test]
fn plan_level_settings_are_applied() {
    let plan = PlanBuilder::new()
        .plan_id("nightly")
        .continue_on_error(true)
        .timeout("30m")
        .hook_timeout("1d")
        .sleep("5s")
        .build();
    assert_eq!(plan.id.as_deref(), Some("nightly"));
    assert!(plan.continue_on_error);
    assert_eq!(plan.timeout_ms(), Some(1_800_000));
    assert_eq!(plan.hook_timeout_ms(), 86_400_000);
}

#[test]
fn closure_inputs_survive_the_builder() {
    let plan = PlanBuilder::new()
        .agent(
            "summarize",
            InputSpec::from_fn(|ctx| json!({"text": ctx.previous})),
            StepOpts::default(),
        )
        .build();
    match &plan.steps[0] {
        Step::Agent { input: Some(spec), .. } => {
            let mut ctx = cadre_core::RunContext::default();
            ctx.record_output(None, json!("body"));
            assert_eq!(spec.resolve(&ctx), json!({"text": "body"}));
        }
        other => panic!("wrong step: {other:?}"),
    }
}
