// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cadre_plan::{InputSpec, PlanBuilder, StepOpts};
use serde_json::json;

#[test]
fn registry_normalises_on_insert() {
    let registry = PlanRegistry::new();
    registry.register(
        "waitful",
        cadre_plan::Plan::new(vec![serde_json::from_value(
            json!({"type": "sleep", "duration": "5s"}),
        )
        .unwrap()]),
    );
    let plan = registry.get("waitful").unwrap();
    assert!(plan.is_normalised());
    assert!(registry.get("ghost").is_none());
}

#[test]
fn registry_lists_ids_sorted() {
    let registry = PlanRegistry::new();
    registry.register("b", cadre_plan::Plan::new(vec![]));
    registry.register("a", cadre_plan::Plan::new(vec![]));
    assert_eq!(registry.ids(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn plan_hash_is_stable_and_content_sensitive() {
    let plan_a = PlanBuilder::new()
        .agent("draft", InputSpec::Literal(json!({})), StepOpts::id("d"))
        .build();
    let plan_b = PlanBuilder::new()
        .agent("draft", InputSpec::Literal(json!({})), StepOpts::id("d"))
        .build();
    let plan_c = PlanBuilder::new()
        .agent("review", InputSpec::Literal(json!({})), StepOpts::id("r"))
        .build();

    let hash_a = plan_hash(&plan_a).unwrap();
    assert_eq!(hash_a, plan_hash(&plan_b).unwrap());
    assert_ne!(hash_a, plan_hash(&plan_c).unwrap());
    assert_eq!(hash_a.len(), 16);
}

#[test]
fn closure_plans_have_no_hash() {
    let plan = PlanBuilder::new()
        .agent(
            "draft",
            InputSpec::from_fn(|_| json!({})),
            StepOpts::default(),
        )
        .build();
    assert!(plan_hash(&plan).is_none());
}
