// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

struct Upper;

#[async_trait]
impl AgentHandler for Upper {
    async fn call(&self, _ctx: &AgentContext, input: Value) -> Result<Value, AgentError> {
        let text = input.as_str().unwrap_or_default().to_uppercase();
        Ok(json!(text))
    }
}

struct Delegating;

#[async_trait]
impl AgentHandler for Delegating {
    async fn call(&self, ctx: &AgentContext, input: Value) -> Result<Value, AgentError> {
        ctx.call_agent("upper", input).await
    }
}

struct Recursing;

#[async_trait]
impl AgentHandler for Recursing {
    async fn call(&self, ctx: &AgentContext, input: Value) -> Result<Value, AgentError> {
        ctx.call_agent("recurse", input).await
    }
}

#[tokio::test]
async fn router_resolves_by_path() {
    let router = AgentRouter::new();
    router.register("upper", std::sync::Arc::new(Upper));
    let out = router.call("upper", json!("hi"), vec![], 10).await.unwrap();
    assert_eq!(out, json!("HI"));
}

#[tokio::test]
async fn leading_slashes_are_normalized() {
    let router = AgentRouter::new();
    router.register("/agents/upper", std::sync::Arc::new(Upper));
    assert!(router.resolve("agents/upper").is_some());
    let out = router
        .call("/agents/upper", json!("x"), vec![], 10)
        .await
        .unwrap();
    assert_eq!(out, json!("X"));
}

#[tokio::test]
async fn unknown_agents_error() {
    let router = AgentRouter::new();
    let err = router.call("ghost", json!(null), vec![], 10).await.unwrap_err();
    assert!(err.to_string().contains("unknown agent"));
}

#[tokio::test]
async fn sub_agent_calls_derive_a_deeper_context() {
    let router = AgentRouter::new();
    router.register("upper", std::sync::Arc::new(Upper));
    router.register("delegate", std::sync::Arc::new(Delegating));
    let out = router
        .call("delegate", json!("deep"), vec![], 10)
        .await
        .unwrap();
    assert_eq!(out, json!("DEEP"));
}

#[tokio::test]
async fn call_depth_is_bounded() {
    let router = AgentRouter::new();
    router.register("recurse", std::sync::Arc::new(Recursing));
    let err = router
        .call("recurse", json!(null), vec![], 5)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("depth limit"));
}

#[tokio::test]
async fn messages_flow_into_the_context() {
    struct Echoes;

    #[async_trait]
    impl AgentHandler for Echoes {
        async fn call(&self, ctx: &AgentContext, _input: Value) -> Result<Value, AgentError> {
            Ok(json!(ctx.messages().len()))
        }
    }

    let router = AgentRouter::new();
    router.register("echoes", std::sync::Arc::new(Echoes));
    let out = router
        .call("echoes", json!(null), vec![json!({"role": "user"})], 10)
        .await
        .unwrap();
    assert_eq!(out, json!(1));
}
