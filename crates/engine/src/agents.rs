// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent router: in-process synchronous callees resolved by path.
//!
//! Sub-agent calls go through [`AgentContext::call_agent`], which derives
//! a fresh context with an incremented depth; depth is bounded to break
//! agent-calls-agent cycles.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct AgentError(pub String);

impl From<String> for AgentError {
    fn from(s: String) -> Self {
        AgentError(s)
    }
}

impl From<&str> for AgentError {
    fn from(s: &str) -> Self {
        AgentError(s.to_string())
    }
}

/// An in-process callee, synchronous to the interpreter.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    async fn call(&self, ctx: &AgentContext, input: Value) -> Result<Value, AgentError>;
}

/// Path → handler registry.
#[derive(Clone, Default)]
pub struct AgentRouter {
    routes: Arc<RwLock<HashMap<String, Arc<dyn AgentHandler>>>>,
}

fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

impl AgentRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: impl AsRef<str>, handler: Arc<dyn AgentHandler>) {
        self.routes
            .write()
            .insert(normalize(path.as_ref()).to_string(), handler);
    }

    pub fn resolve(&self, path: &str) -> Option<Arc<dyn AgentHandler>> {
        self.routes.read().get(normalize(path)).cloned()
    }

    /// Invoke an agent at the root of a call chain.
    pub async fn call(
        &self,
        path: &str,
        input: Value,
        messages: Vec<Value>,
        max_depth: usize,
    ) -> Result<Value, AgentError> {
        self.call_at_depth(path, input, messages, 0, max_depth).await
    }

    pub(crate) async fn call_at_depth(
        &self,
        path: &str,
        input: Value,
        messages: Vec<Value>,
        depth: usize,
        max_depth: usize,
    ) -> Result<Value, AgentError> {
        let handler = self
            .resolve(path)
            .ok_or_else(|| AgentError(format!("unknown agent: {path:?}")))?;
        let ctx = AgentContext {
            path: normalize(path).to_string(),
            depth,
            max_depth,
            messages,
            router: self.clone(),
        };
        handler.call(&ctx, input).await
    }
}

/// Per-call context handed to an agent handler.
///
/// Each sub-agent call derives a fresh context from its parent; handlers
/// never share mutable state with the interpreter.
pub struct AgentContext {
    path: String,
    depth: usize,
    max_depth: usize,
    messages: Vec<Value>,
    router: AgentRouter,
}

impl AgentContext {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Initial messages from the start request.
    pub fn messages(&self) -> &[Value] {
        &self.messages
    }

    /// Call another agent from inside a handler.
    pub async fn call_agent(&self, path: &str, input: Value) -> Result<Value, AgentError> {
        let next = self.depth + 1;
        if next >= self.max_depth {
            return Err(AgentError(format!(
                "agent call depth limit reached ({}) calling {path:?}",
                self.max_depth
            )));
        }
        self.router
            .call_at_depth(path, input, self.messages.clone(), next, self.max_depth)
            .await
    }
}

#[cfg(test)]
#[path = "agents_tests.rs"]
mod tests;
