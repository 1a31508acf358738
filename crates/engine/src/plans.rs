// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named plan registry for sub-workflow steps, and plan content hashing.

use cadre_plan::Plan;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Workflow-id → plan lookup for `workflow` steps.
#[derive(Clone, Default)]
pub struct PlanRegistry {
    plans: Arc<RwLock<HashMap<String, Plan>>>,
}

impl PlanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plan under an id. The plan is normalised on insert.
    pub fn register(&self, id: impl Into<String>, plan: Plan) {
        self.plans.write().insert(id.into(), plan.normalise());
    }

    pub fn get(&self, id: &str) -> Option<Plan> {
        self.plans.read().get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.plans.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Content hash of a serialisable plan, used as its default plan id.
/// `None` for in-process plans carrying closures.
pub fn plan_hash(plan: &Plan) -> Option<String> {
    let bytes = serde_json::to_vec(plan).ok()?;
    let digest = Sha256::digest(&bytes);
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        use std::fmt::Write;
        let _ = write!(hex, "{byte:02x}");
    }
    Some(hex)
}

#[cfg(test)]
#[path = "plans_tests.rs"]
mod tests;
