// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cadre-plan: the declarative plan language the orchestration
//! interpreter executes.
//!
//! Plans are immutable, serialisable descriptions of steps. They are built
//! either with the fluent [`PlanBuilder`] (in-process, closures allowed) or
//! from raw JSON (wire, serialisable forms only). Closure-valued fields
//! fail serialisation; deserialisation only admits the serialisable forms.

pub mod builder;
pub mod condition;
pub mod duration;
pub mod input;
pub mod plan;
pub mod poll;
pub mod step;

pub use builder::{PlanBuilder, StepOpts};
pub use condition::{get_at_path, when_step, Condition, StepFieldCondition, StepFieldOp};
pub use duration::{parse_duration, DurationError, DurationSpec};
pub use input::{ContextValueFn, InputSpec, InputTemplate, ResolveError};
pub use plan::{Plan, PlanError, DEFAULT_HOOK_TIMEOUT_MS};
pub use poll::{ResolvedPoll, WorkerPollConfig};
pub use step::{Step, StatusPhase, TokenSpec};
