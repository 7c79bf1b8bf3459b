// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Autonomous kernel engine: the cron-driven perceive-plan-execute-update loop

mod docs;
mod engine;
mod error;
mod executor;
mod planner;
mod runtime_block;
mod validate;

pub use docs::{render_init_doc, render_system_prompt_doc};
pub use engine::{Engine, EngineDeps, SystemPromptProvider};
pub use error::EngineError;
pub use executor::{DispatchExecutor, ExecuteError};
pub use planner::{HybridPlanner, PlanError, Planner, StaticPlanner};
pub use runtime_block::{
    parse_history, render_runtime_block, upsert_runtime_block, HistoryEntry, RuntimeBlockInput,
    RUNTIME_END, RUNTIME_START,
};
pub use validate::{extract_summary, validate_result, ValidationFailure};
