// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch records: planned work items and their durable lifecycle.

use crate::config::AgentId;
use crate::cycle::{CycleId, TaskId};
use crate::KernelId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Unique identifier for one dispatch row. Never reused.
    pub struct DispatchId;
}

/// Status of a dispatch through its lifecycle.
///
/// Transitions form the DAG `pending → running → {done, failed}`.
/// Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl DispatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchStatus::Done | DispatchStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::Pending => "pending",
            DispatchStatus::Running => "running",
            DispatchStatus::Done => "done",
            DispatchStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the planner asks the engine to run: one unit of work for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSpec {
    pub agent_id: AgentId,
    /// Prompt with `{STATE}` already substituted.
    pub prompt: String,
    pub priority: i32,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A durable dispatch row owned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispatch {
    pub id: DispatchId,
    pub kernel_id: KernelId,
    pub cycle_id: CycleId,
    pub agent_id: AgentId,
    pub prompt: String,
    pub priority: i32,
    pub status: DispatchStatus,
    /// Set on successful completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Set on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Lease expiry while running; expired leases are recoverable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_until_ms: Option<u64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
