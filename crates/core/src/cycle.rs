// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cycle results: what one P-O-D-A-U pass produced.

use crate::config::AgentId;
use crate::KernelId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

crate::define_id! {
    /// Identifier for one engine cycle.
    pub struct CycleId;
}

crate::define_id! {
    /// Task-runner session identifier for a completed dispatch
    /// (`kernel-{agent}-{run}`).
    pub struct TaskId;
}

/// Terminal status of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl CycleStatus {
    /// Derive the cycle status from its counts.
    ///
    /// `failed == 0` is success (including the empty cycle); a mix of
    /// successes and failures is partial; all-failed is failed.
    pub fn derive(dispatched: u32, succeeded: u32, failed: u32) -> Self {
        if failed == 0 {
            CycleStatus::Success
        } else if succeeded > 0 {
            CycleStatus::PartialSuccess
        } else if dispatched > 0 {
            CycleStatus::Failed
        } else {
            CycleStatus::Success
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Success => "success",
            CycleStatus::PartialSuccess => "partial_success",
            CycleStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a dispatch needed recovery (or failed outright) during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryKind {
    /// The run stalled waiting for a human answer.
    AwaitingInput,
    /// The run finished without a single real tool action.
    NoRealAction,
    /// The run produced no usable summary or transcript.
    InvalidResult,
}

impl RecoveryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryKind::AwaitingInput => "awaiting_input",
            RecoveryKind::NoRealAction => "no_real_action",
            RecoveryKind::InvalidResult => "invalid_result",
        }
    }
}

impl std::fmt::Display for RecoveryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a dispatch reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyLabel {
    /// Succeeded outright or after the autonomous retry.
    Actionable,
    AwaitingInput,
    NoRealAction,
    InvalidResult,
}

impl From<RecoveryKind> for AutonomyLabel {
    fn from(kind: RecoveryKind) -> Self {
        match kind {
            RecoveryKind::AwaitingInput => AutonomyLabel::AwaitingInput,
            RecoveryKind::NoRealAction => AutonomyLabel::NoRealAction,
            RecoveryKind::InvalidResult => AutonomyLabel::InvalidResult,
        }
    }
}

impl AutonomyLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutonomyLabel::Actionable => "actionable",
            AutonomyLabel::AwaitingInput => "awaiting_input",
            AutonomyLabel::NoRealAction => "no_real_action",
            AutonomyLabel::InvalidResult => "invalid_result",
        }
    }
}

impl std::fmt::Display for AutonomyLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the executor hands back for one successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub task_id: TaskId,
    pub summary: String,
    /// 1 for a clean first attempt, 2 when the autonomous retry ran.
    pub attempts: u32,
    /// The classification the first attempt tripped, when `attempts == 2`.
    pub recovered_from: Option<RecoveryKind>,
    /// Always `Actionable` on success.
    pub autonomy: AutonomyLabel,
}

/// Per-agent outcome line inside a cycle result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCycleSummary {
    pub agent_id: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Terminal dispatch status rendered as `done` or `failed`.
    pub status: String,
    /// Summary text for `done`, error text for `failed`.
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovered_from: Option<RecoveryKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autonomy: Option<AutonomyLabel>,
}

/// Aggregate result of one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleResult {
    pub cycle_id: CycleId,
    pub kernel_id: KernelId,
    pub status: CycleStatus,
    pub dispatched: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub failed_agents: Vec<AgentId>,
    pub agent_summaries: Vec<AgentCycleSummary>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl CycleResult {
    /// An empty cycle: nothing planned, nothing dispatched.
    pub fn empty(cycle_id: CycleId, kernel_id: KernelId, duration: Duration) -> Self {
        Self {
            cycle_id,
            kernel_id,
            status: CycleStatus::Success,
            dispatched: 0,
            succeeded: 0,
            failed: 0,
            failed_agents: Vec::new(),
            agent_summaries: Vec::new(),
            duration,
        }
    }

    /// Recompute `status` from the counts.
    pub fn finalize(&mut self) {
        self.status = CycleStatus::derive(self.dispatched, self.succeeded, self.failed);
    }

    /// Success rate in percent, one decimal place.
    pub fn success_rate(&self) -> f64 {
        if self.dispatched == 0 {
            return 100.0;
        }
        let rate = f64::from(self.succeeded) * 100.0 / f64::from(self.dispatched);
        (rate * 10.0).round() / 10.0
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
#[path = "cycle_tests.rs"]
mod tests;
