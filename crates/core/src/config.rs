// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kernel and agent configuration.

use crate::schedule::{CronSchedule, ScheduleError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

crate::define_id! {
    /// Tenancy key for one engine instance.
    ///
    /// All dispatch-store reads and writes are filtered by this ID, so
    /// multiple engines may share a store as long as their kernel IDs
    /// differ.
    pub struct KernelId;
}

crate::define_id! {
    /// Identifier for a configured agent within a kernel.
    pub struct AgentId;
}

/// Literal token in agent prompts replaced with the full state content.
pub const STATE_TOKEN: &str = "{STATE}";

/// Default worker pool size per cycle.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Default rolling cycle-history size.
pub const DEFAULT_MAX_CYCLE_HISTORY: usize = 5;

/// Default lease duration for running dispatches.
pub const DEFAULT_LEASE_SECONDS: u64 = 900;

/// Errors from configuration validation
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("kernel id must not be empty")]
    EmptyKernelId,
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// One agent the static planner considers each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: AgentId,
    /// Prompt template; may contain the literal `{STATE}` token.
    pub prompt: String,
    /// Higher is more urgent.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl AgentConfig {
    pub fn new(id: impl Into<AgentId>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            priority: 0,
            enabled: true,
            metadata: HashMap::new(),
        }
    }
}

/// Immutable configuration for one engine instance.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    pub kernel_id: KernelId,
    /// 5-field cron expression (minute hour dom month dow).
    pub schedule: String,
    /// Initial STATE.md body, written once when state is absent.
    pub seed_state: String,
    pub max_concurrent: usize,
    pub max_cycle_history: usize,
    /// Per-dispatch executor timeout. Should not exceed `lease_seconds`,
    /// otherwise a later cycle may recover work that is still running.
    pub timeout_seconds: Option<u64>,
    pub lease_seconds: u64,
    pub channel: Option<String>,
    pub chat_id: Option<String>,
    pub user_id: Option<String>,
    pub agents: Vec<AgentConfig>,
}

impl KernelConfig {
    pub fn new(kernel_id: impl Into<KernelId>, schedule: impl Into<String>) -> Self {
        Self {
            kernel_id: kernel_id.into(),
            schedule: schedule.into(),
            seed_state: String::new(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_cycle_history: DEFAULT_MAX_CYCLE_HISTORY,
            timeout_seconds: None,
            lease_seconds: DEFAULT_LEASE_SECONDS,
            channel: None,
            chat_id: None,
            user_id: None,
            agents: Vec::new(),
        }
    }

    /// Validate the configuration and parse the cron schedule.
    ///
    /// An invalid schedule is a fatal configuration error: the engine
    /// refuses to build rather than start a loop that can never tick.
    pub fn validate(&self) -> Result<CronSchedule, ConfigError> {
        if self.kernel_id.as_str().trim().is_empty() {
            return Err(ConfigError::EmptyKernelId);
        }
        Ok(CronSchedule::parse(&self.schedule)?)
    }

    /// Worker pool capacity, floored at one.
    pub fn concurrency(&self) -> usize {
        self.max_concurrent.max(1)
    }

    /// Rolling history size, floored at one.
    pub fn history_limit(&self) -> usize {
        self.max_cycle_history.max(1)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
