// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task runner adapter
//!
//! The runner executes one task (an LLM session with tools) and returns
//! the final answer plus the full message transcript. The kernel inspects
//! the transcript to enforce autonomy rules; the runner itself knows
//! nothing about them.

mod types;

pub use types::{TaskMessage, TaskResult, ToolCall, ToolResult};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTaskRunner, RunnerCall};

use crate::selection::ResolvedSelection;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from task execution
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("cancelled")]
    Cancelled,
}

/// Per-dispatch execution context.
///
/// Kernel cycles are unattended: `auto_approve` is always set so the
/// runner never blocks on a human tool gate.
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    pub run_id: String,
    pub session_id: String,
    pub user_id: Option<String>,
    pub channel: Option<String>,
    pub chat_id: Option<String>,
    /// Approve tool gates without asking; unattended cycles must not block.
    pub auto_approve: bool,
    /// Pinned model selection, when a resolver matched the routing keys.
    pub selection: Option<ResolvedSelection>,
    /// Per-dispatch deadline.
    pub timeout: Option<Duration>,
}

/// Adapter for executing tasks against the external runtime
#[async_trait]
pub trait TaskRunner: Clone + Send + Sync + 'static {
    /// Execute one task to completion and return the transcript.
    async fn execute_task(
        &self,
        ctx: &TaskContext,
        task: &str,
        session_id: &str,
    ) -> Result<TaskResult, RunnerError>;
}
