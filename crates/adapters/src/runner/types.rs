// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transcript types returned by the task runner.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// The outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ToolResult {
    pub call_id: String,
    #[serde(default)]
    pub content: String,
    /// Set when the tool failed; an errored result is not a real action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// One record in the ordered message transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TaskMessage {
    pub role: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub tool_results: Vec<ToolResult>,
}

/// Result of one task execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TaskResult {
    /// Final answer text.
    pub answer: String,
    /// Why the run stopped (runner-specific; `await_user_input` is the one
    /// the kernel cares about).
    #[serde(default)]
    pub stop_reason: String,
    /// Ordered message transcript.
    #[serde(default)]
    pub messages: Vec<TaskMessage>,
}

impl TaskResult {
    /// Convenience constructor for an answer-only result.
    pub fn answered(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            ..Self::default()
        }
    }
}
