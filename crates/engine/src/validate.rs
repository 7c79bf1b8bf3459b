// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Autonomy validation of task-runner transcripts.
//!
//! The runner knows nothing about kernel rules; this module enforces them
//! by inspection alone. A valid result must not stall on a human question,
//! must contain at least one real tool action, and must end with a
//! `## 执行总结` section.

use ak_adapters::{TaskMessage, TaskResult};
use ak_core::{compact_summary, RecoveryKind};
use std::collections::HashMap;

/// Final-answer section every kernel task must end with.
pub const SUMMARY_HEADER: &str = "## 执行总结";

/// Stop reason the runner reports when the model asked the user something.
const AWAIT_STOP_REASON: &str = "await_user_input";

/// Tool names that coordinate work without doing any.
///
/// `clearify` is a historical misspelling of `clarify` that still appears
/// in transcripts; both are accepted.
const ORCHESTRATION_TOOLS: &[&str] = &[
    "plan",
    "clarify",
    "clearify",
    "todo_read",
    "todo_update",
    "attention",
    "context_checkpoint",
    "request_user",
];

/// Confirmation-prompt phrases that mark a run as waiting for a human.
///
/// `Both` requires each phrase to appear somewhere in the answer.
enum Pattern {
    One(&'static str),
    Both(&'static str, &'static str),
}

const CONFIRMATION_PATTERNS: &[Pattern] = &[
    Pattern::One("do you want me"),
    Pattern::One("would you like me"),
    Pattern::One("please confirm"),
    Pattern::One("should i proceed"),
    Pattern::One("let me know if you"),
    Pattern::Both("option a", "option b"),
    Pattern::Both("我的理解是", "对吗"),
    Pattern::One("请确认"),
    Pattern::One("请选择"),
    Pattern::Both("你要我", "吗"),
    Pattern::One("需要我继续吗"),
];

/// Why a transcript failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    /// The run stalled on a confirmation prompt; carries the trigger that
    /// tripped the detector, for logging.
    AwaitingInput { trigger: String },
    NoRealAction,
    InvalidResult { reason: String },
}

impl ValidationFailure {
    pub fn kind(&self) -> RecoveryKind {
        match self {
            ValidationFailure::AwaitingInput { .. } => RecoveryKind::AwaitingInput,
            ValidationFailure::NoRealAction => RecoveryKind::NoRealAction,
            ValidationFailure::InvalidResult { .. } => RecoveryKind::InvalidResult,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ValidationFailure::AwaitingInput { trigger } => {
                format!("run is awaiting user input ({trigger})")
            }
            ValidationFailure::NoRealAction => {
                "run finished without a real tool action".to_string()
            }
            ValidationFailure::InvalidResult { reason } => {
                format!("run produced an invalid result ({reason})")
            }
        }
    }
}

fn is_orchestration(name: &str) -> bool {
    ORCHESTRATION_TOOLS
        .iter()
        .any(|t| name.eq_ignore_ascii_case(t))
}

fn awaiting_trigger(result: &TaskResult) -> Option<String> {
    if result.stop_reason.eq_ignore_ascii_case(AWAIT_STOP_REASON) {
        return Some(format!("stop_reason={AWAIT_STOP_REASON}"));
    }
    for message in &result.messages {
        for call in &message.tool_calls {
            if call.name.eq_ignore_ascii_case("request_user") {
                return Some("tool_call=request_user".to_string());
            }
        }
    }
    let answer = result.answer.to_lowercase();
    for pattern in CONFIRMATION_PATTERNS {
        match pattern {
            Pattern::One(p) if answer.contains(p) => {
                return Some(format!("pattern={p}"));
            }
            Pattern::Both(a, b) if answer.contains(a) && answer.contains(b) => {
                return Some(format!("pattern={a}…{b}"));
            }
            _ => {}
        }
    }
    None
}

/// A real action is a tool result whose paired call is not an
/// orchestration tool and whose error is absent. When the transcript has
/// no tool results at all, the presence of any non-orchestration tool call
/// is accepted instead.
fn has_real_tool_action(messages: &[TaskMessage]) -> bool {
    let mut call_names: HashMap<&str, &str> = HashMap::new();
    for message in messages {
        for call in &message.tool_calls {
            call_names.insert(call.id.as_str(), call.name.as_str());
        }
    }

    let mut saw_result = false;
    for message in messages {
        for tool_result in &message.tool_results {
            saw_result = true;
            if tool_result.error.is_some() {
                continue;
            }
            match call_names.get(tool_result.call_id.as_str()) {
                Some(name) if !is_orchestration(name) => return true,
                _ => {}
            }
        }
    }
    if saw_result {
        return false;
    }
    call_names.values().any(|name| !is_orchestration(name))
}

/// Validate one transcript against the kernel autonomy rules.
pub fn validate_result(result: &TaskResult) -> Result<(), ValidationFailure> {
    if let Some(trigger) = awaiting_trigger(result) {
        return Err(ValidationFailure::AwaitingInput { trigger });
    }
    if !has_real_tool_action(&result.messages) {
        return Err(ValidationFailure::NoRealAction);
    }
    if result.answer.trim().is_empty() {
        return Err(ValidationFailure::InvalidResult {
            reason: "empty answer".to_string(),
        });
    }
    if !result.answer.contains(SUMMARY_HEADER) {
        return Err(ValidationFailure::InvalidResult {
            reason: format!("missing {SUMMARY_HEADER} section"),
        });
    }
    Ok(())
}

/// Extract the `## 执行总结` section from the final answer and compact it
/// to `max_chars`. When the header is missing, the whole answer is
/// compacted instead; the retry appendix uses this on unvalidated answers.
pub fn extract_summary(answer: &str, max_chars: usize) -> String {
    let Some(idx) = answer.find(SUMMARY_HEADER) else {
        return compact_summary(answer, max_chars);
    };
    let body = &answer[idx + SUMMARY_HEADER.len()..];
    let end = body.find("\n## ").unwrap_or(body.len());
    compact_summary(&body[..end], max_chars)
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
