// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch executor
//!
//! Runs exactly one dispatch against the task runner. The prompt is
//! wrapped with the founder directive and the summary requirement, the
//! transcript is validated for autonomy, and a soft failure earns exactly
//! one retry with a corrective appendix.

use crate::validate::{extract_summary, validate_result, ValidationFailure, SUMMARY_HEADER};
use ak_adapters::{RunnerError, SelectionResolver, TaskContext, TaskResult, TaskRunner};
use ak_core::{
    AgentId, AutonomyLabel, ExecutionResult, IdGen, RecoveryKind, TaskId, UuidIdGen,
};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const SUMMARY_BUDGET: usize = 500;

/// Preamble attached to every kernel task.
const FOUNDER_DIRECTIVE: &str = "\
你是自主运行的内核代理，本周期内没有人类在场。
- 禁止向用户提问或等待确认；遇到歧义时自行选择最合理的方案并继续。
- 必须至少执行一次真实的工具操作（规划、澄清、待办清单不算）。
- 直接推进目标，而不是描述你打算做什么。";

/// Postamble demanding the summary section.
const SUMMARY_REQUIREMENT: &str = "\
完成后，在回答末尾追加一个标题为「## 执行总结」的小节，概述你实际完成的操作与结果。";

/// Errors from dispatch execution
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("runner error: {0}")]
    Runner(#[from] RunnerError),
    #[error("{message}")]
    Validation {
        kind: RecoveryKind,
        message: String,
        attempts: u32,
    },
}

impl ExecuteError {
    /// The validation classification, when this is a validation failure.
    pub fn recovery_kind(&self) -> Option<RecoveryKind> {
        match self {
            ExecuteError::Validation { kind, .. } => Some(*kind),
            ExecuteError::Runner(_) => None,
        }
    }

    /// How many attempts ran before the error was returned.
    pub fn attempts(&self) -> u32 {
        match self {
            ExecuteError::Validation { attempts, .. } => *attempts,
            ExecuteError::Runner(_) => 1,
        }
    }
}

/// Executes one dispatch with autonomy-preserving semantics.
#[derive(Clone)]
pub struct DispatchExecutor<R: TaskRunner, G: IdGen = UuidIdGen> {
    runner: R,
    ids: G,
    timeout: Option<Duration>,
    resolver: Option<SelectionResolver>,
}

impl<R: TaskRunner> DispatchExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            ids: UuidIdGen,
            timeout: None,
            resolver: None,
        }
    }
}

impl<R: TaskRunner, G: IdGen> DispatchExecutor<R, G> {
    /// Use an explicit run-ID generator.
    pub fn with_ids<G2: IdGen>(self, ids: G2) -> DispatchExecutor<R, G2> {
        DispatchExecutor {
            runner: self.runner,
            ids,
            timeout: self.timeout,
            resolver: self.resolver,
        }
    }

    /// Bound each attempt with a deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resolve a pinned model selection from routing metadata.
    pub fn with_selection_resolver(mut self, resolver: SelectionResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    fn wrap_prompt(prompt: &str) -> String {
        format!("{FOUNDER_DIRECTIVE}\n\n{prompt}\n\n{SUMMARY_REQUIREMENT}")
    }

    fn retry_prompt(wrapped: &str, failure: &ValidationFailure, previous_answer: &str) -> String {
        let previous = extract_summary(previous_answer, SUMMARY_BUDGET);
        format!(
            "{wrapped}\n\n\
             ## 重试指令\n\
             上一次执行被判定为「{}」：{}\n\
             重申自主规则：不要提问、不要等待确认，至少完成一次真实的工具操作，\
             并以「{SUMMARY_HEADER}」小节收尾。\n\
             上一次的输出摘要：{}",
            failure.kind(),
            failure.message(),
            if previous.is_empty() {
                "(无)"
            } else {
                previous.as_str()
            }
        )
    }

    async fn run_once(
        &self,
        ctx: &TaskContext,
        task: &str,
        session_id: &str,
    ) -> Result<TaskResult, ExecuteError> {
        let result = match self.timeout {
            Some(deadline) => {
                tokio::time::timeout(deadline, self.runner.execute_task(ctx, task, session_id))
                    .await
                    .map_err(|_| RunnerError::Timeout(deadline))??
            }
            None => self.runner.execute_task(ctx, task, session_id).await?,
        };
        Ok(result)
    }

    fn success(
        session_id: &str,
        result: &TaskResult,
        attempts: u32,
        recovered_from: Option<RecoveryKind>,
    ) -> ExecutionResult {
        ExecutionResult {
            task_id: TaskId::new(session_id),
            summary: extract_summary(&result.answer, SUMMARY_BUDGET),
            attempts,
            recovered_from,
            autonomy: AutonomyLabel::Actionable,
        }
    }

    /// Execute one dispatch: run, validate, retry once on soft failure.
    pub async fn execute(
        &self,
        agent_id: &AgentId,
        prompt: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<ExecutionResult, ExecuteError> {
        let run_id = self.ids.next();
        let session_id = format!("kernel-{agent_id}-{run_id}");

        let channel = metadata.get("channel").cloned();
        let chat_id = metadata.get("chat_id").cloned();
        let user_id = metadata.get("user_id").cloned();
        let selection = self.resolver.as_ref().and_then(|resolve| {
            resolve(channel.as_deref(), chat_id.as_deref(), user_id.as_deref())
        });

        let ctx = TaskContext {
            run_id,
            session_id: session_id.clone(),
            user_id,
            channel,
            chat_id,
            auto_approve: true,
            selection,
            timeout: self.timeout,
        };

        let wrapped = Self::wrap_prompt(prompt);
        let first = self.run_once(&ctx, &wrapped, &session_id).await?;
        let failure = match validate_result(&first) {
            Ok(()) => {
                info!(agent_id = %agent_id, session_id = %session_id, "dispatch succeeded");
                return Ok(Self::success(&session_id, &first, 1, None));
            }
            Err(failure) => failure,
        };

        warn!(
            agent_id = %agent_id,
            session_id = %session_id,
            classification = %failure.kind(),
            detail = %failure.message(),
            "validation failed, retrying once"
        );

        let retry = Self::retry_prompt(&wrapped, &failure, &first.answer);
        let second = self.run_once(&ctx, &retry, &session_id).await?;
        match validate_result(&second) {
            Ok(()) => {
                info!(
                    agent_id = %agent_id,
                    session_id = %session_id,
                    recovered_from = %failure.kind(),
                    "dispatch recovered on retry"
                );
                Ok(Self::success(&session_id, &second, 2, Some(failure.kind())))
            }
            Err(second_failure) => {
                warn!(
                    agent_id = %agent_id,
                    session_id = %session_id,
                    classification = %second_failure.kind(),
                    detail = %second_failure.message(),
                    "retry failed validation"
                );
                Err(ExecuteError::Validation {
                    kind: second_failure.kind(),
                    message: second_failure.message(),
                    attempts: 2,
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
