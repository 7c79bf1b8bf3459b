// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Autonomy enforcement: retry on soft failure, blocking on confirmation
//! stalls.

use crate::prelude::*;
use ak_storage::DispatchStore;
use ak_core::{AgentConfig, AgentId, AutonomyLabel, CycleStatus, DispatchStatus, RecoveryKind};

#[tokio::test]
async fn soft_failure_recovers_on_the_autonomous_retry() {
    let s = spec(vec![AgentConfig::new("a", "push the objective")]);
    // First attempt: planning only, no summary. Second: real action.
    s.runner.push_result(planning_only_result());
    s.runner.push_result(valid_result("第二次真正执行了。"));

    let result = s.engine.run_cycle().await.unwrap();

    assert_eq!(result.status, CycleStatus::Success);
    assert_eq!(result.dispatched, 1);
    assert_eq!(result.succeeded, 1);

    let summary = &result.agent_summaries[0];
    assert_eq!(summary.status, "done");
    assert_eq!(summary.attempts, Some(2));
    assert_eq!(summary.recovered_from, Some(RecoveryKind::NoRealAction));
    assert_eq!(summary.autonomy, Some(AutonomyLabel::Actionable));

    // Two runner calls on the same session; the second carries the retry
    // instructions.
    let calls = s.runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].session_id, calls[1].session_id);
    assert!(calls[1].task.contains("重试指令"));
}

#[tokio::test]
async fn awaiting_confirmation_twice_blocks_the_dispatch() {
    let s = spec(vec![AgentConfig::new("a", "push the objective")]);
    s.runner.push_result(awaiting_result());

    let result = s.engine.run_cycle().await.unwrap();

    assert_eq!(result.status, CycleStatus::Failed);
    assert_eq!(result.dispatched, 1);
    assert_eq!(result.failed, 1);
    assert_eq!(result.failed_agents[0], "a");

    let summary = &result.agent_summaries[0];
    assert_eq!(summary.status, "failed");
    assert!(summary.detail.contains("awaiting user input"));
    assert_eq!(summary.autonomy, Some(AutonomyLabel::AwaitingInput));

    // Both attempts ran before giving up.
    assert_eq!(s.runner.calls().len(), 2);

    let recent = s.store.list_recent_by_agent(&s.kernel_id()).await.unwrap();
    let row = &recent[&AgentId::new("a")];
    assert_eq!(row.status, DispatchStatus::Failed);
    assert!(row.error.as_deref().unwrap().contains("awaiting user input"));
}

#[tokio::test]
async fn every_kernel_task_is_auto_approved() {
    let s = spec(vec![AgentConfig::new("a", "push")]);
    s.runner.push_result(valid_result("ok"));
    s.engine.run_cycle().await.unwrap();

    assert!(s.runner.calls().iter().all(|c| c.ctx.auto_approve));
}

#[tokio::test]
async fn wrapped_prompt_forbids_questions_and_demands_summary() {
    let s = spec(vec![AgentConfig::new("a", "push")]);
    s.runner.push_result(valid_result("ok"));
    s.engine.run_cycle().await.unwrap();

    let task = &s.runner.calls()[0].task;
    assert!(task.contains("禁止向用户提问"));
    assert!(task.contains("## 执行总结"));
}
