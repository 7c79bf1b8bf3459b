// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cycle results: counts, status derivation, store transitions.

use crate::prelude::*;
use ak_storage::DispatchStore;
use ak_core::{AgentConfig, AgentId, CycleStatus, DispatchStatus};
use ak_engine::{RUNTIME_END, RUNTIME_START};

fn agent(id: &str, priority: i32) -> AgentConfig {
    let mut config = AgentConfig::new(id, format!("objective for {id}: {{STATE}}"));
    config.priority = priority;
    config
}

#[tokio::test]
async fn empty_plan_cycle_is_a_success_without_execution() {
    let s = spec(vec![]);
    let result = s.engine.run_cycle().await.unwrap();

    assert_eq!(result.status, CycleStatus::Success);
    assert_eq!(result.dispatched, 0);
    assert_eq!(result.succeeded, 0);
    assert_eq!(result.failed, 0);
    assert!(s.runner.calls().is_empty());

    let state = s.engine.state_file().read_state().unwrap();
    assert!(state.contains(RUNTIME_START));
    assert!(state.contains(RUNTIME_END));
    assert!(state.contains("- latest_cycle_id: (none)"));
}

#[tokio::test]
async fn two_agents_succeed() {
    let s = spec(vec![agent("a", 10), agent("b", 5)]);
    s.runner.push_result(valid_result("搞定。"));

    let result = s.engine.run_cycle().await.unwrap();

    assert_eq!(result.status, CycleStatus::Success);
    assert_eq!(result.dispatched, 2);
    assert_eq!(result.succeeded, 2);
    assert_eq!(result.failed, 0);
    assert!(result.failed_agents.is_empty());

    // Summaries are sorted by agent ID.
    let ids: Vec<&str> = result
        .agent_summaries
        .iter()
        .map(|s| s.agent_id.as_str())
        .collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert!(result.agent_summaries.iter().all(|s| s.status == "done"));

    // Both dispatches are terminal `done` in the store.
    let recent = s.store.list_recent_by_agent(&s.kernel_id()).await.unwrap();
    assert_eq!(recent[&AgentId::new("a")].status, DispatchStatus::Done);
    assert_eq!(recent[&AgentId::new("b")].status, DispatchStatus::Done);
    assert!(s
        .store
        .list_active_dispatches(&s.kernel_id())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn partial_failure_derives_partial_success() {
    // One worker at a time keeps the scripted results mapped to config
    // order: `a` gets the success, `b` the failure.
    let mut config = kernel_config(vec![agent("a", 10), agent("b", 5)]);
    config.max_concurrent = 1;
    let s = spec_with(config, ak_adapters::FakeTaskRunner::new());
    s.runner.push_result(valid_result("完成了 a 的目标。"));
    s.runner.push_error("boom");

    let result = s.engine.run_cycle().await.unwrap();

    assert_eq!(result.status, CycleStatus::PartialSuccess);
    assert_eq!(result.dispatched, 2);
    assert_eq!(result.succeeded, 1);
    assert_eq!(result.failed, 1);
    assert_eq!(result.failed_agents.len(), 1);
    assert_eq!(result.failed_agents[0], "b");

    let recent = s.store.list_recent_by_agent(&s.kernel_id()).await.unwrap();
    assert_eq!(recent[&AgentId::new("a")].status, DispatchStatus::Done);
    let failed = &recent[&AgentId::new("b")];
    assert_eq!(failed.status, DispatchStatus::Failed);
    assert!(failed.error.as_deref().unwrap().contains("boom"));

    // The notifier heard about the partial cycle.
    let calls = s.notifier.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].message.contains("部分成功"));
}

#[tokio::test]
async fn dispatched_always_equals_succeeded_plus_failed() {
    let s = spec(vec![agent("a", 0), agent("b", 0), agent("c", 0)]);
    s.runner.push_result(valid_result("ok"));
    s.runner.push_error("boom");
    s.runner.push_result(valid_result("ok"));

    let result = s.engine.run_cycle().await.unwrap();
    assert_eq!(result.dispatched, result.succeeded + result.failed);
}

#[tokio::test]
async fn cycle_duration_is_reported() {
    let s = spec(vec![]);
    let result = s.engine.run_cycle().await.unwrap();
    // FakeClock is frozen, so the measured duration is exactly zero.
    assert_eq!(result.duration, std::time::Duration::ZERO);
}
