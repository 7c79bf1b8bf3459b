// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable queue behavior across cycles: running-agent skip and stale
//! lease recovery.

use crate::prelude::*;
use ak_storage::DispatchStore;
use ak_core::{AgentConfig, AgentId, CycleId, DispatchSpec, DispatchStatus};
use std::collections::HashMap;
use std::time::Duration;

fn agent(id: &str) -> AgentConfig {
    AgentConfig::new(id, format!("objective for {id}"))
}

fn bare_spec(agent_id: &str) -> DispatchSpec {
    DispatchSpec {
        agent_id: AgentId::new(agent_id),
        prompt: "carry on".to_string(),
        priority: 0,
        metadata: HashMap::new(),
    }
}

#[tokio::test]
async fn running_agent_is_not_re_dispatched() {
    let s = spec(vec![agent("a"), agent("b")]);
    s.runner.push_result(valid_result("ok"));

    // Pre-seed a live running dispatch for `a` from an earlier cycle.
    let rows = s
        .store
        .enqueue_dispatches(&s.kernel_id(), &CycleId::new("c-0"), vec![bare_spec("a")])
        .await
        .unwrap();
    s.store.mark_dispatch_running(&rows[0].id).await.unwrap();

    let result = s.engine.run_cycle().await.unwrap();

    assert_eq!(result.dispatched, 1);
    assert_eq!(result.agent_summaries.len(), 1);
    assert_eq!(result.agent_summaries[0].agent_id, "b");

    // Only `b` reached the runner.
    let calls = s.runner.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].session_id.starts_with("kernel-b-"));

    // The pre-seeded dispatch is still running, lease intact.
    let active = s.store.list_active_dispatches(&s.kernel_id()).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].agent_id, "a");
    assert_eq!(active[0].status, DispatchStatus::Running);
}

#[tokio::test]
async fn expired_lease_is_recovered_and_agent_redispatched() {
    let s = spec(vec![agent("a")]);
    s.runner.push_result(valid_result("重新完成了。"));

    // A running dispatch whose lease expired before this cycle.
    let rows = s
        .store
        .enqueue_dispatches(&s.kernel_id(), &CycleId::new("c-0"), vec![bare_spec("a")])
        .await
        .unwrap();
    let stale_id = rows[0].id.clone();
    s.store.mark_dispatch_running(&stale_id).await.unwrap();
    s.clock.advance(Duration::from_secs(901));

    let result = s.engine.run_cycle().await.unwrap();
    assert_eq!(result.dispatched, 1);
    assert_eq!(result.succeeded, 1);

    // The stale row was failed by the sweep, the fresh one is done, and
    // nothing is left pending or running.
    let recent = s.store.list_recent_by_agent(&s.kernel_id()).await.unwrap();
    assert_eq!(recent[&AgentId::new("a")].status, DispatchStatus::Done);
    assert!(s
        .store
        .list_active_dispatches(&s.kernel_id())
        .await
        .unwrap()
        .is_empty());

    // The persisted document shows the stale row failed with the sweep
    // reason.
    let persisted = std::fs::read_to_string(s.store.path()).unwrap();
    assert!(persisted.contains("stale lease"), "stale row not failed: {persisted}");
    assert!(persisted.contains(stale_id.as_str()));
}

#[tokio::test]
async fn dispatch_rows_carry_cycle_and_kernel_ids() {
    let s = spec(vec![agent("a")]);
    s.runner.push_result(valid_result("ok"));
    let result = s.engine.run_cycle().await.unwrap();

    let recent = s.store.list_recent_by_agent(&s.kernel_id()).await.unwrap();
    let row = &recent[&AgentId::new("a")];
    assert_eq!(row.kernel_id, s.kernel_id());
    assert_eq!(row.cycle_id, result.cycle_id);
    assert!(row.task_id.is_some());
}
