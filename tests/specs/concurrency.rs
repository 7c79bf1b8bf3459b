// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker pool bounds and drain semantics.

use crate::prelude::*;
use ak_storage::DispatchStore;
use ak_adapters::FakeTaskRunner;
use ak_core::{AgentConfig, AgentId, DispatchStatus};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn agent(id: &str) -> AgentConfig {
    AgentConfig::new(id, format!("objective for {id}"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn max_concurrent_bounds_the_worker_pool() {
    let mut config = kernel_config(vec![agent("a"), agent("b"), agent("c")]);
    config.max_concurrent = 2;
    let runner = FakeTaskRunner::new().with_delay(Duration::from_millis(50));
    runner.push_result(valid_result("ok"));
    let s = spec_with(config, runner);

    let started = Instant::now();
    let result = s.engine.run_cycle().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(result.dispatched, 3);
    assert_eq!(result.succeeded, 3);
    assert!(s.runner.max_observed_parallelism() <= 2);

    // Two waves of work: roughly ceil(3/2) * 50ms.
    assert!(elapsed >= Duration::from_millis(90), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(500), "elapsed {elapsed:?}");

    let recent = s.store.list_recent_by_agent(&s.kernel_id()).await.unwrap();
    for id in ["a", "b", "c"] {
        assert_eq!(recent[&AgentId::new(id)].status, DispatchStatus::Done);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn zero_max_concurrent_still_makes_progress() {
    let mut config = kernel_config(vec![agent("a")]);
    config.max_concurrent = 0;
    let runner = FakeTaskRunner::new();
    runner.push_result(valid_result("ok"));
    let s = spec_with(config, runner);

    let result = s.engine.run_cycle().await.unwrap();
    assert_eq!(result.succeeded, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn summaries_are_sorted_despite_unordered_execution() {
    let mut config = kernel_config(vec![agent("c"), agent("a"), agent("b")]);
    config.max_concurrent = 3;
    let runner = FakeTaskRunner::new().with_delay(Duration::from_millis(10));
    runner.push_result(valid_result("ok"));
    let s = spec_with(config, runner);

    let result = s.engine.run_cycle().await.unwrap();
    let ids: Vec<&str> = result
        .agent_summaries
        .iter()
        .map(|s| s.agent_id.as_str())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_is_idempotent_and_run_exits() {
    let s = spec(vec![]);
    let engine = Arc::clone(&s.engine);
    let loop_handle = tokio::spawn(engine.run());

    s.engine.stop();
    s.engine.stop();
    tokio::time::timeout(Duration::from_secs(1), loop_handle)
        .await
        .expect("run loop should exit after stop")
        .unwrap();

    tokio::time::timeout(Duration::from_secs(1), s.engine.drain())
        .await
        .expect("drain should finish");
}
