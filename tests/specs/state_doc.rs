// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State document invariants: runtime-block idempotence, rolling history,
//! and the sandbox-restriction fallback.

use crate::prelude::*;
use ak_core::AgentConfig;
use ak_engine::{parse_history, RUNTIME_END, RUNTIME_START};
use std::time::Duration;

#[tokio::test]
async fn three_cycles_leave_one_marker_pair_and_three_history_rows() {
    let s = spec(vec![AgentConfig::new("a", "push")]);
    s.runner.push_result(valid_result("ok"));

    for _ in 0..3 {
        s.engine.run_cycle().await.unwrap();
        s.clock.advance(Duration::from_secs(60));
    }

    let state = s.engine.state_file().read_state().unwrap();
    assert_eq!(state.matches(RUNTIME_START).count(), 1);
    assert_eq!(state.matches(RUNTIME_END).count(), 1);

    let history = parse_history(&state);
    assert_eq!(history.len(), 3);
    // Most recent first: timestamps descend down the table.
    assert!(history[0].timestamp > history[1].timestamp);
    assert!(history[1].timestamp > history[2].timestamp);
}

#[tokio::test]
async fn history_is_bounded_by_max_cycle_history() {
    let mut config = kernel_config(vec![AgentConfig::new("a", "push")]);
    config.max_cycle_history = 2;
    let s = spec_with(config, ak_adapters::FakeTaskRunner::new());
    s.runner.push_result(valid_result("ok"));

    for _ in 0..5 {
        s.engine.run_cycle().await.unwrap();
        s.clock.advance(Duration::from_secs(60));
    }

    let state = s.engine.state_file().read_state().unwrap();
    assert_eq!(parse_history(&state).len(), 2);
}

#[tokio::test]
async fn agent_owned_content_survives_every_cycle() {
    let s = spec(vec![]);
    s.engine
        .state_file()
        .write_state("# My Notes\n\nhand-written agent text\n")
        .unwrap();

    s.engine.run_cycle().await.unwrap();
    s.engine.run_cycle().await.unwrap();

    let state = s.engine.state_file().read_state().unwrap();
    assert!(state.starts_with("# My Notes\n\nhand-written agent text\n"));
    assert_eq!(state.matches(RUNTIME_START).count(), 1);
}

#[tokio::test]
async fn each_cycle_prepends_exactly_one_history_row() {
    let s = spec(vec![]);
    s.engine.run_cycle().await.unwrap();
    let first = s.engine.state_file().read_state().unwrap();
    assert_eq!(parse_history(&first).len(), 1);

    s.engine.run_cycle().await.unwrap();
    let second = s.engine.state_file().read_state().unwrap();
    assert_eq!(parse_history(&second).len(), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn restricted_state_dir_falls_back_to_artifacts_path() {
    use std::os::unix::fs::PermissionsExt;

    let s = spec(vec![]);
    // Lock the kernel's state directory before the first cycle.
    let state_dir = s.engine.state_file().dir().to_path_buf();
    std::fs::create_dir_all(&state_dir).unwrap();
    std::fs::set_permissions(&state_dir, std::fs::Permissions::from_mode(0o555)).unwrap();

    s.engine.run_cycle().await.unwrap();

    let fallback = s.dir.path().join("artifacts").join("kernel_state.md");
    assert_eq!(s.engine.effective_state_path(), fallback);
    let content = std::fs::read_to_string(&fallback).unwrap();
    assert!(content.contains(RUNTIME_START));

    // Later cycles keep writing to the fallback and note it in the block.
    s.clock.advance(Duration::from_secs(60));
    s.engine.run_cycle().await.unwrap();
    let content = std::fs::read_to_string(&fallback).unwrap();
    assert!(content.contains("- state_write_fallback:"));
    assert_eq!(parse_history(&content).len(), 2);

    std::fs::set_permissions(&state_dir, std::fs::Permissions::from_mode(0o755)).unwrap();
}
