// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for the behavioral specs.

use ak_adapters::{FakeNotifyAdapter, FakeTaskRunner, TaskMessage, TaskResult, ToolCall, ToolResult};
use ak_core::{AgentConfig, FakeClock, KernelConfig, KernelId, SequentialIdGen};
use ak_engine::{Engine, EngineDeps, StaticPlanner};
use ak_storage::FileDispatchStore;
use std::sync::Arc;
use std::time::Duration;

pub type SpecStore = FileDispatchStore<FakeClock, SequentialIdGen>;
pub type SpecEngine =
    Engine<SpecStore, StaticPlanner, FakeTaskRunner, FakeNotifyAdapter, FakeClock>;

pub struct Spec {
    pub engine: Arc<SpecEngine>,
    pub runner: FakeTaskRunner,
    pub notifier: FakeNotifyAdapter,
    pub store: Arc<SpecStore>,
    pub clock: FakeClock,
    pub dir: tempfile::TempDir,
}

impl Spec {
    pub fn kernel_id(&self) -> KernelId {
        self.engine.config().kernel_id.clone()
    }
}

pub fn kernel_config(agents: Vec<AgentConfig>) -> KernelConfig {
    let mut config = KernelConfig::new("kern-spec", "* * * * *");
    config.seed_state = "# Agent State\n\n- objective: keep the lights on\n".to_string();
    config.agents = agents;
    config
}

pub fn spec_with(config: KernelConfig, runner: FakeTaskRunner) -> Spec {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let store = Arc::new(
        SpecStore::open_with(
            dir.path().join("store"),
            Duration::from_secs(config.lease_seconds),
            clock.clone(),
            SequentialIdGen::new("d"),
        )
        .unwrap(),
    );
    let notifier = FakeNotifyAdapter::new();
    let planner = StaticPlanner::new(config.agents.clone());
    let deps = EngineDeps::new(Arc::clone(&store), planner, runner.clone())
        .with_notifier(notifier.clone());
    let engine = Engine::new(config, dir.path().join("state"), deps, clock.clone())
        .unwrap()
        .with_fallback_dir(dir.path().join("artifacts"));
    Spec {
        engine: Arc::new(engine),
        runner,
        notifier,
        store,
        clock,
        dir,
    }
}

pub fn spec(agents: Vec<AgentConfig>) -> Spec {
    spec_with(kernel_config(agents), FakeTaskRunner::new())
}

/// A transcript that passes autonomy validation: one real tool action and
/// a summary section.
pub fn valid_result(summary: &str) -> TaskResult {
    TaskResult {
        answer: format!("完成。\n\n## 执行总结\n{summary}"),
        stop_reason: "end_turn".to_string(),
        messages: vec![
            TaskMessage {
                role: "assistant".to_string(),
                tool_calls: vec![ToolCall {
                    id: "1".to_string(),
                    name: "read_file".to_string(),
                    arguments: String::new(),
                }],
                tool_results: vec![],
            },
            TaskMessage {
                role: "tool".to_string(),
                tool_calls: vec![],
                tool_results: vec![ToolResult {
                    call_id: "1".to_string(),
                    content: "content".to_string(),
                    error: None,
                    metadata: Default::default(),
                }],
            },
        ],
    }
}

/// A transcript with only a `plan` call and no summary section.
pub fn planning_only_result() -> TaskResult {
    TaskResult {
        answer: "我打算分析之后再动手。".to_string(),
        stop_reason: "end_turn".to_string(),
        messages: vec![TaskMessage {
            role: "assistant".to_string(),
            tool_calls: vec![ToolCall {
                id: "1".to_string(),
                name: "plan".to_string(),
                arguments: String::new(),
            }],
            tool_results: vec![],
        }],
    }
}

/// A transcript stopped on `await_user_input`.
pub fn awaiting_result() -> TaskResult {
    TaskResult {
        answer: "需要先得到确认。".to_string(),
        stop_reason: "await_user_input".to_string(),
        messages: vec![],
    }
}
