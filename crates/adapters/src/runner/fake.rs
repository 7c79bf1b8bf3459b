// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake task runner for deterministic testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{RunnerError, TaskContext, TaskResult, TaskRunner};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Recorded call to FakeTaskRunner
#[derive(Debug, Clone)]
pub struct RunnerCall {
    pub session_id: String,
    pub task: String,
    pub ctx: TaskContext,
}

type ScriptedResult = Result<TaskResult, String>;

struct FakeRunnerState {
    /// Results handed out in call order; the last entry repeats once the
    /// queue drains.
    script: VecDeque<ScriptedResult>,
    calls: Vec<RunnerCall>,
}

/// Fake task runner for testing
///
/// Scripts results per call, records every invocation, and can delay each
/// execution to make concurrency observable.
#[derive(Clone)]
pub struct FakeTaskRunner {
    inner: Arc<Mutex<FakeRunnerState>>,
    delay: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for FakeTaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTaskRunner {
    /// Create a fake runner that answers every call with an empty success.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeRunnerState {
                script: VecDeque::new(),
                calls: Vec::new(),
            })),
            delay: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Delay each execution, making parallelism observable in tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful result for the next call.
    pub fn push_result(&self, result: TaskResult) {
        self.inner.lock().script.push_back(Ok(result));
    }

    /// Queue an error for the next call.
    pub fn push_error(&self, message: impl Into<String>) {
        self.inner.lock().script.push_back(Err(message.into()));
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<RunnerCall> {
        self.inner.lock().calls.clone()
    }

    /// Highest number of concurrently running executions observed.
    pub fn max_observed_parallelism(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_result(&self) -> ScriptedResult {
        let mut inner = self.inner.lock();
        match inner.script.len() {
            0 => Ok(TaskResult::default()),
            1 => inner
                .script
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(TaskResult::default())),
            _ => inner
                .script
                .pop_front()
                .unwrap_or_else(|| Ok(TaskResult::default())),
        }
    }
}

#[async_trait]
impl TaskRunner for FakeTaskRunner {
    async fn execute_task(
        &self,
        ctx: &TaskContext,
        task: &str,
        session_id: &str,
    ) -> Result<TaskResult, RunnerError> {
        {
            let mut inner = self.inner.lock();
            inner.calls.push(RunnerCall {
                session_id: session_id.to_string(),
                task: task.to_string(),
                ctx: ctx.clone(),
            });
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.next_result().map_err(RunnerError::ExecutionFailed)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
