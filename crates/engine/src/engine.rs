// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The kernel engine: cron loop and cycle orchestration.
//!
//! Each cycle perceives persisted state, recovers stale work, plans
//! dispatches, executes them under a concurrency bound, and durably
//! records the outcome in the state document's runtime block. Cycle-fatal
//! errors propagate to the caller; everything else is absorbed with a log
//! entry so the next tick always runs.

use crate::docs::{render_init_doc, render_system_prompt_doc};
use crate::error::EngineError;
use crate::executor::DispatchExecutor;
use crate::planner::Planner;
use crate::runtime_block::{
    parse_history, render_runtime_block, upsert_runtime_block, HistoryEntry, RuntimeBlockInput,
};
use ak_adapters::{
    format_cycle_notification, NoOpNotifyAdapter, NotifyAdapter, SelectionResolver, TaskRunner,
};
use ak_core::{
    AgentCycleSummary, AutonomyLabel, Clock, CronSchedule, CycleId, CycleResult, Dispatch,
    IdGen, KernelConfig, SystemClock, UuidIdGen,
};
use ak_storage::{write_atomic, DispatchStore, StateFile, StateFileError, VersionedStore};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

const FALLBACK_STATE_DOC: &str = "kernel_state.md";
const FALLBACK_SYSTEM_PROMPT_DOC: &str = "SYSTEM_PROMPT.md";

/// Parameterless provider of the current effective system prompt.
pub type SystemPromptProvider = Arc<dyn Fn() -> String + Send + Sync>;

/// External capabilities the engine composes.
pub struct EngineDeps<D, P, R, N = NoOpNotifyAdapter> {
    pub store: Arc<D>,
    pub planner: P,
    pub runner: R,
    pub notifier: Option<N>,
}

impl<D, P, R> EngineDeps<D, P, R, NoOpNotifyAdapter> {
    pub fn new(store: Arc<D>, planner: P, runner: R) -> Self {
        Self {
            store,
            planner,
            runner,
            notifier: None,
        }
    }
}

impl<D, P, R, N> EngineDeps<D, P, R, N> {
    /// Attach a notification adapter.
    pub fn with_notifier<N2>(self, notifier: N2) -> EngineDeps<D, P, R, N2> {
        EngineDeps {
            store: self.store,
            planner: self.planner,
            runner: self.runner,
            notifier: Some(notifier),
        }
    }
}

/// The autonomous kernel engine.
///
/// One engine instance owns one kernel ID. Two engines with the same
/// kernel ID on the same store are unsupported and will race on dispatch
/// state.
pub struct Engine<D, P, R: TaskRunner, N, C: Clock = SystemClock> {
    config: KernelConfig,
    schedule: CronSchedule,
    store: Arc<D>,
    planner: P,
    executor: DispatchExecutor<R>,
    notifier: Option<N>,
    clock: C,
    ids: UuidIdGen,
    state_file: StateFile,
    system_prompt_provider: Option<SystemPromptProvider>,
    /// Directory for rerouted writes once the state dir is restricted.
    fallback_dir: PathBuf,
    /// Latched fallback state path; set on the first restricted write.
    fallback: Mutex<Option<PathBuf>>,
    stopping: AtomicBool,
    stopped: Notify,
    cycles: Mutex<Vec<JoinHandle<()>>>,
}

impl<D, P, R: TaskRunner, N, C: Clock> std::fmt::Debug for Engine<D, P, R, N, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl<D, P, R, N, C> Engine<D, P, R, N, C>
where
    D: DispatchStore + 'static,
    P: Planner + 'static,
    R: TaskRunner,
    N: NotifyAdapter,
    C: Clock + 'static,
{
    /// Build an engine rooted at `state_root` (documents live under
    /// `{state_root}/{kernel_id}/`).
    ///
    /// Validates the configuration, seeds the INIT.md snapshot once, and
    /// wires the per-dispatch executor. An invalid cron schedule fails
    /// here; the engine is never started with one.
    pub fn new(
        config: KernelConfig,
        state_root: impl Into<PathBuf>,
        deps: EngineDeps<D, P, R, N>,
        clock: C,
    ) -> Result<Self, EngineError> {
        let schedule = config.validate()?;
        let state_file = StateFile::new(state_root.into().join(config.kernel_id.as_str()));

        let init_doc = render_init_doc(&config);
        if let Err(e) = state_file.seed_init(&init_doc) {
            warn!(error = %e, "init snapshot seed failed");
        }

        let mut executor = DispatchExecutor::new(deps.runner);
        if let Some(secs) = config.timeout_seconds {
            executor = executor.with_timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            config,
            schedule,
            store: deps.store,
            planner: deps.planner,
            executor,
            notifier: deps.notifier,
            clock,
            ids: UuidIdGen,
            state_file,
            system_prompt_provider: None,
            fallback_dir: std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("artifacts"),
            fallback: Mutex::new(None),
            stopping: AtomicBool::new(false),
            stopped: Notify::new(),
            cycles: Mutex::new(Vec::new()),
        })
    }

    /// Back the state documents with a versioned store.
    pub fn with_versioned(mut self, versioned: Arc<dyn VersionedStore>) -> Self {
        self.state_file = self.state_file.clone().with_versioned(versioned);
        self
    }

    /// Resolve pinned model selections for dispatches.
    pub fn with_selection_resolver(mut self, resolver: SelectionResolver) -> Self {
        self.executor = self.executor.clone().with_selection_resolver(resolver);
        self
    }

    /// Refresh SYSTEM_PROMPT.md from this provider after each cycle.
    pub fn with_system_prompt_provider(mut self, provider: SystemPromptProvider) -> Self {
        self.system_prompt_provider = Some(provider);
        self
    }

    /// Override the directory used for restricted-write fallback.
    pub fn with_fallback_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_dir = dir.into();
        self
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn state_file(&self) -> &StateFile {
        &self.state_file
    }

    /// Where the runtime block currently lands: the state document, or the
    /// fallback path once writes were rerouted.
    pub fn effective_state_path(&self) -> PathBuf {
        self.fallback
            .lock()
            .clone()
            .unwrap_or_else(|| self.state_file.state_path())
    }

    /// Run one full cycle and return its result.
    ///
    /// The runtime block is persisted even when the cycle fails; the error
    /// is recorded in it and then propagated.
    pub async fn run_cycle(&self) -> Result<CycleResult, EngineError> {
        let start = self.clock.now();
        let cycle_id = CycleId::new(self.ids.next());
        info!(kernel_id = %self.config.kernel_id, cycle_id = %cycle_id, "cycle started");

        let outcome = self.run_cycle_inner(&cycle_id).await;
        let duration = self.clock.now().duration_since(start);
        let outcome = outcome.map(|mut result| {
            result.duration = duration;
            result
        });

        let error_text = outcome.as_ref().err().map(|e| e.to_string());
        self.persist_cycle(&cycle_id, outcome.as_ref().ok(), error_text.as_deref());
        self.send_notification(outcome.as_ref().ok(), error_text.as_deref())
            .await;

        match &outcome {
            Ok(result) => info!(
                cycle_id = %cycle_id,
                status = %result.status,
                dispatched = result.dispatched,
                succeeded = result.succeeded,
                failed = result.failed,
                elapsed_ms = duration.as_millis() as u64,
                "cycle finished"
            ),
            Err(e) => error!(cycle_id = %cycle_id, error = %e, "cycle failed"),
        }
        outcome
    }

    async fn run_cycle_inner(&self, cycle_id: &CycleId) -> Result<CycleResult, EngineError> {
        // Perceive (from the fallback document once writes were rerouted)
        let mut state = self.read_effective_state()?;
        if state.is_empty() {
            match self.state_file.seed_state(&self.config.seed_state) {
                Ok(()) => {}
                // A restricted seed keeps the cycle alive; the update step
                // reroutes writes to the fallback path.
                Err(e) if e.is_restricted() => {
                    warn!(error = %e, "state seed restricted, continuing with in-memory seed");
                }
                Err(e) => return Err(e.into()),
            }
            state = self.config.seed_state.clone();
        }

        // Recover: a failed sweep never fails the cycle.
        match self.store.recover_stale_running(&self.config.kernel_id).await {
            Ok(0) => {}
            Ok(count) => info!(count, "recovered stale dispatches"),
            Err(e) => warn!(error = %e, "stale recovery failed"),
        }

        // Orient
        let recent = match self.store.list_recent_by_agent(&self.config.kernel_id).await {
            Ok(recent) => recent,
            Err(e) => {
                warn!(error = %e, "recent-dispatch lookup failed");
                HashMap::new()
            }
        };

        // Decide
        let specs = self.planner.plan(&state, &recent).await?;
        if specs.is_empty() {
            return Ok(CycleResult::empty(
                cycle_id.clone(),
                self.config.kernel_id.clone(),
                Duration::ZERO,
            ));
        }

        // Act
        let dispatches = self
            .store
            .enqueue_dispatches(&self.config.kernel_id, cycle_id, specs)
            .await?;

        Ok(self.execute_dispatches(cycle_id, dispatches).await)
    }

    /// Execute all dispatches of one cycle under the concurrency bound.
    async fn execute_dispatches(
        &self,
        cycle_id: &CycleId,
        dispatches: Vec<Dispatch>,
    ) -> CycleResult {
        let mut initial = CycleResult::empty(
            cycle_id.clone(),
            self.config.kernel_id.clone(),
            Duration::ZERO,
        );
        initial.dispatched = dispatches.len() as u32;
        let aggregate = Arc::new(Mutex::new(initial));
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency()));

        let mut workers = JoinSet::new();
        for dispatch in dispatches {
            let store = Arc::clone(&self.store);
            let executor = self.executor.clone();
            let semaphore = Arc::clone(&semaphore);
            let aggregate = Arc::clone(&aggregate);
            let user_id = self.config.user_id.clone();
            let channel = self.config.channel.clone();
            let chat_id = self.config.chat_id.clone();

            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };

                if let Err(e) = store.mark_dispatch_running(&dispatch.id).await {
                    warn!(dispatch_id = %dispatch.id, error = %e, "mark running failed");
                }

                // Each worker gets its own copy of the metadata map with
                // the kernel routing injected.
                let mut metadata = dispatch.metadata.clone();
                if let Some(user_id) = user_id {
                    metadata.insert("user_id".to_string(), user_id);
                }
                if let Some(channel) = channel {
                    metadata.insert("channel".to_string(), channel);
                }
                if let Some(chat_id) = chat_id {
                    metadata.insert("chat_id".to_string(), chat_id);
                }

                match executor
                    .execute(&dispatch.agent_id, &dispatch.prompt, &metadata)
                    .await
                {
                    Ok(exec) => {
                        {
                            let mut agg = aggregate.lock();
                            agg.succeeded += 1;
                            agg.agent_summaries.push(AgentCycleSummary {
                                agent_id: dispatch.agent_id.clone(),
                                task_id: Some(exec.task_id.clone()),
                                status: "done".to_string(),
                                detail: exec.summary.clone(),
                                attempts: Some(exec.attempts),
                                recovered_from: exec.recovered_from,
                                autonomy: Some(exec.autonomy),
                            });
                        }
                        if let Err(e) = store.mark_dispatch_done(&dispatch.id, &exec.task_id).await
                        {
                            warn!(dispatch_id = %dispatch.id, error = %e, "mark done failed");
                        }
                    }
                    Err(err) => {
                        let message = err.to_string();
                        {
                            let mut agg = aggregate.lock();
                            agg.failed += 1;
                            agg.failed_agents.push(dispatch.agent_id.clone());
                            agg.agent_summaries.push(AgentCycleSummary {
                                agent_id: dispatch.agent_id.clone(),
                                task_id: None,
                                status: "failed".to_string(),
                                detail: message.clone(),
                                attempts: Some(err.attempts()),
                                recovered_from: None,
                                autonomy: err.recovery_kind().map(AutonomyLabel::from),
                            });
                        }
                        if let Err(e) = store.mark_dispatch_failed(&dispatch.id, &message).await {
                            warn!(dispatch_id = %dispatch.id, error = %e, "mark failed failed");
                        }
                    }
                }
            });
        }
        while workers.join_next().await.is_some() {}

        let mut result = aggregate.lock().clone();
        result
            .agent_summaries
            .sort_by(|a, b| {
                a.agent_id
                    .as_str()
                    .cmp(b.agent_id.as_str())
                    .then_with(|| a.status.cmp(&b.status))
            });
        result
            .failed_agents
            .sort_by(|a, b| a.as_str().cmp(b.as_str()));
        result.finalize();
        result
    }

    /// Deferred update step: always runs, also after a cycle-fatal error.
    fn persist_cycle(
        &self,
        cycle_id: &CycleId,
        result: Option<&CycleResult>,
        error: Option<&str>,
    ) {
        self.state_file
            .commit_cycle_boundary_logged(&format!("pre-cycle {cycle_id}"));

        let content = match self.read_effective_state() {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "state read for runtime block failed");
                String::new()
            }
        };
        let content = if content.is_empty() {
            self.config.seed_state.clone()
        } else {
            content
        };

        let status = match (result, error) {
            (_, Some(_)) => "error".to_string(),
            (Some(r), None) => r.status.to_string(),
            (None, None) => "unknown".to_string(),
        };
        let summary = match (result, error) {
            (_, Some(err)) => err.to_string(),
            (Some(r), None) if r.agent_summaries.is_empty() => "no dispatches".to_string(),
            (Some(r), None) => r
                .agent_summaries
                .iter()
                .map(|s| format!("{}={}", s.agent_id, s.status))
                .collect::<Vec<_>>()
                .join(", "),
            (None, None) => String::new(),
        };
        let timestamp = self.timestamp();

        let mut history = parse_history(&content);
        history.insert(
            0,
            HistoryEntry {
                cycle_id: cycle_id.to_string(),
                timestamp: timestamp.clone(),
                status: status.clone(),
                dispatched: result.map_or(0, |r| r.dispatched),
                succeeded: result.map_or(0, |r| r.succeeded),
                failed: result.map_or(0, |r| r.failed),
                summary,
            }
            .sanitized(),
        );
        history.truncate(self.config.history_limit());

        let dispatched = result.map_or(0, |r| r.dispatched);
        let input = RuntimeBlockInput {
            cycle_id: (dispatched > 0 || error.is_some()).then(|| cycle_id.to_string()),
            timestamp,
            status,
            dispatched,
            succeeded: result.map_or(0, |r| r.succeeded),
            failed: result.map_or(0, |r| r.failed),
            error: error.map(str::to_string),
            fallback_path: self
                .fallback
                .lock()
                .as_ref()
                .map(|p| p.display().to_string()),
            history,
        };
        let block = render_runtime_block(&input);
        let updated = upsert_runtime_block(&content, &block);
        self.write_state_with_fallback(&updated);

        self.state_file
            .commit_cycle_boundary_logged(&format!("post-cycle {cycle_id}"));

        if let Some(provider) = &self.system_prompt_provider {
            let text = provider();
            if !text.is_empty() {
                let doc = render_system_prompt_doc("kernel", &text, &self.timestamp());
                self.write_system_prompt_with_fallback(&doc);
            }
        }
    }

    fn read_effective_state(&self) -> Result<String, StateFileError> {
        let fallback = self.fallback.lock().clone();
        match fallback {
            Some(path) => match std::fs::read_to_string(&path) {
                Ok(content) => Ok(content),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
                Err(e) => Err(StateFileError::Io { path, source: e }),
            },
            None => self.state_file.read_state(),
        }
    }

    fn write_state_with_fallback(&self, content: &str) {
        let latched = self.fallback.lock().clone();
        if let Some(path) = latched {
            if let Err(e) = write_atomic(&path, content) {
                warn!(path = %path.display(), error = %e, "fallback state write failed");
            }
            return;
        }

        match self.state_file.write_state(content) {
            Ok(()) => {}
            Err(e) if e.is_restricted() => {
                let path = self.fallback_dir.join(FALLBACK_STATE_DOC);
                warn!(
                    error = %e,
                    fallback = %path.display(),
                    "state write restricted, rerouting to fallback path"
                );
                *self.fallback.lock() = Some(path.clone());
                if let Err(e) = write_atomic(&path, content) {
                    warn!(path = %path.display(), error = %e, "fallback state write failed");
                }
            }
            Err(e) => warn!(error = %e, "state write failed"),
        }
    }

    fn write_system_prompt_with_fallback(&self, content: &str) {
        let latched = self.fallback.lock().is_some();
        if latched {
            let path = self.fallback_dir.join(FALLBACK_SYSTEM_PROMPT_DOC);
            if let Err(e) = write_atomic(&path, content) {
                warn!(path = %path.display(), error = %e, "fallback system prompt write failed");
            }
            return;
        }
        match self.state_file.write_system_prompt(content) {
            Ok(()) => {}
            Err(e) if e.is_restricted() => {
                let path = self.fallback_dir.join(FALLBACK_SYSTEM_PROMPT_DOC);
                warn!(
                    error = %e,
                    fallback = %path.display(),
                    "system prompt write restricted, rerouting to fallback path"
                );
                *self.fallback.lock() = Some(self.fallback_dir.join(FALLBACK_STATE_DOC));
                if let Err(e) = write_atomic(&path, content) {
                    warn!(path = %path.display(), error = %e, "fallback system prompt write failed");
                }
            }
            Err(e) => warn!(error = %e, "system prompt write failed"),
        }
    }

    async fn send_notification(&self, result: Option<&CycleResult>, error: Option<&str>) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let noteworthy = error.is_some() || result.is_some_and(|r| r.dispatched > 0);
        if !noteworthy {
            return;
        }
        let title = format!("Kernel {}", self.config.kernel_id);
        let message = format_cycle_notification(&self.config.kernel_id, result, error);
        if let Err(e) = notifier.notify(&title, &message).await {
            warn!(error = %e, "notification failed");
        }
    }

    fn timestamp(&self) -> String {
        DateTime::<Utc>::from_timestamp_millis(self.clock.epoch_ms() as i64)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn wall_now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.clock.epoch_ms() as i64)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Run the cron loop until stopped.
    ///
    /// Each tick spawns a tracked cycle; overlapping cycles are permitted
    /// and joined by [`Engine::drain`].
    pub async fn run(self: Arc<Self>) {
        info!(
            kernel_id = %self.config.kernel_id,
            schedule = %self.schedule.expression(),
            "engine started"
        );
        loop {
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }
            let Some(wait) = self.schedule.wait_duration(self.wall_now()) else {
                warn!("schedule has no future tick, stopping");
                break;
            };
            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    let engine = Arc::clone(&self);
                    let handle = tokio::spawn(async move {
                        let _ = engine.run_cycle().await;
                    });
                    let mut cycles = self.cycles.lock();
                    cycles.retain(|h| !h.is_finished());
                    cycles.push(handle);
                }
                _ = self.stopped.notified() => break,
            }
        }
        info!(kernel_id = %self.config.kernel_id, "engine stopped");
    }

    /// Signal the run loop to exit. Idempotent.
    pub fn stop(&self) {
        if !self.stopping.swap(true, Ordering::SeqCst) {
            self.stopped.notify_one();
        }
    }

    /// Stop and wait for every in-flight cycle to finish.
    pub async fn drain(&self) {
        self.stop();
        let handles: Vec<_> = std::mem::take(&mut *self.cycles.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
