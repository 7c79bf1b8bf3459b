// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed dispatch store.
//!
//! All rows live in one `dispatches.json` document, rewritten atomically on
//! every mutation. The interior is a mutex-guarded vector; mutations build
//! the new row set first and only commit in memory after the rewrite
//! landed on disk, so a failed write leaves the previous state intact.

use crate::dispatch_store::{DispatchStore, StoreError};
use ak_core::{
    AgentId, Clock, CycleId, Dispatch, DispatchId, DispatchSpec, DispatchStatus, IdGen, KernelId,
    SystemClock, TaskId, UuidIdGen,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const STORE_DOC: &str = "dispatches.json";

struct StoreInner {
    rows: Vec<Dispatch>,
    /// Last created-at stamp handed out; enforces strict monotonicity even
    /// when the clock returns the same millisecond twice.
    last_created_ms: u64,
}

/// Durable dispatch queue persisted as a single JSON document.
pub struct FileDispatchStore<C: Clock = SystemClock, G: IdGen = UuidIdGen> {
    path: PathBuf,
    lease: Duration,
    clock: C,
    ids: G,
    inner: Arc<Mutex<StoreInner>>,
}

impl FileDispatchStore<SystemClock, UuidIdGen> {
    /// Open (or create) a store under `dir` with the given lease duration.
    pub fn open(dir: impl AsRef<Path>, lease: Duration) -> Result<Self, StoreError> {
        Self::open_with(dir, lease, SystemClock, UuidIdGen)
    }
}

impl<C: Clock, G: IdGen> FileDispatchStore<C, G> {
    /// Open a store with explicit clock and ID generator.
    pub fn open_with(
        dir: impl AsRef<Path>,
        lease: Duration,
        clock: C,
        ids: G,
    ) -> Result<Self, StoreError> {
        let path = dir.as_ref().join(STORE_DOC);
        let rows = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<Vec<Dispatch>>(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let last_created_ms = rows.iter().map(|d| d.created_at_ms).max().unwrap_or(0);
        debug!(path = %path.display(), rows = rows.len(), "dispatch store opened");
        Ok(Self {
            path,
            lease,
            clock,
            ids,
            inner: Arc::new(Mutex::new(StoreInner {
                rows,
                last_created_ms,
            })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, rows: &[Dispatch]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(rows)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Apply a status transition to one row and persist.
    ///
    /// Terminal rows are left untouched: the transition is an idempotent
    /// no-op once a dispatch is `done` or `failed`.
    fn transition<F>(&self, id: &DispatchId, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Dispatch),
    {
        let mut inner = self.inner.lock();
        let now = self.clock.epoch_ms();
        let mut rows = inner.rows.clone();
        let row = rows
            .iter_mut()
            .find(|d| &d.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if row.status.is_terminal() {
            return Ok(());
        }
        apply(row);
        row.updated_at_ms = now;
        self.persist(&rows)?;
        inner.rows = rows;
        Ok(())
    }
}

#[async_trait]
impl<C: Clock + 'static, G: IdGen + 'static> DispatchStore for FileDispatchStore<C, G> {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let inner = self.inner.lock();
        if !self.path.exists() {
            self.persist(&inner.rows)?;
        }
        Ok(())
    }

    async fn enqueue_dispatches(
        &self,
        kernel_id: &KernelId,
        cycle_id: &CycleId,
        specs: Vec<DispatchSpec>,
    ) -> Result<Vec<Dispatch>, StoreError> {
        let mut inner = self.inner.lock();
        let mut rows = inner.rows.clone();
        let mut created = Vec::with_capacity(specs.len());
        let mut last = inner.last_created_ms;
        for spec in specs {
            last = self.clock.epoch_ms().max(last + 1);
            let dispatch = Dispatch {
                id: DispatchId::new(self.ids.next()),
                kernel_id: kernel_id.clone(),
                cycle_id: cycle_id.clone(),
                agent_id: spec.agent_id,
                prompt: spec.prompt,
                priority: spec.priority,
                status: DispatchStatus::Pending,
                task_id: None,
                error: None,
                lease_until_ms: None,
                metadata: spec.metadata,
                created_at_ms: last,
                updated_at_ms: last,
            };
            rows.push(dispatch.clone());
            created.push(dispatch);
        }
        self.persist(&rows)?;
        inner.rows = rows;
        inner.last_created_ms = last;
        Ok(created)
    }

    async fn mark_dispatch_running(&self, id: &DispatchId) -> Result<(), StoreError> {
        let lease_until = self.clock.epoch_ms() + self.lease.as_millis() as u64;
        self.transition(id, |row| {
            row.status = DispatchStatus::Running;
            row.lease_until_ms = Some(lease_until);
        })
    }

    async fn mark_dispatch_done(
        &self,
        id: &DispatchId,
        task_id: &TaskId,
    ) -> Result<(), StoreError> {
        let task_id = task_id.clone();
        self.transition(id, move |row| {
            row.status = DispatchStatus::Done;
            row.task_id = Some(task_id);
            row.lease_until_ms = None;
        })
    }

    async fn mark_dispatch_failed(&self, id: &DispatchId, error: &str) -> Result<(), StoreError> {
        let error = error.to_string();
        self.transition(id, move |row| {
            row.status = DispatchStatus::Failed;
            row.error = Some(error);
            row.lease_until_ms = None;
        })
    }

    async fn list_active_dispatches(
        &self,
        kernel_id: &KernelId,
    ) -> Result<Vec<Dispatch>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .rows
            .iter()
            .filter(|d| &d.kernel_id == kernel_id && !d.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn list_recent_by_agent(
        &self,
        kernel_id: &KernelId,
    ) -> Result<HashMap<AgentId, Dispatch>, StoreError> {
        let inner = self.inner.lock();
        let mut recent: HashMap<AgentId, Dispatch> = HashMap::new();
        for row in inner.rows.iter().filter(|d| &d.kernel_id == kernel_id) {
            match recent.get(&row.agent_id) {
                Some(existing) if existing.created_at_ms >= row.created_at_ms => {}
                _ => {
                    recent.insert(row.agent_id.clone(), row.clone());
                }
            }
        }
        Ok(recent)
    }

    async fn recover_stale_running(&self, kernel_id: &KernelId) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();
        let now = self.clock.epoch_ms();
        let mut rows = inner.rows.clone();
        let mut recovered = 0usize;
        for row in rows.iter_mut() {
            if &row.kernel_id == kernel_id
                && row.status == DispatchStatus::Running
                && row.lease_until_ms.is_some_and(|lease| lease < now)
            {
                row.status = DispatchStatus::Failed;
                row.error = Some("stale lease".to_string());
                row.lease_until_ms = None;
                row.updated_at_ms = now;
                recovered += 1;
            }
        }
        if recovered > 0 {
            self.persist(&rows)?;
            inner.rows = rows;
            info!(kernel_id = %kernel_id, recovered, "recovered stale running dispatches");
        }
        Ok(recovered)
    }
}

#[cfg(test)]
#[path = "file_store_tests.rs"]
mod tests;
