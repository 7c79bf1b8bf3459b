// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable dispatch queue capability.

use ak_core::{AgentId, CycleId, Dispatch, DispatchId, DispatchSpec, KernelId, TaskId};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Errors from dispatch-store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("dispatch not found: {0}")]
    NotFound(DispatchId),
}

/// Durable queue of agent dispatches keyed by kernel ID.
///
/// All operations are idempotent on retry. Status transitions form the DAG
/// `pending → running → {done, failed}`; terminal transitions are
/// absorbing no-ops.
#[async_trait]
pub trait DispatchStore: Send + Sync {
    /// Create persistent structures if missing.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Insert a batch of specs as `pending` rows. All-or-nothing per call.
    async fn enqueue_dispatches(
        &self,
        kernel_id: &KernelId,
        cycle_id: &CycleId,
        specs: Vec<DispatchSpec>,
    ) -> Result<Vec<Dispatch>, StoreError>;

    /// Transition to `running` and take a lease.
    async fn mark_dispatch_running(&self, id: &DispatchId) -> Result<(), StoreError>;

    /// Terminal success transition.
    async fn mark_dispatch_done(&self, id: &DispatchId, task_id: &TaskId)
        -> Result<(), StoreError>;

    /// Terminal failure transition.
    async fn mark_dispatch_failed(&self, id: &DispatchId, error: &str) -> Result<(), StoreError>;

    /// All `pending` and `running` rows for a kernel.
    async fn list_active_dispatches(&self, kernel_id: &KernelId)
        -> Result<Vec<Dispatch>, StoreError>;

    /// Most recent dispatch per agent, by creation order.
    async fn list_recent_by_agent(
        &self,
        kernel_id: &KernelId,
    ) -> Result<HashMap<AgentId, Dispatch>, StoreError>;

    /// Fail every `running` row whose lease expired. Returns the count.
    async fn recover_stale_running(&self, kernel_id: &KernelId) -> Result<usize, StoreError>;
}
