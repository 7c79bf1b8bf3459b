// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the kernel engine

use crate::planner::PlanError;
use ak_core::ConfigError;
use ak_storage::{StateFileError, StoreError};
use thiserror::Error;

/// Errors that abort engine construction or a whole cycle.
///
/// Per-dispatch failures never surface here: they are absorbed into the
/// cycle result. Everything else in the cycle is warn-and-continue.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("state error: {0}")]
    State(#[from] StateFileError),
    #[error("planner error: {0}")]
    Plan(#[from] PlanError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
