// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic markdown artifact store for one kernel.
//!
//! Each kernel owns a directory holding three documents: `STATE.md` (the
//! agent-owned state plus the engine's runtime block), `INIT.md` (an
//! immutable configuration snapshot), and `SYSTEM_PROMPT.md` (refreshed
//! each cycle). Writes go to a `.tmp` sibling and are renamed into place,
//! so a reader never observes a partial document.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

const STATE_DOC: &str = "STATE.md";
const INIT_DOC: &str = "INIT.md";
const SYSTEM_PROMPT_DOC: &str = "SYSTEM_PROMPT.md";

/// Errors from state-file operations.
///
/// Sandbox path restrictions are classified separately from ordinary disk
/// errors so callers can fall back to a writable location instead of
/// aborting the cycle.
#[derive(Debug, Error)]
pub enum StateFileError {
    #[error("restricted path {path}: {source}")]
    Restricted {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("versioning error: {0}")]
    Versioning(String),
}

impl StateFileError {
    /// True when the failure came from a sandbox path restriction
    /// (permission denied, read-only filesystem).
    pub fn is_restricted(&self) -> bool {
        matches!(self, StateFileError::Restricted { .. })
    }

    fn classify(path: &Path, source: io::Error) -> Self {
        if is_restriction(&source) {
            StateFileError::Restricted {
                path: path.to_path_buf(),
                source,
            }
        } else {
            StateFileError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

fn is_restriction(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem
    )
}

/// Optional versioned backing for the state directory.
///
/// The engine commits a boundary before and after each cycle; the store
/// decides what, if anything, to persist for it.
pub trait VersionedStore: Send + Sync {
    fn commit_cycle_boundary(&self, message: &str) -> Result<(), StateFileError>;
}

/// Default root for kernel state directories: `~/.alex/kernel`.
///
/// Each engine appends its kernel ID, so two kernels never share a
/// directory.
pub fn default_state_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".alex")
        .join("kernel")
}

/// Write `content` to `path` atomically: temp sibling, then rename.
///
/// Parent directories are created on demand. On success no `.tmp` file
/// remains.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), StateFileError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StateFileError::classify(parent, e))?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content).map_err(|e| StateFileError::classify(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        // Leave no temp file behind on a failed rename.
        let _ = std::fs::remove_file(&tmp);
        StateFileError::classify(path, e)
    })?;
    Ok(())
}

fn read_or_empty(path: &Path) -> Result<String, StateFileError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(StateFileError::classify(path, e)),
    }
}

/// Markdown artifact store rooted at one kernel's state directory.
#[derive(Clone)]
pub struct StateFile {
    dir: PathBuf,
    versioned: Option<Arc<dyn VersionedStore>>,
}

impl StateFile {
    /// Create a store rooted at `dir` (e.g. `~/.alex/kernel/{kernel_id}`).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            versioned: None,
        }
    }

    /// Attach a versioned backing store for cycle-boundary commits.
    pub fn with_versioned(mut self, versioned: Arc<dyn VersionedStore>) -> Self {
        self.versioned = Some(versioned);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_DOC)
    }

    pub fn init_path(&self) -> PathBuf {
        self.dir.join(INIT_DOC)
    }

    pub fn system_prompt_path(&self) -> PathBuf {
        self.dir.join(SYSTEM_PROMPT_DOC)
    }

    /// Read STATE.md; a missing file reads as empty, not as an error.
    pub fn read_state(&self) -> Result<String, StateFileError> {
        read_or_empty(&self.state_path())
    }

    pub fn write_state(&self, content: &str) -> Result<(), StateFileError> {
        write_atomic(&self.state_path(), content)
    }

    /// Seed STATE.md only when it is absent or empty.
    ///
    /// Idempotent: a second seed with different content leaves the first
    /// content in place.
    pub fn seed_state(&self, content: &str) -> Result<(), StateFileError> {
        self.seed(&self.state_path(), content)
    }

    pub fn read_init(&self) -> Result<String, StateFileError> {
        read_or_empty(&self.init_path())
    }

    pub fn write_init(&self, content: &str) -> Result<(), StateFileError> {
        write_atomic(&self.init_path(), content)
    }

    /// Seed INIT.md only when it is absent or empty.
    pub fn seed_init(&self, content: &str) -> Result<(), StateFileError> {
        self.seed(&self.init_path(), content)
    }

    pub fn read_system_prompt(&self) -> Result<String, StateFileError> {
        read_or_empty(&self.system_prompt_path())
    }

    pub fn write_system_prompt(&self, content: &str) -> Result<(), StateFileError> {
        write_atomic(&self.system_prompt_path(), content)
    }

    fn seed(&self, path: &Path, content: &str) -> Result<(), StateFileError> {
        let existing = read_or_empty(path)?;
        if !existing.is_empty() {
            return Ok(());
        }
        write_atomic(path, content)
    }

    /// Commit a cycle boundary to the versioned backing store.
    ///
    /// A successful no-op when no backing store is configured.
    pub fn commit_cycle_boundary(&self, message: &str) -> Result<(), StateFileError> {
        match &self.versioned {
            Some(store) => store.commit_cycle_boundary(message),
            None => Ok(()),
        }
    }

    /// Best-effort boundary commit: failures are logged, never propagated.
    pub fn commit_cycle_boundary_logged(&self, message: &str) {
        if let Err(e) = self.commit_cycle_boundary(message) {
            warn!(message, error = %e, "cycle boundary commit failed");
        }
    }
}

#[cfg(test)]
#[path = "state_file_tests.rs"]
mod tests;
