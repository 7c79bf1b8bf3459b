// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Five-field cron schedule parsing and tick computation.
//!
//! Kernel schedules use the classic `minute hour day-of-month month
//! day-of-week` form. The `cron` crate wants a seconds field, so parsing
//! prepends `0` before handing the expression over.

use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors from schedule parsing
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("expected 5 cron fields, got {found} in '{expr}'")]
    FieldCount { expr: String, found: usize },
    #[error("invalid cron expression '{expr}': {message}")]
    Invalid { expr: String, message: String },
}

/// A parsed 5-field cron schedule
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expr: String,
    inner: cron::Schedule,
}

impl CronSchedule {
    /// Parse a 5-field cron expression.
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ScheduleError::FieldCount {
                expr: expr.to_string(),
                found: fields.len(),
            });
        }
        let normalized = format!("0 {}", fields.join(" "));
        let inner = cron::Schedule::from_str(&normalized).map_err(|e| ScheduleError::Invalid {
            expr: expr.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            expr: expr.to_string(),
            inner,
        })
    }

    /// The original 5-field expression.
    pub fn expression(&self) -> &str {
        &self.expr
    }

    /// The next tick strictly after the given instant.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.inner.after(&after).next()
    }

    /// How long to sleep from `now` until the next tick.
    ///
    /// Returns `None` when the schedule has no future tick (possible with
    /// expressions pinned to a past date combination).
    pub fn wait_duration(&self, now: DateTime<Utc>) -> Option<Duration> {
        let next = self.next_after(now)?;
        (next - now).to_std().ok()
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
