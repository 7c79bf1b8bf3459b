// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime-block renderer and parser.
//!
//! The engine owns exactly one fenced region inside the otherwise opaque
//! STATE.md, delimited by sentinel comments. Everything outside the
//! markers belongs to the agent and is preserved byte for byte. Rendering
//! is idempotent: identical inputs produce identical bytes, and repeated
//! upserts never duplicate the markers.

use ak_core::compact_summary;

pub const RUNTIME_START: &str = "<!-- KERNEL_RUNTIME:START -->";
pub const RUNTIME_END: &str = "<!-- KERNEL_RUNTIME:END -->";

const HISTORY_HEADER: &str = "### cycle_history";
const NONE: &str = "(none)";
const HISTORY_SUMMARY_BUDGET: usize = 120;

/// One row of the rolling cycle-history table, most recent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub cycle_id: String,
    pub timestamp: String,
    pub status: String,
    pub dispatched: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub summary: String,
}

impl HistoryEntry {
    /// Compact the summary to the table budget and protect the table
    /// syntax from embedded pipes.
    pub fn sanitized(mut self) -> Self {
        self.summary = compact_summary(&self.summary, HISTORY_SUMMARY_BUDGET).replace('|', "/");
        self
    }
}

/// Inputs for one rendering of the runtime block.
#[derive(Debug, Clone)]
pub struct RuntimeBlockInput {
    /// Cycle ID of the latest dispatching cycle; `None` renders the empty
    /// sentinel.
    pub cycle_id: Option<String>,
    /// UTC RFC 3339 timestamp of the rendering.
    pub timestamp: String,
    /// `success` / `partial_success` / `failed`, or `error` for a
    /// cycle-fatal failure.
    pub status: String,
    pub dispatched: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// Cycle error text, when the cycle failed outright.
    pub error: Option<String>,
    /// Fallback path note, once sandbox restrictions rerouted writes.
    pub fallback_path: Option<String>,
    /// Rolling history, most recent first, already truncated.
    pub history: Vec<HistoryEntry>,
}

fn or_none(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => NONE,
    }
}

/// Render the full runtime block, markers included.
pub fn render_runtime_block(input: &RuntimeBlockInput) -> String {
    let mut out = String::new();
    out.push_str(RUNTIME_START);
    out.push_str("\n## kernel_runtime\n");
    out.push_str(&format!(
        "- latest_cycle_id: {}\n",
        or_none(input.cycle_id.as_deref())
    ));
    out.push_str(&format!("- latest_timestamp: {}\n", input.timestamp));
    out.push_str(&format!("- latest_status: {}\n", input.status));
    out.push_str(&format!("- latest_dispatched: {}\n", input.dispatched));
    out.push_str(&format!("- latest_succeeded: {}\n", input.succeeded));
    out.push_str(&format!("- latest_failed: {}\n", input.failed));
    out.push_str(&format!(
        "- latest_error: {}\n",
        or_none(input.error.as_deref())
    ));
    if let Some(path) = &input.fallback_path {
        out.push_str(&format!("- state_write_fallback: {path}\n"));
    }
    out.push('\n');
    out.push_str(HISTORY_HEADER);
    out.push('\n');
    out.push_str("| cycle_id | timestamp | status | dispatched | succeeded | failed | summary |\n");
    out.push_str("| -------- | --------- | ------ | ---------- | --------- | ------ | ------- |\n");
    for entry in &input.history {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            entry.cycle_id,
            entry.timestamp,
            entry.status,
            entry.dispatched,
            entry.succeeded,
            entry.failed,
            entry.summary
        ));
    }
    out.push_str(RUNTIME_END);
    out
}

/// Replace the runtime block inside `content`, or append one.
///
/// The agent-owned text outside the markers survives unchanged apart from
/// trailing-newline normalization around the block. Re-upserting the same
/// block yields byte-identical output.
pub fn upsert_runtime_block(content: &str, block: &str) -> String {
    let block = block.trim_end_matches('\n');
    let replaced = match (content.find(RUNTIME_START), content.find(RUNTIME_END)) {
        (Some(start), Some(end)) if start < end => {
            let before = content[..start].trim_end_matches('\n');
            let after = content[end + RUNTIME_END.len()..].trim_start_matches('\n');
            let mut out = String::new();
            if !before.is_empty() {
                out.push_str(before);
                out.push_str("\n\n");
            }
            out.push_str(block);
            out.push('\n');
            if !after.is_empty() {
                out.push('\n');
                out.push_str(after.trim_end_matches('\n'));
                out.push('\n');
            }
            out
        }
        _ => {
            let before = content.trim_end_matches('\n');
            let mut out = String::new();
            if !before.is_empty() {
                out.push_str(before);
                out.push_str("\n\n");
            }
            out.push_str(block);
            out.push('\n');
            out
        }
    };
    replaced
}

/// Parse cycle-history rows from a state document.
///
/// Scans from the history header to the end marker. Data rows start and
/// end with a pipe; the header row (leading `cycle_id` cell) and the
/// separator row (contains `--------`) are skipped, as is any row with
/// fewer than 7 cells. File order is preserved.
pub fn parse_history(content: &str) -> Vec<HistoryEntry> {
    let Some(header_idx) = content.find(HISTORY_HEADER) else {
        return Vec::new();
    };
    let section = &content[header_idx..];
    let section = match section.find(RUNTIME_END) {
        Some(end) => &section[..end],
        None => section,
    };

    let mut entries = Vec::new();
    for line in section.lines() {
        let line = line.trim();
        if !line.starts_with('|') || !line.ends_with('|') || line.len() < 2 {
            continue;
        }
        if line.contains("--------") {
            continue;
        }
        let cells: Vec<&str> = line[1..line.len() - 1]
            .split('|')
            .map(str::trim)
            .collect();
        if cells.len() < 7 {
            continue;
        }
        if cells[0] == "cycle_id" {
            continue;
        }
        entries.push(HistoryEntry {
            cycle_id: cells[0].to_string(),
            timestamp: cells[1].to_string(),
            status: cells[2].to_string(),
            dispatched: cells[3].parse().unwrap_or(0),
            succeeded: cells[4].parse().unwrap_or(0),
            failed: cells[5].parse().unwrap_or(0),
            summary: cells[6].to_string(),
        });
    }
    entries
}

#[cfg(test)]
#[path = "runtime_block_tests.rs"]
mod tests;
