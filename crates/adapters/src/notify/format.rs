// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cycle notification formatter.
//!
//! Pure function of its inputs: the same result always renders the same
//! string. Delivery is the adapter's concern; this only builds the text.

use ak_core::{compact_summary, AgentCycleSummary, CycleResult, CycleStatus, KernelId};

const AGENT_LINE_BUDGET: usize = 220;

fn localized_status(status: CycleStatus) -> &'static str {
    match status {
        CycleStatus::Success => "成功",
        CycleStatus::PartialSuccess => "部分成功",
        CycleStatus::Failed => "失败",
    }
}

/// Parse a literal `attempts=N` marker out of a summary line.
fn parse_attempts_marker(detail: &str) -> Option<u32> {
    let idx = detail.find("attempts=")?;
    let rest = &detail[idx + "attempts=".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn attempts_of(summary: &AgentCycleSummary) -> u32 {
    summary
        .attempts
        .or_else(|| parse_attempts_marker(&summary.detail))
        .unwrap_or(1)
}

/// Render a deterministic, localized summary of one cycle.
pub fn format_cycle_notification(
    kernel_id: &KernelId,
    result: Option<&CycleResult>,
    error: Option<&str>,
) -> String {
    if let Some(err) = error {
        return format!("Kernel[{kernel_id}] 周期异常\n- 错误: {err}");
    }

    let Some(result) = result else {
        return format!("Kernel[{kernel_id}] 周期状态未知\n- 任务: 总计 0 / 成功 0 / 失败 0");
    };

    let mut lines = vec![
        format!("Kernel[{kernel_id}] 周期完成"),
        format!("- 周期: {}", result.cycle_id),
        format!(
            "- 状态: {} ({})",
            localized_status(result.status),
            result.status
        ),
        format!(
            "- 任务: 总计 {} / 成功 {} / 失败 {}",
            result.dispatched, result.succeeded, result.failed
        ),
        format!("- 成功率: {:.1}%", result.success_rate()),
    ];

    if !result.failed_agents.is_empty() {
        let names: Vec<&str> = result.failed_agents.iter().map(|a| a.as_str()).collect();
        lines.push(format!("- 失败代理: {}", names.join(", ")));
    }

    for summary in &result.agent_summaries {
        lines.push(format!(
            "- [{}|{}] {}",
            summary.agent_id,
            summary.status,
            compact_summary(&summary.detail, AGENT_LINE_BUDGET)
        ));
    }

    if !result.agent_summaries.is_empty() {
        let mut actionable = 0u32;
        let mut auto_recovered = 0u32;
        let mut blocked = 0u32;
        for summary in &result.agent_summaries {
            if summary.status == "done" {
                actionable += 1;
                if attempts_of(summary) > 1 || summary.recovered_from.is_some() {
                    auto_recovered += 1;
                }
            } else {
                blocked += 1;
            }
        }
        lines.push(format!(
            "- 自主信号: 可执行 {actionable} / 自动恢复 {auto_recovered} / 受阻 {blocked}"
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
