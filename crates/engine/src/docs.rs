// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Renderers for the INIT.md and SYSTEM_PROMPT.md documents.

use ak_core::KernelConfig;

fn or_none(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => "(none)",
    }
}

/// Render the immutable initialization snapshot, seeded once at engine
/// build.
pub fn render_init_doc(config: &KernelConfig) -> String {
    let mut out = String::new();
    out.push_str("# Kernel Initialization\n\n");

    out.push_str("## Runtime Config\n\n");
    out.push_str(&format!("- kernel_id: {}\n", config.kernel_id));
    out.push_str(&format!("- schedule: {}\n", config.schedule));
    out.push_str(&format!("- max_concurrent: {}\n", config.max_concurrent));
    out.push_str(&format!(
        "- max_cycle_history: {}\n",
        config.max_cycle_history
    ));
    match config.timeout_seconds {
        Some(secs) => out.push_str(&format!("- timeout_seconds: {secs}\n")),
        None => out.push_str("- timeout_seconds: (none)\n"),
    }
    out.push_str(&format!("- lease_seconds: {}\n", config.lease_seconds));
    out.push_str(&format!("- channel: {}\n", or_none(config.channel.as_deref())));
    out.push_str(&format!("- chat_id: {}\n", or_none(config.chat_id.as_deref())));
    out.push_str(&format!("- user_id: {}\n", or_none(config.user_id.as_deref())));

    out.push_str("\n## Seed State\n\n");
    out.push_str("```markdown\n");
    if !config.seed_state.is_empty() {
        out.push_str(config.seed_state.trim_end_matches('\n'));
        out.push('\n');
    }
    out.push_str("```\n");

    out.push_str("\n## Agents\n");
    for (idx, agent) in config.agents.iter().enumerate() {
        out.push_str(&format!("\n{}. {}\n", idx + 1, agent.id));
        out.push_str(&format!("- enabled: {}\n", agent.enabled));
        out.push_str(&format!("- priority: {}\n", agent.priority));
        if !agent.metadata.is_empty() {
            let mut pairs: Vec<String> = agent
                .metadata
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            pairs.sort();
            out.push_str(&format!("- metadata: {}\n", pairs.join(", ")));
        }
        out.push_str("\n```\n");
        out.push_str(agent.prompt.trim_end_matches('\n'));
        out.push_str("\n```\n");
    }
    out
}

/// Render the per-cycle system-prompt snapshot.
pub fn render_system_prompt_doc(source: &str, prompt: &str, generated_at: &str) -> String {
    let mut out = String::new();
    out.push_str("# Kernel System Prompt\n\n");
    out.push_str(&format!("- generated_at: {generated_at}\n"));
    out.push_str(&format!("- source: {source}\n"));
    out.push_str("\n```\n");
    out.push_str(prompt.trim_end_matches('\n'));
    out.push_str("\n```\n");
    out
}

#[cfg(test)]
#[path = "docs_tests.rs"]
mod tests;
