// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Planners: decide which dispatches a cycle should run.

use ak_core::{AgentConfig, AgentId, Dispatch, DispatchSpec, DispatchStatus, STATE_TOKEN};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// Errors from planning
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("planning failed: {0}")]
    Failed(String),
}

/// Capability that turns current state plus recent dispatch history into a
/// list of dispatch specifications.
///
/// Every implementation must skip agents whose most recent dispatch is
/// still `running`; duplicating in-flight work is never allowed.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        state: &str,
        recent_by_agent: &HashMap<AgentId, Dispatch>,
    ) -> Result<Vec<DispatchSpec>, PlanError>;
}

fn is_running(recent_by_agent: &HashMap<AgentId, Dispatch>, agent_id: &AgentId) -> bool {
    recent_by_agent
        .get(agent_id)
        .is_some_and(|d| d.status == DispatchStatus::Running)
}

/// Configuration-driven planner: one spec per enabled, idle agent.
///
/// Output order follows configuration order, so planning is deterministic.
pub struct StaticPlanner {
    agents: Vec<AgentConfig>,
}

impl StaticPlanner {
    pub fn new(agents: Vec<AgentConfig>) -> Self {
        Self { agents }
    }
}

#[async_trait]
impl Planner for StaticPlanner {
    async fn plan(
        &self,
        state: &str,
        recent_by_agent: &HashMap<AgentId, Dispatch>,
    ) -> Result<Vec<DispatchSpec>, PlanError> {
        let mut specs = Vec::new();
        for agent in &self.agents {
            if !agent.enabled {
                continue;
            }
            if is_running(recent_by_agent, &agent.id) {
                continue;
            }
            specs.push(DispatchSpec {
                agent_id: agent.id.clone(),
                prompt: agent.prompt.replace(STATE_TOKEN, state),
                priority: agent.priority,
                metadata: agent.metadata.clone(),
            });
        }
        Ok(specs)
    }
}

/// Composes two planners: the primary decides, the fallback takes over on
/// error or an empty plan.
///
/// The combined output is re-checked against running agents and capped at
/// `max_specs`, so a misbehaving primary cannot overcommit the cycle.
pub struct HybridPlanner<P, F> {
    primary: P,
    fallback: F,
    max_specs: usize,
}

impl<P: Planner, F: Planner> HybridPlanner<P, F> {
    pub fn new(primary: P, fallback: F, max_specs: usize) -> Self {
        Self {
            primary,
            fallback,
            max_specs,
        }
    }
}

#[async_trait]
impl<P: Planner, F: Planner> Planner for HybridPlanner<P, F> {
    async fn plan(
        &self,
        state: &str,
        recent_by_agent: &HashMap<AgentId, Dispatch>,
    ) -> Result<Vec<DispatchSpec>, PlanError> {
        let mut specs = match self.primary.plan(state, recent_by_agent).await {
            Ok(specs) if !specs.is_empty() => specs,
            Ok(_) => self.fallback.plan(state, recent_by_agent).await?,
            Err(e) => {
                warn!(error = %e, "primary planner failed, falling back");
                self.fallback.plan(state, recent_by_agent).await?
            }
        };
        specs.retain(|spec| !is_running(recent_by_agent, &spec.agent_id));
        specs.truncate(self.max_specs);
        Ok(specs)
    }
}

#[cfg(test)]
#[path = "planner_tests.rs"]
mod tests;
