//! Agent management collaborator
//!
//! The dialer does not own agents. It reads the roster once per pacing cycle
//! and once per answered call, and it flips an agent to `Busy` when a call is
//! handed over. Everything else about agents (login, wrap-up, skills) belongs
//! to whoever implements [`AgentDirectory`].

use std::fmt;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{DialerError, Result};

/// Agent status as reported by the agent directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Available,
    Busy,
    PostCallWrapUp,
    Offline,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentStatus::Available => "available",
            AgentStatus::Busy => "busy",
            AgentStatus::PostCallWrapUp => "post_call_wrap_up",
            AgentStatus::Offline => "offline",
        };
        f.write_str(s)
    }
}

/// Roster entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent_id: String,
    pub status: AgentStatus,

    /// Where an answered call is transferred to (SIP URI or E.164 number)
    pub transfer_target: String,
}

impl AgentInfo {
    pub fn new(agent_id: impl Into<String>, status: AgentStatus, transfer_target: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            status,
            transfer_target: transfer_target.into(),
        }
    }
}

/// Historical performance for one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub agent_id: String,

    /// Seconds
    pub average_call_duration: f64,
}

/// Source of agent roster and agent performance data
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Current roster with statuses; order is the routing preference order
    async fn list_agents(&self, tenant_id: &str) -> Result<Vec<AgentInfo>>;

    /// Historical per-agent metrics
    async fn agent_metrics(&self, tenant_id: &str) -> Result<Vec<AgentMetrics>>;

    async fn set_agent_status(&self, tenant_id: &str, agent_id: &str, status: AgentStatus) -> Result<()>;
}

/// Agent directory backed by process memory
///
/// Useful for tests and single-node deployments where the roster is pushed in
/// by another component. Tenants are not partitioned.
#[derive(Debug, Default)]
pub struct InMemoryAgentDirectory {
    agents: RwLock<Vec<AgentInfo>>,
    metrics: RwLock<Vec<AgentMetrics>>,
}

impl InMemoryAgentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agents(agents: Vec<AgentInfo>) -> Self {
        Self {
            agents: RwLock::new(agents),
            metrics: RwLock::new(Vec::new()),
        }
    }

    /// Add an agent, or replace the entry with the same id in place
    pub fn upsert_agent(&self, agent: AgentInfo) {
        let mut agents = self.agents.write();
        match agents.iter_mut().find(|a| a.agent_id == agent.agent_id) {
            Some(existing) => *existing = agent,
            None => agents.push(agent),
        }
    }

    pub fn remove_agent(&self, agent_id: &str) -> bool {
        let mut agents = self.agents.write();
        let before = agents.len();
        agents.retain(|a| a.agent_id != agent_id);
        agents.len() != before
    }

    pub fn set_metrics(&self, metrics: Vec<AgentMetrics>) {
        *self.metrics.write() = metrics;
    }

    pub fn status_of(&self, agent_id: &str) -> Option<AgentStatus> {
        self.agents
            .read()
            .iter()
            .find(|a| a.agent_id == agent_id)
            .map(|a| a.status)
    }
}

#[async_trait]
impl AgentDirectory for InMemoryAgentDirectory {
    async fn list_agents(&self, _tenant_id: &str) -> Result<Vec<AgentInfo>> {
        Ok(self.agents.read().clone())
    }

    async fn agent_metrics(&self, _tenant_id: &str) -> Result<Vec<AgentMetrics>> {
        Ok(self.metrics.read().clone())
    }

    async fn set_agent_status(&self, _tenant_id: &str, agent_id: &str, status: AgentStatus) -> Result<()> {
        let mut agents = self.agents.write();
        let agent = agents
            .iter_mut()
            .find(|a| a.agent_id == agent_id)
            .ok_or_else(|| DialerError::not_found(format!("agent {}", agent_id)))?;
        agent.status = status;
        Ok(())
    }
}
