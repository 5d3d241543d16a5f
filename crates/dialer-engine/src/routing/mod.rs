//! # Agent Router
//!
//! Connects an answered outbound call to a live agent. The router runs once
//! per `call.answered` webhook:
//!
//! ```text
//!              call.answered
//!                    │
//!        ┌───────────▼────────────┐
//!        │  roster (first         │
//!        │  available, in order)  │
//!        └─────┬─────────────┬────┘
//!              │ found       │ none / roster error
//!   ┌──────────▼─────────┐ ┌─▼──────────────────────┐
//!   │ mark agent busy    │ │ answered → abandoned   │
//!   │ transfer call      │ │ abandonment += incr    │
//!   └──────────┬─────────┘ └────────────────────────┘
//!              │
//!   ok: connected_to_agent set (agent released if the call ended meanwhile)
//!   err: logged, call stays answered
//! ```
//!
//! Agent selection and busy-marking happen under one lock so that two calls
//! answered at the same moment cannot land on the same agent. The transfer
//! itself runs outside the lock.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::agents::{AgentDirectory, AgentInfo, AgentStatus};
use crate::campaign::CampaignState;
use crate::telephony::{TelephonyProvider, TransferRequest};
use crate::types::{CallId, DialStatus};

/// What the router did with an answered call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RoutingDecision {
    /// Transferred and recorded on the call
    Connected { agent_id: String },

    /// Agent reserved, but the provider rejected the transfer
    TransferFailed { agent_id: String, error: String },

    /// No agent was available; the call is abandoned
    Abandoned,

    /// Call is no longer answered and unrouted, or ended before the
    /// transfer completed
    NotRoutable,
}

pub struct AgentRouter {
    agents: Arc<dyn AgentDirectory>,
    telephony: Arc<dyn TelephonyProvider>,
    abandonment_increment: f64,
    selection_lock: Mutex<()>,
}

impl AgentRouter {
    pub fn new(
        agents: Arc<dyn AgentDirectory>,
        telephony: Arc<dyn TelephonyProvider>,
        abandonment_increment: f64,
    ) -> Self {
        Self {
            agents,
            telephony,
            abandonment_increment,
            selection_lock: Mutex::new(()),
        }
    }

    /// Route an answered call to the first available agent
    pub async fn route_answered_call(&self, campaign: &CampaignState, call_id: &CallId) -> RoutingDecision {
        let call_control_id = match campaign.registry.get(call_id) {
            Some(call) if call.is_waiting_for_agent() => match call.call_control_id {
                Some(id) => id,
                None => return RoutingDecision::NotRoutable,
            },
            _ => return RoutingDecision::NotRoutable,
        };

        let agent = {
            let _guard = self.selection_lock.lock().await;

            let agent = match self.agents.list_agents(&campaign.tenant_id).await {
                Ok(roster) => select_agent(&roster).cloned(),
                Err(e) => {
                    warn!("⚠️ Agent roster unavailable while routing call {}: {}", call_id, e);
                    None
                }
            };

            let Some(agent) = agent else {
                return self.abandon(campaign, call_id);
            };

            if let Err(e) = self
                .agents
                .set_agent_status(&campaign.tenant_id, &agent.agent_id, AgentStatus::Busy)
                .await
            {
                warn!("⚠️ Failed to mark agent {} busy: {}", agent.agent_id, e);
            }

            agent
        };

        debug!("🎯 Routing call {} to agent {}", call_id, agent.agent_id);

        let request = TransferRequest {
            call_control_id,
            transfer_target: agent.transfer_target.clone(),
        };

        if let Err(e) = self.telephony.transfer_call(&request).await {
            warn!("⚠️ Failed to transfer call {} to agent {}: {}", call_id, agent.agent_id, e);
            return RoutingDecision::TransferFailed {
                agent_id: agent.agent_id,
                error: e.to_string(),
            };
        }

        let recorded = campaign
            .registry
            .update(call_id, |call| call.assign_agent(agent.agent_id.clone()));
        match recorded {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                warn!("⚠️ Call {} ended during transfer to agent {}: {}", call_id, agent.agent_id, e);
                self.release(campaign, &agent).await;
                return RoutingDecision::NotRoutable;
            }
            None => {
                debug!("Call {} evicted before its agent was recorded", call_id);
                self.release(campaign, &agent).await;
                return RoutingDecision::NotRoutable;
            }
        }

        info!("✅ Call {} connected to agent {}", call_id, agent.agent_id);
        RoutingDecision::Connected {
            agent_id: agent.agent_id,
        }
    }

    /// Hand a reserved agent back when the call it was reserved for is gone
    async fn release(&self, campaign: &CampaignState, agent: &AgentInfo) {
        if let Err(e) = self
            .agents
            .set_agent_status(&campaign.tenant_id, &agent.agent_id, AgentStatus::Available)
            .await
        {
            warn!("⚠️ Failed to release agent {}: {}", agent.agent_id, e);
        }
    }

    fn abandon(&self, campaign: &CampaignState, call_id: &CallId) -> RoutingDecision {
        let transitioned = campaign
            .registry
            .update(call_id, |call| call.transition(DialStatus::Abandoned));

        match transitioned {
            Some(Ok(())) => {
                let rate = campaign.record_abandonment(self.abandonment_increment);
                warn!(
                    "📵 No agent available for call {}, abandoned (abandonment rate now {:.2})",
                    call_id, rate
                );
                RoutingDecision::Abandoned
            }
            _ => RoutingDecision::NotRoutable,
        }
    }
}

/// First available agent in roster order
pub fn select_agent(roster: &[AgentInfo]) -> Option<&AgentInfo> {
    roster.iter().find(|agent| agent.status == AgentStatus::Available)
}
