//! Final call outcome reporting
//!
//! Every call reaching a terminal status is reported exactly once, so that
//! the campaign side can update contact history and retry schedules.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::types::{CallId, CampaignId, DialResult, DialStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallOutcome {
    pub tenant_id: String,
    pub campaign_id: CampaignId,
    pub call_id: CallId,
    pub contact_id: String,
    pub phone_number: String,
    pub status: DialStatus,
    /// Seconds of talk time for completed calls
    pub duration: Option<f64>,
    pub agent_id: Option<String>,
    pub error: Option<String>,
}

impl CallOutcome {
    pub fn from_result(tenant_id: &str, campaign_id: &CampaignId, result: &DialResult) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            campaign_id: campaign_id.clone(),
            call_id: result.call_id.clone(),
            contact_id: result.contact_id.clone(),
            phone_number: result.phone_number.clone(),
            status: result.status,
            duration: result.duration,
            agent_id: result.connected_to_agent.clone(),
            error: result.error.clone(),
        }
    }
}

#[async_trait]
pub trait OutcomeSink: Send + Sync {
    async fn record_outcome(&self, outcome: CallOutcome) -> Result<()>;
}

/// Outcome sink that only logs
#[derive(Debug, Default, Clone)]
pub struct TracingOutcomeSink;

#[async_trait]
impl OutcomeSink for TracingOutcomeSink {
    async fn record_outcome(&self, outcome: CallOutcome) -> Result<()> {
        info!(
            target: "dialer::outcomes",
            campaign_id = %outcome.campaign_id,
            call_id = %outcome.call_id,
            status = %outcome.status,
            "📞 Call {} finished as {}",
            outcome.contact_id,
            outcome.status
        );
        Ok(())
    }
}
