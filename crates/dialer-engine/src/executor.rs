//! # Call Placement Executor
//!
//! Turns a pacing decision into provider placements. A batch picks up to `n`
//! contacts that are neither live in the registry nor already dialed this
//! run, places them all concurrently, and registers every result with the
//! lifecycle tracker. One failed placement never affects its siblings.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::audit::{AuditAction, AuditEvent, AuditTrail};
use crate::campaign::CampaignState;
use crate::config::{PacingConfig, TelephonyConfig};
use crate::telephony::{ClientState, PlacementRequest, TelephonyProvider};
use crate::tracker::CallLifecycleTracker;
use crate::types::{CallId, Contact, DialResult, DialStatus};

/// Result of one batch dial
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub attempted: usize,
    pub successful: usize,
    pub failed: usize,
    pub call_ids: Vec<CallId>,
}

pub struct CallPlacementExecutor {
    telephony: Arc<dyn TelephonyProvider>,
    tracker: Arc<CallLifecycleTracker>,
    audit: AuditTrail,
    telephony_config: TelephonyConfig,
    pacing_config: PacingConfig,
}

impl CallPlacementExecutor {
    pub fn new(
        telephony: Arc<dyn TelephonyProvider>,
        tracker: Arc<CallLifecycleTracker>,
        audit: AuditTrail,
        telephony_config: TelephonyConfig,
        pacing_config: PacingConfig,
    ) -> Self {
        Self {
            telephony,
            tracker,
            audit,
            telephony_config,
            pacing_config,
        }
    }

    /// Pick up to `n` contacts that are not live and not yet dialed, claiming
    /// them for this run
    pub fn select_contacts(&self, campaign: &CampaignState, contacts: &[Contact], n: usize) -> Vec<Contact> {
        if n == 0 {
            return Vec::new();
        }

        let live: HashSet<String> = campaign.registry.phone_numbers().into_iter().collect();
        let mut selected = Vec::with_capacity(n);

        for contact in contacts {
            if selected.len() == n {
                break;
            }
            if live.contains(&contact.phone_number) {
                continue;
            }
            if campaign.try_claim(&contact.phone_number) {
                selected.push(contact.clone());
            }
        }

        selected
    }

    /// Select and dial up to `n` contacts concurrently
    pub async fn dial_batch(
        &self,
        campaign: &Arc<CampaignState>,
        contacts: &[Contact],
        n: usize,
        dial_rate: f64,
    ) -> BatchSummary {
        let selected = self.select_contacts(campaign, contacts, n);
        if selected.is_empty() {
            debug!("No eligible contacts for campaign {}", campaign.campaign_id);
            return BatchSummary::default();
        }

        let results = join_all(selected.iter().map(|contact| self.place_call(campaign, contact))).await;

        let mut summary = BatchSummary {
            attempted: results.len(),
            ..Default::default()
        };
        for result in &results {
            if result.status == DialStatus::Failed {
                summary.failed += 1;
            } else {
                summary.successful += 1;
            }
            summary.call_ids.push(result.call_id.clone());
        }

        info!(
            "📞 Campaign {} dialed {} contacts ({} placed, {} failed)",
            campaign.campaign_id, summary.attempted, summary.successful, summary.failed
        );

        self.audit.emit(AuditEvent::new(
            campaign.tenant_id.clone(),
            campaign.campaign_id.clone(),
            AuditAction::DialBatch,
            json!({
                "calls_attempted": summary.attempted,
                "successful": summary.successful,
                "failed": summary.failed,
                "dial_rate": dial_rate,
            }),
        ));

        summary
    }

    /// Place one call and hand the result to the tracker
    pub async fn place_call(&self, campaign: &Arc<CampaignState>, contact: &Contact) -> DialResult {
        let call_id = CallId::generate();

        let request = PlacementRequest {
            to: contact.phone_number.clone(),
            from: self.telephony_config.caller_id.clone(),
            connection_profile_id: self.telephony_config.connection_profile_id.clone(),
            webhook_url: self.telephony_config.webhook_url(),
            client_state: ClientState {
                tenant_id: campaign.tenant_id.clone(),
                campaign_id: campaign.campaign_id.to_string(),
                contact_id: contact.contact_id.clone(),
                call_id: call_id.to_string(),
            },
            timeout_secs: self.pacing_config.dial_timeout_secs,
            answering_machine_detection: self.telephony_config.answering_machine_detection,
            answer_detection_timeout_secs: self.pacing_config.answer_detection_timeout_secs,
        };

        let result = match self.telephony.place_call(&request).await {
            Ok(call_control_id) => DialResult::initiated(call_id, contact, call_control_id),
            Err(e) => {
                warn!("❌ Failed to place call to {}: {}", contact.phone_number, e);
                DialResult::failed(call_id, contact, e.to_string())
            }
        };

        self.tracker.register(campaign, result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::InMemoryAgentDirectory;
    use crate::audit::TracingAuditSink;
    use crate::config::TrackerConfig;
    use crate::error::{DialerError, Result};
    use crate::outcomes::TracingOutcomeSink;
    use crate::routing::AgentRouter;
    use crate::telephony::TransferRequest;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Fails placements to numbers ending in `9`
    #[derive(Default)]
    struct ScriptedProvider {
        placed: Mutex<Vec<PlacementRequest>>,
    }

    #[async_trait]
    impl TelephonyProvider for ScriptedProvider {
        async fn place_call(&self, request: &PlacementRequest) -> Result<String> {
            self.placed.lock().push(request.clone());
            if request.to.ends_with('9') {
                return Err(DialerError::telephony(422, "invalid destination"));
            }
            Ok(format!("cc_{}", request.to))
        }

        async fn transfer_call(&self, _request: &TransferRequest) -> Result<()> {
            Ok(())
        }
    }

    fn executor(provider: Arc<ScriptedProvider>) -> CallPlacementExecutor {
        let router = Arc::new(AgentRouter::new(
            Arc::new(InMemoryAgentDirectory::new()),
            provider.clone(),
            0.01,
        ));
        let tracker = Arc::new(CallLifecycleTracker::new(
            TrackerConfig::default(),
            router,
            Arc::new(TracingOutcomeSink),
        ));
        let telephony_config = TelephonyConfig {
            caller_id: "+18005550000".into(),
            connection_profile_id: "profile_1".into(),
            ..Default::default()
        };

        CallPlacementExecutor::new(
            provider,
            tracker,
            AuditTrail::new(Arc::new(TracingAuditSink)),
            telephony_config,
            PacingConfig::default(),
        )
    }

    fn contacts(numbers: &[&str]) -> Vec<Contact> {
        numbers
            .iter()
            .enumerate()
            .map(|(i, n)| Contact::new(*n, format!("contact_{}", i)))
            .collect()
    }

    #[tokio::test]
    async fn test_failed_placement_does_not_abort_batch() {
        let provider = Arc::new(ScriptedProvider::default());
        let executor = executor(provider.clone());
        let campaign = Arc::new(CampaignState::new("tenant", "campaign".into(), 10));
        let list = contacts(&["+15550001", "+15550009", "+15550002"]);

        let summary = executor.dial_batch(&campaign, &list, 3, 1.5).await;
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(campaign.registry.len(), 3);

        let failed: Vec<DialResult> = campaign
            .registry
            .snapshot()
            .into_iter()
            .filter(|c| c.status == DialStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].error.as_deref().unwrap().contains("invalid destination"));
    }

    #[tokio::test]
    async fn test_placement_carries_client_state() {
        let provider = Arc::new(ScriptedProvider::default());
        let executor = executor(provider.clone());
        let campaign = Arc::new(CampaignState::new("tenant_7", "campaign_7".into(), 10));

        let result = executor.place_call(&campaign, &Contact::new("+15550003", "contact_3")).await;
        assert_eq!(result.status, DialStatus::Initiated);
        assert_eq!(result.call_control_id.as_deref(), Some("cc_+15550003"));

        let placed = provider.placed.lock().clone();
        assert_eq!(placed[0].from, "+18005550000");
        assert_eq!(placed[0].connection_profile_id, "profile_1");
        assert_eq!(placed[0].timeout_secs, 30);
        assert_eq!(placed[0].answer_detection_timeout_secs, 5);
        assert_eq!(placed[0].client_state.tenant_id, "tenant_7");
        assert_eq!(placed[0].client_state.campaign_id, "campaign_7");
        assert_eq!(placed[0].client_state.call_id, result.call_id.to_string());
        assert!(placed[0].webhook_url.ends_with("/api/telemarketing/call-events"));
    }

    #[tokio::test]
    async fn test_selection_skips_live_and_attempted_numbers() {
        let provider = Arc::new(ScriptedProvider::default());
        let executor = executor(provider);
        let campaign = Arc::new(CampaignState::new("tenant", "campaign".into(), 10));
        let list = contacts(&["+15550001", "+15550002", "+15550003", "+15550004"]);

        let first = executor.select_contacts(&campaign, &list, 2);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].phone_number, "+15550001");

        let second = executor.select_contacts(&campaign, &list, 5);
        let numbers: Vec<&str> = second.iter().map(|c| c.phone_number.as_str()).collect();
        assert_eq!(numbers, vec!["+15550003", "+15550004"]);

        assert!(executor.select_contacts(&campaign, &list, 5).is_empty());
        assert!(executor.select_contacts(&campaign, &list, 0).is_empty());
    }

    #[tokio::test]
    async fn test_empty_selection_places_nothing() {
        let provider = Arc::new(ScriptedProvider::default());
        let executor = executor(provider.clone());
        let campaign = Arc::new(CampaignState::new("tenant", "campaign".into(), 10));

        let summary = executor.dial_batch(&campaign, &[], 4, 0.0).await;
        assert_eq!(summary, BatchSummary::default());
        assert!(provider.placed.lock().is_empty());
    }
}
