//! Per-run campaign state shared by the pacing loop, the executor and the
//! lifecycle tracker.

use dashmap::DashSet;
use parking_lot::{Mutex, RwLock};

use crate::metrics::CallStatistics;
use crate::pacing::DialingMetrics;
use crate::registry::CallRegistry;
use crate::types::CampaignId;

#[derive(Debug)]
pub struct CampaignState {
    pub tenant_id: String,
    pub campaign_id: CampaignId,

    /// Calls placed by this run that have not been evicted yet
    pub registry: CallRegistry,

    pub stats: Mutex<CallStatistics>,

    /// Phone numbers already dialed during this run
    attempted: DashSet<String>,

    last_metrics: RwLock<Option<DialingMetrics>>,
}

impl CampaignState {
    pub fn new(tenant_id: impl Into<String>, campaign_id: CampaignId, outcome_window_size: usize) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            campaign_id,
            registry: CallRegistry::new(),
            stats: Mutex::new(CallStatistics::new(outcome_window_size)),
            attempted: DashSet::new(),
            last_metrics: RwLock::new(None),
        }
    }

    /// Claim a phone number for dialing; false if it was already claimed
    pub fn try_claim(&self, phone_number: &str) -> bool {
        self.attempted.insert(phone_number.to_string())
    }

    pub fn attempted_count(&self) -> usize {
        self.attempted.len()
    }

    pub fn record_abandonment(&self, increment: f64) -> f64 {
        self.stats.lock().record_abandonment(increment)
    }

    pub fn abandonment_rate(&self) -> f64 {
        self.stats.lock().abandonment_rate()
    }

    pub fn set_last_metrics(&self, metrics: DialingMetrics) {
        *self.last_metrics.write() = Some(metrics);
    }

    /// Metrics from the most recent pacing cycle
    pub fn last_metrics(&self) -> Option<DialingMetrics> {
        self.last_metrics.read().clone()
    }
}
