//! # Pacing Loop Orchestrator
//!
//! [`PredictiveDialer`] owns the set of running campaigns and drives one
//! pacing loop per campaign:
//!
//! ```text
//!  start(tenant, campaign, contacts)
//!        │
//!        ├── reject if already running
//!        ├── audit: dialer_started
//!        ├── cycle (immediately)
//!        └── ticker ──► every pacing_update_interval_ms ──► cycle
//!
//!  cycle:  snapshot ──► calculate_pacing ──► should_dial? ──► dial_batch
//!
//!  stop(campaign)
//!        ├── cancel ticker, wait for the in-flight cycle
//!        └── audit: dialer_stopped
//! ```
//!
//! Audit records go out on background tasks and are never awaited by a
//! cycle.
//!
//! Each running campaign gets its own [`CampaignState`], so registries and
//! statistics are never shared between campaigns. Stopping a campaign only
//! stops dialing: calls already placed keep resolving through webhooks until
//! the tracker evicts them.
//!
//! A failing or panicking cycle is logged and the next tick runs as usual.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::agents::AgentDirectory;
use crate::audit::{AuditAction, AuditEvent, AuditSink, AuditTrail};
use crate::campaign::CampaignState;
use crate::config::DialerConfig;
use crate::error::{DialerError, Result};
use crate::executor::{BatchSummary, CallPlacementExecutor};
use crate::metrics::MetricsSnapshotBuilder;
use crate::outcomes::OutcomeSink;
use crate::pacing::{calculate_pacing, gate_reason, should_dial, DialingMetrics, PacingCalculation};
use crate::routing::AgentRouter;
use crate::telephony::{CallEvent, TelephonyProvider};
use crate::tracker::{CallLifecycleTracker, EventDisposition};
use crate::types::{CallId, CampaignId, Contact, DialResult};

/// How long shutdown waits for pending audit records
const AUDIT_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// What one pacing cycle observed and did
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub metrics: DialingMetrics,
    pub pacing: PacingCalculation,

    /// Why the gate refused to dial, if it did
    pub skipped: Option<String>,

    pub batch: Option<BatchSummary>,
}

struct CampaignRun {
    state: Arc<CampaignState>,
    contacts: Vec<Contact>,
    cancel: CancellationToken,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

pub struct PredictiveDialer {
    config: DialerConfig,
    campaigns: DashMap<CampaignId, Arc<CampaignRun>>,
    snapshot_builder: MetricsSnapshotBuilder,
    executor: CallPlacementExecutor,
    tracker: Arc<CallLifecycleTracker>,
    audit: AuditTrail,

    /// Cancelled once by [`shutdown`](PredictiveDialer::shutdown); a shut
    /// down engine accepts no new campaigns
    lifecycle: CancellationToken,
}

impl PredictiveDialer {
    /// Wire an engine from its collaborators
    pub fn new(
        config: DialerConfig,
        telephony: Arc<dyn TelephonyProvider>,
        agents: Arc<dyn AgentDirectory>,
        audit: Arc<dyn AuditSink>,
        outcomes: Arc<dyn OutcomeSink>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let audit = AuditTrail::new(audit);

        let router = Arc::new(AgentRouter::new(
            agents.clone(),
            telephony.clone(),
            config.tracker.abandonment_increment,
        ));
        let tracker = Arc::new(CallLifecycleTracker::new(config.tracker.clone(), router, outcomes));
        let executor = CallPlacementExecutor::new(
            telephony,
            tracker.clone(),
            audit.clone(),
            config.telephony.clone(),
            config.pacing.clone(),
        );
        let snapshot_builder = MetricsSnapshotBuilder::new(agents, config.pacing.clone());

        Ok(Arc::new(Self {
            config,
            campaigns: DashMap::new(),
            snapshot_builder,
            executor,
            tracker,
            audit,
            lifecycle: CancellationToken::new(),
        }))
    }

    pub fn config(&self) -> &DialerConfig {
        &self.config
    }

    /// Start pacing a campaign
    ///
    /// Runs the first cycle before returning; subsequent cycles run every
    /// `pacing_update_interval_ms` until [`stop`](Self::stop).
    pub async fn start(
        self: &Arc<Self>,
        tenant_id: impl Into<String>,
        campaign_id: impl Into<CampaignId>,
        contacts: Vec<Contact>,
    ) -> Result<()> {
        let tenant_id = tenant_id.into();
        let campaign_id = campaign_id.into();
        let contact_count = contacts.len();

        let run = match self.campaigns.entry(campaign_id.clone()) {
            Entry::Occupied(_) => {
                warn!("⚠️ Campaign {} is already running", campaign_id);
                return Err(DialerError::AlreadyRunning(campaign_id.to_string()));
            }
            Entry::Vacant(_) if self.lifecycle.is_cancelled() => {
                warn!("⚠️ Refusing to start campaign {}: engine is shut down", campaign_id);
                return Err(DialerError::ShutDown);
            }
            Entry::Vacant(vacant) => {
                let run = Arc::new(CampaignRun {
                    state: Arc::new(CampaignState::new(
                        tenant_id.clone(),
                        campaign_id.clone(),
                        self.config.tracker.outcome_window_size,
                    )),
                    contacts,
                    cancel: CancellationToken::new(),
                    ticker: Mutex::new(None),
                });
                vacant.insert(run.clone());
                run
            }
        };

        info!(
            "🚀 Starting predictive dialer for campaign {} ({} contacts)",
            campaign_id, contact_count
        );

        self.audit.emit(AuditEvent::new(
            tenant_id,
            campaign_id.clone(),
            AuditAction::DialerStarted,
            json!({ "contacts": contact_count }),
        ));

        if let Err(e) = self.run_cycle(&run).await {
            error!("❌ Initial pacing cycle failed for campaign {}: {}", campaign_id, e);
        }

        if run.cancel.is_cancelled() {
            debug!("Campaign {} stopped during its first cycle", campaign_id);
            return Ok(());
        }

        let handle = tokio::spawn(Self::pacing_loop(
            Arc::downgrade(self),
            campaign_id,
            run.cancel.clone(),
        ));
        *run.ticker.lock() = Some(handle);

        Ok(())
    }

    /// Stop pacing a campaign; returns false if it was not running
    pub async fn stop(&self, campaign_id: &CampaignId) -> bool {
        let Some((_, run)) = self.campaigns.remove(campaign_id) else {
            debug!("Stop requested for campaign {} which is not running", campaign_id);
            return false;
        };

        run.cancel.cancel();

        let ticker = run.ticker.lock().take();
        if let Some(handle) = ticker {
            if let Err(e) = handle.await {
                error!("🚨 Pacing loop for campaign {} ended abnormally: {}", campaign_id, e);
            }
        }

        let active_calls = run.state.registry.len();
        info!(
            "🛑 Stopped predictive dialer for campaign {} ({} calls still active)",
            campaign_id, active_calls
        );

        self.audit.emit(AuditEvent::new(
            run.state.tenant_id.clone(),
            campaign_id.clone(),
            AuditAction::DialerStopped,
            json!({ "active_calls": active_calls }),
        ));

        true
    }

    /// Stop every campaign and cancel pending background work
    ///
    /// Terminal. Later calls to [`start`](Self::start) fail with
    /// [`DialerError::ShutDown`]; webhooks are still applied but terminal
    /// calls are no longer reported or evicted.
    pub async fn shutdown(&self) {
        self.lifecycle.cancel();
        for campaign_id in self.running_campaigns() {
            self.stop(&campaign_id).await;
        }
        self.tracker.shutdown();
        self.audit.close(AUDIT_CLOSE_TIMEOUT).await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.lifecycle.is_cancelled()
    }

    /// Apply a provider webhook
    pub async fn handle_call_event(&self, event: &CallEvent) -> EventDisposition {
        self.tracker.handle_event(event).await
    }

    /// Run one pacing cycle now, outside the ticker
    pub async fn trigger_cycle(&self, campaign_id: &CampaignId) -> Result<CycleReport> {
        let run = self
            .campaigns
            .get(campaign_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DialerError::not_found(format!("campaign {}", campaign_id)))?;

        self.run_cycle(&run).await
    }

    pub fn is_running(&self, campaign_id: &CampaignId) -> bool {
        self.campaigns.contains_key(campaign_id)
    }

    pub fn running_campaigns(&self) -> Vec<CampaignId> {
        self.campaigns.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Metrics from the campaign's latest cycle
    pub fn metrics(&self, campaign_id: &CampaignId) -> Option<DialingMetrics> {
        self.campaign(campaign_id)?.last_metrics()
    }

    /// Calls still held in the campaign's registry
    pub fn active_calls(&self, campaign_id: &CampaignId) -> Option<Vec<DialResult>> {
        Some(self.campaign(campaign_id)?.registry.snapshot())
    }

    pub fn get_call(&self, campaign_id: &CampaignId, call_id: &CallId) -> Option<DialResult> {
        self.campaign(campaign_id)?.registry.get(call_id)
    }

    fn campaign(&self, campaign_id: &CampaignId) -> Option<Arc<CampaignState>> {
        self.campaigns
            .get(campaign_id)
            .map(|entry| entry.value().state.clone())
    }

    async fn pacing_loop(engine: Weak<Self>, campaign_id: CampaignId, cancel: CancellationToken) {
        let period = match engine.upgrade() {
            Some(engine) => engine.config.pacing.pacing_interval(),
            None => return,
        };

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(engine) = engine.upgrade() else {
                break;
            };
            let Some(run) = engine.campaigns.get(&campaign_id).map(|entry| entry.value().clone()) else {
                break;
            };

            // Separate task so a panicking cycle cannot take the loop down
            let cycle = tokio::spawn(async move { engine.run_cycle(&run).await });
            match cycle.await {
                Ok(Ok(report)) => {
                    if let Some(batch) = report.batch.filter(|b| b.attempted > 0) {
                        debug!("Campaign {} cycle placed {} calls", campaign_id, batch.attempted);
                    }
                }
                Ok(Err(e)) => error!("❌ Pacing cycle failed for campaign {}: {}", campaign_id, e),
                Err(e) => error!("🚨 Pacing cycle for campaign {} panicked: {}", campaign_id, e),
            }
        }

        debug!("Pacing loop for campaign {} exited", campaign_id);
    }

    #[instrument(
        name = "pacing_cycle",
        skip(self, run),
        fields(campaign_id = %run.state.campaign_id, tenant_id = %run.state.tenant_id)
    )]
    async fn run_cycle(&self, run: &CampaignRun) -> Result<CycleReport> {
        let campaign = &run.state;
        let pacing_config = &self.config.pacing;

        let metrics = self.snapshot_builder.build_snapshot(campaign).await?;
        campaign.set_last_metrics(metrics.clone());

        let pacing = calculate_pacing(&metrics, pacing_config);

        if !should_dial(&metrics, pacing_config) {
            let reason = gate_reason(&metrics, pacing_config).unwrap_or("gate closed");
            debug!(
                "⏸️ Not dialing: {} (available {}, utilization {:.2}, abandonment {:.2})",
                reason, metrics.available_agents, metrics.agent_utilization, metrics.abandonment_rate
            );
            return Ok(CycleReport {
                metrics,
                pacing,
                skipped: Some(reason.to_string()),
                batch: None,
            });
        }

        let batch = self
            .executor
            .dial_batch(campaign, &run.contacts, pacing.calls_to_dial as usize, pacing.dial_rate)
            .await;

        Ok(CycleReport {
            metrics,
            pacing,
            skipped: None,
            batch: Some(batch),
        })
    }
}
