//! Audit trail for campaign dialing activity

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::tasks::BackgroundTasks;
use crate::types::CampaignId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    DialerStarted,
    DialerStopped,
    DialBatch,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditAction::DialerStarted => "dialer_started",
            AuditAction::DialerStopped => "dialer_stopped",
            AuditAction::DialBatch => "dial_batch",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub tenant_id: String,
    pub campaign_id: CampaignId,
    pub action: AuditAction,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        tenant_id: impl Into<String>,
        campaign_id: CampaignId,
        action: AuditAction,
        details: serde_json::Value,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            campaign_id,
            action,
            details,
            timestamp: Utc::now(),
        }
    }
}

/// Destination for audit events
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<()>;
}

/// Audit sink that writes events to the tracing pipeline
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        info!(
            target: "dialer::audit",
            tenant_id = %event.tenant_id,
            campaign_id = %event.campaign_id,
            action = %event.action,
            details = %event.details,
            "📝 Audit event"
        );
        Ok(())
    }
}

/// Fire-and-forget front for an [`AuditSink`]
///
/// Records are written on background tasks, so a slow or failing sink never
/// holds up pacing. Failures are logged and dropped.
#[derive(Clone)]
pub struct AuditTrail {
    sink: Arc<dyn AuditSink>,
    tasks: BackgroundTasks,
}

impl AuditTrail {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            tasks: BackgroundTasks::new(),
        }
    }

    pub fn emit(&self, event: AuditEvent) {
        let sink = self.sink.clone();
        let name = format!("audit {} {}", event.action, event.campaign_id);
        self.tasks.spawn(name, async move {
            let action = event.action;
            let campaign_id = event.campaign_id.clone();
            if let Err(e) = sink.record(event).await {
                warn!("⚠️ Failed to record {} audit event for campaign {}: {}", action, campaign_id, e);
            }
            Ok(())
        });
    }

    /// Records still being written
    pub fn pending(&self) -> usize {
        self.tasks.active_count()
    }

    /// Give pending records up to `timeout` to land, then drop the rest
    pub async fn close(&self, timeout: Duration) {
        if !self.tasks.drain(timeout).await {
            warn!("⚠️ Dropping {} audit events still pending at shutdown", self.pending());
        }
        self.tasks.cancel_all();
    }
}
