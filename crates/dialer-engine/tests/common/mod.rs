//! Shared fakes for dialer-engine integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use rvoip_dialer_engine::audit::AuditAction;
use rvoip_dialer_engine::telephony::{PlacementRequest, TransferRequest};
use rvoip_dialer_engine::{
    AgentInfo, AgentStatus, AuditEvent, AuditSink, CallOutcome, DialerConfig, DialerError,
    InMemoryAgentDirectory, OutcomeSink, PredictiveDialer, Result, TelephonyProvider,
};

/// Telephony provider that records requests and answers with `cc_{to}`
#[derive(Default)]
pub struct FakeTelephony {
    pub placed: Mutex<Vec<PlacementRequest>>,
    pub transfers: Mutex<Vec<TransferRequest>>,
    failing_numbers: Mutex<HashSet<String>>,
    fail_transfers: Mutex<bool>,
    transfer_delay: Mutex<Option<Duration>>,
}

impl FakeTelephony {
    pub fn fail_number(&self, phone_number: &str) {
        self.failing_numbers.lock().insert(phone_number.to_string());
    }

    pub fn fail_transfers(&self) {
        *self.fail_transfers.lock() = true;
    }

    /// Make every transfer take `delay` before the provider answers
    pub fn delay_transfers(&self, delay: Duration) {
        *self.transfer_delay.lock() = Some(delay);
    }

    pub fn placed_numbers(&self) -> Vec<String> {
        self.placed.lock().iter().map(|p| p.to.clone()).collect()
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.lock().len()
    }
}

pub fn control_id_for(phone_number: &str) -> String {
    format!("cc_{}", phone_number)
}

#[async_trait]
impl TelephonyProvider for FakeTelephony {
    async fn place_call(&self, request: &PlacementRequest) -> Result<String> {
        self.placed.lock().push(request.clone());
        if self.failing_numbers.lock().contains(&request.to) {
            return Err(DialerError::telephony(422, "destination rejected"));
        }
        Ok(control_id_for(&request.to))
    }

    async fn transfer_call(&self, request: &TransferRequest) -> Result<()> {
        self.transfers.lock().push(request.clone());
        let delay = *self.transfer_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_transfers.lock() {
            return Err(DialerError::telephony(503, "transfer unavailable"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct CollectingAudit {
    pub events: Mutex<Vec<AuditEvent>>,
    failing: Mutex<bool>,
    hanging: Mutex<bool>,
}

impl CollectingAudit {
    /// Reject every record
    pub fn fail_records(&self) {
        *self.failing.lock() = true;
    }

    /// Never finish writing a record
    pub fn hang_records(&self) {
        *self.hanging.lock() = true;
    }

    pub fn actions(&self) -> Vec<AuditAction> {
        self.events.lock().iter().map(|e| e.action).collect()
    }

    pub fn last(&self, action: AuditAction) -> Option<AuditEvent> {
        self.events.lock().iter().rev().find(|e| e.action == action).cloned()
    }
}

#[async_trait]
impl AuditSink for CollectingAudit {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        if *self.hanging.lock() {
            return std::future::pending().await;
        }
        if *self.failing.lock() {
            return Err(DialerError::internal("audit store unavailable"));
        }
        self.events.lock().push(event);
        Ok(())
    }
}

#[derive(Default)]
pub struct CollectingOutcomes {
    pub outcomes: Mutex<Vec<CallOutcome>>,
}

#[async_trait]
impl OutcomeSink for CollectingOutcomes {
    async fn record_outcome(&self, outcome: CallOutcome) -> Result<()> {
        self.outcomes.lock().push(outcome);
        Ok(())
    }
}

pub struct Harness {
    pub engine: Arc<PredictiveDialer>,
    pub telephony: Arc<FakeTelephony>,
    pub agents: Arc<InMemoryAgentDirectory>,
    pub audit: Arc<CollectingAudit>,
    pub outcomes: Arc<CollectingOutcomes>,
}

/// Config with short grace delays; the ticker is effectively disabled so
/// tests drive cycles explicitly
pub fn test_config() -> DialerConfig {
    let mut config = DialerConfig::default();
    config.pacing.pacing_update_interval_ms = 60_000;
    config.pacing.default_answer_rate = 1.0;
    config.tracker.terminal_grace_delay_ms = 100;
    config
}

/// Let fire-and-forget audit and outcome tasks run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

pub fn available_agents(count: usize) -> Vec<AgentInfo> {
    (1..=count)
        .map(|i| {
            AgentInfo::new(
                format!("agent_{}", i),
                AgentStatus::Available,
                format!("sip:agent_{}@pbx.example.com", i),
            )
        })
        .collect()
}

pub fn harness(config: DialerConfig, agents: Vec<AgentInfo>) -> Harness {
    let telephony = Arc::new(FakeTelephony::default());
    let agents = Arc::new(InMemoryAgentDirectory::with_agents(agents));
    let audit = Arc::new(CollectingAudit::default());
    let outcomes = Arc::new(CollectingOutcomes::default());

    let engine = PredictiveDialer::new(
        config,
        telephony.clone(),
        agents.clone(),
        audit.clone(),
        outcomes.clone(),
    )
    .expect("valid test config");

    Harness {
        engine,
        telephony,
        agents,
        audit,
        outcomes,
    }
}
