//! # Dialer-Engine
//!
//! Predictive outbound dialing for telemarketing campaigns.
//!
//! The engine keeps a pool of human agents busy by placing outbound calls
//! ahead of agent availability, using the observed answer rate and talk time
//! to decide how many numbers to dial each pacing cycle. Answered calls are
//! transferred to the first available agent; when none is free the call is
//! abandoned and dialing backs off.
//!
//! This crate provides:
//! - A pure pacing calculator and admission gate
//! - Concurrent call placement through a pluggable telephony provider
//!   (a Telnyx Call Control client is included)
//! - A webhook-driven call lifecycle state machine
//! - Agent routing over a pluggable agent directory
//! - A per-campaign pacing loop with start/stop control
//! - An axum HTTP surface for webhooks and campaign inspection
//!
//! ## Architecture
//!
//! ```text
//!   ticker ─► MetricsSnapshotBuilder ─► calculate_pacing ─► should_dial
//!                                                              │
//!                                           CallPlacementExecutor ─► TelephonyProvider
//!                                                              │
//!   webhook ─► CallLifecycleTracker ─► AgentRouter ─► AgentDirectory
//! ```

pub mod agents;
pub mod api;
pub mod audit;
pub mod campaign;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod outcomes;
pub mod pacing;
pub mod registry;
pub mod routing;
pub mod server;
pub mod tasks;
pub mod telephony;
pub mod tracker;
pub mod types;

pub use agents::{AgentDirectory, AgentInfo, AgentMetrics, AgentStatus, InMemoryAgentDirectory};
pub use audit::{AuditAction, AuditEvent, AuditSink, AuditTrail, TracingAuditSink};
pub use config::{ApiConfig, DialerConfig, PacingConfig, TelephonyConfig, TrackerConfig};
pub use error::{DialerError, Result};
pub use orchestrator::{CycleReport, PredictiveDialer};
pub use outcomes::{CallOutcome, OutcomeSink, TracingOutcomeSink};
pub use pacing::{calculate_pacing, should_dial, DialingMetrics, PacingCalculation};
pub use server::{DialerServer, DialerServerBuilder};
pub use telephony::{CallEvent, TelephonyProvider, TelnyxClient};
pub use tracker::EventDisposition;
pub use types::{CallId, CampaignId, Contact, DialResult, DialStatus};

/// Commonly used types for wiring a dialer
pub mod prelude {
    pub use crate::agents::{AgentDirectory, AgentInfo, AgentStatus, InMemoryAgentDirectory};
    pub use crate::config::{DialerConfig, PacingConfig, TelephonyConfig};
    pub use crate::error::{DialerError, Result};
    pub use crate::logging::{init_logging, LoggingConfig};
    pub use crate::orchestrator::PredictiveDialer;
    pub use crate::server::{DialerServer, DialerServerBuilder};
    pub use crate::telephony::{CallEvent, TelephonyProvider, TelnyxClient};
    pub use crate::types::{CallId, CampaignId, Contact, DialResult, DialStatus};
}
