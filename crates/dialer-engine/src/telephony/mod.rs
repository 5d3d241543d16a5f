//! # Telephony boundary
//!
//! Outbound requests (placement, transfer) go through [`TelephonyProvider`];
//! inbound provider webhooks are decoded by [`events`]. The engine only ever
//! sees provider calls through their call control id.

pub mod events;
pub mod telnyx;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{DialerError, Result};

pub use events::{CallEvent, CallEventData, CallEventKind};
pub use telnyx::TelnyxClient;

/// Correlation data echoed back by the provider on every webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    pub tenant_id: String,
    pub campaign_id: String,
    pub contact_id: String,
    pub call_id: String,
}

impl ClientState {
    /// Base64-encoded JSON, the form the provider carries opaquely
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(json))
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| DialerError::internal(format!("client_state is not valid base64: {}", e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Outbound call placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRequest {
    pub to: String,
    pub from: String,
    pub connection_profile_id: String,
    pub webhook_url: String,
    pub client_state: ClientState,
    pub timeout_secs: u64,
    pub answering_machine_detection: bool,

    /// How long the provider may analyse the greeting before deciding
    pub answer_detection_timeout_secs: u64,
}

/// Hand an answered call to an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub call_control_id: String,
    pub transfer_target: String,
}

/// Provider-facing half of the telephony boundary
#[async_trait]
pub trait TelephonyProvider: Send + Sync {
    /// Place a call and return the provider's call control id
    async fn place_call(&self, request: &PlacementRequest) -> Result<String>;

    async fn transfer_call(&self, request: &TransferRequest) -> Result<()>;
}
