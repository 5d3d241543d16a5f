//! Inbound call-control webhook envelope

use serde::{Deserialize, Serialize};

use super::ClientState;

/// Webhook envelope posted by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEvent {
    #[serde(alias = "eventType")]
    pub event_type: String,
    pub data: CallEventData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEventData {
    #[serde(alias = "callControlId")]
    pub call_control_id: String,

    #[serde(default, alias = "callLegId")]
    pub call_leg_id: Option<String>,

    #[serde(default)]
    pub to: String,

    #[serde(default)]
    pub from: String,

    #[serde(default)]
    pub direction: String,

    #[serde(default)]
    pub state: String,

    /// Base64 client state set at placement, when the provider echoes it
    #[serde(default, alias = "clientState")]
    pub client_state: Option<String>,
}

/// Event types the lifecycle tracker acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEventKind {
    Answered,
    Hangup,
    MachineDetection,
    Busy,
    Other(String),
}

impl CallEventKind {
    pub fn parse(event_type: &str) -> Self {
        match event_type {
            "call.answered" => CallEventKind::Answered,
            "call.hangup" => CallEventKind::Hangup,
            "call.machine.detection" => CallEventKind::MachineDetection,
            "call.busy" => CallEventKind::Busy,
            other => CallEventKind::Other(other.to_string()),
        }
    }
}

impl CallEvent {
    pub fn new(event_type: impl Into<String>, call_control_id: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: CallEventData {
                call_control_id: call_control_id.into(),
                call_leg_id: None,
                to: String::new(),
                from: String::new(),
                direction: "outgoing".to_string(),
                state: String::new(),
                client_state: None,
            },
        }
    }

    pub fn kind(&self) -> CallEventKind {
        CallEventKind::parse(&self.event_type)
    }

    /// Decoded client state, if present and well formed
    pub fn client_state(&self) -> Option<ClientState> {
        self.data
            .client_state
            .as_deref()
            .and_then(|encoded| ClientState::decode(encoded).ok())
    }
}
