use thiserror::Error;

use crate::types::DialStatus;

/// Error types for predictive dialing operations
///
/// Only a handful of these ever reach a caller of the engine: a pacing cycle
/// logs its own failures and keeps going, and webhook handling never fails.
/// The variants exist so that each seam (telephony, agent directory,
/// configuration) can report what went wrong with `?`.
///
/// # Examples
///
/// ```
/// use rvoip_dialer_engine::{DialerError, Result};
///
/// fn start() -> Result<()> {
///     Err(DialerError::AlreadyRunning("campaign-42".to_string()))
/// }
///
/// match start() {
///     Err(DialerError::AlreadyRunning(id)) => println!("{} is already being paced", id),
///     other => println!("{:?}", other),
/// }
/// ```
#[derive(Error, Debug)]
pub enum DialerError {
    /// A campaign was started while pacing for it is already active
    #[error("Campaign already running: {0}")]
    AlreadyRunning(String),

    /// The engine has been shut down and accepts no new campaigns
    #[error("Dialer engine has been shut down")]
    ShutDown,

    /// Requested campaign or call is not tracked by the engine
    #[error("Not found: {0}")]
    NotFound(String),

    /// The telephony provider answered with a non-success status
    ///
    /// Placement and transfer requests surface the HTTP status and the raw
    /// response body so the failure can be recorded on the `DialResult`.
    #[error("Telephony provider rejected request ({status}): {body}")]
    Telephony {
        status: u16,
        body: String,
    },

    /// Transport-level failure talking to the telephony provider
    #[error("Network error: {0}")]
    Network(String),

    /// The agent management collaborator failed to answer
    #[error("Agent directory error: {0}")]
    AgentDirectory(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A call state change that is not an edge of the call state machine
    #[error("Invalid call state transition from {from} to {to}")]
    InvalidTransition {
        from: DialStatus,
        to: DialStatus,
    },

    /// Payload encoding or decoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for DialerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl DialerError {
    /// Create a telephony rejection error
    pub fn telephony<S: Into<String>>(status: u16, body: S) -> Self {
        Self::Telephony {
            status,
            body: body.into(),
        }
    }

    /// Create a new NotFound error with the provided message
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new AgentDirectory error with the provided message
    pub fn agent_directory<S: Into<String>>(msg: S) -> Self {
        Self::AgentDirectory(msg.into())
    }

    /// Create a new Configuration error with the provided message
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new Internal error with the provided message
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error came from the telephony boundary
    pub fn is_telephony(&self) -> bool {
        matches!(self, Self::Telephony { .. } | Self::Network(_))
    }
}

/// Result type for dialer operations
pub type Result<T> = std::result::Result<T, DialerError>;
