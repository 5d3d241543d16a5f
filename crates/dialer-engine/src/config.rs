//! Dialer configuration
//!
//! Configuration is fixed when the engine is constructed. Every section has
//! production defaults, so a deployment usually only overrides the telephony
//! credentials (see [`TelephonyConfig::from_env`]).

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DialerError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialerConfig {
    #[serde(default)]
    pub pacing: PacingConfig,

    #[serde(default)]
    pub telephony: TelephonyConfig,

    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

/// Pacing tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Desired fraction of agents on a call (0-1)
    pub target_agent_utilization: f64,

    /// Upper bound on calls placed per available agent in one cycle
    pub max_calls_per_agent: u32,

    /// Minimum available agents before any call is placed
    pub min_available_agents: u32,

    /// Milliseconds between pacing cycles
    pub pacing_update_interval_ms: u64,

    /// Abandonment rate (0-1) above which dialing pauses
    pub max_abandonment_rate: f64,

    /// Seconds the provider rings before giving up
    pub dial_timeout_secs: u64,

    /// Seconds allowed for answering-machine detection
    pub answer_detection_timeout_secs: u64,

    /// Talk time seed used until enough completed calls are observed
    pub default_average_talk_time: f64,

    /// Wrap-up time used for wait estimates
    pub default_average_wrap_time: f64,

    /// Answer rate seed used until outcomes are observed
    pub default_answer_rate: f64,

    /// Completed calls needed before observed talk time replaces the seed
    pub min_talk_time_samples: usize,
}

/// Telephony provider credentials and endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelephonyConfig {
    pub api_base_url: String,

    pub api_key: String,

    /// Outbound connection (voice profile) identifier
    pub connection_profile_id: String,

    /// Number presented to the callee
    pub caller_id: String,

    /// Public base URL the provider posts call events to
    pub webhook_base_url: String,

    pub webhook_path: String,

    pub request_timeout_ms: u64,

    /// Ask the provider to run answering-machine detection
    pub answering_machine_detection: bool,
}

/// Call lifecycle tracker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// How long terminal calls stay in the live registry
    pub terminal_grace_delay_ms: u64,

    /// Added to the abandonment estimate for each abandoned call
    pub abandonment_increment: f64,

    /// Number of recent outcomes the answer rate is computed over
    pub outcome_window_size: usize,
}

/// Webhook listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind_address: SocketAddr,
}

impl DialerConfig {
    pub fn validate(&self) -> Result<()> {
        let pacing = &self.pacing;

        if !(0.0..=1.0).contains(&pacing.target_agent_utilization) {
            return Err(DialerError::configuration(format!(
                "target_agent_utilization must be between 0 and 1, got {}",
                pacing.target_agent_utilization
            )));
        }

        if pacing.max_calls_per_agent == 0 {
            return Err(DialerError::configuration("max_calls_per_agent must be at least 1"));
        }

        if pacing.pacing_update_interval_ms == 0 {
            return Err(DialerError::configuration("pacing_update_interval_ms must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&pacing.max_abandonment_rate) {
            return Err(DialerError::configuration(format!(
                "max_abandonment_rate must be between 0 and 1, got {}",
                pacing.max_abandonment_rate
            )));
        }

        if !(pacing.default_average_talk_time > 0.0) {
            return Err(DialerError::configuration("default_average_talk_time must be positive"));
        }

        if !(pacing.default_average_wrap_time > 0.0) {
            return Err(DialerError::configuration("default_average_wrap_time must be positive"));
        }

        if !(pacing.default_answer_rate > 0.0 && pacing.default_answer_rate <= 1.0) {
            return Err(DialerError::configuration(format!(
                "default_answer_rate must be in (0, 1], got {}",
                pacing.default_answer_rate
            )));
        }

        if self.telephony.api_base_url.is_empty() {
            return Err(DialerError::configuration("api_base_url cannot be empty"));
        }

        if !self.telephony.webhook_path.starts_with('/') {
            return Err(DialerError::configuration(format!(
                "webhook_path must start with '/', got {}",
                self.telephony.webhook_path
            )));
        }

        if !(0.0..=1.0).contains(&self.tracker.abandonment_increment) {
            return Err(DialerError::configuration(format!(
                "abandonment_increment must be between 0 and 1, got {}",
                self.tracker.abandonment_increment
            )));
        }

        if self.tracker.outcome_window_size == 0 {
            return Err(DialerError::configuration("outcome_window_size must be greater than 0"));
        }

        Ok(())
    }
}

impl PacingConfig {
    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_update_interval_ms)
    }
}

impl TelephonyConfig {
    /// Load credentials from the process environment
    ///
    /// Reads `TELNYX_API_KEY`, `TELNYX_CONNECTION_ID`, `TELNYX_CALLER_ID` and
    /// `DIALER_WEBHOOK_BASE_URL`; `TELNYX_API_BASE_URL` optionally overrides
    /// the API endpoint.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| DialerError::configuration(format!("{} is not set", key)))
        };

        let mut config = Self {
            api_key: required("TELNYX_API_KEY")?,
            connection_profile_id: required("TELNYX_CONNECTION_ID")?,
            caller_id: required("TELNYX_CALLER_ID")?,
            webhook_base_url: required("DIALER_WEBHOOK_BASE_URL")?,
            ..Self::default()
        };

        if let Some(base) = lookup("TELNYX_API_BASE_URL").filter(|v| !v.is_empty()) {
            config.api_base_url = base;
        }

        Ok(config)
    }

    /// Full URL handed to the provider for call events
    pub fn webhook_url(&self) -> String {
        format!("{}{}", self.webhook_base_url.trim_end_matches('/'), self.webhook_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl TrackerConfig {
    pub fn terminal_grace_delay(&self) -> Duration {
        Duration::from_millis(self.terminal_grace_delay_ms)
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            target_agent_utilization: 0.85,
            max_calls_per_agent: 3,
            min_available_agents: 1,
            pacing_update_interval_ms: 5000,
            max_abandonment_rate: 0.1,
            dial_timeout_secs: 30,
            answer_detection_timeout_secs: 5,
            default_average_talk_time: 180.0, // 3 minutes
            default_average_wrap_time: 30.0,
            default_answer_rate: 0.3,
            min_talk_time_samples: 5,
        }
    }
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.telnyx.com".to_string(),
            api_key: String::new(),
            connection_profile_id: String::new(),
            caller_id: String::new(),
            webhook_base_url: "http://127.0.0.1:8090".to_string(),
            webhook_path: "/api/telemarketing/call-events".to_string(),
            request_timeout_ms: 10_000,
            answering_machine_detection: true,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            terminal_grace_delay_ms: 5000,
            abandonment_increment: 0.01,
            outcome_window_size: 100,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8090)),
        }
    }
}
