//! Core types shared by the pacing loop, the placement executor and the
//! call lifecycle tracker.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DialerError, Result};

/// Campaign identifier type for strongly-typed campaign references
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CampaignId(pub String);

impl From<String> for CampaignId {
    fn from(s: String) -> Self {
        CampaignId(s)
    }
}

impl From<&str> for CampaignId {
    fn from(s: &str) -> Self {
        CampaignId(s.to_string())
    }
}

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CampaignId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Internally generated identifier of one outbound attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    /// Generate a fresh, unique call identifier
    pub fn generate() -> Self {
        CallId(format!("call_{}", Uuid::new_v4().simple()))
    }
}

impl From<&str> for CallId {
    fn from(s: &str) -> Self {
        CallId(s.to_string())
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CallId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A dialable contact handed to the engine by the campaign collaborator
///
/// Contacts are expected to be compliance-filtered before they reach
/// [`PredictiveDialer::start`](crate::orchestrator::PredictiveDialer::start).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// E.164 phone number to dial
    pub phone_number: String,

    /// Campaign-side contact identifier, echoed back in client state
    pub contact_id: String,

    /// Free-form campaign metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Contact {
    pub fn new(phone_number: impl Into<String>, contact_id: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            contact_id: contact_id.into(),
            metadata: HashMap::new(),
        }
    }
}

/// Status of an outbound call attempt
///
/// ```text
/// initiated ──┬─> answered ──┬─> completed
///             │              └─> abandoned
///             ├─> no_answer
///             ├─> busy
///             ├─> voicemail
///             └─> failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialStatus {
    Initiated,
    Answered,
    NoAnswer,
    Busy,
    Voicemail,
    Failed,
    Completed,
    Abandoned,
}

impl DialStatus {
    /// Terminal statuses receive no further pacing-relevant transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DialStatus::Initiated | DialStatus::Answered)
    }

    /// Check whether `next` is a single edge away from `self`
    pub fn can_transition_to(&self, next: DialStatus) -> bool {
        use DialStatus::*;

        match (self, next) {
            (Initiated, Answered) => true,
            (Initiated, NoAnswer) => true,
            (Initiated, Busy) => true,
            (Initiated, Voicemail) => true,
            (Initiated, Failed) => true,

            (Answered, Completed) => true,
            (Answered, Abandoned) => true,

            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DialStatus::Initiated => "initiated",
            DialStatus::Answered => "answered",
            DialStatus::NoAnswer => "no_answer",
            DialStatus::Busy => "busy",
            DialStatus::Voicemail => "voicemail",
            DialStatus::Failed => "failed",
            DialStatus::Completed => "completed",
            DialStatus::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for DialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DialStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(DialStatus::Initiated),
            "answered" => Ok(DialStatus::Answered),
            "no_answer" => Ok(DialStatus::NoAnswer),
            "busy" => Ok(DialStatus::Busy),
            "voicemail" => Ok(DialStatus::Voicemail),
            "failed" => Ok(DialStatus::Failed),
            "completed" => Ok(DialStatus::Completed),
            "abandoned" => Ok(DialStatus::Abandoned),
            _ => Err(format!("Unknown dial status: {}", s)),
        }
    }
}

/// One outbound attempt and everything the engine knows about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialResult {
    pub call_id: CallId,

    /// Provider handle, present only when placement succeeded
    pub call_control_id: Option<String>,

    pub phone_number: String,

    pub contact_id: String,

    pub status: DialStatus,

    /// Agent the call was transferred to
    pub connected_to_agent: Option<String>,

    pub initiated_at: DateTime<Utc>,

    pub answered_at: Option<DateTime<Utc>>,

    /// Talk time in seconds, set when an answered call completes
    pub duration: Option<f64>,

    pub error: Option<String>,
}

impl DialResult {
    /// A successfully placed call awaiting provider events
    pub fn initiated(call_id: CallId, contact: &Contact, call_control_id: impl Into<String>) -> Self {
        Self {
            call_id,
            call_control_id: Some(call_control_id.into()),
            phone_number: contact.phone_number.clone(),
            contact_id: contact.contact_id.clone(),
            status: DialStatus::Initiated,
            connected_to_agent: None,
            initiated_at: Utc::now(),
            answered_at: None,
            duration: None,
            error: None,
        }
    }

    /// A placement the provider rejected or never received
    pub fn failed(call_id: CallId, contact: &Contact, error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error = "Unknown placement error".to_string();
        }

        Self {
            call_id,
            call_control_id: None,
            phone_number: contact.phone_number.clone(),
            contact_id: contact.contact_id.clone(),
            status: DialStatus::Failed,
            connected_to_agent: None,
            initiated_at: Utc::now(),
            answered_at: None,
            duration: None,
            error: Some(error),
        }
    }

    pub fn transition(&mut self, next: DialStatus) -> Result<()> {
        self.transition_at(next, Utc::now())
    }

    /// Move along one edge of the state machine, stamping `answered_at` and
    /// `duration` as the edge requires
    pub fn transition_at(&mut self, next: DialStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(DialerError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        match next {
            DialStatus::Answered => {
                self.answered_at = Some(now);
            }
            DialStatus::Completed => {
                if let Some(answered_at) = self.answered_at {
                    let elapsed = (now - answered_at).num_milliseconds().max(0);
                    self.duration = Some(elapsed as f64 / 1000.0);
                }
            }
            _ => {}
        }

        self.status = next;
        Ok(())
    }

    /// Record the agent a call was handed to; a call is routed at most once
    pub fn assign_agent(&mut self, agent_id: impl Into<String>) -> Result<()> {
        let agent_id = agent_id.into();

        if let Some(existing) = &self.connected_to_agent {
            return Err(DialerError::internal(format!(
                "Call {} already routed to agent {}",
                self.call_id, existing
            )));
        }

        if self.status != DialStatus::Answered || self.answered_at.is_none() {
            return Err(DialerError::internal(format!(
                "Call {} is {} and cannot be routed to agent {}",
                self.call_id, self.status, agent_id
            )));
        }

        self.connected_to_agent = Some(agent_id);
        Ok(())
    }

    /// Answered but not yet handed to an agent
    pub fn is_waiting_for_agent(&self) -> bool {
        self.status == DialStatus::Answered && self.connected_to_agent.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const ALL: [DialStatus; 8] = [
        DialStatus::Initiated,
        DialStatus::Answered,
        DialStatus::NoAnswer,
        DialStatus::Busy,
        DialStatus::Voicemail,
        DialStatus::Failed,
        DialStatus::Completed,
        DialStatus::Abandoned,
    ];

    fn contact() -> Contact {
        Contact::new("+15551234567", "contact_123")
    }

    #[test]
    fn test_initiated_reaches_only_first_hop_statuses() {
        let reachable: Vec<DialStatus> = ALL
            .iter()
            .copied()
            .filter(|s| DialStatus::Initiated.can_transition_to(*s))
            .collect();

        assert_eq!(
            reachable,
            vec![
                DialStatus::Answered,
                DialStatus::NoAnswer,
                DialStatus::Busy,
                DialStatus::Voicemail,
                DialStatus::Failed,
            ]
        );
    }

    #[test]
    fn test_answered_reaches_only_completed_or_abandoned() {
        let reachable: Vec<DialStatus> = ALL
            .iter()
            .copied()
            .filter(|s| DialStatus::Answered.can_transition_to(*s))
            .collect();

        assert_eq!(reachable, vec![DialStatus::Completed, DialStatus::Abandoned]);
    }

    #[test]
    fn test_terminal_statuses_have_no_outgoing_edges() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{} -> {} should be rejected", from, to);
            }
        }
    }

    #[test]
    fn test_answer_then_complete_sets_duration() {
        let mut call = DialResult::initiated(CallId::generate(), &contact(), "cc_123");
        let answered = Utc::now();

        call.transition_at(DialStatus::Answered, answered).unwrap();
        assert_eq!(call.answered_at, Some(answered));
        assert!(call.duration.is_none());

        call.transition_at(DialStatus::Completed, answered + Duration::seconds(42)).unwrap();
        assert_eq!(call.status, DialStatus::Completed);
        assert_eq!(call.duration, Some(42.0));
    }

    #[test]
    fn test_hangup_before_answer_has_no_duration() {
        let mut call = DialResult::initiated(CallId::generate(), &contact(), "cc_123");
        call.transition(DialStatus::NoAnswer).unwrap();

        assert!(call.duration.is_none());
        assert!(call.answered_at.is_none());
        assert!(call.transition(DialStatus::Answered).is_err());
        assert_eq!(call.status, DialStatus::NoAnswer);
    }

    #[test]
    fn test_failed_placement_always_has_error() {
        let call = DialResult::failed(CallId::generate(), &contact(), "");
        assert_eq!(call.status, DialStatus::Failed);
        assert!(call.call_control_id.is_none());
        assert!(!call.error.unwrap().is_empty());
    }

    #[test]
    fn test_agent_assigned_at_most_once() {
        let mut call = DialResult::initiated(CallId::generate(), &contact(), "cc_123");
        assert!(call.assign_agent("agent_1").is_err());

        call.transition(DialStatus::Answered).unwrap();
        assert!(call.is_waiting_for_agent());
        call.assign_agent("agent_1").unwrap();
        assert!(!call.is_waiting_for_agent());
        assert!(call.assign_agent("agent_2").is_err());
        assert_eq!(call.connected_to_agent.as_deref(), Some("agent_1"));
    }

    #[test]
    fn test_agent_not_assigned_after_hangup() {
        let mut call = DialResult::initiated(CallId::generate(), &contact(), "cc_123");
        call.transition(DialStatus::Answered).unwrap();
        call.transition(DialStatus::Completed).unwrap();

        assert!(call.assign_agent("agent_1").is_err());
        assert!(call.connected_to_agent.is_none());
    }

    #[test]
    fn test_generated_call_ids_are_unique() {
        assert_ne!(CallId::generate(), CallId::generate());
    }
}
