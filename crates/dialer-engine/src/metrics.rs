//! Campaign call statistics and the per-cycle metrics snapshot
//!
//! [`CallStatistics`] accumulates what the engine observes from webhooks
//! (answer outcomes, talk times, abandonments). [`MetricsSnapshotBuilder`]
//! combines those observations with the live agent roster into the
//! [`DialingMetrics`] the pacing calculator consumes.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::agents::{AgentDirectory, AgentStatus};
use crate::campaign::CampaignState;
use crate::config::PacingConfig;
use crate::error::Result;
use crate::pacing::DialingMetrics;

/// Outcome of a call that reached the answer/no-answer decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Answered,
    NoAnswer,
    Busy,
}

/// Rolling statistics for one campaign run
#[derive(Debug, Clone)]
pub struct CallStatistics {
    outcomes: VecDeque<AnswerOutcome>,
    window_size: usize,
    total_talk_time: f64,
    completed_calls: usize,
    abandonment_rate: f64,
}

impl CallStatistics {
    pub fn new(window_size: usize) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(window_size),
            window_size: window_size.max(1),
            total_talk_time: 0.0,
            completed_calls: 0,
            abandonment_rate: 0.0,
        }
    }

    pub fn record_outcome(&mut self, outcome: AnswerOutcome) {
        if self.outcomes.len() == self.window_size {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(outcome);
    }

    /// Record the talk time of a completed call, in seconds
    pub fn record_talk_time(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds >= 0.0 {
            self.total_talk_time += seconds;
            self.completed_calls += 1;
        }
    }

    /// Bump the abandonment estimate, returning the new value
    pub fn record_abandonment(&mut self, increment: f64) -> f64 {
        self.abandonment_rate = (self.abandonment_rate + increment).min(1.0);
        self.abandonment_rate
    }

    pub fn abandonment_rate(&self) -> f64 {
        self.abandonment_rate
    }

    /// Answered fraction of recent outcomes; `None` until one is observed
    pub fn answer_rate(&self) -> Option<f64> {
        if self.outcomes.is_empty() {
            return None;
        }
        let answered = self
            .outcomes
            .iter()
            .filter(|o| **o == AnswerOutcome::Answered)
            .count();
        Some(answered as f64 / self.outcomes.len() as f64)
    }

    /// Mean talk time once at least `min_samples` calls have completed
    pub fn average_talk_time(&self, min_samples: usize) -> Option<f64> {
        if self.completed_calls == 0 || self.completed_calls < min_samples {
            return None;
        }
        Some(self.total_talk_time / self.completed_calls as f64)
    }

    pub fn completed_calls(&self) -> usize {
        self.completed_calls
    }
}

/// Builds [`DialingMetrics`] for a campaign from the roster and its statistics
pub struct MetricsSnapshotBuilder {
    agents: Arc<dyn AgentDirectory>,
    config: PacingConfig,
}

impl MetricsSnapshotBuilder {
    pub fn new(agents: Arc<dyn AgentDirectory>, config: PacingConfig) -> Self {
        Self { agents, config }
    }

    /// Take a snapshot for one pacing cycle
    ///
    /// A roster failure aborts the snapshot. Missing historical agent metrics
    /// only degrade the talk-time estimate.
    pub async fn build_snapshot(&self, campaign: &CampaignState) -> Result<DialingMetrics> {
        let roster = self.agents.list_agents(&campaign.tenant_id).await?;

        let total_agents = roster.len() as u32;
        let available_agents = roster
            .iter()
            .filter(|a| a.status == AgentStatus::Available)
            .count() as u32;
        let busy_agents = roster
            .iter()
            .filter(|a| a.status == AgentStatus::Busy)
            .count() as u32;

        let agent_utilization = if total_agents > 0 {
            busy_agents as f64 / total_agents as f64
        } else {
            0.0
        };

        let (observed_talk_time, observed_answer_rate, abandonment_rate) = {
            let stats = campaign.stats.lock();
            (
                stats.average_talk_time(self.config.min_talk_time_samples),
                stats.answer_rate(),
                stats.abandonment_rate(),
            )
        };

        let average_talk_time = match observed_talk_time {
            Some(talk_time) => talk_time,
            None => self.historical_talk_time(&campaign.tenant_id).await,
        };

        Ok(DialingMetrics {
            available_agents,
            busy_agents,
            total_agents,
            average_talk_time,
            average_wrap_time: self.config.default_average_wrap_time,
            answer_rate: observed_answer_rate.unwrap_or(self.config.default_answer_rate),
            abandonment_rate,
            agent_utilization,
            calls_in_progress: campaign.registry.len(),
            calls_waiting: campaign.registry.count_waiting(),
        })
    }

    async fn historical_talk_time(&self, tenant_id: &str) -> f64 {
        match self.agents.agent_metrics(tenant_id).await {
            Ok(metrics) => {
                let durations: Vec<f64> = metrics
                    .iter()
                    .map(|m| m.average_call_duration)
                    .filter(|d| d.is_finite() && *d > 0.0)
                    .collect();
                if durations.is_empty() {
                    self.config.default_average_talk_time
                } else {
                    durations.iter().sum::<f64>() / durations.len() as f64
                }
            }
            Err(e) => {
                warn!("⚠️ Agent metrics unavailable, using default talk time: {}", e);
                self.config.default_average_talk_time
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentInfo, AgentMetrics, InMemoryAgentDirectory};
    use crate::types::{CallId, Contact, DialResult, DialStatus};

    #[test]
    fn test_answer_rate_window_drops_oldest() {
        let mut stats = CallStatistics::new(4);
        assert_eq!(stats.answer_rate(), None);

        for _ in 0..4 {
            stats.record_outcome(AnswerOutcome::NoAnswer);
        }
        assert_eq!(stats.answer_rate(), Some(0.0));

        stats.record_outcome(AnswerOutcome::Answered);
        stats.record_outcome(AnswerOutcome::Answered);
        assert_eq!(stats.answer_rate(), Some(0.5));
    }

    #[test]
    fn test_talk_time_needs_minimum_samples() {
        let mut stats = CallStatistics::new(10);
        stats.record_talk_time(100.0);
        stats.record_talk_time(200.0);
        assert_eq!(stats.average_talk_time(3), None);

        stats.record_talk_time(300.0);
        assert_eq!(stats.average_talk_time(3), Some(200.0));
        assert_eq!(stats.completed_calls(), 3);
    }

    #[test]
    fn test_abandonment_is_clamped() {
        let mut stats = CallStatistics::new(10);
        assert_eq!(stats.record_abandonment(0.6), 0.6);
        assert_eq!(stats.record_abandonment(0.6), 1.0);
    }

    #[tokio::test]
    async fn test_snapshot_combines_roster_and_statistics() {
        let directory = Arc::new(InMemoryAgentDirectory::with_agents(vec![
            AgentInfo::new("a1", AgentStatus::Available, "sip:a1@pbx"),
            AgentInfo::new("a2", AgentStatus::Available, "sip:a2@pbx"),
            AgentInfo::new("a3", AgentStatus::Busy, "sip:a3@pbx"),
            AgentInfo::new("a4", AgentStatus::PostCallWrapUp, "sip:a4@pbx"),
        ]));
        directory.set_metrics(vec![
            AgentMetrics { agent_id: "a1".into(), average_call_duration: 100.0 },
            AgentMetrics { agent_id: "a2".into(), average_call_duration: 200.0 },
        ]);

        let builder = MetricsSnapshotBuilder::new(directory, PacingConfig::default());
        let campaign = CampaignState::new("tenant", "campaign".into(), 100);

        let call = DialResult::initiated(CallId::generate(), &Contact::new("+15550001", "c1"), "cc_1");
        let call_id = call.call_id.clone();
        campaign.registry.insert(call);
        campaign
            .registry
            .update(&call_id, |c| c.transition(DialStatus::Answered))
            .unwrap()
            .unwrap();

        let metrics = builder.build_snapshot(&campaign).await.unwrap();
        assert_eq!(metrics.total_agents, 4);
        assert_eq!(metrics.available_agents, 2);
        assert_eq!(metrics.busy_agents, 1);
        assert_eq!(metrics.agent_utilization, 0.25);
        assert_eq!(metrics.average_talk_time, 150.0);
        assert_eq!(metrics.answer_rate, 0.3);
        assert_eq!(metrics.calls_in_progress, 1);
        assert_eq!(metrics.calls_waiting, 1);
    }

    #[tokio::test]
    async fn test_snapshot_prefers_observed_statistics() {
        let directory = Arc::new(InMemoryAgentDirectory::new());
        let config = PacingConfig {
            min_talk_time_samples: 1,
            ..Default::default()
        };
        let builder = MetricsSnapshotBuilder::new(directory, config);
        let campaign = CampaignState::new("tenant", "campaign".into(), 100);
        {
            let mut stats = campaign.stats.lock();
            stats.record_talk_time(60.0);
            stats.record_outcome(AnswerOutcome::Answered);
            stats.record_outcome(AnswerOutcome::Busy);
        }

        let metrics = builder.build_snapshot(&campaign).await.unwrap();
        assert_eq!(metrics.total_agents, 0);
        assert_eq!(metrics.agent_utilization, 0.0);
        assert_eq!(metrics.average_talk_time, 60.0);
        assert_eq!(metrics.answer_rate, 0.5);
    }
}
