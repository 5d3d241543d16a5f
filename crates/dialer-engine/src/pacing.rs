//! # Pacing Calculator
//!
//! Pure functions that turn one [`DialingMetrics`] snapshot into a dialing
//! decision. Nothing in here suspends or touches shared state: every cycle
//! re-derives pacing from scratch, so a transient spike in abandonment or
//! utilization corrects itself on the next snapshot.
//!
//! ```text
//! base_dial_rate        = (average_talk_time / available_agents) × answer_rate
//! dial_rate             = base_dial_rate × target_agent_utilization
//! estimated_connections = floor(available_agents × answer_rate)
//! calls_to_dial         = ceil(estimated_connections / answer_rate)
//!                         clamped to [0, max_calls_per_agent × available_agents]
//! ```
//!
//! The clamp keeps `calls_to_dial` bounded when the answer rate approaches
//! zero, and the utilization multiplier keeps agents from saturating instantly.

use serde::{Deserialize, Serialize};

use crate::config::PacingConfig;

/// Point-in-time view of agents and calls for one pacing cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialingMetrics {
    pub available_agents: u32,
    pub busy_agents: u32,
    pub total_agents: u32,

    /// Seconds
    pub average_talk_time: f64,
    /// Seconds
    pub average_wrap_time: f64,

    pub answer_rate: f64,
    pub abandonment_rate: f64,
    pub agent_utilization: f64,

    pub calls_in_progress: usize,
    pub calls_waiting: usize,
}

impl Default for DialingMetrics {
    fn default() -> Self {
        Self {
            available_agents: 0,
            busy_agents: 0,
            total_agents: 0,
            average_talk_time: 180.0,
            average_wrap_time: 30.0,
            answer_rate: 0.3,
            abandonment_rate: 0.0,
            agent_utilization: 0.0,
            calls_in_progress: 0,
            calls_waiting: 0,
        }
    }
}

/// Outcome of one pacing calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingCalculation {
    /// Calls per agent per minute
    pub dial_rate: f64,
    pub calls_to_dial: u32,
    pub target_utilization: f64,
    pub estimated_connections: u32,
    /// Seconds until the next agent is expected to free up
    pub estimated_wait_time: f64,
}

/// Compute how many calls to place this cycle
pub fn calculate_pacing(metrics: &DialingMetrics, config: &PacingConfig) -> PacingCalculation {
    if metrics.available_agents == 0 {
        return PacingCalculation {
            dial_rate: 0.0,
            calls_to_dial: 0,
            target_utilization: config.target_agent_utilization,
            estimated_connections: 0,
            estimated_wait_time: 0.0,
        };
    }

    let available = metrics.available_agents as f64;
    let answer_rate = if metrics.answer_rate.is_finite() {
        metrics.answer_rate.clamp(0.0, 1.0)
    } else {
        0.0
    };

    let base_dial_rate = (metrics.average_talk_time / available) * answer_rate;
    let dial_rate = (base_dial_rate * config.target_agent_utilization).max(0.0);

    let estimated_connections = (available * answer_rate).floor();

    let max_calls = config.max_calls_per_agent as u64 * metrics.available_agents as u64;
    let calls_to_dial = if estimated_connections <= 0.0 || answer_rate <= 0.0 {
        0
    } else {
        let raw = (estimated_connections / answer_rate).ceil();
        (raw as u64).min(max_calls)
    };

    let estimated_wait_time = if metrics.average_wrap_time > 0.0 {
        metrics.average_wrap_time
    } else {
        config.default_average_wrap_time
    };

    PacingCalculation {
        dial_rate: if dial_rate.is_finite() { dial_rate } else { 0.0 },
        calls_to_dial: calls_to_dial.min(u32::MAX as u64) as u32,
        target_utilization: config.target_agent_utilization,
        estimated_connections: estimated_connections as u32,
        estimated_wait_time,
    }
}

/// Hard admission gate evaluated every cycle
pub fn should_dial(metrics: &DialingMetrics, config: &PacingConfig) -> bool {
    if metrics.available_agents < config.min_available_agents {
        return false;
    }

    if metrics.abandonment_rate > config.max_abandonment_rate {
        return false;
    }

    if metrics.agent_utilization >= config.target_agent_utilization {
        return false;
    }

    if metrics.calls_waiting > metrics.available_agents as usize * 2 {
        return false;
    }

    true
}

/// Reason the gate refused to dial, for logging
pub fn gate_reason(metrics: &DialingMetrics, config: &PacingConfig) -> Option<&'static str> {
    if metrics.available_agents < config.min_available_agents {
        Some("not enough available agents")
    } else if metrics.abandonment_rate > config.max_abandonment_rate {
        Some("abandonment rate above maximum")
    } else if metrics.agent_utilization >= config.target_agent_utilization {
        Some("agent utilization at target")
    } else if metrics.calls_waiting > metrics.available_agents as usize * 2 {
        Some("too many answered calls waiting")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn metrics(available: u32, talk: f64, answer_rate: f64) -> DialingMetrics {
        DialingMetrics {
            available_agents: available,
            total_agents: available,
            average_talk_time: talk,
            answer_rate,
            ..Default::default()
        }
    }

    #[test]
    fn test_scenario_small_team_low_answer_rate_does_not_dial() {
        let config = PacingConfig::default();
        let pacing = calculate_pacing(&metrics(2, 180.0, 0.3), &config);

        // floor(2 × 0.3) = 0 connections expected, so nothing is dialed
        assert_eq!(pacing.estimated_connections, 0);
        assert_eq!(pacing.calls_to_dial, 0);
        assert!(pacing.dial_rate > 0.0);
        assert_eq!(pacing.target_utilization, 0.85);
    }

    #[test]
    fn test_scenario_five_agents() {
        let config = PacingConfig {
            max_calls_per_agent: 3,
            ..Default::default()
        };
        let pacing = calculate_pacing(&metrics(5, 200.0, 0.4), &config);

        assert!((pacing.dial_rate - 13.6).abs() < 1e-9);
        assert_eq!(pacing.estimated_connections, 2);
        assert_eq!(pacing.calls_to_dial, 5);
        assert_eq!(pacing.estimated_wait_time, 30.0);
    }

    #[test]
    fn test_no_available_agents_yields_zero() {
        let pacing = calculate_pacing(&metrics(0, 180.0, 0.9), &PacingConfig::default());
        assert_eq!(pacing.calls_to_dial, 0);
        assert_eq!(pacing.dial_rate, 0.0);
        assert_eq!(pacing.estimated_wait_time, 0.0);
    }

    #[test]
    fn test_higher_answer_rate_raises_dial_rate() {
        let config = PacingConfig::default();
        let high = calculate_pacing(&metrics(2, 180.0, 0.5), &config);
        let low = calculate_pacing(&metrics(2, 180.0, 0.1), &config);
        assert!(high.dial_rate > low.dial_rate);
    }

    #[test]
    fn test_zero_wrap_time_falls_back_to_default() {
        let mut m = metrics(4, 120.0, 0.5);
        m.average_wrap_time = 0.0;
        let pacing = calculate_pacing(&m, &PacingConfig::default());
        assert_eq!(pacing.estimated_wait_time, 30.0);
    }

    #[test]
    fn test_gate_allows_dialing_when_healthy() {
        let m = DialingMetrics {
            available_agents: 2,
            total_agents: 4,
            busy_agents: 2,
            abandonment_rate: 0.05,
            agent_utilization: 0.5,
            calls_waiting: 0,
            ..Default::default()
        };
        assert!(should_dial(&m, &PacingConfig::default()));
        assert_eq!(gate_reason(&m, &PacingConfig::default()), None);
    }

    #[test]
    fn test_gate_refusals() {
        let config = PacingConfig::default();
        let healthy = DialingMetrics {
            available_agents: 2,
            total_agents: 4,
            agent_utilization: 0.5,
            ..Default::default()
        };

        let no_agents = DialingMetrics { available_agents: 0, ..healthy.clone() };
        assert!(!should_dial(&no_agents, &config));

        let abandoning = DialingMetrics { abandonment_rate: 0.15, ..healthy.clone() };
        assert!(!should_dial(&abandoning, &config));

        let saturated = DialingMetrics { agent_utilization: 0.85, ..healthy.clone() };
        assert!(!should_dial(&saturated, &config));

        let backlog = DialingMetrics { calls_waiting: 5, ..healthy.clone() };
        assert!(!should_dial(&backlog, &config));
        assert_eq!(gate_reason(&backlog, &config), Some("too many answered calls waiting"));
    }

    fn arb_metrics() -> impl Strategy<Value = DialingMetrics> {
        (
            0u32..200,
            0u32..200,
            1.0f64..3600.0,
            0.0f64..=1.0,
            0.0f64..=1.0,
            0.0f64..=1.0,
            0usize..500,
        )
            .prop_map(|(available, busy, talk, answer, abandon, util, waiting)| DialingMetrics {
                available_agents: available,
                busy_agents: busy,
                total_agents: available + busy,
                average_talk_time: talk,
                average_wrap_time: 30.0,
                answer_rate: answer,
                abandonment_rate: abandon,
                agent_utilization: util,
                calls_in_progress: 0,
                calls_waiting: waiting,
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_calls_to_dial_never_exceeds_clamp(m in arb_metrics(), max_per_agent in 1u32..10) {
            let config = PacingConfig { max_calls_per_agent: max_per_agent, ..Default::default() };
            let pacing = calculate_pacing(&m, &config);
            prop_assert!(pacing.calls_to_dial as u64 <= max_per_agent as u64 * m.available_agents as u64);
            prop_assert!(pacing.dial_rate >= 0.0);
        }

        #[test]
        fn prop_tiny_answer_rate_stays_bounded(available in 1u32..200, rate in 0.0f64..1e-6) {
            let m = DialingMetrics { answer_rate: rate, ..metrics(available, 180.0, rate) };
            let pacing = calculate_pacing(&m, &PacingConfig::default());
            prop_assert!(pacing.calls_to_dial <= 3 * available);
        }

        #[test]
        fn prop_zero_available_agents_never_dials(m in arb_metrics()) {
            let m = DialingMetrics { available_agents: 0, ..m };
            let pacing = calculate_pacing(&m, &PacingConfig::default());
            prop_assert_eq!(pacing.calls_to_dial, 0);
            prop_assert_eq!(pacing.dial_rate, 0.0);
        }

        #[test]
        fn prop_gate_closed_above_max_abandonment(m in arb_metrics(), excess in 1e-6f64..0.9) {
            let config = PacingConfig::default();
            let m = DialingMetrics { abandonment_rate: config.max_abandonment_rate + excess, ..m };
            prop_assert!(!should_dial(&m, &config));
        }
    }
}
