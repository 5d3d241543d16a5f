//! # Call Lifecycle Tracker
//!
//! Applies provider webhooks to the live call registries. Each campaign run
//! owns its own registry; the tracker keeps a call control id index pointing
//! at the owning [`CampaignState`] so a webhook finds its call without
//! knowing the campaign.
//!
//! | event                    | from        | to          | follow-up              |
//! |--------------------------|-------------|-------------|------------------------|
//! | `call.answered`          | initiated   | answered    | agent router           |
//! | `call.hangup`            | initiated   | no_answer   | evict after grace      |
//! | `call.hangup`            | answered    | completed   | talk time, evict later |
//! | `call.machine.detection` | initiated   | voicemail   | evict after grace      |
//! | `call.busy`              | initiated   | busy        | evict immediately      |
//!
//! Events that do not match an edge are ignored, which makes duplicate and
//! late webhooks harmless. Every terminal call is reported to the
//! [`OutcomeSink`] exactly once.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::campaign::CampaignState;
use crate::config::TrackerConfig;
use crate::metrics::AnswerOutcome;
use crate::outcomes::{CallOutcome, OutcomeSink};
use crate::routing::{AgentRouter, RoutingDecision};
use crate::tasks::BackgroundTasks;
use crate::telephony::{CallEvent, CallEventKind};
use crate::types::{CallId, DialResult, DialStatus};

/// What a webhook did to the engine's state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum EventDisposition {
    Applied {
        call_id: CallId,
        from: DialStatus,
        to: DialStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        routing: Option<RoutingDecision>,
    },

    /// The call exists but the event is not a valid edge from its status
    Ignored { call_id: CallId, status: DialStatus },

    /// Event type the tracker does not act on
    Unsupported { event_type: String },

    /// No live call carries this call control id
    UnknownCall,
}

type ControlIdIndex = DashMap<String, Arc<CampaignState>>;

pub struct CallLifecycleTracker {
    config: TrackerConfig,
    index: Arc<ControlIdIndex>,
    router: Arc<AgentRouter>,
    outcomes: Arc<dyn OutcomeSink>,
    tasks: BackgroundTasks,
}

impl CallLifecycleTracker {
    pub fn new(config: TrackerConfig, router: Arc<AgentRouter>, outcomes: Arc<dyn OutcomeSink>) -> Self {
        Self {
            config,
            index: Arc::new(DashMap::new()),
            router,
            outcomes,
            tasks: BackgroundTasks::new(),
        }
    }

    /// Start tracking a placement result
    pub fn register(&self, campaign: &Arc<CampaignState>, result: DialResult) {
        if let Some(control_id) = &result.call_control_id {
            self.index.insert(control_id.clone(), campaign.clone());
        }

        let terminal = result.status.is_terminal().then(|| result.clone());
        campaign.registry.insert(result);

        if let Some(result) = terminal {
            self.finalize(campaign, result);
        }
    }

    /// Number of call control ids still routable to a campaign
    pub fn tracked_calls(&self) -> usize {
        self.index.len()
    }

    /// Apply one provider webhook
    pub async fn handle_event(&self, event: &CallEvent) -> EventDisposition {
        let kind = event.kind();
        if let CallEventKind::Other(event_type) = &kind {
            debug!("Ignoring unsupported call event {}", event_type);
            return EventDisposition::Unsupported {
                event_type: event_type.clone(),
            };
        }

        let control_id = &event.data.call_control_id;
        let campaign = self.index.get(control_id).map(|entry| entry.value().clone());
        let Some((campaign, call_id)) = campaign
            .and_then(|campaign| campaign.registry.call_id_for(control_id).map(|id| (campaign, id)))
        else {
            let claimed = event.client_state().map(|state| state.call_id).unwrap_or_default();
            warn!(
                "⚠️ Dropping {} for unknown call control id {} {}",
                event.event_type, control_id, claimed
            );
            return EventDisposition::UnknownCall;
        };

        match kind {
            CallEventKind::Answered => self.on_answered(&campaign, call_id).await,
            CallEventKind::Hangup => self.on_hangup(&campaign, call_id),
            CallEventKind::MachineDetection => self.on_machine_detection(&campaign, call_id),
            CallEventKind::Busy => self.on_busy(&campaign, call_id),
            CallEventKind::Other(_) => EventDisposition::Unsupported {
                event_type: event.event_type.clone(),
            },
        }
    }

    async fn on_answered(&self, campaign: &Arc<CampaignState>, call_id: CallId) -> EventDisposition {
        let (from, _) = match self.apply(campaign, &call_id, |_| DialStatus::Answered) {
            Ok(applied) => applied,
            Err(disposition) => return disposition,
        };

        campaign.stats.lock().record_outcome(AnswerOutcome::Answered);
        info!("📞 Call {} answered", call_id);

        let routing = self.router.route_answered_call(campaign, &call_id).await;
        if routing == RoutingDecision::Abandoned {
            if let Some(result) = campaign.registry.get(&call_id) {
                self.finalize(campaign, result);
            }
        }

        EventDisposition::Applied {
            call_id,
            from,
            to: DialStatus::Answered,
            routing: Some(routing),
        }
    }

    fn on_hangup(&self, campaign: &Arc<CampaignState>, call_id: CallId) -> EventDisposition {
        let next = |from: DialStatus| match from {
            DialStatus::Initiated => DialStatus::NoAnswer,
            _ => DialStatus::Completed,
        };

        let (from, result) = match self.apply(campaign, &call_id, next) {
            Ok(applied) => applied,
            Err(disposition) => return disposition,
        };

        match result.status {
            DialStatus::NoAnswer => {
                campaign.stats.lock().record_outcome(AnswerOutcome::NoAnswer);
            }
            DialStatus::Completed => {
                if let Some(duration) = result.duration {
                    campaign.stats.lock().record_talk_time(duration);
                }
            }
            _ => {}
        }

        debug!("Call {} hung up as {}", call_id, result.status);
        let to = result.status;
        self.finalize(campaign, result);

        EventDisposition::Applied {
            call_id,
            from,
            to,
            routing: None,
        }
    }

    fn on_machine_detection(&self, campaign: &Arc<CampaignState>, call_id: CallId) -> EventDisposition {
        let (from, result) = match self.apply(campaign, &call_id, |_| DialStatus::Voicemail) {
            Ok(applied) => applied,
            Err(disposition) => return disposition,
        };

        debug!("🤖 Call {} reached voicemail", call_id);
        self.finalize(campaign, result);

        EventDisposition::Applied {
            call_id,
            from,
            to: DialStatus::Voicemail,
            routing: None,
        }
    }

    fn on_busy(&self, campaign: &Arc<CampaignState>, call_id: CallId) -> EventDisposition {
        let (from, result) = match self.apply(campaign, &call_id, |_| DialStatus::Busy) {
            Ok(applied) => applied,
            Err(disposition) => return disposition,
        };

        campaign.stats.lock().record_outcome(AnswerOutcome::Busy);
        debug!("Call {} busy", call_id);

        self.report(campaign, result);
        evict(&self.index, campaign, &call_id);

        EventDisposition::Applied {
            call_id,
            from,
            to: DialStatus::Busy,
            routing: None,
        }
    }

    /// Transition a call in place; the closure picks the target from the
    /// current status
    fn apply(
        &self,
        campaign: &CampaignState,
        call_id: &CallId,
        next: impl FnOnce(DialStatus) -> DialStatus,
    ) -> std::result::Result<(DialStatus, DialResult), EventDisposition> {
        let applied = campaign.registry.update(call_id, |call| {
            let from = call.status;
            match call.transition(next(from)) {
                Ok(()) => Ok((from, call.clone())),
                Err(_) => Err(from),
            }
        });

        match applied {
            Some(Ok(applied)) => Ok(applied),
            Some(Err(status)) => {
                debug!("Ignoring event for call {} already {}", call_id, status);
                Err(EventDisposition::Ignored {
                    call_id: call_id.clone(),
                    status,
                })
            }
            None => Err(EventDisposition::UnknownCall),
        }
    }

    /// Report a terminal call and evict it once the grace delay has passed
    fn finalize(&self, campaign: &Arc<CampaignState>, result: DialResult) {
        let call_id = result.call_id.clone();
        self.report(campaign, result);

        let delay = self.config.terminal_grace_delay();
        let index = self.index.clone();
        let campaign = campaign.clone();
        self.tasks.spawn(format!("evict {}", call_id), async move {
            tokio::time::sleep(delay).await;
            evict(&index, &campaign, &call_id);
            Ok(())
        });
    }

    fn report(&self, campaign: &CampaignState, result: DialResult) {
        let outcome = CallOutcome::from_result(&campaign.tenant_id, &campaign.campaign_id, &result);
        let outcomes = self.outcomes.clone();
        self.tasks.spawn(format!("report {}", result.call_id), async move {
            outcomes.record_outcome(outcome).await
        });
    }

    /// Cancel pending reports and evictions
    pub fn shutdown(&self) {
        self.tasks.cancel_all();
    }
}

fn evict(index: &ControlIdIndex, campaign: &Arc<CampaignState>, call_id: &CallId) {
    if let Some(result) = campaign.registry.remove(call_id) {
        if let Some(control_id) = result.call_control_id {
            index.remove_if(&control_id, |_, owner| Arc::ptr_eq(owner, campaign));
        }
        debug!("🧹 Evicted call {} from campaign {}", call_id, campaign.campaign_id);
    }
}
