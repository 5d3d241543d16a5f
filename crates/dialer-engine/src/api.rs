//! HTTP surface: provider webhooks plus read-only campaign inspection

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::debug;

use crate::orchestrator::PredictiveDialer;
use crate::telephony::CallEvent;
use crate::types::CampaignId;

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<PredictiveDialer>,
}

/// Build the router; the webhook is mounted at `webhook_path`
pub fn create_router(engine: Arc<PredictiveDialer>, webhook_path: &str) -> Router {
    Router::new()
        .route(webhook_path, post(call_event))
        .route("/campaigns/:campaign_id/metrics", get(campaign_metrics))
        .route("/campaigns/:campaign_id/calls", get(campaign_calls))
        .with_state(ApiState { engine })
}

async fn call_event(State(state): State<ApiState>, Json(event): Json<CallEvent>) -> Response {
    debug!("📨 Webhook {} for {}", event.event_type, event.data.call_control_id);
    let disposition = state.engine.handle_call_event(&event).await;
    (StatusCode::OK, Json(disposition)).into_response()
}

async fn campaign_metrics(State(state): State<ApiState>, Path(campaign_id): Path<String>) -> Response {
    let campaign_id = CampaignId::from(campaign_id);
    if !state.engine.is_running(&campaign_id) {
        return not_running(&campaign_id);
    }

    Json(json!({
        "campaign_id": campaign_id,
        "metrics": state.engine.metrics(&campaign_id),
    }))
    .into_response()
}

async fn campaign_calls(State(state): State<ApiState>, Path(campaign_id): Path<String>) -> Response {
    let campaign_id = CampaignId::from(campaign_id);
    match state.engine.active_calls(&campaign_id) {
        Some(calls) => Json(json!({
            "campaign_id": campaign_id,
            "calls": calls,
        }))
        .into_response(),
        None => not_running(&campaign_id),
    }
}

fn not_running(campaign_id: &CampaignId) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("Campaign {} is not running", campaign_id) })),
    )
        .into_response()
}
