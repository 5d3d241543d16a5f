//! Telnyx Call Control client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{PlacementRequest, TelephonyProvider, TransferRequest};
use crate::config::TelephonyConfig;
use crate::error::{DialerError, Result};

#[derive(Debug, Serialize)]
struct DialBody<'a> {
    to: &'a str,
    from: &'a str,
    connection_id: &'a str,
    webhook_url: &'a str,
    webhook_url_method: &'static str,
    client_state: String,
    timeout_secs: u64,
    answering_machine_detection: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    answering_machine_detection_config: Option<DetectionConfig>,
}

#[derive(Debug, Serialize)]
struct DetectionConfig {
    total_analysis_time_millis: u64,
}

#[derive(Debug, Serialize)]
struct TransferBody<'a> {
    to: &'a str,
}

#[derive(Debug, Deserialize)]
struct DialResponse {
    data: DialResponseData,
}

#[derive(Debug, Deserialize)]
struct DialResponseData {
    call_control_id: String,
}

/// [`TelephonyProvider`] backed by the Telnyx v2 REST API
#[derive(Debug, Clone)]
pub struct TelnyxClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl TelnyxClient {
    pub fn new(config: &TelephonyConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(DialerError::configuration("Telnyx API key is not configured"));
        }

        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| DialerError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DialerError::telephony(status.as_u16(), body));
        }

        Ok(response)
    }
}

#[async_trait]
impl TelephonyProvider for TelnyxClient {
    async fn place_call(&self, request: &PlacementRequest) -> Result<String> {
        let body = DialBody {
            to: &request.to,
            from: &request.from,
            connection_id: &request.connection_profile_id,
            webhook_url: &request.webhook_url,
            webhook_url_method: "POST",
            client_state: request.client_state.encode()?,
            timeout_secs: request.timeout_secs,
            answering_machine_detection: if request.answering_machine_detection {
                "detect"
            } else {
                "disabled"
            },
            answering_machine_detection_config: request.answering_machine_detection.then(|| DetectionConfig {
                total_analysis_time_millis: request.answer_detection_timeout_secs * 1000,
            }),
        };

        let response: DialResponse = self.post("/v2/calls", &body).await?.json().await?;
        debug!(
            "📤 Placed call {} to {} as {}",
            request.client_state.call_id, request.to, response.data.call_control_id
        );

        Ok(response.data.call_control_id)
    }

    async fn transfer_call(&self, request: &TransferRequest) -> Result<()> {
        let path = format!("/v2/calls/{}/actions/transfer", request.call_control_id);
        self.post(&path, &TransferBody { to: &request.transfer_target }).await?;
        debug!("🔀 Transferred {} to {}", request.call_control_id, request.transfer_target);
        Ok(())
    }
}
