//! # Dialer Server
//!
//! Wires a [`PredictiveDialer`] to its collaborators and serves the webhook
//! and inspection routes over HTTP.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              DialerServer               │
//! ├─────────────────────────────────────────┤
//! │  POST {webhook_path}  │  GET /campaigns │
//! ├─────────────────────────────────────────┤
//! │            PredictiveDialer             │
//! ├─────────────────────────────────────────┤
//! │ Telephony │ Agent directory │ Audit/Out │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rvoip_dialer_engine::prelude::*;
//!
//! # async fn example() -> rvoip_dialer_engine::Result<()> {
//! let mut config = DialerConfig::default();
//! config.telephony = TelephonyConfig::from_env()?;
//!
//! let mut server = DialerServerBuilder::new()
//!     .with_config(config)
//!     .with_agent_directory(Arc::new(InMemoryAgentDirectory::new()))
//!     .build()?;
//!
//! server.start().await?;
//! server
//!     .engine()
//!     .start("tenant-1", "spring-renewals", vec![Contact::new("+15551234567", "contact-1")])
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::agents::AgentDirectory;
use crate::api::create_router;
use crate::audit::{AuditSink, TracingAuditSink};
use crate::config::DialerConfig;
use crate::error::{DialerError, Result};
use crate::orchestrator::PredictiveDialer;
use crate::outcomes::{OutcomeSink, TracingOutcomeSink};
use crate::telephony::{TelephonyProvider, TelnyxClient};

/// HTTP front end plus the engine it drives
pub struct DialerServer {
    engine: Arc<PredictiveDialer>,

    config: DialerConfig,

    shutdown: CancellationToken,

    /// Handle to the HTTP serve task once started
    serve_handle: Option<JoinHandle<()>>,
}

impl DialerServer {
    pub fn new(engine: Arc<PredictiveDialer>) -> Self {
        let config = engine.config().clone();
        Self {
            engine,
            config,
            shutdown: CancellationToken::new(),
            serve_handle: None,
        }
    }

    /// Bind the listener and start serving; returns the bound address
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if self.serve_handle.is_some() {
            return Err(DialerError::internal("Dialer server already started"));
        }
        if self.shutdown.is_cancelled() || self.engine.is_shut_down() {
            return Err(DialerError::ShutDown);
        }

        let listener = TcpListener::bind(self.config.api.bind_address)
            .await
            .map_err(|e| {
                DialerError::configuration(format!("Failed to bind {}: {}", self.config.api.bind_address, e))
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| DialerError::internal(format!("Failed to read bound address: {}", e)))?;

        let app = create_router(self.engine.clone(), &self.config.telephony.webhook_path);
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = served {
                error!("🚨 Dialer HTTP server failed: {}", e);
            }
        });
        self.serve_handle = Some(handle);

        info!(
            "✅ Dialer listening on {} (webhook {})",
            local_addr, self.config.telephony.webhook_path
        );
        Ok(local_addr)
    }

    /// Stop all campaigns, then the HTTP listener; the server cannot be
    /// started again afterwards
    pub async fn stop(&mut self) -> Result<()> {
        info!("🛑 Stopping dialer server...");

        self.engine.shutdown().await;
        self.shutdown.cancel();

        if let Some(handle) = self.serve_handle.take() {
            handle
                .await
                .map_err(|e| DialerError::internal(format!("HTTP server task failed: {}", e)))?;
        }

        info!("✅ Dialer server stopped");
        Ok(())
    }

    /// Serve until Ctrl+C, then shut down gracefully
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| DialerError::internal(format!("Failed to listen for shutdown signal: {}", e)))?;

        self.stop().await
    }

    pub fn engine(&self) -> &Arc<PredictiveDialer> {
        &self.engine
    }

    pub fn config(&self) -> &DialerConfig {
        &self.config
    }
}

/// Builder for DialerServer with fluent API
///
/// Only the agent directory is mandatory. Telephony defaults to
/// [`TelnyxClient`] built from the telephony config, audit and outcome sinks
/// default to the tracing-backed implementations.
#[derive(Default)]
pub struct DialerServerBuilder {
    config: Option<DialerConfig>,
    telephony: Option<Arc<dyn TelephonyProvider>>,
    agents: Option<Arc<dyn AgentDirectory>>,
    audit: Option<Arc<dyn AuditSink>>,
    outcomes: Option<Arc<dyn OutcomeSink>>,
}

impl DialerServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: DialerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_telephony(mut self, telephony: Arc<dyn TelephonyProvider>) -> Self {
        self.telephony = Some(telephony);
        self
    }

    pub fn with_agent_directory(mut self, agents: Arc<dyn AgentDirectory>) -> Self {
        self.agents = Some(agents);
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_outcome_sink(mut self, outcomes: Arc<dyn OutcomeSink>) -> Self {
        self.outcomes = Some(outcomes);
        self
    }

    pub fn build(self) -> Result<DialerServer> {
        let config = self.config.unwrap_or_default();
        let agents = self
            .agents
            .ok_or_else(|| DialerError::configuration("Agent directory not provided"))?;

        let telephony: Arc<dyn TelephonyProvider> = match self.telephony {
            Some(telephony) => telephony,
            None => Arc::new(TelnyxClient::new(&config.telephony)?),
        };
        let audit = self.audit.unwrap_or_else(|| Arc::new(TracingAuditSink));
        let outcomes = self.outcomes.unwrap_or_else(|| Arc::new(TracingOutcomeSink));

        let engine = PredictiveDialer::new(config, telephony, agents, audit, outcomes)?;
        Ok(DialerServer::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::InMemoryAgentDirectory;
    use serde_json::json;

    fn local_config() -> DialerConfig {
        let mut config = DialerConfig::default();
        config.api.bind_address = SocketAddr::from(([127, 0, 0, 1], 0));
        config.telephony.api_key = "KEY_test".into();
        config
    }

    #[test]
    fn test_builder_requires_agent_directory() {
        let result = DialerServerBuilder::new().with_config(local_config()).build();
        assert!(matches!(result, Err(DialerError::Configuration(_))));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = local_config();
        config.pacing.max_calls_per_agent = 0;

        let result = DialerServerBuilder::new()
            .with_config(config)
            .with_agent_directory(Arc::new(InMemoryAgentDirectory::new()))
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_serves_webhook_over_http() {
        let mut server = DialerServerBuilder::new()
            .with_config(local_config())
            .with_agent_directory(Arc::new(InMemoryAgentDirectory::new()))
            .build()
            .unwrap();

        let addr = server.start().await.unwrap();
        assert!(server.start().await.is_err());

        let response = reqwest::Client::new()
            .post(format!("http://{}{}", addr, server.config().telephony.webhook_path))
            .json(&json!({ "event_type": "call.hangup", "data": { "call_control_id": "unknown" } }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["disposition"], "unknown_call");

        server.stop().await.unwrap();
        assert!(matches!(server.start().await, Err(DialerError::ShutDown)));
        assert!(matches!(
            server.engine().start("tenant", "late", Vec::new()).await,
            Err(DialerError::ShutDown)
        ));
    }
}
