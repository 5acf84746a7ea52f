//! Gateway HTTP server (single port).

use crate::channels::{verify_subscription, WhatsAppClient, WhatsAppSettings};
use crate::config::{self, Config};
use crate::dedupe::DedupeCache;
use crate::handler::WebhookHandler;
use crate::llm::{GeminiClient, GeminiSettings};
use anyhow::{Context, Result};
use axum::{
    body::{self, Body},
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Shared state for the gateway (config, verify secret, webhook handler).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    /// Secret expected in `hub.verify_token`. None rejects every handshake.
    pub verify_token: Option<String>,
    pub handler: Arc<WebhookHandler>,
}

impl GatewayState {
    pub fn new(config: Config, verify_token: Option<String>, handler: WebhookHandler) -> Self {
        Self {
            config: Arc::new(config),
            verify_token,
            handler: Arc::new(handler),
        }
    }

    /// Build the production state: Gemini inference, WhatsApp delivery, in-memory dedupe.
    /// Missing credentials are logged here and fail the gateway call that needs them.
    pub fn from_config(config: Config) -> Result<Self> {
        let http = http_client(&config)?;

        let gemini = GeminiSettings::from_config(&config);
        if gemini.api_key.is_none() {
            log::warn!("GEMINI_API_KEY is not set; replies will fail until it is configured");
        }
        let whatsapp = WhatsAppSettings::from_config(&config);
        if whatsapp.phone_number_id.is_none() || whatsapp.access_token.is_none() {
            log::warn!("WA_PHONE_NUMBER_ID or WA_ACCESS_TOKEN is not set; replies cannot be delivered");
        }
        let verify_token = config::resolve_verify_token(&config);
        if verify_token.is_none() {
            log::warn!("VERIFY_TOKEN is not set; webhook verification will be rejected");
        }
        log::info!("gemini model: {}", gemini.model);

        let dedupe = DedupeCache::with_capacity(
            Duration::from_secs(config.dedupe.window_secs),
            config.dedupe.max_entries,
        );
        let handler = WebhookHandler::new(
            Arc::new(dedupe),
            Arc::new(GeminiClient::new(gemini, http.clone())),
            Arc::new(WhatsAppClient::new(whatsapp, http)),
            config.whatsapp.unsupported_notice.clone(),
        );
        Ok(Self::new(config, verify_token, handler))
    }
}

/// Shared outbound HTTP client; the request timeout is the only limit on gateway calls.
pub fn http_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.gateway.request_timeout_secs))
        .build()
        .context("building http client")
}

/// Routes: health checks and the webhook (GET handshake, POST deliveries).
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(root_http))
        .route("/health", get(health_http))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .with_state(state)
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Blocks until shutdown (e.g. Ctrl+C); in-flight webhook requests finish first.
pub async fn run_gateway(config: Config) -> Result<()> {
    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let state = GatewayState::from_config(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining in-flight requests");
}

/// GET / — plain liveness check.
async fn root_http() -> &'static str {
    "OK"
}

/// GET /health — JSON liveness check.
async fn health_http() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

/// Handshake query. Meta sends the `hub.`-prefixed names; the bare names are accepted too.
#[derive(Debug, Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode", alias = "mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token", alias = "verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge", alias = "challenge")]
    challenge: Option<String>,
}

/// GET /webhook — subscription handshake: echo the challenge or 403.
async fn verify_webhook(
    State(state): State<GatewayState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    match verify_subscription(
        params.mode.as_deref(),
        params.verify_token.as_deref(),
        params.challenge.as_deref(),
        state.verify_token.as_deref(),
    ) {
        Some(challenge) => {
            log::info!("webhook: verification succeeded");
            (StatusCode::OK, challenge.to_string()).into_response()
        }
        None => {
            log::warn!("webhook: verification rejected (mode {:?})", params.mode);
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// POST /webhook — handle the delivery, then acknowledge with 200 whatever happened.
/// Bodies over `gateway.maxBodyBytes` (or that fail to read) are dropped, still with 200.
async fn receive_webhook(State(state): State<GatewayState>, body: Body) -> StatusCode {
    let limit = state.config.gateway.max_body_bytes;
    let body = match body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("webhook: delivery body dropped (limit {} bytes): {}", limit, e);
            return StatusCode::OK;
        }
    };
    let report = state.handler.handle_body(&body).await;
    if report.is_empty() {
        log::debug!("webhook: no message in delivery");
    } else if report.failures() > 0 {
        log::warn!("webhook: handled delivery with failures: {}", report.summary());
    } else {
        log::info!("webhook: handled delivery: {}", report.summary());
    }
    StatusCode::OK
}
