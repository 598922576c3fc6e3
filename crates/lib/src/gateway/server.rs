//! Gateway HTTP server: webhook callback, staged media, health probe.

use crate::config::{self, Config};
use crate::gateway::handler;
use crate::line::{self, LineClient, WebhookRequest};
use crate::llm::{ImageGenClient, VisionClient};
use crate::media::MediaStore;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Shared state for the gateway (config, clients, media store).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    /// Channel secret for webhook signature verification.
    pub channel_secret: Arc<String>,
    pub line: LineClient,
    pub vision: VisionClient,
    pub image_gen: ImageGenClient,
    pub media: MediaStore,
    /// Public base URL under which /media/{key} is reachable.
    pub base_url: Arc<String>,
    /// Placeholder image URL substituted when generation fails.
    pub fallback_image_url: Arc<String>,
}

impl GatewayState {
    /// Public URL of a staged image, fetched by the vision service.
    pub fn media_url(&self, key: &str) -> String {
        format!("{}/media/{}", self.base_url, key)
    }
}

fn require(value: Option<String>, what: &str) -> Result<String> {
    value.with_context(|| format!("{} is not configured (set it in config.json or env)", what))
}

/// Build the gateway state from config. Fails when the LINE secrets or the
/// AI deployments are missing, so the process exits non-zero at startup
/// instead of limping along.
pub fn build_state(config: Config) -> Result<GatewayState> {
    let channel_secret = require(config::resolve_channel_secret(&config), "line.channelSecret")?;
    let access_token = require(
        config::resolve_channel_access_token(&config),
        "line.channelAccessToken",
    )?;
    let vision = VisionClient::new(
        require(config.vision.endpoint.clone(), "vision.endpoint")?,
        require(config.vision.api_key.clone(), "vision.apiKey")?,
        require(config.vision.deployment.clone(), "vision.deployment")?,
        config.vision.api_version.clone(),
    );
    let image_gen = ImageGenClient::new(
        require(config.image_gen.endpoint.clone(), "imageGen.endpoint")?,
        require(config.image_gen.api_key.clone(), "imageGen.apiKey")?,
        require(config.image_gen.deployment.clone(), "imageGen.deployment")?,
        config.image_gen.api_version.clone(),
    );
    let line = LineClient::new(
        access_token,
        config.line.api_base.clone(),
        config.line.data_api_base.clone(),
    );
    let media = MediaStore::new(config::resolve_media_dir(&config))?;
    let base_url = config::resolve_base_url(&config);
    let fallback_image_url = config::resolve_fallback_image_url(&config);
    Ok(GatewayState {
        channel_secret: Arc::new(channel_secret),
        line,
        vision,
        image_gen,
        media,
        base_url: Arc::new(base_url),
        fallback_image_url: Arc::new(fallback_image_url),
        config: Arc::new(config),
    })
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    let state = build_state(config)?;

    let bind_addr = format!("{}:{}", state.config.gateway.bind, state.config.gateway.port);
    let app = Router::new()
        .route("/", get(health_http))
        .route("/callback", post(callback))
        .route("/media/:key", get(serve_media))
        .with_state(state);

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
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

/// POST /callback — verifies X-Line-Signature over the raw body, decodes the
/// webhook payload, and dispatches each recognized event in order.
/// 400 on a bad signature or undecodable body; 500 when a reply fails.
async fn callback(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    log::info!("webhook request body: {}", String::from_utf8_lossy(&body));

    let signature = headers
        .get("X-Line-Signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !line::verify_signature(&state.channel_secret, &body, signature) {
        log::warn!("webhook signature verification failed");
        return (StatusCode::BAD_REQUEST, "bad signature");
    }

    let request: WebhookRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            log::warn!("webhook body decode failed: {}", e);
            return (StatusCode::BAD_REQUEST, "bad request");
        }
    };

    for event in request.events {
        let Some(inbound) = event.into_inbound() else {
            continue;
        };
        if let Err(e) = handler::handle_event(&state, inbound).await {
            log::error!("handling webhook event failed: {:#}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "");
        }
    }
    (StatusCode::OK, "OK")
}

/// GET /media/{key} — serve a staged image for the vision service to fetch.
async fn serve_media(State(state): State<GatewayState>, Path(key): Path<String>) -> Response {
    let Some(path) = state.media.path(&key) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
    }))
}
