//! HTTP gateway for Parley.
//!
//! Exposes the health check and the v1 API (chat, conversations,
//! documents, catalogs). Built on Axum.

pub mod api_v1;
pub mod bootstrap;

pub use bootstrap::{BootstrapError, build_state, build_state_with_history, open_history};

use axum::extract::DefaultBodyLimit;
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the full router: `/health` plus the v1 API under `/v1`.
///
/// Layers applied:
/// - Request body limit (uploads count against it)
/// - CORS for browser clients
/// - HTTP trace logging
pub fn build_router(state: api_v1::SharedApiState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// The service graph (backends, history store, retriever) is built once and
/// shared by every request.
pub async fn start(config: parley_config::AppConfig) -> Result<(), GatewayError> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = Arc::new(build_state(&config).await?);
    state.backends.log_table();

    let app = build_router(state, config.gateway.max_body_bytes);

    info!(addr = %addr, "Gateway starting with v1 API");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
