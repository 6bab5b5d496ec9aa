//! Avatar relay server library logic.
//!
//! Proxies the speech provider for browser clients: short-lived credentials,
//! relay (ICE) server discovery and session-less synthesis. The long-lived
//! subscription key never leaves this process in the default token mode.

pub mod api;
pub mod config;
pub mod middleware;

use avatar_speech::SpeechService;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Router,
};
use middleware::RateLimiter;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Maximum request body size (64 KiB).
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Speech provider client.
    pub speech: Arc<SpeechService>,
    /// Rate limiter state.
    pub rate_limiter: RateLimiter,
    /// Requests per minute allowed per IP on `/api/speech/*`.
    pub rate_limit_per_minute: u32,
    /// Directory of a built browser client, if one should be served.
    pub client_dir: Option<String>,
}

impl AppState {
    pub fn new(speech: SpeechService, rate_limit_per_minute: u32) -> Self {
        Self {
            speech: Arc::new(speech),
            rate_limiter: RateLimiter::new(),
            rate_limit_per_minute,
            client_dir: None,
        }
    }
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let speech_routes = Router::new()
        .route("/api/speech/token", get(api::token_handler))
        .route("/api/speech/ice-token", get(api::ice_token_handler))
        .route("/api/speech/synthesize", post(api::synthesize_handler))
        .route_layer(axum::middleware::from_fn(middleware::rate_limit_middleware));

    let router = Router::new()
        .route("/api/health", get(api::health))
        .merge(speech_routes);

    let router = match &state.client_dir {
        Some(client_dir) if std::path::Path::new(client_dir).join("index.html").exists() => {
            tracing::info!(path = %client_dir, "serving client static files");
            let index = std::path::Path::new(client_dir).join("index.html");
            router.fallback_service(ServeDir::new(client_dir).fallback(ServeFile::new(index)))
        }
        Some(client_dir) => {
            tracing::info!(path = %client_dir, "client directory not found, skipping static file serving");
            router
        }
        None => router,
    };

    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
