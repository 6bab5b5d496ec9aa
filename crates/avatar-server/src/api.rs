//! Handlers for the speech relay endpoints.

use crate::AppState;
use avatar_speech::{tts::validate_text, SpeechError};
use avatar_types::wire::{
    HealthResponse, IceServersResponse, SynthesizeRequest, SynthesizeResponse, TokenResponse,
};
use axum::{
    extract::{rejection::JsonRejection, Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::Engine;
use std::sync::Arc;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("upstream failure: {0}")]
    BadGateway(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
    /// An extractor rejection, keeping its status (e.g. 413 for oversized bodies).
    #[error("rejected request: {1}")]
    Rejected(StatusCode, String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Rejected(status, msg) => (status, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Handler for `GET /api/health`.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handler for `GET /api/speech/token`.
///
/// Missing credentials are a 500; a provider failure while issuing the
/// short-lived token is a 502.
pub async fn token_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<TokenResponse>, ApiError> {
    let credential = state.speech.credential().await.map_err(|e| match e {
        SpeechError::NotConfigured => {
            tracing::error!("speech token requested but credentials are not configured");
            ApiError::InternalServerError(e.to_string())
        }
        e => {
            tracing::error!(error = %e, "failed to issue speech token");
            ApiError::BadGateway(e.to_string())
        }
    })?;

    tracing::info!(
        region = %credential.region,
        token_len = credential.token.len(),
        "issued speech credential"
    );
    Ok(Json(TokenResponse {
        token: credential.token,
        region: credential.region,
    }))
}

/// Handler for `GET /api/speech/ice-token`.
///
/// Always succeeds. Any upstream failure yields an empty server list so
/// clients fall back to public STUN.
pub async fn ice_token_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<IceServersResponse> {
    match state.speech.relay_servers().await {
        Ok(ice_servers) => Json(IceServersResponse { ice_servers }),
        Err(e) => {
            match &e {
                SpeechError::RelayUnavailable => tracing::warn!(
                    "avatar relay not available for this region/subscription"
                ),
                SpeechError::Unauthorized(status) => {
                    tracing::warn!(status, "avatar relay authorization failed")
                }
                SpeechError::NotConfigured => {
                    tracing::warn!("avatar relay requested but credentials are not configured")
                }
                other => tracing::warn!(error = %other, "avatar relay lookup failed"),
            }
            Json(IceServersResponse::default())
        }
    }
}

/// Handler for `POST /api/speech/synthesize`.
pub async fn synthesize_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<SynthesizeRequest>, JsonRejection>,
) -> Result<Json<SynthesizeResponse>, ApiError> {
    let Json(request) = payload?;
    validate_text(&request.text).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let audio = state.speech.synthesize(&request.text).await.map_err(|e| {
        tracing::error!(error = %e, "speech synthesis failed");
        ApiError::InternalServerError(e.to_string())
    })?;

    Ok(Json(SynthesizeResponse {
        success: true,
        audio_data: base64::engine::general_purpose::STANDARD.encode(&audio.audio),
        duration: audio.duration_ticks,
    }))
}
