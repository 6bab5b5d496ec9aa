#![allow(dead_code)]

use avatar_server::{app, AppState};
use avatar_speech::{SpeechConfig, SpeechService, TokenMode};
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

pub const KEY: &str = "test-subscription-key";
pub const REGION: &str = "westus2";

/// A provider stub and the number of synthesis requests it has served.
pub struct Provider {
    pub base: String,
    pub synth_calls: Arc<AtomicUsize>,
}

impl Provider {
    pub fn synth_calls(&self) -> usize {
        self.synth_calls.load(Ordering::SeqCst)
    }
}

fn has_key(headers: &HeaderMap) -> bool {
    headers
        .get("Ocp-Apim-Subscription-Key")
        .and_then(|v| v.to_str().ok())
        == Some(KEY)
}

/// RIFF header plus `data_len` bytes of silence at 24 kHz, 16-bit mono.
pub fn wav(data_len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((36 + data_len) as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&24_000u32.to_le_bytes());
    out.extend_from_slice(&48_000u32.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&(data_len as u32).to_le_bytes());
    out.extend(std::iter::repeat(0u8).take(data_len));
    out
}

/// Spawns a provider stub answering token, relay and synthesis requests.
///
/// `relay_status` other than 200 makes the relay endpoint fail with it.
pub async fn spawn_provider(relay_status: StatusCode) -> Provider {
    let synth_calls = Arc::new(AtomicUsize::new(0));
    let counter = synth_calls.clone();

    let router = Router::new()
        .route(
            "/sts/v1.0/issueToken",
            post(|headers: HeaderMap| async move {
                if has_key(&headers) {
                    (StatusCode::OK, "short-lived-token".to_string())
                } else {
                    (StatusCode::UNAUTHORIZED, String::new())
                }
            }),
        )
        .route(
            "/cognitiveservices/avatar/relay/token/v1",
            get(move |headers: HeaderMap| async move {
                if relay_status != StatusCode::OK {
                    return Err(relay_status);
                }
                if !has_key(&headers) {
                    return Err(StatusCode::UNAUTHORIZED);
                }
                Ok(Json(json!({
                    "Urls": ["turn:relay.example.org:3478"],
                    "Username": "relay-user",
                    "Password": "relay-pass"
                })))
            }),
        )
        .route(
            "/cognitiveservices/v1",
            post(move |body: String| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if body.contains("provider-failure") {
                        return Err((StatusCode::BAD_REQUEST, "bad ssml".to_string()));
                    }
                    Ok(wav(24_000))
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    Provider {
        base: format!("http://{}", addr),
        synth_calls,
    }
}

pub fn speech_config(provider: &Provider) -> SpeechConfig {
    let mut config = SpeechConfig::new(KEY, REGION);
    config.tts_base_url = Some(provider.base.clone());
    config.sts_base_url = Some(provider.base.clone());
    config
}

pub fn state(config: SpeechConfig) -> AppState {
    AppState::new(SpeechService::new(config).unwrap(), 1_000)
}

pub fn configured(provider: &Provider) -> Router {
    app(state(speech_config(provider)))
}

pub fn subscription_key_mode(provider: &Provider) -> Router {
    let mut config = speech_config(provider);
    config.token_mode = TokenMode::SubscriptionKey;
    app(state(config))
}

pub fn unconfigured() -> Router {
    app(state(SpeechConfig::default()))
}

pub fn client_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 40_000)
}

pub fn get_request(uri: &str) -> Request<Body> {
    let mut request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    request.extensions_mut().insert(ConnectInfo(client_addr()));
    request
}

pub fn post_json(uri: &str, body: impl Into<Body>) -> Request<Body> {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(client_addr()));
    request
}

/// Sends `request` and returns the status and JSON body (`Null` if empty).
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}
