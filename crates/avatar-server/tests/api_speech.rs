mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use common::*;
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn health_check_returns_ok() {
    let (status, body) = send(unconfigured(), get_request("/api/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn token_is_short_lived_by_default() {
    let provider = spawn_provider(StatusCode::OK).await;

    let (status, body) = send(configured(&provider), get_request("/api/speech/token")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token"], "short-lived-token");
    assert_eq!(body["region"], REGION);
}

#[tokio::test]
async fn token_in_subscription_key_mode_is_the_key() {
    let provider = spawn_provider(StatusCode::OK).await;

    let (status, body) = send(
        subscription_key_mode(&provider),
        get_request("/api/speech/token"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token"], KEY);
    assert_eq!(body["region"], REGION);
}

#[tokio::test]
async fn token_without_credentials_is_500() {
    let (status, body) = send(unconfigured(), get_request("/api/speech/token")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "speech credentials not configured" }));
}

#[tokio::test]
async fn token_provider_rejection_is_502() {
    let provider = spawn_provider(StatusCode::OK).await;
    let mut config = speech_config(&provider);
    config.key = "wrong-key".to_string();

    let (status, body) = send(
        avatar_server::app(state(config)),
        get_request("/api/speech/token"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("401"));
}

#[tokio::test]
async fn ice_token_maps_relay_credentials() {
    let provider = spawn_provider(StatusCode::OK).await;

    let (status, body) = send(configured(&provider), get_request("/api/speech/ice-token")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "iceServers": [{
                "urls": ["turn:relay.example.org:3478"],
                "username": "relay-user",
                "credential": "relay-pass"
            }]
        })
    );
}

#[tokio::test]
async fn ice_token_is_empty_when_relay_unavailable() {
    let provider = spawn_provider(StatusCode::NOT_FOUND).await;

    let (status, body) = send(configured(&provider), get_request("/api/speech/ice-token")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "iceServers": [] }));
}

#[tokio::test]
async fn ice_token_is_empty_when_unauthorized() {
    let provider = spawn_provider(StatusCode::FORBIDDEN).await;

    let (status, body) = send(configured(&provider), get_request("/api/speech/ice-token")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "iceServers": [] }));
}

#[tokio::test]
async fn ice_token_is_empty_without_credentials() {
    let (status, body) = send(unconfigured(), get_request("/api/speech/ice-token")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "iceServers": [] }));
}

#[tokio::test]
async fn synthesize_returns_base64_wav_and_duration() {
    let provider = spawn_provider(StatusCode::OK).await;

    let (status, body) = send(
        configured(&provider),
        post_json(
            "/api/speech/synthesize",
            json!({ "text": "Hello & welcome" }).to_string(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    // 24 000 bytes at 48 000 bytes/s is half a second.
    assert_eq!(body["duration"], 5_000_000);
    let audio = base64::engine::general_purpose::STANDARD
        .decode(body["audioData"].as_str().unwrap())
        .unwrap();
    assert_eq!(&audio[..4], b"RIFF");
    assert_eq!(audio, wav(24_000));
    assert_eq!(provider.synth_calls(), 1);
}

#[tokio::test]
async fn synthesize_rejects_blank_text_without_provider_call() {
    let provider = spawn_provider(StatusCode::OK).await;

    for body in [json!({ "text": "   " }), json!({})] {
        let (status, response) = send(
            configured(&provider),
            post_json("/api/speech/synthesize", body.to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(response["error"].is_string());
    }
    assert_eq!(provider.synth_calls(), 0);
}

#[tokio::test]
async fn synthesize_rejects_malformed_json() {
    let (status, body) = send(
        unconfigured(),
        post_json("/api/speech/synthesize", "{not json"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn synthesize_without_credentials_is_500() {
    let (status, body) = send(
        unconfigured(),
        post_json("/api/speech/synthesize", json!({ "text": "hi" }).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "speech credentials not configured" }));
}

#[tokio::test]
async fn synthesize_provider_failure_is_500() {
    let provider = spawn_provider(StatusCode::OK).await;

    let (status, body) = send(
        configured(&provider),
        post_json(
            "/api/speech/synthesize",
            json!({ "text": "provider-failure" }).to_string(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("400"));
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let text = "a".repeat(70 * 1024);
    let response = unconfigured()
        .oneshot(post_json(
            "/api/speech/synthesize",
            json!({ "text": text }).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/speech/token")
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "GET")
        .body(Body::empty())
        .unwrap();

    let response = unconfigured().oneshot(request).await.unwrap();

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
