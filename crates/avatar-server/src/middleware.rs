use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::AppState;

/// Length of a rate-limit window.
const WINDOW: Duration = Duration::from_secs(60);

/// Entries kept before expired windows are evicted.
const EVICTION_THRESHOLD: usize = 10_000;

/// In-memory per-IP rate limiter.
///
/// Uses a simple fixed window counter.
#[derive(Clone, Debug, Default)]
pub struct RateLimiter {
    state: Arc<Mutex<HashMap<IpAddr, (u32, Instant)>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a request from `ip`.
    ///
    /// Returns `true` if allowed, `false` if the window's limit is exceeded.
    pub fn check(&self, ip: IpAddr, limit: u32) -> bool {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("rate limiter lock poisoned, recovering with stale state");
                poisoned.into_inner()
            }
        };
        let now = Instant::now();

        // Evict expired windows only; live counters survive.
        if state.len() > EVICTION_THRESHOLD {
            state.retain(|_, (_, start)| now.duration_since(*start) <= WINDOW);
        }

        let (count, start) = state.entry(ip).or_insert((0, now));

        if now.duration_since(*start) > WINDOW {
            *count = 1;
            *start = now;
            true
        } else {
            *count += 1;
            *count <= limit
        }
    }
}

/// Rate limiting middleware for the speech endpoints.
///
/// Requests are keyed by peer IP, so the router must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub async fn rate_limit_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() else {
        tracing::error!("connect info missing, cannot key rate limit");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    };
    let ip = addr.ip();

    if !state.rate_limiter.check(ip, state.rate_limit_per_minute) {
        tracing::warn!(%ip, path = req.uri().path(), "rate limit exceeded");
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from_static("60"));
        return Ok(response);
    }

    Ok(next.run(req).await)
}
