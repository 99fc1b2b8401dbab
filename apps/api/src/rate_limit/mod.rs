//! Fixed-window, per-client-IP rate limiting.
//!
//! Each route group gets its own [`RatePolicy`] and is wrapped with
//! [`rate_limit_middleware`]. Clients are keyed on the socket peer; proxy
//! headers are read only when `TRUST_PROXY_HEADERS` is set, since any
//! client can send them. Counters live in memory by default or in
//! Redis when `REDIS_URL` is set. If the counter backend fails the request
//! is let through and a warning is logged.

pub mod memory;
pub mod redis;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::warn;

use crate::errors::AppError;

pub use self::memory::InMemoryRateLimiter;
pub use self::redis::RedisRateLimiter;

pub static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

const UNKNOWN_CLIENT: &str = "unknown";

/// Quota for one route group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatePolicy {
    /// Namespaces counters so groups don't share a budget.
    pub scope: &'static str,
    pub limit: u32,
    pub window_secs: u64,
}

impl RatePolicy {
    pub fn per_minute(scope: &'static str, limit: u32) -> Self {
        Self {
            scope,
            limit,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Denied { retry_after_secs: u64 },
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limiter unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Counts one request against `key` and reports whether it fits.
    async fn check(&self, key: &str, policy: &RatePolicy) -> Result<RateDecision, RateLimitError>;
}

/// State for one `from_fn_with_state` layer.
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<dyn RateLimiter>,
    pub policy: RatePolicy,
    pub trust_proxy_headers: bool,
}

impl RateLimitState {
    pub fn new(limiter: Arc<dyn RateLimiter>, policy: RatePolicy) -> Self {
        Self {
            limiter,
            policy,
            trust_proxy_headers: false,
        }
    }

    pub fn trusting_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }
}

pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_ip(
        request.headers(),
        connect_info.as_ref(),
        state.trust_proxy_headers,
    )
    .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
    let key = format!("ratelimit:{}:{client}", state.policy.scope);

    let remaining = match state.limiter.check(&key, &state.policy).await {
        Ok(RateDecision::Denied { retry_after_secs }) => {
            warn!(
                "Rate limit exceeded for {client} on {} ({}/{}s)",
                state.policy.scope, state.policy.limit, state.policy.window_secs
            );
            let mut response = AppError::RateLimited { retry_after_secs }.into_response();
            add_headers(&mut response, state.policy.limit, 0);
            return response;
        }
        Ok(RateDecision::Allowed { remaining }) => Some(remaining),
        Err(e) => {
            warn!("{e}; allowing request");
            None
        }
    };

    let mut response = next.run(request).await;
    if let Some(remaining) = remaining {
        add_headers(&mut response, state.policy.limit, remaining);
    }
    response
}

/// The socket peer. With `trust_proxy_headers`, the first `X-Forwarded-For`
/// entry or `X-Real-IP` take precedence.
fn client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy_headers: bool,
) -> Option<String> {
    let peer = connect_info.map(|ci| ci.0.ip().to_string());
    if !trust_proxy_headers {
        return peer;
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(first) = header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Some(first.to_string());
    }
    if let Some(real_ip) = header("x-real-ip") {
        return Some(real_ip.to_string());
    }
    peer
}

fn add_headers(response: &mut Response, limit: u32, remaining: u32) {
    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(remaining));
}
