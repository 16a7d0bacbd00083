//! Rate limiting middleware using Governor.
//!
//! Per-client token bucket keyed by the TCP peer address. `X-Forwarded-For`
//! is only honoured when the server sits behind a trusted proxy; otherwise
//! any caller could pick a fresh key per request.

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DefaultKeyedStateStore,
};
use serde_json::json;
use std::{
    net::SocketAddr,
    num::NonZeroU32,
    sync::Arc,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

const ANONYMOUS: &str = "anonymous";

/// Checks between sweeps of idle client buckets.
const PRUNE_EVERY: u64 = 1024;

type KeyedLimiter<C> =
    RateLimiter<String, DefaultKeyedStateStore<String>, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Rate limiter state shared across requests.
pub struct RateLimiterState<C: Clock = DefaultClock> {
    limiters: KeyedLimiter<C>,
    /// Use the proxy-appended `X-Forwarded-For` hop instead of the peer address.
    trust_forwarded_for: bool,
    checks: AtomicU64,
}

impl Default for RateLimiterState {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(60))
    }
}

impl RateLimiterState {
    /// Allows `requests` per `period`, all of which may arrive as one burst.
    pub fn new(requests: u32, period: Duration) -> Self {
        Self::with_clock(requests, period, DefaultClock::default())
    }
}

impl<C: Clock> RateLimiterState<C> {
    pub fn with_clock(requests: u32, period: Duration, clock: C) -> Self {
        let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiters: RateLimiter::new(quota, DefaultKeyedStateStore::default(), clock),
            trust_forwarded_for: false,
            checks: AtomicU64::new(0),
        }
    }

    /// Set when a reverse proxy in front of the server overwrites or appends
    /// `X-Forwarded-For`.
    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    /// Returns true if the request is allowed, false if rate limited.
    pub fn check(&self, key: &str) -> bool {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune();
        }
        self.limiters.check_key(&key.to_string()).is_ok()
    }

    /// Drops buckets that have refilled completely; they are
    /// indistinguishable from a client never seen before.
    pub fn prune(&self) {
        self.limiters.retain_recent();
        self.limiters.shrink_to_fit();
    }

    /// Number of client buckets currently held.
    pub fn tracked_clients(&self) -> usize {
        self.limiters.len()
    }

    fn client_key(&self, request: &Request<Body>) -> String {
        if self.trust_forwarded_for {
            // The last hop is the one our own proxy appended.
            let forwarded = request
                .headers()
                .get("X-Forwarded-For")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.rsplit(',').next())
                .map(str::trim)
                .filter(|s| !s.is_empty());
            if let Some(hop) = forwarded {
                return hop.to_string();
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(peer)| peer.ip().to_string())
            .unwrap_or_else(|| ANONYMOUS.to_string())
    }
}

/// Rate limiting middleware.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // Skip rate limiting for health endpoint
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let key = limiter.client_key(&request);
    if !limiter.check(&key) {
        tracing::warn!(client = %key, "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Rate limit exceeded. Please try again later.",
                "retry_after_seconds": 60
            })),
        )
            .into_response();
    }

    next.run(request).await
}
