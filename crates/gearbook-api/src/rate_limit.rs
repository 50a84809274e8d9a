// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-key token bucket rate limiting.
//!
//! One bucket per key in a concurrent map. The key is the primary API key
//! when the request authenticated, else the remote peer address. Buckets
//! refill continuously at the steady rate up to the burst size; a request
//! costs one token and is denied (never queued) when the bucket is empty.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use gearbook_core::GearbookError;

use crate::auth::AuthedClient;
use crate::handlers::error_response;
use crate::recording;

/// Buckets idle this long have fully refilled; keeping them only holds memory.
const SWEEP_IDLE: Duration = Duration::from_secs(300);

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket table shared by the HTTP middleware and the gRPC interceptor.
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    rps: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(rps: f64, burst: u32) -> Self {
        Self {
            buckets: DashMap::new(),
            rps,
            burst: f64::from(burst),
        }
    }

    /// Take one token from the bucket for `key`. Returns false when empty.
    pub fn try_acquire(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket {
                tokens: self.burst,
                last_refill: now,
            });
        let elapsed = now
            .saturating_duration_since(bucket.last_refill)
            .as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rps).min(self.burst);
        bucket.last_refill = now;
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop buckets that have been idle long enough to refill completely.
    pub fn sweep(&self) {
        self.buckets
            .retain(|_, bucket| bucket.last_refill.elapsed() < SWEEP_IDLE);
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// The rate limiter key: api key when authenticated, else peer ip.
fn rate_key(request: &Request) -> String {
    if let Some(client) = request.extensions().get::<AuthedClient>()
        && let Some(key) = &client.key
    {
        return key.clone();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware denying requests once their bucket runs dry.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = rate_key(&request);
    if !limiter.try_acquire(&key) {
        recording::record_rate_limited();
        return error_response(&GearbookError::TooManyRequests);
    }
    next.run(request).await
}
