// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics.

use std::time::Duration;

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Gearbook metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("gearbook_bookings_total", "Bookings created, by kind");
    describe_counter!(
        "gearbook_sync_tasks_total",
        "Sync queue tasks finished, by outcome"
    );
    describe_counter!(
        "gearbook_http_requests_total",
        "HTTP requests served, by method and status"
    );
    describe_counter!(
        "gearbook_grpc_requests_total",
        "gRPC requests served, by method and code"
    );
    describe_counter!(
        "gearbook_requests_rate_limited_total",
        "Requests rejected by the token bucket"
    );
    describe_gauge!(
        "gearbook_rate_limit_buckets",
        "Live token buckets held by the rate limiter"
    );
    describe_histogram!(
        "gearbook_request_latency_seconds",
        "Request latency in seconds"
    );
}

/// Record one served HTTP request.
pub fn record_http_request(method: &str, status: u16, elapsed: Duration) {
    metrics::counter!(
        "gearbook_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gearbook_request_latency_seconds").record(elapsed.as_secs_f64());
}

/// Record one served gRPC request.
pub fn record_grpc_request(method: &str, code: &str, elapsed: Duration) {
    metrics::counter!(
        "gearbook_grpc_requests_total",
        "method" => method.to_string(),
        "code" => code.to_string()
    )
    .increment(1);
    metrics::histogram!("gearbook_request_latency_seconds").record(elapsed.as_secs_f64());
}

/// Record a request denied by the rate limiter.
pub fn record_rate_limited() {
    metrics::counter!("gearbook_requests_rate_limited_total").increment(1);
}

/// Set the number of live rate limiter buckets.
pub fn set_rate_limit_buckets(count: f64) {
    metrics::gauge!("gearbook_rate_limit_buckets").set(count);
}
