// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP and gRPC surface for the Gearbook reservation service.
//!
//! Three read operations (availability for one item, bulk availability,
//! item listing) served over axum and tonic with shared semantics: the same
//! two-header auth, the same per-key token bucket, and one error taxonomy
//! mapped to status codes per transport. Health, readiness, and Prometheus
//! metrics endpoints stay outside the auth wall.

pub mod auth;
pub mod grpc;
pub mod handlers;
pub mod middleware;
pub mod proto;
pub mod rate_limit;
pub mod recording;
pub mod server;

pub use auth::{ApiAuth, ApiClient, AuthedClient};
pub use rate_limit::RateLimiter;
pub use server::{ApiState, ServerSettings, router, serve_grpc, serve_http};
