// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP and gRPC server assembly.
//!
//! Builds the axum router with the middleware chain (request id, CORS,
//! request timeout, then per-route auth and rate limiting) and runs both
//! servers under one cancellation token.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, middleware as axum_middleware, routing::get};
use gearbook_core::GearbookError;
use gearbook_engine::AvailabilityReader;
use gearbook_sheets::SheetWriter;
use gearbook_storage::Database;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::auth::{ApiAuth, auth_middleware};
use crate::grpc::{AvailabilityGrpc, GrpcGuard};
use crate::handlers;
use crate::middleware::{cors_middleware, request_id_middleware, timeout_middleware};
use crate::proto::availability_server::AvailabilityServer;
use crate::rate_limit::{RateLimiter, rate_limit_middleware};
use crate::recording;

/// Dependency pings get this long each before readiness fails.
const READY_PING_TIMEOUT: Duration = Duration::from_secs(5);

/// How often idle rate limiter buckets are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared state for request handlers.
#[derive(Clone)]
pub struct ApiState {
    /// Read side of the reservation engine.
    pub reader: AvailabilityReader,
    /// Auth settings and client table.
    pub auth: Arc<ApiAuth>,
    /// Token bucket table.
    pub limiter: Arc<RateLimiter>,
    /// Database handle, pinged by the readiness probe.
    pub db: Arc<Database>,
    /// Sheet client, pinged by the readiness probe.
    pub sheet: Arc<dyn SheetWriter>,
    /// Whole-request budget enforced by the timeout middleware.
    pub request_timeout: Duration,
    /// Prometheus render function for GET /metrics, when installed.
    pub metrics_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl ApiState {
    /// Ping the hard dependencies. Any failure or timeout makes us unready.
    pub async fn probe_dependencies(&self) -> Result<(), GearbookError> {
        tokio::time::timeout(READY_PING_TIMEOUT, self.db.ping())
            .await
            .map_err(|_| GearbookError::Timeout {
                duration: READY_PING_TIMEOUT,
            })??;
        tokio::time::timeout(READY_PING_TIMEOUT, self.sheet.ping())
            .await
            .map_err(|_| GearbookError::Timeout {
                duration: READY_PING_TIMEOUT,
            })??;
        Ok(())
    }
}

/// Server bind settings (mirrors ServerConfig in gearbook-config to avoid a
/// dependency on the config crate).
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Address for the HTTP server.
    pub http_bind: String,
    /// Address for the gRPC server; empty string disables gRPC.
    pub grpc_bind: String,
}

/// Build the full HTTP router with the middleware chain applied.
///
/// Outermost first: request id, CORS, request timeout. Auth and rate
/// limiting wrap only the `/api` routes; health, readiness, and metrics
/// stay public.
pub fn router(state: ApiState) -> Router {
    let public = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics_endpoint))
        .with_state(state.clone());

    let api = Router::new()
        .route(
            "/api/v1/availability/bulk",
            get(handlers::get_availability_bulk).post(handlers::post_availability_bulk),
        )
        .route(
            "/api/v1/availability/{item_name}",
            get(handlers::get_availability),
        )
        .route("/api/v1/items", get(handlers::list_items))
        .route_layer(axum_middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    Router::new()
        .merge(public)
        .merge(api)
        .layer(axum_middleware::from_fn_with_state(
            state.request_timeout,
            timeout_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            cors_middleware,
        ))
        .layer(axum_middleware::from_fn(request_id_middleware))
}

/// Run the HTTP server until the token is cancelled.
pub async fn serve_http(
    settings: &ServerSettings,
    state: ApiState,
    cancel: CancellationToken,
) -> Result<(), GearbookError> {
    let limiter = state.limiter.clone();
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(&settings.http_bind)
        .await
        .map_err(|e| {
            GearbookError::Internal(format!(
                "failed to bind http server to {}: {e}",
                settings.http_bind
            ))
        })?;
    info!(addr = %settings.http_bind, "http server listening");

    let sweeper = tokio::spawn(sweep_buckets(limiter, cancel.clone()));

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await
        .map_err(|e| GearbookError::Internal(format!("http server error: {e}")))?;

    let _ = sweeper.await;
    info!("http server stopped");
    Ok(())
}

/// Run the gRPC server until the token is cancelled.
///
/// An empty bind address disables the server.
pub async fn serve_grpc(
    settings: &ServerSettings,
    state: ApiState,
    cancel: CancellationToken,
) -> Result<(), GearbookError> {
    if settings.grpc_bind.is_empty() {
        info!("grpc server disabled");
        return Ok(());
    }
    let addr: SocketAddr = settings.grpc_bind.parse().map_err(|e| {
        GearbookError::Config(format!(
            "invalid grpc bind address {}: {e}",
            settings.grpc_bind
        ))
    })?;

    let guard = GrpcGuard::new(state.auth.clone(), state.limiter.clone());
    let timeout = state.request_timeout;
    let service = AvailabilityServer::with_interceptor(AvailabilityGrpc::new(state), guard);
    info!(addr = %addr, "grpc server listening");

    tonic::transport::Server::builder()
        .timeout(timeout)
        .add_service(service)
        .serve_with_shutdown(addr, async move {
            cancel.cancelled().await;
        })
        .await
        .map_err(|e| GearbookError::Internal(format!("grpc server error: {e}")))?;

    info!("grpc server stopped");
    Ok(())
}

/// Periodically drop idle rate limiter buckets.
async fn sweep_buckets(limiter: Arc<RateLimiter>, cancel: CancellationToken) {
    let mut tick = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = tick.tick() => {
                limiter.sweep();
                recording::set_rate_limit_buckets(limiter.bucket_count() as f64);
            }
            _ = cancel.cancelled() => break,
        }
    }
}
