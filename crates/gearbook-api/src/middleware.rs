// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-cutting HTTP middleware: request ids, CORS, request timeouts.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use gearbook_core::GearbookError;
use tracing::info;
use uuid::Uuid;

use crate::auth::ApiAuth;
use crate::handlers::error_response;
use crate::recording;

/// Header carrying the request id, inbound and outbound.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id propagated through extensions to handlers and logs.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Outermost middleware: adopt or assign a request id, echo it on the
/// response, and log one line per request.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let started = Instant::now();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));
    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let status = response.status().as_u16();
    let elapsed = started.elapsed();
    info!(
        %method,
        path = %path,
        remote = remote.as_deref().unwrap_or("-"),
        status,
        elapsed_ms = elapsed.as_millis() as u64,
        request_id = %request_id,
        "request served"
    );
    recording::record_http_request(method.as_str(), status, elapsed);
    response
}

/// Permissive CORS: wildcard origin, the methods the API serves, and the
/// configured auth headers. Preflight `OPTIONS` is answered here with 204
/// before routing.
pub async fn cors_middleware(
    State(auth): State<Arc<ApiAuth>>,
    request: Request,
    next: Next,
) -> Response {
    let allow_headers = auth.cors_allow_headers();
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors(response.headers_mut(), &allow_headers);
        return response;
    }
    let mut response = next.run(request).await;
    apply_cors(response.headers_mut(), &allow_headers);
    response
}

fn apply_cors(headers: &mut HeaderMap, allow_headers: &str) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    if let Ok(value) = HeaderValue::from_str(allow_headers) {
        headers.insert("access-control-allow-headers", value);
    }
}

/// Bound the whole request to the configured write timeout; an elapsed
/// budget turns into a 504 instead of a hung connection.
pub async fn timeout_middleware(
    State(budget): State<Duration>,
    request: Request,
    next: Next,
) -> Response {
    match tokio::time::timeout(budget, next.run(request)).await {
        Ok(response) => response,
        Err(_) => error_response(&GearbookError::Timeout { duration: budget }),
    }
}
