// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the availability API.
//!
//! Three availability operations plus health, readiness, and metrics.
//! Error kinds map to status codes in one place; see [`error_response`].

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gearbook_core::GearbookError;
use gearbook_core::types::Item;
use gearbook_engine::Availability;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::server::ApiState;

/// Query parameters for GET availability.
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// Date to check, `YYYY-MM-DD`.
    #[serde(default)]
    pub date: Option<String>,
}

/// Response body for GET /api/v1/availability/{item_name}.
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
    pub booked_count: i64,
    pub total: i64,
}

/// Request body for POST /api/v1/availability/bulk.
#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub dates: Vec<String>,
}

/// Query parameters for GET /api/v1/availability/bulk (CSV lists).
#[derive(Debug, Deserialize)]
pub struct BulkQuery {
    #[serde(default)]
    pub items: Option<String>,
    #[serde(default)]
    pub dates: Option<String>,
}

/// Response body for the bulk availability endpoints.
#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub results: Vec<Availability>,
}

/// Response body for GET /api/v1/items.
#[derive(Debug, Serialize)]
pub struct ItemsResponse {
    pub items: Vec<Item>,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// GET /api/v1/availability/{item_name}?date=YYYY-MM-DD
pub async fn get_availability(
    State(state): State<ApiState>,
    Path(item_name): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Response {
    let Some(date) = query.date else {
        return error_response(&GearbookError::InvalidArgument(
            "missing date query parameter".to_string(),
        ));
    };
    match state.reader.get_availability(&item_name, &date).await {
        Ok(availability) => (
            StatusCode::OK,
            Json(AvailabilityResponse {
                available: availability.available,
                booked_count: availability.booked_count,
                total: availability.total,
            }),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST /api/v1/availability/bulk
pub async fn post_availability_bulk(
    State(state): State<ApiState>,
    Json(body): Json<BulkRequest>,
) -> Response {
    bulk_availability(&state, &body.items, &body.dates).await
}

/// GET /api/v1/availability/bulk?items=a,b&dates=...
pub async fn get_availability_bulk(
    State(state): State<ApiState>,
    Query(query): Query<BulkQuery>,
) -> Response {
    let items = split_csv(query.items.as_deref());
    let dates = split_csv(query.dates.as_deref());
    bulk_availability(&state, &items, &dates).await
}

async fn bulk_availability(state: &ApiState, items: &[String], dates: &[String]) -> Response {
    match state.reader.get_availability_bulk(items, dates).await {
        Ok(results) => (StatusCode::OK, Json(BulkResponse { results })).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Split a CSV query value, dropping empty segments.
fn split_csv(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// GET /api/v1/items
pub async fn list_items(State(state): State<ApiState>) -> Response {
    match state.reader.list_items().await {
        Ok(items) => (StatusCode::OK, Json(ItemsResponse { items })).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}

/// GET /readyz
///
/// Pings the hard dependencies; any failure or timeout returns 503.
pub async fn readyz(State(state): State<ApiState>) -> Response {
    match state.probe_dependencies().await {
        Ok(()) => (StatusCode::OK, "ready").into_response(),
        Err(e) => {
            warn!(error = %e, "readiness probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
        }
    }
}

/// GET /metrics
pub async fn metrics_endpoint(State(state): State<ApiState>) -> Response {
    match &state.metrics_render {
        Some(render) => (StatusCode::OK, render()).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed\n").into_response(),
    }
}

/// HTTP status for an error kind.
fn status_for(err: &GearbookError) -> StatusCode {
    match err {
        GearbookError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        GearbookError::NotFound { .. } => StatusCode::NOT_FOUND,
        GearbookError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        GearbookError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        GearbookError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        GearbookError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        GearbookError::SlotNotAvailable
        | GearbookError::ItemNotAvailable { .. }
        | GearbookError::SlotMisaligned(_)
        | GearbookError::ConcurrentModification
        | GearbookError::TooLate
        | GearbookError::AlreadyFinalized(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Uniform JSON error body. Server-side detail stays in the log for 5xx.
pub(crate) fn error_response(err: &GearbookError) -> Response {
    let status = status_for(err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "request failed");
        return (
            status,
            Json(ErrorResponse {
                error: "internal error".to_string(),
            }),
        )
            .into_response();
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_drops_empty_segments() {
        assert_eq!(
            split_csv(Some("camera, lens ,,tripod")),
            ["camera", "lens", "tripod"]
        );
        assert!(split_csv(Some("")).is_empty());
        assert!(split_csv(None).is_empty());
    }

    #[test]
    fn bulk_request_deserializes_with_defaults() {
        let body: BulkRequest = serde_json::from_str(r#"{"items":["camera"]}"#).unwrap();
        assert_eq!(body.items, ["camera"]);
        assert!(body.dates.is_empty());
    }

    #[test]
    fn error_kinds_map_to_their_status_codes() {
        let cases = [
            (
                GearbookError::InvalidArgument("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                GearbookError::NotFound {
                    what: "item",
                    name: "tripod".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                GearbookError::Unauthenticated("missing header".to_string()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                GearbookError::PermissionDenied("missing permission".to_string()),
                StatusCode::FORBIDDEN,
            ),
            (GearbookError::TooManyRequests, StatusCode::TOO_MANY_REQUESTS),
            (GearbookError::ConcurrentModification, StatusCode::CONFLICT),
            (
                GearbookError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(status_for(&err), expected, "{err}");
        }
    }

    #[tokio::test]
    async fn internal_detail_stays_out_of_the_body() {
        let response = error_response(&GearbookError::Internal("secret detail".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!body.contains("secret detail"));
        assert!(body.contains("internal error"));
    }

    #[test]
    fn availability_response_serializes() {
        let resp = AvailabilityResponse {
            available: true,
            booked_count: 1,
            total: 2,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"available\":true"));
        assert!(json.contains("\"booked_count\":1"));
    }
}
