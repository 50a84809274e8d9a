// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! gRPC surface for the availability API.
//!
//! Implements the generated `gearbook.v1.Availability` service. AuthN and
//! rate limiting run in an interceptor before the service; the per-method
//! permission check and the request id echo happen in the methods.

use std::sync::Arc;
use std::time::Instant;

use gearbook_core::GearbookError;
use tonic::metadata::{MetadataMap, MetadataValue};
use tonic::service::Interceptor;
use tonic::{Request, Response, Status};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{ApiAuth, AuthedClient};
use crate::proto::availability_server::Availability;
use crate::proto::{
    AvailabilityReply, GetAvailabilityBulkReply, GetAvailabilityBulkRequest,
    GetAvailabilityRequest, Item, ListItemsReply, ListItemsRequest,
};
use crate::rate_limit::RateLimiter;
use crate::recording;
use crate::server::ApiState;

/// AuthN and rate limiting for every gRPC call.
///
/// Runs before the service; the matched client lands in request extensions
/// for the per-method permission check.
#[derive(Clone)]
pub struct GrpcGuard {
    auth: Arc<ApiAuth>,
    limiter: Arc<RateLimiter>,
}

impl GrpcGuard {
    pub fn new(auth: Arc<ApiAuth>, limiter: Arc<RateLimiter>) -> Self {
        Self { auth, limiter }
    }
}

impl Interceptor for GrpcGuard {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let key = request
            .metadata()
            .get(self.auth.key_header())
            .and_then(|v| v.to_str().ok());
        let extra = request
            .metadata()
            .get(self.auth.extra_header())
            .and_then(|v| v.to_str().ok());
        let client = self
            .auth
            .authenticate(key, extra)
            .map_err(|e| status_for(&e))?;

        let rate_key = client
            .key
            .clone()
            .or_else(|| request.remote_addr().map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string());
        if !self.limiter.try_acquire(&rate_key) {
            recording::record_rate_limited();
            return Err(status_for(&GearbookError::TooManyRequests));
        }

        request.extensions_mut().insert(client);
        Ok(request)
    }
}

/// `gearbook.v1.Availability` backed by the engine's availability reader.
pub struct AvailabilityGrpc {
    state: ApiState,
}

impl AvailabilityGrpc {
    pub fn new(state: ApiState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl Availability for AvailabilityGrpc {
    async fn get_availability(
        &self,
        request: Request<GetAvailabilityRequest>,
    ) -> Result<Response<AvailabilityReply>, Status> {
        let started = Instant::now();
        let request_id = request_id_of(request.metadata());
        let client = authed_client(&request)?;
        client
            .require("read:availability")
            .map_err(|e| fail("GetAvailability", &request_id, started, &e))?;

        let message = request.into_inner();
        match self
            .state
            .reader
            .get_availability(&message.item_name, &message.date)
            .await
        {
            Ok(availability) => Ok(respond(
                "GetAvailability",
                &request_id,
                started,
                AvailabilityReply {
                    item_name: availability.item_name,
                    date: availability.date,
                    available: availability.available,
                    booked_count: availability.booked_count,
                    total: availability.total,
                },
            )),
            Err(e) => Err(fail("GetAvailability", &request_id, started, &e)),
        }
    }

    async fn get_availability_bulk(
        &self,
        request: Request<GetAvailabilityBulkRequest>,
    ) -> Result<Response<GetAvailabilityBulkReply>, Status> {
        let started = Instant::now();
        let request_id = request_id_of(request.metadata());
        let client = authed_client(&request)?;
        client
            .require("read:availability")
            .map_err(|e| fail("GetAvailabilityBulk", &request_id, started, &e))?;

        let message = request.into_inner();
        match self
            .state
            .reader
            .get_availability_bulk(&message.items, &message.dates)
            .await
        {
            Ok(results) => {
                let results = results
                    .into_iter()
                    .map(|a| AvailabilityReply {
                        item_name: a.item_name,
                        date: a.date,
                        available: a.available,
                        booked_count: a.booked_count,
                        total: a.total,
                    })
                    .collect();
                Ok(respond(
                    "GetAvailabilityBulk",
                    &request_id,
                    started,
                    GetAvailabilityBulkReply { results },
                ))
            }
            Err(e) => Err(fail("GetAvailabilityBulk", &request_id, started, &e)),
        }
    }

    async fn list_items(
        &self,
        request: Request<ListItemsRequest>,
    ) -> Result<Response<ListItemsReply>, Status> {
        let started = Instant::now();
        let request_id = request_id_of(request.metadata());
        let client = authed_client(&request)?;
        client
            .require("read:items")
            .map_err(|e| fail("ListItems", &request_id, started, &e))?;

        match self.state.reader.list_items().await {
            Ok(items) => {
                let items = items
                    .into_iter()
                    .map(|item| Item {
                        id: item.id,
                        name: item.name,
                        description: item.description.unwrap_or_default(),
                        total_quantity: item.total_quantity,
                        sort_order: item.sort_order,
                    })
                    .collect();
                Ok(respond(
                    "ListItems",
                    &request_id,
                    started,
                    ListItemsReply { items },
                ))
            }
            Err(e) => Err(fail("ListItems", &request_id, started, &e)),
        }
    }
}

/// gRPC status for an error kind.
pub(crate) fn status_for(err: &GearbookError) -> Status {
    match err {
        GearbookError::InvalidArgument(_) => Status::invalid_argument(err.to_string()),
        GearbookError::NotFound { .. } => Status::not_found(err.to_string()),
        GearbookError::Unauthenticated(_) => Status::unauthenticated(err.to_string()),
        GearbookError::PermissionDenied(_) => Status::permission_denied(err.to_string()),
        GearbookError::TooManyRequests => Status::resource_exhausted(err.to_string()),
        GearbookError::Timeout { .. } => Status::deadline_exceeded(err.to_string()),
        GearbookError::SlotNotAvailable
        | GearbookError::ItemNotAvailable { .. }
        | GearbookError::SlotMisaligned(_)
        | GearbookError::TooLate
        | GearbookError::AlreadyFinalized(_) => Status::failed_precondition(err.to_string()),
        GearbookError::ConcurrentModification => Status::aborted(err.to_string()),
        _ => Status::internal("internal error"),
    }
}

/// The client the interceptor authenticated. Absent means the call bypassed
/// the interceptor; fail closed.
fn authed_client<T>(request: &Request<T>) -> Result<AuthedClient, Status> {
    request
        .extensions()
        .get::<AuthedClient>()
        .cloned()
        .ok_or_else(|| Status::unauthenticated("request skipped authentication"))
}

fn request_id_of(metadata: &MetadataMap) -> String {
    metadata
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn respond<T>(method: &str, request_id: &str, started: Instant, reply: T) -> Response<T> {
    let elapsed = started.elapsed();
    recording::record_grpc_request(method, "Ok", elapsed);
    debug!(
        method,
        request_id,
        elapsed_ms = elapsed.as_millis() as u64,
        "grpc request served"
    );
    let mut response = Response::new(reply);
    if let Ok(value) = MetadataValue::try_from(request_id) {
        response.metadata_mut().insert("x-request-id", value);
    }
    response
}

fn fail(method: &str, request_id: &str, started: Instant, err: &GearbookError) -> Status {
    let mut status = status_for(err);
    recording::record_grpc_request(method, &format!("{:?}", status.code()), started.elapsed());
    warn!(
        method,
        request_id,
        code = ?status.code(),
        error = %err,
        "grpc request failed"
    );
    if let Ok(value) = MetadataValue::try_from(request_id) {
        status.metadata_mut().insert("x-request-id", value);
    }
    status
}
