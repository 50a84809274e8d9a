// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `gearbook serve` command implementation.
//!
//! Starts the full reservation service: SQLite storage, catalog seeding,
//! the spreadsheet mirror with its sync worker, the user flow state store,
//! the reservation engine, and the HTTP and gRPC availability servers.
//! Supports graceful shutdown via signal handlers; a failed server cancels
//! the shared token so the rest of the process winds down with it.

use std::sync::Arc;
use std::time::Duration;

use gearbook_api::{
    ApiAuth, ApiClient, ApiState, RateLimiter, ServerSettings, serve_grpc, serve_http,
};
use gearbook_config::GearbookConfig;
use gearbook_core::{GearbookError, SystemClock};
use gearbook_engine::{AvailabilityReader, BookingPolicy, ItemCache, ReservationEngine};
use gearbook_sheets::{HttpSheetClient, MemorySheet, SheetWriter};
use gearbook_state::{FailoverStateStore, FlowStateStore, MemoryStateStore, RedisStateStore};
use gearbook_storage::Database;
use gearbook_sync::{RemoteQueue, RetryPolicy, SyncWorker, WorkerOptions};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::seed;
use crate::shutdown;

/// Runs the `gearbook serve` command.
///
/// Initializes every subsystem in dependency order, installs the signal
/// handler, then runs the sync worker and both servers until shutdown.
pub async fn run_serve(config: GearbookConfig) -> Result<(), GearbookError> {
    // Initialize tracing subscriber.
    init_tracing(&config.service.log_level);

    info!(service = config.service.name.as_str(), "starting gearbook serve");

    // Initialize storage.
    let db = Arc::new(Database::open(&config.storage.database_path).await?);
    if !config.storage.wal_mode {
        db.disable_wal().await?;
    }

    // Seed the catalog when an items file is configured.
    match seed::resolve_items_path() {
        Some(path) => {
            let report = seed::seed_catalog(&db, &path).await?;
            info!(
                path = %path.display(),
                items = report.items,
                cabinets = report.cabinets,
                "catalog seeded"
            );
        }
        None => debug!("no items file configured, skipping catalog seeding"),
    }

    // Initialize Prometheus metrics.
    let prometheus_handle = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gearbook_api::recording::register_metrics();
            info!("prometheus metrics enabled");
            Some(handle)
        }
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    };

    // Render function for the /metrics endpoint.
    let metrics_render: Option<Arc<dyn Fn() -> String + Send + Sync>> =
        prometheus_handle.map(|handle| {
            Arc::new(move || handle.render()) as Arc<dyn Fn() -> String + Send + Sync>
        });

    // Initialize the sheet mirror backend.
    let sheet: Arc<dyn SheetWriter> = match config.sheets.backend.as_str() {
        "http" => {
            let base_url = config.sheets.base_url.clone().ok_or_else(|| {
                GearbookError::Config("sheets.backend = \"http\" requires sheets.base_url".to_string())
            })?;
            let client = HttpSheetClient::new(
                base_url,
                config.sheets.api_token.clone(),
                config.sheets.bookings_sheet.clone(),
                config.sheets.schedule_sheet.clone(),
                Duration::from_secs(config.sheets.timeout_secs),
                Duration::from_secs(config.sheets.row_cache_refresh_secs),
            )?;
            info!(
                bookings_sheet = config.sheets.bookings_sheet.as_str(),
                schedule_sheet = config.sheets.schedule_sheet.as_str(),
                "http sheet mirror configured"
            );
            Arc::new(client)
        }
        _ => {
            info!("memory sheet mirror configured (local dev)");
            Arc::new(MemorySheet::new())
        }
    };

    // Assemble the sync worker.
    let retry_policy = RetryPolicy {
        initial_delay: Duration::from_secs(config.sync.initial_delay_secs),
        backoff_factor: config.sync.backoff_factor,
        max_delay: Duration::from_secs(config.sync.max_delay_secs),
        max_retries: config.sync.max_retries,
    };
    let worker_options = WorkerOptions {
        batch_size: config.sync.batch_size,
        poll_interval: Duration::from_secs(config.sync.poll_interval_secs),
        task_timeout: Duration::from_secs(config.sync.task_timeout_secs),
    };
    let mut worker = SyncWorker::new(db.clone(), sheet.clone(), retry_policy, worker_options);
    if let Some(ref url) = config.sync.redis_url {
        let remote = RemoteQueue::connect(url, &config.sync.queue_key, &config.sync.dead_letter_key)
            .await?;
        worker = worker.with_remote(remote);
        info!(
            queue = config.sync.queue_key.as_str(),
            dead_letter = config.sync.dead_letter_key.as_str(),
            "remote sync queue connected"
        );
    } else {
        debug!("no remote sync queue configured");
    }

    // Connect the user flow state store; the booking front-end reads and
    // writes it, serve connects it at startup.
    let _flow_state: Arc<dyn FlowStateStore> = match config.state.backend.as_str() {
        "redis" => {
            let url = config.state.redis_url.clone().ok_or_else(|| {
                GearbookError::Config("state.backend = \"redis\" requires state.redis_url".to_string())
            })?;
            let ttl = Duration::from_secs(config.state.ttl_secs);
            let redis = RedisStateStore::connect(&url, ttl).await?;
            info!("redis flow state store connected");
            Arc::new(FailoverStateStore::new(redis, MemoryStateStore::new(ttl)))
        }
        _ => {
            debug!("memory flow state store configured");
            Arc::new(MemoryStateStore::new(Duration::from_secs(config.state.ttl_secs)))
        }
    };

    // Build the reservation engine and the availability reader. The booking
    // front-end drives the engine; the API serves reads through the reader.
    let cache = Arc::new(ItemCache::new(Duration::from_secs(
        config.cache.items_ttl_minutes * 60,
    )));
    let policy = BookingPolicy {
        min_advance_minutes: config.booking.min_advance_minutes,
        max_advance_days_hour: config.booking.max_advance_days_hour,
        max_advance_days_day: config.booking.max_advance_days_day,
        max_active_per_user: config.booking.max_active_per_user,
    };
    let _engine = ReservationEngine::new(db.clone(), cache.clone(), Arc::new(SystemClock), policy)
        .with_sync_hint(worker.hint_sender());
    let reader = AvailabilityReader::new(db.clone(), cache.clone());

    // API authentication and rate limiting.
    if config.api.require_auth && config.api.clients.is_empty() {
        warn!("api.require_auth is on with no configured clients, every request will be rejected");
    }
    let clients: Vec<ApiClient> = config
        .api
        .clients
        .iter()
        .map(|c| ApiClient {
            name: c.name.clone(),
            key: c.key.clone(),
            extra: c.extra.clone(),
            permissions: c.permissions.clone(),
        })
        .collect();
    let auth = Arc::new(ApiAuth::new(
        config.api.key_header.clone(),
        config.api.extra_header.clone(),
        config.api.require_auth,
        clients,
    ));
    let limiter = Arc::new(RateLimiter::new(
        config.api.rate_limit_rps,
        config.api.rate_limit_burst,
    ));
    info!(
        clients = config.api.clients.len(),
        require_auth = config.api.require_auth,
        rate_limit_rps = config.api.rate_limit_rps,
        "api access control configured"
    );

    let state = ApiState {
        reader,
        auth,
        limiter,
        db: db.clone(),
        sheet: sheet.clone(),
        request_timeout: Duration::from_secs(config.server.write_timeout_secs),
        metrics_render,
    };

    let settings = ServerSettings {
        http_bind: config.server.http_bind.clone(),
        grpc_bind: config.server.grpc_bind.clone(),
    };

    // Install signal handler.
    let cancel = shutdown::install_signal_handler();

    // Run the sync worker in the background.
    let worker_handle = tokio::spawn(worker.run(cancel.clone()));

    // Run both servers. A server that exits with an error cancels the shared
    // token so the other server and the worker wind down with it.
    let http_handle = {
        let settings = settings.clone();
        let state = state.clone();
        let server_cancel = cancel.clone();
        let trip = cancel.clone();
        tokio::spawn(async move {
            let result = serve_http(&settings, state, server_cancel).await;
            if let Err(ref e) = result {
                error!(error = %e, "http server exited with error");
                trip.cancel();
            }
            result
        })
    };
    let grpc_handle = {
        let settings = settings.clone();
        let state = state.clone();
        let server_cancel = cancel.clone();
        let trip = cancel.clone();
        tokio::spawn(async move {
            let result = serve_grpc(&settings, state, server_cancel).await;
            if let Err(ref e) = result {
                error!(error = %e, "grpc server exited with error");
                trip.cancel();
            }
            result
        })
    };

    let http_result = join_server(http_handle).await;
    let grpc_result = join_server(grpc_handle).await;

    worker_handle
        .await
        .map_err(|e| GearbookError::Internal(format!("sync worker task panicked: {e}")))?;

    http_result?;
    grpc_result?;

    info!("gearbook serve shutdown complete");
    Ok(())
}

/// Unwraps a joined server task, mapping a panic into an internal error.
async fn join_server(handle: JoinHandle<Result<(), GearbookError>>) -> Result<(), GearbookError> {
    match handle.await {
        Ok(result) => result,
        Err(e) => Err(GearbookError::Internal(format!("server task panicked: {e}"))),
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gearbook={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
