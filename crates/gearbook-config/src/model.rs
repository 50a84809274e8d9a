// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Gearbook reservation service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Gearbook configuration.
///
/// Loaded from a YAML file (path from `GEARBOOK_CONFIG_PATH` / `CONFIG_PATH`)
/// with `${ENV_VAR}` expansion, then environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GearbookConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP and gRPC server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// API authentication, authorization, and rate limiting.
    #[serde(default)]
    pub api: ApiConfig,

    /// Booking policy (advance windows, per-user caps).
    #[serde(default)]
    pub booking: BookingConfig,

    /// Read-through cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Sync queue and worker settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// External spreadsheet mirror settings.
    #[serde(default)]
    pub sheets: SheetsConfig,

    /// User flow state store settings.
    #[serde(default)]
    pub state: StateConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service instance.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "gearbook".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("gearbook").join("gearbook.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("gearbook.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// HTTP and gRPC server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_http_bind")]
    pub http_bind: String,

    /// Address the gRPC server binds to. Empty string disables gRPC.
    #[serde(default = "default_grpc_bind")]
    pub grpc_bind: String,

    /// Timeout for reading request headers, in seconds.
    #[serde(default = "default_read_header_timeout_secs")]
    pub read_header_timeout_secs: u64,

    /// Timeout for writing a response, in seconds.
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind: default_http_bind(),
            grpc_bind: default_grpc_bind(),
            read_header_timeout_secs: default_read_header_timeout_secs(),
            write_timeout_secs: default_write_timeout_secs(),
        }
    }
}

fn default_http_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_grpc_bind() -> String {
    "0.0.0.0:50051".to_string()
}

fn default_read_header_timeout_secs() -> u64 {
    5
}

fn default_write_timeout_secs() -> u64 {
    15
}

/// API authentication, authorization, and rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Header carrying the primary API key.
    #[serde(default = "default_key_header")]
    pub key_header: String,

    /// Header carrying the secondary token (compared constant-time).
    #[serde(default = "default_extra_header")]
    pub extra_header: String,

    /// Require authentication on the availability routes. When false, every
    /// request is treated as an anonymous allow-all client (local dev only).
    #[serde(default = "default_require_auth")]
    pub require_auth: bool,

    /// Configured API clients.
    #[serde(default)]
    pub clients: Vec<ApiClientConfig>,

    /// Steady token-bucket refill rate, requests per second per key.
    #[serde(default = "default_rate_limit_rps")]
    pub rate_limit_rps: f64,

    /// Token-bucket burst capacity per key.
    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key_header: default_key_header(),
            extra_header: default_extra_header(),
            require_auth: default_require_auth(),
            clients: Vec::new(),
            rate_limit_rps: default_rate_limit_rps(),
            rate_limit_burst: default_rate_limit_burst(),
        }
    }
}

fn default_key_header() -> String {
    "x-api-key".to_string()
}

fn default_extra_header() -> String {
    "x-api-extra".to_string()
}

fn default_require_auth() -> bool {
    true
}

fn default_rate_limit_rps() -> f64 {
    10.0
}

fn default_rate_limit_burst() -> u32 {
    20
}

/// One configured API client.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiClientConfig {
    /// Human-readable client name, used in logs.
    #[serde(default)]
    pub name: String,

    /// Primary API key (matched against the key header).
    pub key: String,

    /// Secondary token (matched constant-time against the extra header).
    pub extra: String,

    /// Granted permissions. An empty list means allow-all.
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Booking policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BookingConfig {
    /// Minimum advance notice for a booking start, in minutes.
    #[serde(default = "default_min_advance_minutes")]
    pub min_advance_minutes: i64,

    /// Maximum advance window for hour bookings, in days.
    #[serde(default = "default_max_advance_days_hour")]
    pub max_advance_days_hour: i64,

    /// Maximum advance window for day bookings, in days.
    #[serde(default = "default_max_advance_days_day")]
    pub max_advance_days_day: i64,

    /// Cap on concurrent active bookings per user. `None` means no cap.
    #[serde(default)]
    pub max_active_per_user: Option<u32>,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            min_advance_minutes: default_min_advance_minutes(),
            max_advance_days_hour: default_max_advance_days_hour(),
            max_advance_days_day: default_max_advance_days_day(),
            max_active_per_user: None,
        }
    }
}

fn default_min_advance_minutes() -> i64 {
    60
}

fn default_max_advance_days_hour() -> i64 {
    30
}

fn default_max_advance_days_day() -> i64 {
    365
}

/// Read-through cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Item catalog cache TTL, in minutes.
    #[serde(default = "default_items_ttl_minutes")]
    pub items_ttl_minutes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            items_ttl_minutes: default_items_ttl_minutes(),
        }
    }
}

fn default_items_ttl_minutes() -> u64 {
    30
}

/// Sync queue and worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// First retry delay, in seconds.
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,

    /// Multiplier applied per additional attempt.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Ceiling on the retry delay, in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    /// Retries before a task is dead-lettered.
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,

    /// Due tasks fetched per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Sleep between empty polls, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Per-task handler timeout, in seconds.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Redis URL for the shared remote task queue. `None` disables it.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Redis list key for the remote task queue.
    #[serde(default = "default_queue_key")]
    pub queue_key: String,

    /// Redis list key for the dead-letter tier.
    #[serde(default = "default_dead_letter_key")]
    pub dead_letter_key: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay_secs(),
            backoff_factor: default_backoff_factor(),
            max_delay_secs: default_max_delay_secs(),
            max_retries: default_max_retries(),
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval_secs(),
            task_timeout_secs: default_task_timeout_secs(),
            redis_url: None,
            queue_key: default_queue_key(),
            dead_letter_key: default_dead_letter_key(),
        }
    }
}

fn default_initial_delay_secs() -> u64 {
    2
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_delay_secs() -> u64 {
    60
}

fn default_max_retries() -> i64 {
    5
}

fn default_batch_size() -> i64 {
    20
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_task_timeout_secs() -> u64 {
    30
}

fn default_queue_key() -> String {
    "gearbook:sync".to_string()
}

fn default_dead_letter_key() -> String {
    "gearbook:sync:dead".to_string()
}

/// External spreadsheet mirror configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SheetsConfig {
    /// Sheet backend: `memory` (local dev) or `http`.
    #[serde(default = "default_sheets_backend")]
    pub backend: String,

    /// Base URL of the spreadsheet values API, including the spreadsheet id.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token for the values API.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Tab holding one row per booking.
    #[serde(default = "default_bookings_sheet")]
    pub bookings_sheet: String,

    /// Tab holding the rendered schedule view.
    #[serde(default = "default_schedule_sheet")]
    pub schedule_sheet: String,

    /// Per-request timeout, in seconds.
    #[serde(default = "default_sheets_timeout_secs")]
    pub timeout_secs: u64,

    /// Row cache refresh interval (full column A scan), in seconds.
    #[serde(default = "default_row_cache_refresh_secs")]
    pub row_cache_refresh_secs: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            backend: default_sheets_backend(),
            base_url: None,
            api_token: None,
            bookings_sheet: default_bookings_sheet(),
            schedule_sheet: default_schedule_sheet(),
            timeout_secs: default_sheets_timeout_secs(),
            row_cache_refresh_secs: default_row_cache_refresh_secs(),
        }
    }
}

fn default_sheets_backend() -> String {
    "memory".to_string()
}

fn default_bookings_sheet() -> String {
    "Bookings".to_string()
}

fn default_schedule_sheet() -> String {
    "Schedule".to_string()
}

fn default_sheets_timeout_secs() -> u64 {
    10
}

fn default_row_cache_refresh_secs() -> u64 {
    300
}

/// User flow state store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    /// State backend: `memory` or `redis` (with in-memory failover).
    #[serde(default = "default_state_backend")]
    pub backend: String,

    /// Redis URL for the primary state store.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Flow state TTL, in seconds.
    #[serde(default = "default_state_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: default_state_backend(),
            redis_url: None,
            ttl_secs: default_state_ttl_secs(),
        }
    }
}

fn default_state_backend() -> String {
    "memory".to_string()
}

fn default_state_ttl_secs() -> u64 {
    86_400 // 24 hours
}
