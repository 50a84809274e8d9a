// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Gearbook reservation service.

use thiserror::Error;

/// The primary error type used across all Gearbook crates.
///
/// Business kinds (capacity, overlap, alignment, version conflicts) are
/// distinct variants so callers can branch on them; the API layer maps each
/// kind to a stable HTTP status / gRPC code.
#[derive(Debug, Error)]
pub enum GearbookError {
    /// Configuration errors (invalid YAML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Spreadsheet client errors (transport failure, non-success response).
    #[error("sheet error: {message}")]
    Sheet {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Flow-state backend errors (remote key-value store unreachable).
    #[error("state error: {message}")]
    State {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed caller input (bad date, empty list, unparseable time label).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced entity does not exist.
    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },

    /// Missing or wrong authentication credentials.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The caller is authenticated but lacks the required permission or role.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// An active reservation already occupies the requested interval.
    #[error("slot not available")]
    SlotNotAvailable,

    /// Day capacity for the item is exhausted on the requested date.
    #[error("item {item} not available on {date}")]
    ItemNotAvailable { item: String, date: String },

    /// Requested interval falls outside the schedule window or breaks alignment.
    #[error("slot misaligned: {0}")]
    SlotMisaligned(String),

    /// Optimistic-lock version mismatch; caller should re-read and retry.
    #[error("concurrent modification")]
    ConcurrentModification,

    /// The booking's start has already been reached; too late to cancel.
    #[error("too late: booking already started")]
    TooLate,

    /// The booking is in a terminal status and cannot change further.
    #[error("already finalized: {0}")]
    AlreadyFinalized(String),

    /// Token-bucket denial.
    #[error("too many requests")]
    TooManyRequests,

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GearbookError {
    /// True for the business kinds the engine surfaces when a reservation
    /// cannot be placed but the caller's draft is still usable (the front-end
    /// reprompts instead of aborting the flow).
    pub fn is_retriable_by_user(&self) -> bool {
        matches!(
            self,
            GearbookError::SlotNotAvailable
                | GearbookError::ItemNotAvailable { .. }
                | GearbookError::SlotMisaligned(_)
        )
    }
}
