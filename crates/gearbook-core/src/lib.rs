// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Gearbook reservation service.
//!
//! This crate provides the error enum, shared domain types, wire-format
//! validation, and the clock abstraction used throughout the workspace.
//! Storage, transport, and runtime concerns live in the crates that own
//! them.

pub mod clock;
pub mod error;
pub mod types;
pub mod validate;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, SystemClock, schedule_weekday};
pub use error::GearbookError;
pub use types::{ActorRole, BookingStatus, SyncTaskStatus, SyncTaskType};

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn booking_status_round_trips_through_strings() {
        let all = [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Approved,
            BookingStatus::Rejected,
            BookingStatus::Canceled,
            BookingStatus::Completed,
        ];
        for status in all {
            let s = status.to_string();
            let parsed = BookingStatus::from_str(&s).expect("should parse back");
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn canceled_writes_new_spelling_tolerates_legacy() {
        assert_eq!(BookingStatus::Canceled.to_string(), "canceled");
        assert_eq!(
            BookingStatus::from_str("cancelled").expect("legacy spelling parses"),
            BookingStatus::Canceled
        );
        // serde accepts both spellings too.
        let parsed: BookingStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, BookingStatus::Canceled);
        assert_eq!(
            serde_json::to_string(&BookingStatus::Canceled).unwrap(),
            "\"canceled\""
        );
    }

    #[test]
    fn active_and_terminal_sets() {
        assert!(BookingStatus::Pending.is_active());
        assert!(BookingStatus::Confirmed.is_active());
        assert!(BookingStatus::Approved.is_active());
        assert!(!BookingStatus::Canceled.is_active());
        assert!(!BookingStatus::Rejected.is_active());
        assert!(!BookingStatus::Completed.is_active());

        assert!(BookingStatus::Canceled.is_terminal());
        assert!(BookingStatus::Rejected.is_terminal());
        assert!(!BookingStatus::Completed.is_terminal());
        assert!(!BookingStatus::Pending.is_terminal());
    }

    #[test]
    fn sync_task_type_uses_snake_case() {
        assert_eq!(SyncTaskType::Upsert.to_string(), "upsert");
        assert_eq!(SyncTaskType::UpdateStatus.to_string(), "update_status");
        assert_eq!(SyncTaskType::SyncSchedule.to_string(), "sync_schedule");
        assert_eq!(
            SyncTaskType::from_str("update_status").unwrap(),
            SyncTaskType::UpdateStatus
        );
    }

    #[test]
    fn error_variants_carry_business_kinds() {
        let not_available = GearbookError::ItemNotAvailable {
            item: "camera".into(),
            date: "2025-12-01".into(),
        };
        assert!(not_available.is_retriable_by_user());
        assert!(GearbookError::SlotNotAvailable.is_retriable_by_user());
        assert!(!GearbookError::ConcurrentModification.is_retriable_by_user());
        assert!(!GearbookError::TooManyRequests.is_retriable_by_user());

        let msg = GearbookError::NotFound {
            what: "item",
            name: "ghost".into(),
        }
        .to_string();
        assert_eq!(msg, "item not found: ghost");
    }
}
