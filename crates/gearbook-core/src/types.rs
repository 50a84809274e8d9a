// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Gearbook workspace.
//!
//! Dates travel as `YYYY-MM-DD` strings, times-of-day as `HH:MM`, and hour
//! booking boundaries as naive local datetimes `YYYY-MM-DDTHH:MM`. All three
//! are fixed-width, so lexicographic order equals chronological order and the
//! storage layer can compare them directly.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle status of a booking row.
///
/// `pending`, `confirmed`, and `approved` are "active" and count toward
/// capacity. `canceled` and `rejected` are terminal. All new writes use the
/// `canceled` spelling; the legacy `cancelled` form is accepted on read.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Approved,
    Rejected,
    #[strum(to_string = "canceled", serialize = "cancelled")]
    #[serde(alias = "cancelled")]
    Canceled,
    Completed,
}

impl BookingStatus {
    /// Active statuses count toward day capacity and hour-slot exclusion.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::Approved
        )
    }

    /// Terminal statuses can never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Canceled | BookingStatus::Rejected)
    }
}

/// Kind of outbound mirroring work carried by a sync task.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncTaskType {
    /// Write the full booking snapshot to the sheet row keyed by booking id.
    Upsert,
    /// Remove the sheet row for the booking id.
    Delete,
    /// Patch only the status and updated_at columns.
    UpdateStatus,
    /// Re-render the schedule view for a date range.
    SyncSchedule,
}

/// Lifecycle status of a sync task.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncTaskStatus {
    Pending,
    Retry,
    Completed,
    Failed,
}

/// Role of the actor requesting a status transition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    User,
    Manager,
}

/// A rentable catalog item with per-day capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub total_quantity: i64,
    pub sort_order: i64,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A bookable cabinet room governed by a weekly schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cabinet {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// One weekly schedule row. At most one active row per (cabinet, weekday).
///
/// `day_of_week` uses Monday=1 .. Sunday=7.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub id: i64,
    pub cabinet_id: i64,
    pub day_of_week: u32,
    pub start_time: String,
    pub end_time: String,
    pub slot_duration_minutes: i64,
    pub active: bool,
}

/// A per-date exception applied on top of the weekly schedule.
///
/// `is_closed` removes all slots for the day; otherwise the non-empty
/// start/end fields replace the weekly window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOverride {
    pub id: i64,
    pub cabinet_id: i64,
    pub date: String,
    pub is_closed: bool,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// A day-granular reservation of a catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayBooking {
    pub id: i64,
    pub user_id: i64,
    pub item_id: i64,
    /// Item name snapshot taken at creation; survives later catalog renames.
    pub item_name: String,
    pub date: String,
    pub status: BookingStatus,
    pub comment: Option<String>,
    /// Optimistic-lock counter; starts at 1, increments by exactly 1 per update.
    pub version: i64,
    pub user_name: Option<String>,
    pub user_phone: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// An hour-granular reservation of a cabinet.
///
/// `start_time`/`end_time` are naive local datetimes `YYYY-MM-DDTHH:MM`
/// on the same calendar day, aligned to the cabinet's schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourBooking {
    pub id: i64,
    pub user_id: i64,
    pub cabinet_id: i64,
    /// Optional external item reference cross-checked against day capacity.
    pub item_name: Option<String>,
    pub client_name: String,
    pub client_phone: String,
    pub start_time: String,
    pub end_time: String,
    pub status: BookingStatus,
    pub comment: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating a day booking; ids and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewDayBooking {
    pub user_id: i64,
    pub item_id: i64,
    pub item_name: String,
    pub date: String,
    pub comment: Option<String>,
    pub user_name: Option<String>,
    pub user_phone: Option<String>,
}

/// Input for creating an hour booking.
#[derive(Debug, Clone)]
pub struct NewHourBooking {
    pub user_id: i64,
    pub cabinet_id: i64,
    pub item_name: Option<String>,
    pub client_name: String,
    pub client_phone: String,
    pub start_time: String,
    pub end_time: String,
    pub comment: Option<String>,
}

/// A durable outbound sync task mirroring one booking mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTask {
    pub id: i64,
    pub task_type: SyncTaskType,
    /// Absent for schedule re-renders, which are not tied to one booking.
    pub booking_id: Option<i64>,
    /// Opaque JSON payload; decoded by the worker per task type.
    pub payload: String,
    pub status: SyncTaskStatus,
    pub retry_count: i64,
    pub last_error: Option<String>,
    pub created_at: String,
    pub processed_at: Option<String>,
    pub next_retry_at: Option<String>,
}

/// Payload of an `upsert` sync task: the full booking as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookingSnapshot {
    Day(DayBooking),
    Hour(HourBooking),
}

/// Payload of an `update_status` sync task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPatch {
    pub booking_id: i64,
    pub status: BookingStatus,
    pub updated_at: String,
}

/// Payload of a `sync_schedule` task. Empty bounds fall back to the worker's
/// default window (one month back, two months ahead).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

/// A chat user known to the service; keyed by the external chat user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub blacklisted: bool,
    pub created_at: String,
    pub updated_at: String,
}
