// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The sheet mirror contract: one row per booking plus a schedule view.

use async_trait::async_trait;
use gearbook_core::GearbookError;
use gearbook_core::types::{BookingSnapshot, BookingStatus, ScheduleRange};

/// Header row written above the schedule view.
pub const SCHEDULE_HEADER: [&str; 6] = ["date", "cabinet", "status", "start", "end", "slot minutes"];

/// One booking as mirrored to the external sheet.
///
/// Column order is fixed: id, user id, item id, date, status, user name,
/// user phone, item name, created_at, updated_at. The booking id in column A
/// is the row key; everything else is display data.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRow {
    pub id: i64,
    pub user_id: i64,
    /// Empty for cabinet bookings, which have no catalog item id.
    pub item_id: String,
    /// Calendar date for day bookings; `YYYY-MM-DD HH:MM-HH:MM` for hour bookings.
    pub date: String,
    pub status: String,
    pub user_name: String,
    pub user_phone: String,
    pub item_name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl BookingRow {
    /// Flattens a booking snapshot into its sheet representation.
    pub fn from_snapshot(snapshot: &BookingSnapshot) -> Self {
        match snapshot {
            BookingSnapshot::Day(b) => Self {
                id: b.id,
                user_id: b.user_id,
                item_id: b.item_id.to_string(),
                date: b.date.clone(),
                status: b.status.to_string(),
                user_name: b.user_name.clone().unwrap_or_default(),
                user_phone: b.user_phone.clone().unwrap_or_default(),
                item_name: b.item_name.clone(),
                created_at: b.created_at.clone(),
                updated_at: b.updated_at.clone(),
            },
            BookingSnapshot::Hour(b) => {
                let date = match (b.start_time.split_once('T'), b.end_time.split_once('T')) {
                    (Some((day, from)), Some((_, to))) => format!("{day} {from}-{to}"),
                    _ => b.start_time.clone(),
                };
                Self {
                    id: b.id,
                    user_id: b.user_id,
                    item_id: String::new(),
                    date,
                    status: b.status.to_string(),
                    user_name: b.client_name.clone(),
                    user_phone: b.client_phone.clone(),
                    item_name: b.item_name.clone().unwrap_or_default(),
                    created_at: b.created_at.clone(),
                    updated_at: b.updated_at.clone(),
                }
            }
        }
    }

    /// Cells in sheet column order A..J.
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.user_id.to_string(),
            self.item_id.clone(),
            self.date.clone(),
            self.status.clone(),
            self.user_name.clone(),
            self.user_phone.clone(),
            self.item_name.clone(),
            self.created_at.clone(),
            self.updated_at.clone(),
        ]
    }
}

/// One line of the schedule view: the effective opening window for a
/// (date, cabinet) pair after overrides are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRow {
    pub date: String,
    pub cabinet: String,
    pub closed: bool,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub slot_minutes: Option<i64>,
}

impl ScheduleRow {
    /// Cells in sheet column order A..F.
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.cabinet.clone(),
            if self.closed { "closed" } else { "open" }.to_string(),
            self.start_time.clone().unwrap_or_default(),
            self.end_time.clone().unwrap_or_default(),
            self.slot_minutes.map(|m| m.to_string()).unwrap_or_default(),
        ]
    }
}

/// Destination for booking mirror mutations.
///
/// Implementations must be idempotent: the sync worker replays tasks after
/// transient failures, so the same upsert or delete may arrive many times.
#[async_trait]
pub trait SheetWriter: Send + Sync {
    /// Writes the full row for a booking, creating it if absent.
    async fn upsert_row(&self, row: &BookingRow) -> Result<(), GearbookError>;

    /// Removes the row for a booking. A missing row is success.
    async fn delete_row(&self, booking_id: i64) -> Result<(), GearbookError>;

    /// Patches only the status and updated_at columns of an existing row.
    async fn update_status(
        &self,
        booking_id: i64,
        status: BookingStatus,
        updated_at: &str,
    ) -> Result<(), GearbookError>;

    /// Replaces the schedule view with freshly rendered rows.
    async fn write_schedule(
        &self,
        rows: &[ScheduleRow],
        range: &ScheduleRange,
    ) -> Result<(), GearbookError>;

    /// Cheap reachability probe used by health checks.
    async fn ping(&self) -> Result<(), GearbookError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearbook_core::types::{DayBooking, HourBooking};

    #[test]
    fn day_snapshot_flattens_in_column_order() {
        let snapshot = BookingSnapshot::Day(DayBooking {
            id: 7,
            user_id: 100,
            item_id: 3,
            item_name: "camera".into(),
            date: "2025-12-01".into(),
            status: BookingStatus::Pending,
            comment: None,
            version: 1,
            user_name: Some("Ada".into()),
            user_phone: Some("+15551234567".into()),
            created_at: "2025-11-20T09:00:00Z".into(),
            updated_at: "2025-11-20T09:00:00Z".into(),
        });

        let cells = BookingRow::from_snapshot(&snapshot).to_cells();
        assert_eq!(
            cells,
            vec![
                "7",
                "100",
                "3",
                "2025-12-01",
                "pending",
                "Ada",
                "+15551234567",
                "camera",
                "2025-11-20T09:00:00Z",
                "2025-11-20T09:00:00Z",
            ]
        );
    }

    #[test]
    fn hour_snapshot_uses_interval_label_and_blank_item_id() {
        let snapshot = BookingSnapshot::Hour(HourBooking {
            id: 12,
            user_id: 200,
            cabinet_id: 1,
            item_name: None,
            client_name: "Grace".into(),
            client_phone: "+15557654321".into(),
            start_time: "2025-12-01T10:00".into(),
            end_time: "2025-12-01T12:00".into(),
            status: BookingStatus::Confirmed,
            comment: None,
            created_at: "2025-11-20T09:00:00Z".into(),
            updated_at: "2025-11-21T09:00:00Z".into(),
        });

        let row = BookingRow::from_snapshot(&snapshot);
        assert_eq!(row.date, "2025-12-01 10:00-12:00");
        assert_eq!(row.item_id, "");
        assert_eq!(row.user_name, "Grace");
        assert_eq!(row.status, "confirmed");
    }

    #[test]
    fn closed_schedule_row_blanks_the_window() {
        let row = ScheduleRow {
            date: "2025-12-01".into(),
            cabinet: "Main hall".into(),
            closed: true,
            start_time: None,
            end_time: None,
            slot_minutes: None,
        };
        assert_eq!(
            row.to_cells(),
            vec!["2025-12-01", "Main hall", "closed", "", "", ""]
        );
    }

    #[test]
    fn open_schedule_row_renders_the_window() {
        let row = ScheduleRow {
            date: "2025-12-02".into(),
            cabinet: "Main hall".into(),
            closed: false,
            start_time: Some("09:00".into()),
            end_time: Some("18:00".into()),
            slot_minutes: Some(60),
        };
        assert_eq!(
            row.to_cells(),
            vec!["2025-12-02", "Main hall", "open", "09:00", "18:00", "60"]
        );
    }
}
