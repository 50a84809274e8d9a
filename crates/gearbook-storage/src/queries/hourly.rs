// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hour-booking operations.
//!
//! Intervals are half-open `[start_time, end_time)` naive local datetimes
//! (`YYYY-MM-DDTHH:MM`). Two intervals overlap exactly when
//! `a.start < b.end AND a.end > b.start`, which the fixed-width encoding lets
//! SQLite evaluate as plain text comparison. The overlap check, the insert,
//! and the sync-queue insert share one transaction.

use gearbook_core::GearbookError;
use gearbook_core::types::{BookingSnapshot, BookingStatus, StatusPatch, SyncTaskType};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{HourBooking, NewHourBooking};
use crate::queries::{parse_enum, sync_queue};

fn row_to_booking(row: &rusqlite::Row) -> Result<HourBooking, rusqlite::Error> {
    Ok(HourBooking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        cabinet_id: row.get(2)?,
        item_name: row.get(3)?,
        client_name: row.get(4)?,
        client_phone: row.get(5)?,
        start_time: row.get(6)?,
        end_time: row.get(7)?,
        status: parse_enum(8, row.get(8)?)?,
        comment: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn get_tx(tx: &rusqlite::Transaction<'_>, id: i64) -> Result<Option<HourBooking>, rusqlite::Error> {
    tx.query_row(
        "SELECT id, user_id, cabinet_id, item_name, client_name, client_phone,
                start_time, end_time, status, comment, created_at, updated_at
         FROM hourly_bookings WHERE id = ?1",
        params![id],
        row_to_booking,
    )
    .optional()
}

fn snapshot_payload(booking: &HourBooking) -> Result<String, rusqlite::Error> {
    serde_json::to_string(&BookingSnapshot::Hour(booking.clone()))
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn patch_payload(booking: &HourBooking) -> Result<String, rusqlite::Error> {
    let patch = StatusPatch {
        booking_id: booking.id,
        status: booking.status,
        updated_at: booking.updated_at.clone(),
    };
    serde_json::to_string(&patch).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

/// Result of an overlap-checked create.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateHourOutcome {
    Created(HourBooking),
    /// An active booking already occupies part of the interval.
    Overlap,
}

/// Result of a status transition on an hour booking.
#[derive(Debug, Clone, PartialEq)]
pub enum HourStatusOutcome {
    Updated(HourBooking),
    NotFound,
    AlreadyTerminal { status: BookingStatus },
}

/// Result of an owner-initiated cancellation of an hour booking.
#[derive(Debug, Clone, PartialEq)]
pub enum HourCancelOutcome {
    Canceled(HourBooking),
    NotFound,
    NotOwner,
    /// The interval has already started.
    TooLate,
    AlreadyFinalized { status: BookingStatus },
}

/// Create an hour booking if no active booking overlaps the interval.
///
/// On success the booking (status `pending`) and its `upsert` sync task are
/// committed together.
pub async fn create_hour_booking(
    db: &Database,
    new: NewHourBooking,
) -> Result<CreateHourOutcome, GearbookError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let overlapping: i64 = tx.query_row(
                "SELECT COUNT(*) FROM hourly_bookings
                 WHERE cabinet_id = ?1 AND start_time < ?2 AND end_time > ?3
                   AND status IN ('pending', 'confirmed', 'approved')",
                params![new.cabinet_id, new.end_time, new.start_time],
                |row| row.get(0),
            )?;
            if overlapping > 0 {
                tx.commit()?;
                return Ok(CreateHourOutcome::Overlap);
            }

            tx.execute(
                "INSERT INTO hourly_bookings
                     (user_id, cabinet_id, item_name, client_name, client_phone,
                      start_time, end_time, comment)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    new.user_id,
                    new.cabinet_id,
                    new.item_name,
                    new.client_name,
                    new.client_phone,
                    new.start_time,
                    new.end_time,
                    new.comment,
                ],
            )?;
            let id = tx.last_insert_rowid();
            let booking = match get_tx(&tx, id)? {
                Some(b) => b,
                None => return Err(rusqlite::Error::QueryReturnedNoRows),
            };

            let payload = snapshot_payload(&booking)?;
            sync_queue::enqueue_tx(&tx, SyncTaskType::Upsert, Some(booking.id), &payload)?;

            tx.commit()?;
            Ok(CreateHourOutcome::Created(booking))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Active intervals for (cabinet, date) as `(start_time, end_time)` pairs,
/// ordered by start. The slot generator marks these as unavailable.
pub async fn busy_intervals(
    db: &Database,
    cabinet_id: i64,
    date: &str,
) -> Result<Vec<(String, String)>, GearbookError> {
    let lo = format!("{date}T00:00");
    let hi = format!("{date}T23:59");
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT start_time, end_time FROM hourly_bookings
                 WHERE cabinet_id = ?1 AND start_time >= ?2 AND start_time <= ?3
                   AND status IN ('pending', 'confirmed', 'approved')
                 ORDER BY start_time ASC",
            )?;
            let rows = stmt.query_map(params![cabinet_id, lo, hi], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            let mut intervals = Vec::new();
            for row in rows {
                intervals.push(row?);
            }
            Ok(intervals)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Transition an hour booking to `new_status` and enqueue the status patch.
pub async fn change_status(
    db: &Database,
    booking_id: i64,
    new_status: BookingStatus,
) -> Result<HourStatusOutcome, GearbookError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let current = match get_tx(&tx, booking_id)? {
                Some(b) => b,
                None => {
                    tx.commit()?;
                    return Ok(HourStatusOutcome::NotFound);
                }
            };
            if current.status.is_terminal() {
                tx.commit()?;
                return Ok(HourStatusOutcome::AlreadyTerminal {
                    status: current.status,
                });
            }

            tx.execute(
                "UPDATE hourly_bookings SET status = ?1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![new_status.to_string(), booking_id],
            )?;

            let booking = match get_tx(&tx, booking_id)? {
                Some(b) => b,
                None => return Err(rusqlite::Error::QueryReturnedNoRows),
            };
            let payload = patch_payload(&booking)?;
            sync_queue::enqueue_tx(&tx, SyncTaskType::UpdateStatus, Some(booking.id), &payload)?;

            tx.commit()?;
            Ok(HourStatusOutcome::Updated(booking))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Owner-initiated cancellation with distinct rejection reasons.
///
/// `now` is the current naive local datetime `YYYY-MM-DDTHH:MM`; once the
/// interval's start is reached the owner can no longer cancel.
pub async fn cancel_owned(
    db: &Database,
    booking_id: i64,
    user_id: i64,
    now: &str,
) -> Result<HourCancelOutcome, GearbookError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let current = match get_tx(&tx, booking_id)? {
                Some(b) => b,
                None => {
                    tx.commit()?;
                    return Ok(HourCancelOutcome::NotFound);
                }
            };
            if current.user_id != user_id {
                tx.commit()?;
                return Ok(HourCancelOutcome::NotOwner);
            }
            if current.status.is_terminal() {
                tx.commit()?;
                return Ok(HourCancelOutcome::AlreadyFinalized {
                    status: current.status,
                });
            }
            if current.start_time <= now {
                tx.commit()?;
                return Ok(HourCancelOutcome::TooLate);
            }

            tx.execute(
                "UPDATE hourly_bookings SET status = 'canceled',
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![booking_id],
            )?;

            let booking = match get_tx(&tx, booking_id)? {
                Some(b) => b,
                None => return Err(rusqlite::Error::QueryReturnedNoRows),
            };
            let payload = patch_payload(&booking)?;
            sync_queue::enqueue_tx(&tx, SyncTaskType::UpdateStatus, Some(booking.id), &payload)?;

            tx.commit()?;
            Ok(HourCancelOutcome::Canceled(booking))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get(db: &Database, id: i64) -> Result<Option<HourBooking>, GearbookError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, user_id, cabinet_id, item_name, client_name, client_phone,
                        start_time, end_time, status, comment, created_at, updated_at
                 FROM hourly_bookings WHERE id = ?1",
                params![id],
                row_to_booking,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of active hour bookings held by a user, for per-user caps.
pub async fn active_count_for_user(db: &Database, user_id: i64) -> Result<i64, GearbookError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM hourly_bookings
                 WHERE user_id = ?1 AND status IN ('pending', 'confirmed', 'approved')",
                params![user_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}
