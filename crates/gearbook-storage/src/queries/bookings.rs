// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Day-booking operations.
//!
//! Capacity checks, the booking write, and the sync-queue insert happen in
//! one transaction, so a committed booking always respects the per-day
//! capacity of its item and always has its mirror task. Business rejections
//! (full day, stale version) come back as outcome values, not errors; the
//! engine decides how to surface them.

use gearbook_core::GearbookError;
use gearbook_core::types::{BookingSnapshot, BookingStatus, StatusPatch, SyncTaskType};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{DayBooking, NewDayBooking};
use crate::queries::{parse_enum, sync_queue};

fn row_to_booking(row: &rusqlite::Row) -> Result<DayBooking, rusqlite::Error> {
    Ok(DayBooking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        item_id: row.get(2)?,
        item_name: row.get(3)?,
        date: row.get(4)?,
        status: parse_enum(5, row.get(5)?)?,
        comment: row.get(6)?,
        version: row.get(7)?,
        user_name: row.get(8)?,
        user_phone: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn get_tx(tx: &rusqlite::Transaction<'_>, id: i64) -> Result<Option<DayBooking>, rusqlite::Error> {
    tx.query_row(
        "SELECT id, user_id, item_id, item_name, date, status, comment, version,
                user_name, user_phone, created_at, updated_at
         FROM bookings WHERE id = ?1",
        params![id],
        row_to_booking,
    )
    .optional()
}

fn active_count_tx(
    tx: &rusqlite::Transaction<'_>,
    item_id: i64,
    date: &str,
    exclude_id: Option<i64>,
) -> Result<i64, rusqlite::Error> {
    match exclude_id {
        Some(id) => tx.query_row(
            "SELECT COUNT(*) FROM bookings
             WHERE item_id = ?1 AND date = ?2 AND id != ?3
               AND status IN ('pending', 'confirmed', 'approved')",
            params![item_id, date, id],
            |row| row.get(0),
        ),
        None => tx.query_row(
            "SELECT COUNT(*) FROM bookings
             WHERE item_id = ?1 AND date = ?2
               AND status IN ('pending', 'confirmed', 'approved')",
            params![item_id, date],
            |row| row.get(0),
        ),
    }
}

fn snapshot_payload(booking: &DayBooking) -> Result<String, rusqlite::Error> {
    serde_json::to_string(&BookingSnapshot::Day(booking.clone()))
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn patch_payload(booking: &DayBooking) -> Result<String, rusqlite::Error> {
    let patch = StatusPatch {
        booking_id: booking.id,
        status: booking.status,
        updated_at: booking.updated_at.clone(),
    };
    serde_json::to_string(&patch).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

/// Result of a capacity-checked create.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateDayOutcome {
    Created(DayBooking),
    /// The day is full for this item.
    NoCapacity { booked: i64, total: i64 },
}

/// Result of a status transition.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdateOutcome {
    Updated(DayBooking),
    NotFound,
    /// The caller's expected_version no longer matches.
    StaleVersion { current_version: i64 },
    /// The booking is canceled or rejected and cannot change again.
    AlreadyTerminal { status: BookingStatus },
}

/// Result of relocating a booking to another item.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeItemOutcome {
    Changed(DayBooking),
    NotFound,
    ItemMissing,
    StaleVersion { current_version: i64 },
    NoCapacity { booked: i64, total: i64 },
    AlreadyTerminal { status: BookingStatus },
}

/// Result of an owner-initiated cancellation.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    Canceled(DayBooking),
    NotFound,
    NotOwner,
    /// The booking day has already started.
    TooLate,
    AlreadyFinalized { status: BookingStatus },
}

/// Create a day booking if the item still has capacity on that date.
///
/// On success the booking (status `pending`, version 1) and its `upsert`
/// sync task are committed together.
pub async fn create_day_booking(
    db: &Database,
    new: NewDayBooking,
) -> Result<CreateDayOutcome, GearbookError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let total: i64 = tx.query_row(
                "SELECT total_quantity FROM items WHERE id = ?1",
                params![new.item_id],
                |row| row.get(0),
            )?;
            let booked = active_count_tx(&tx, new.item_id, &new.date, None)?;
            if booked >= total {
                tx.commit()?;
                return Ok(CreateDayOutcome::NoCapacity { booked, total });
            }

            tx.execute(
                "INSERT INTO bookings
                     (user_id, item_id, item_name, date, comment, user_name, user_phone)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    new.user_id,
                    new.item_id,
                    new.item_name,
                    new.date,
                    new.comment,
                    new.user_name,
                    new.user_phone,
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
            Ok(CreateDayOutcome::Created(booking))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Transition a booking to `new_status`.
///
/// When `expected_version` is given, the update carries a version filter and
/// zero affected rows reports `StaleVersion`. The version column increments
/// by exactly 1 on success and an `update_status` task is enqueued.
pub async fn change_status(
    db: &Database,
    booking_id: i64,
    new_status: BookingStatus,
    expected_version: Option<i64>,
) -> Result<StatusUpdateOutcome, GearbookError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let current = match get_tx(&tx, booking_id)? {
                Some(b) => b,
                None => {
                    tx.commit()?;
                    return Ok(StatusUpdateOutcome::NotFound);
                }
            };
            if current.status.is_terminal() {
                tx.commit()?;
                return Ok(StatusUpdateOutcome::AlreadyTerminal {
                    status: current.status,
                });
            }

            let guard = expected_version.unwrap_or(current.version);
            let affected = tx.execute(
                "UPDATE bookings SET status = ?1, version = version + 1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2 AND version = ?3",
                params![new_status.to_string(), booking_id, guard],
            )?;
            if affected == 0 {
                tx.commit()?;
                return Ok(StatusUpdateOutcome::StaleVersion {
                    current_version: current.version,
                });
            }

            let booking = match get_tx(&tx, booking_id)? {
                Some(b) => b,
                None => return Err(rusqlite::Error::QueryReturnedNoRows),
            };
            let payload = patch_payload(&booking)?;
            sync_queue::enqueue_tx(&tx, SyncTaskType::UpdateStatus, Some(booking.id), &payload)?;

            tx.commit()?;
            Ok(StatusUpdateOutcome::Updated(booking))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Move a booking to another item, re-checking capacity on the target
/// (item, date) in the same transaction. `new_status` optionally changes the
/// status in the same write. Always requires the expected version.
pub async fn change_item(
    db: &Database,
    booking_id: i64,
    new_item_id: i64,
    new_status: Option<BookingStatus>,
    expected_version: i64,
) -> Result<ChangeItemOutcome, GearbookError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let current = match get_tx(&tx, booking_id)? {
                Some(b) => b,
                None => {
                    tx.commit()?;
                    return Ok(ChangeItemOutcome::NotFound);
                }
            };
            if current.status.is_terminal() {
                tx.commit()?;
                return Ok(ChangeItemOutcome::AlreadyTerminal {
                    status: current.status,
                });
            }

            let item: Option<(String, i64)> = tx
                .query_row(
                    "SELECT name, total_quantity FROM items WHERE id = ?1",
                    params![new_item_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((item_name, total)) = item else {
                tx.commit()?;
                return Ok(ChangeItemOutcome::ItemMissing);
            };

            // The booking itself must not count against the target capacity.
            let booked = active_count_tx(&tx, new_item_id, &current.date, Some(booking_id))?;
            if booked >= total {
                tx.commit()?;
                return Ok(ChangeItemOutcome::NoCapacity { booked, total });
            }

            let status = new_status.unwrap_or(current.status);
            let affected = tx.execute(
                "UPDATE bookings SET item_id = ?1, item_name = ?2, status = ?3,
                     version = version + 1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?4 AND version = ?5",
                params![
                    new_item_id,
                    item_name,
                    status.to_string(),
                    booking_id,
                    expected_version,
                ],
            )?;
            if affected == 0 {
                tx.commit()?;
                return Ok(ChangeItemOutcome::StaleVersion {
                    current_version: current.version,
                });
            }

            let booking = match get_tx(&tx, booking_id)? {
                Some(b) => b,
                None => return Err(rusqlite::Error::QueryReturnedNoRows),
            };
            let payload = snapshot_payload(&booking)?;
            sync_queue::enqueue_tx(&tx, SyncTaskType::Upsert, Some(booking.id), &payload)?;

            tx.commit()?;
            Ok(ChangeItemOutcome::Changed(booking))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Owner-initiated cancellation with distinct rejection reasons.
///
/// `today` is the server-local calendar day; a booking whose date is today
/// or earlier can no longer be canceled by its owner.
pub async fn cancel_owned(
    db: &Database,
    booking_id: i64,
    user_id: i64,
    today: &str,
) -> Result<CancelOutcome, GearbookError> {
    let today = today.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let current = match get_tx(&tx, booking_id)? {
                Some(b) => b,
                None => {
                    tx.commit()?;
                    return Ok(CancelOutcome::NotFound);
                }
            };
            if current.user_id != user_id {
                tx.commit()?;
                return Ok(CancelOutcome::NotOwner);
            }
            if current.status.is_terminal() {
                tx.commit()?;
                return Ok(CancelOutcome::AlreadyFinalized {
                    status: current.status,
                });
            }
            if current.date.as_str() <= today.as_str() {
                tx.commit()?;
                return Ok(CancelOutcome::TooLate);
            }

            tx.execute(
                "UPDATE bookings SET status = 'canceled', version = version + 1,
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
            Ok(CancelOutcome::Canceled(booking))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Active bookings for (item, date). Capacity decisions always read this,
/// never a cache.
pub async fn booked_count(db: &Database, item_id: i64, date: &str) -> Result<i64, GearbookError> {
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM bookings
                 WHERE item_id = ?1 AND date = ?2
                   AND status IN ('pending', 'confirmed', 'approved')",
                params![item_id, date],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get(db: &Database, id: i64) -> Result<Option<DayBooking>, GearbookError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, user_id, item_id, item_name, date, status, comment, version,
                        user_name, user_phone, created_at, updated_at
                 FROM bookings WHERE id = ?1",
                params![id],
                row_to_booking,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// A user's bookings, newest date first. `only_active` drops terminal and
/// completed rows.
pub async fn list_for_user(
    db: &Database,
    user_id: i64,
    only_active: bool,
) -> Result<Vec<DayBooking>, GearbookError> {
    db.connection()
        .call(move |conn| {
            let mut bookings = Vec::new();
            if only_active {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, item_id, item_name, date, status, comment, version,
                            user_name, user_phone, created_at, updated_at
                     FROM bookings
                     WHERE user_id = ?1 AND status IN ('pending', 'confirmed', 'approved')
                     ORDER BY date DESC, id DESC",
                )?;
                let rows = stmt.query_map(params![user_id], row_to_booking)?;
                for row in rows {
                    bookings.push(row?);
                }
            } else {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, item_id, item_name, date, status, comment, version,
                            user_name, user_phone, created_at, updated_at
                     FROM bookings WHERE user_id = ?1 ORDER BY date DESC, id DESC",
                )?;
                let rows = stmt.query_map(params![user_id], row_to_booking)?;
                for row in rows {
                    bookings.push(row?);
                }
            }
            Ok(bookings)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of active day bookings held by a user, for per-user caps.
pub async fn active_count_for_user(db: &Database, user_id: i64) -> Result<i64, GearbookError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM bookings
                 WHERE user_id = ?1 AND status IN ('pending', 'confirmed', 'approved')",
                params![user_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}
