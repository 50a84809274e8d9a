// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Weekly cabinet schedules and per-date overrides.
//!
//! `day_of_week` is 1 (Monday) to 7 (Sunday). At most one active weekly row
//! exists per (cabinet, weekday); `upsert_weekly` deactivates old rows inside
//! the same transaction to preserve that.

use gearbook_core::GearbookError;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{ScheduleOverride, WeeklySchedule};

fn row_to_weekly(row: &rusqlite::Row) -> Result<WeeklySchedule, rusqlite::Error> {
    Ok(WeeklySchedule {
        id: row.get(0)?,
        cabinet_id: row.get(1)?,
        day_of_week: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        slot_duration_minutes: row.get(5)?,
        active: row.get(6)?,
    })
}

fn row_to_override(row: &rusqlite::Row) -> Result<ScheduleOverride, rusqlite::Error> {
    Ok(ScheduleOverride {
        id: row.get(0)?,
        cabinet_id: row.get(1)?,
        date: row.get(2)?,
        is_closed: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
    })
}

/// The one active weekly row for (cabinet, weekday), if any.
pub async fn weekly_for_day(
    db: &Database,
    cabinet_id: i64,
    day_of_week: u32,
) -> Result<Option<WeeklySchedule>, GearbookError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, cabinet_id, day_of_week, start_time, end_time,
                        slot_duration_minutes, active
                 FROM cabinet_schedules
                 WHERE cabinet_id = ?1 AND day_of_week = ?2 AND active = 1",
                params![cabinet_id, day_of_week],
                row_to_weekly,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All active weekly rows, ordered by (cabinet_id, day_of_week).
///
/// Used when rendering the full schedule view for the sheet mirror.
pub async fn list_active_weekly(db: &Database) -> Result<Vec<WeeklySchedule>, GearbookError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, cabinet_id, day_of_week, start_time, end_time,
                        slot_duration_minutes, active
                 FROM cabinet_schedules
                 WHERE active = 1 ORDER BY cabinet_id ASC, day_of_week ASC",
            )?;
            let rows = stmt.query_map([], row_to_weekly)?;
            let mut schedules = Vec::new();
            for row in rows {
                schedules.push(row?);
            }
            Ok(schedules)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Replace the active weekly row for (cabinet, weekday).
///
/// Existing active rows for the pair are deactivated, then the new row is
/// inserted, all in one transaction.
pub async fn upsert_weekly(
    db: &Database,
    cabinet_id: i64,
    day_of_week: u32,
    start_time: &str,
    end_time: &str,
    slot_duration_minutes: i64,
) -> Result<WeeklySchedule, GearbookError> {
    let start_time = start_time.to_string();
    let end_time = end_time.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE cabinet_schedules SET active = 0
                 WHERE cabinet_id = ?1 AND day_of_week = ?2 AND active = 1",
                params![cabinet_id, day_of_week],
            )?;
            tx.execute(
                "INSERT INTO cabinet_schedules
                     (cabinet_id, day_of_week, start_time, end_time, slot_duration_minutes)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![cabinet_id, day_of_week, start_time, end_time, slot_duration_minutes],
            )?;
            let id = tx.last_insert_rowid();
            let schedule = tx.query_row(
                "SELECT id, cabinet_id, day_of_week, start_time, end_time,
                        slot_duration_minutes, active
                 FROM cabinet_schedules WHERE id = ?1",
                params![id],
                row_to_weekly,
            )?;
            tx.commit()?;
            Ok(schedule)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The override for (cabinet, date), if one exists.
pub async fn override_for_date(
    db: &Database,
    cabinet_id: i64,
    date: &str,
) -> Result<Option<ScheduleOverride>, GearbookError> {
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, cabinet_id, date, is_closed, start_time, end_time
                 FROM cabinet_schedule_overrides
                 WHERE cabinet_id = ?1 AND date = ?2",
                params![cabinet_id, date],
                row_to_override,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All overrides with `from <= date <= to`, ordered by (cabinet_id, date).
pub async fn overrides_in_range(
    db: &Database,
    from: &str,
    to: &str,
) -> Result<Vec<ScheduleOverride>, GearbookError> {
    let from = from.to_string();
    let to = to.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, cabinet_id, date, is_closed, start_time, end_time
                 FROM cabinet_schedule_overrides
                 WHERE date >= ?1 AND date <= ?2
                 ORDER BY cabinet_id ASC, date ASC",
            )?;
            let rows = stmt.query_map(params![from, to], row_to_override)?;
            let mut overrides = Vec::new();
            for row in rows {
                overrides.push(row?);
            }
            Ok(overrides)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Set (or replace) the override for (cabinet, date).
pub async fn set_override(
    db: &Database,
    cabinet_id: i64,
    date: &str,
    is_closed: bool,
    start_time: Option<&str>,
    end_time: Option<&str>,
) -> Result<ScheduleOverride, GearbookError> {
    let date = date.to_string();
    let start_time = start_time.map(str::to_string);
    let end_time = end_time.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO cabinet_schedule_overrides
                     (cabinet_id, date, is_closed, start_time, end_time)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(cabinet_id, date) DO UPDATE SET
                     is_closed = excluded.is_closed,
                     start_time = excluded.start_time,
                     end_time = excluded.end_time",
                params![cabinet_id, date, is_closed, start_time, end_time],
            )?;
            conn.query_row(
                "SELECT id, cabinet_id, date, is_closed, start_time, end_time
                 FROM cabinet_schedule_overrides
                 WHERE cabinet_id = ?1 AND date = ?2",
                params![cabinet_id, date],
                row_to_override,
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Remove the override for (cabinet, date). Returns false if none existed.
pub async fn clear_override(
    db: &Database,
    cabinet_id: i64,
    date: &str,
) -> Result<bool, GearbookError> {
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(
                "DELETE FROM cabinet_schedule_overrides WHERE cabinet_id = ?1 AND date = ?2",
                params![cabinet_id, date],
            )?;
            Ok(affected > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
