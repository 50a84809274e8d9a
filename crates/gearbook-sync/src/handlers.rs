// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task handlers: one per [`SyncTaskType`], dispatched by the worker.
//!
//! All handlers are idempotent. Re-running an `upsert` rewrites the same
//! row, a `delete` of an absent row succeeds, and `sync_schedule` replaces
//! the whole rendered view. Only `update_status` of a row that was never
//! written fails, and then the retry path eventually gives up.

use std::collections::HashMap;

use chrono::{Local, Months, NaiveDate};
use gearbook_core::types::{
    BookingSnapshot, ScheduleOverride, ScheduleRange, StatusPatch, SyncTask, SyncTaskType,
    WeeklySchedule,
};
use gearbook_core::validate::parse_date;
use gearbook_core::{GearbookError, schedule_weekday};
use gearbook_sheets::{BookingRow, ScheduleRow, SheetWriter};
use gearbook_storage::Database;
use gearbook_storage::queries::{catalog, schedules};
use thiserror::Error;
use tracing::debug;

/// How a handler failed. A bad payload can never succeed and is
/// dead-lettered on the spot; anything else goes through the retry ladder.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("undecodable payload: {0}")]
    BadPayload(String),
    #[error(transparent)]
    Transient(GearbookError),
}

fn bad_payload(e: serde_json::Error) -> TaskError {
    TaskError::BadPayload(e.to_string())
}

/// Decode the task payload and run the matching handler.
pub async fn run_task(
    db: &Database,
    sheet: &dyn SheetWriter,
    task: &SyncTask,
) -> Result<(), TaskError> {
    match task.task_type {
        SyncTaskType::Upsert => {
            let snapshot: BookingSnapshot =
                serde_json::from_str(&task.payload).map_err(bad_payload)?;
            let row = BookingRow::from_snapshot(&snapshot);
            sheet.upsert_row(&row).await.map_err(TaskError::Transient)
        }
        SyncTaskType::Delete => {
            let booking_id = task
                .booking_id
                .ok_or_else(|| TaskError::BadPayload("delete task without a booking id".into()))?;
            sheet
                .delete_row(booking_id)
                .await
                .map_err(TaskError::Transient)
        }
        SyncTaskType::UpdateStatus => {
            let patch: StatusPatch = serde_json::from_str(&task.payload).map_err(bad_payload)?;
            sheet
                .update_status(patch.booking_id, patch.status, &patch.updated_at)
                .await
                .map_err(TaskError::Transient)
        }
        SyncTaskType::SyncSchedule => {
            let range: ScheduleRange = if task.payload.trim().is_empty() {
                ScheduleRange::default()
            } else {
                serde_json::from_str(&task.payload).map_err(bad_payload)?
            };
            sync_schedule(db, sheet, &range).await
        }
    }
}

/// Render the schedule view for the requested range and replace the sheet
/// tab with it. Bounds default to one month back and two months ahead.
async fn sync_schedule(
    db: &Database,
    sheet: &dyn SheetWriter,
    range: &ScheduleRange,
) -> Result<(), TaskError> {
    let (from, to) = resolve_bounds(range, Local::now().date_naive())?;
    let rows = render_schedule(db, from, to)
        .await
        .map_err(TaskError::Transient)?;

    debug!(%from, %to, rows = rows.len(), "schedule view rendered");
    let resolved = ScheduleRange {
        from: Some(from.to_string()),
        to: Some(to.to_string()),
    };
    sheet
        .write_schedule(&rows, &resolved)
        .await
        .map_err(TaskError::Transient)
}

fn resolve_bounds(
    range: &ScheduleRange,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), TaskError> {
    let from = match &range.from {
        Some(s) => parse_date(s).map_err(|e| TaskError::BadPayload(e.to_string()))?,
        None => today.checked_sub_months(Months::new(1)).unwrap_or(today),
    };
    let to = match &range.to {
        Some(s) => parse_date(s).map_err(|e| TaskError::BadPayload(e.to_string()))?,
        None => today.checked_add_months(Months::new(2)).unwrap_or(today),
    };
    if from > to {
        return Err(TaskError::BadPayload(format!(
            "schedule range starts after it ends: {from}..{to}"
        )));
    }
    Ok((from, to))
}

/// One row per active cabinet per date that has a weekly schedule.
///
/// A closed override renders as a closed row; a non-closed override
/// replaces the weekly window where its fields are non-empty. Dates whose
/// weekday has no weekly row are omitted entirely, overridden or not.
async fn render_schedule(
    db: &Database,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<ScheduleRow>, GearbookError> {
    let cabinets = catalog::list_active_cabinets(db).await?;
    let weekly = schedules::list_active_weekly(db).await?;
    let overrides =
        schedules::overrides_in_range(db, &from.to_string(), &to.to_string()).await?;

    let weekly_by_day: HashMap<(i64, u32), &WeeklySchedule> = weekly
        .iter()
        .map(|w| ((w.cabinet_id, w.day_of_week), w))
        .collect();
    let override_by_date: HashMap<(i64, &str), &ScheduleOverride> = overrides
        .iter()
        .map(|o| ((o.cabinet_id, o.date.as_str()), o))
        .collect();

    let mut rows = Vec::new();
    let mut date = from;
    while date <= to {
        let day = schedule_weekday(date);
        let date_str = date.to_string();
        for cabinet in &cabinets {
            let Some(weekly_row) = weekly_by_day.get(&(cabinet.id, day)) else {
                continue;
            };
            let row = match override_by_date.get(&(cabinet.id, date_str.as_str())) {
                Some(o) if o.is_closed => ScheduleRow {
                    date: date_str.clone(),
                    cabinet: cabinet.name.clone(),
                    closed: true,
                    start_time: None,
                    end_time: None,
                    slot_minutes: None,
                },
                Some(o) => {
                    let start = o
                        .start_time
                        .as_deref()
                        .filter(|s| !s.is_empty())
                        .unwrap_or(&weekly_row.start_time);
                    let end = o
                        .end_time
                        .as_deref()
                        .filter(|s| !s.is_empty())
                        .unwrap_or(&weekly_row.end_time);
                    ScheduleRow {
                        date: date_str.clone(),
                        cabinet: cabinet.name.clone(),
                        closed: false,
                        start_time: Some(start.to_string()),
                        end_time: Some(end.to_string()),
                        slot_minutes: Some(weekly_row.slot_duration_minutes),
                    }
                }
                None => ScheduleRow {
                    date: date_str.clone(),
                    cabinet: cabinet.name.clone(),
                    closed: false,
                    start_time: Some(weekly_row.start_time.clone()),
                    end_time: Some(weekly_row.end_time.clone()),
                    slot_minutes: Some(weekly_row.slot_duration_minutes),
                },
            };
            rows.push(row);
        }
        let Some(next) = date.succ_opt() else { break };
        date = next;
    }
    Ok(rows)
}
