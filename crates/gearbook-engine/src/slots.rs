// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slot generation from weekly schedules and per-date overrides.
//!
//! The generator is pure: it takes the resolved schedule rows and the active
//! booking intervals and produces the fixed-width slot list. `slots_for_date`
//! is the store-reading wrapper used by the engine.

use chrono::{Duration, NaiveDate, NaiveTime};
use gearbook_core::{GearbookError, schedule_weekday};
use gearbook_core::types::{ScheduleOverride, WeeklySchedule};
use gearbook_core::validate::parse_hhmm;
use gearbook_storage::Database;
use gearbook_storage::queries::{hourly, schedules};
use serde::Serialize;

/// The bookable window for one (cabinet, date) after override application.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub slot_minutes: i64,
}

/// One fixed-width interval inside a schedule window.
///
/// `start`/`end` are naive local datetimes `YYYY-MM-DDTHH:MM`, directly
/// comparable with stored hour-booking bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    pub start: String,
    pub end: String,
    pub available: bool,
}

impl Slot {
    /// Time-of-day label `HH:MM-HH:MM`.
    pub fn label(&self) -> String {
        format!("{}-{}", time_of(&self.start), time_of(&self.end))
    }
}

fn time_of(bound: &str) -> &str {
    bound.split_once('T').map(|(_, t)| t).unwrap_or(bound)
}

/// Apply the override for the date (if any) to the weekly row.
///
/// Returns `None` when the cabinet has no window that day: no active weekly
/// row, or a closing override. Non-empty override start/end fields replace
/// the weekly window; empty or absent fields keep it.
pub fn resolve_window(
    weekly: Option<&WeeklySchedule>,
    override_row: Option<&ScheduleOverride>,
) -> Result<Option<ScheduleWindow>, GearbookError> {
    let Some(weekly) = weekly else {
        return Ok(None);
    };

    let mut start = weekly.start_time.as_str();
    let mut end = weekly.end_time.as_str();
    if let Some(ov) = override_row {
        if ov.is_closed {
            return Ok(None);
        }
        if let Some(s) = ov.start_time.as_deref().filter(|s| !s.is_empty()) {
            start = s;
        }
        if let Some(e) = ov.end_time.as_deref().filter(|e| !e.is_empty()) {
            end = e;
        }
    }

    Ok(Some(ScheduleWindow {
        start: parse_hhmm(start)?,
        end: parse_hhmm(end)?,
        slot_minutes: weekly.slot_duration_minutes,
    }))
}

/// Enumerate fixed-width slots and mark the busy ones.
///
/// Generation stops when the next interval would pass the window end, so a
/// window not divisible by the slot width loses its tail remainder. `busy`
/// holds active booking bounds for the same date, as stored.
pub fn enumerate_slots(
    date: NaiveDate,
    window: &ScheduleWindow,
    busy: &[(String, String)],
) -> Vec<Slot> {
    let mut slots = Vec::new();
    if window.slot_minutes <= 0 {
        return slots;
    }

    let width = Duration::minutes(window.slot_minutes);
    let end_dt = date.and_time(window.end);
    let mut cursor = date.and_time(window.start);

    while cursor + width <= end_dt {
        let next = cursor + width;
        let start = cursor.format("%Y-%m-%dT%H:%M").to_string();
        let end = next.format("%Y-%m-%dT%H:%M").to_string();
        let available = !busy
            .iter()
            .any(|(bs, be)| start.as_str() < be.as_str() && end.as_str() > bs.as_str());
        slots.push(Slot {
            start,
            end,
            available,
        });
        cursor = next;
    }
    slots
}

/// Slot list for (cabinet, date) from stored schedule rows and bookings.
pub async fn slots_for_date(
    db: &Database,
    cabinet_id: i64,
    date: NaiveDate,
) -> Result<Vec<Slot>, GearbookError> {
    let date_str = date.format("%Y-%m-%d").to_string();
    let weekly = schedules::weekly_for_day(db, cabinet_id, schedule_weekday(date)).await?;
    let override_row = schedules::override_for_date(db, cabinet_id, &date_str).await?;
    let Some(window) = resolve_window(weekly.as_ref(), override_row.as_ref())? else {
        return Ok(Vec::new());
    };
    let busy = hourly::busy_intervals(db, cabinet_id, &date_str).await?;
    Ok(enumerate_slots(date, &window, &busy))
}
