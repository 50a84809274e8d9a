// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Advance-window rules and the per-user booking cap.
//!
//! These checks run before any capacity or overlap check and never touch
//! the store.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime};
use gearbook_core::GearbookError;

/// Limits applied to every create operation.
#[derive(Debug, Clone)]
pub struct BookingPolicy {
    pub min_advance_minutes: i64,
    pub max_advance_days_hour: i64,
    pub max_advance_days_day: i64,
    pub max_active_per_user: Option<u32>,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            min_advance_minutes: 60,
            max_advance_days_hour: 30,
            max_advance_days_day: 365,
            max_active_per_user: None,
        }
    }
}

impl BookingPolicy {
    /// An hour booking must start inside `[now + min_advance, now + max_advance]`.
    ///
    /// Both bounds are inclusive: a start exactly at `now + min_advance`
    /// passes, one second less does not.
    pub fn check_hour_start(
        &self,
        now: DateTime<Local>,
        start: NaiveDateTime,
    ) -> Result<(), GearbookError> {
        let now = now.naive_local();
        let earliest = now + Duration::minutes(self.min_advance_minutes);
        if start < earliest {
            return Err(GearbookError::InvalidArgument(format!(
                "booking must start at least {} minutes from now",
                self.min_advance_minutes
            )));
        }
        let latest = now + Duration::days(self.max_advance_days_hour);
        if start > latest {
            return Err(GearbookError::InvalidArgument(format!(
                "booking must start within {} days",
                self.max_advance_days_hour
            )));
        }
        Ok(())
    }

    /// A day booking's date must be today or later, within the advance window.
    pub fn check_day_date(&self, today: NaiveDate, date: NaiveDate) -> Result<(), GearbookError> {
        if date < today {
            return Err(GearbookError::InvalidArgument(
                "date is in the past".to_string(),
            ));
        }
        if date > today + Duration::days(self.max_advance_days_day) {
            return Err(GearbookError::InvalidArgument(format!(
                "date must be within {} days",
                self.max_advance_days_day
            )));
        }
        Ok(())
    }

    /// Enforce the optional cap on active bookings per user.
    pub fn check_user_cap(&self, active_count: i64) -> Result<(), GearbookError> {
        if let Some(cap) = self.max_active_per_user
            && active_count >= i64::from(cap)
        {
            return Err(GearbookError::InvalidArgument(format!(
                "active booking limit of {cap} reached"
            )));
        }
        Ok(())
    }
}
