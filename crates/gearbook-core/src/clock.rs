// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Clock abstraction and calendar helpers.
//!
//! All date comparisons in the service use the server's local zone; the
//! engine takes a `Clock` so advance-window rules are testable at exact
//! boundaries.

use chrono::{DateTime, Datelike, Local, NaiveDate};

/// Source of "now" for business rules.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// Today's calendar day in the server's local zone.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall-clock implementation used outside tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Weekday number used by the schedule table: Monday=1 .. Sunday=7.
pub fn schedule_weekday(date: NaiveDate) -> u32 {
    date.weekday().number_from_monday()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monday_is_one_sunday_is_seven() {
        // 2026-01-05 is a Monday.
        let monday = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(schedule_weekday(monday), 1);

        let sunday = NaiveDate::from_ymd_opt(2026, 1, 11).unwrap();
        assert_eq!(schedule_weekday(sunday), 7);

        let wednesday = NaiveDate::from_ymd_opt(2026, 1, 7).unwrap();
        assert_eq!(schedule_weekday(wednesday), 3);
    }

    #[test]
    fn system_clock_today_matches_now() {
        let clock = SystemClock;
        assert_eq!(clock.today(), clock.now().date_naive());
    }
}
