// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adjustable clock for advance-window boundary tests.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Local, TimeZone};
use gearbook_core::Clock;

/// Resolve a local wall time. DST gaps and ambiguous folds yield `None`.
pub fn local_time(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
) -> Option<DateTime<Local>> {
    Local
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
}

/// A [`Clock`] whose "now" is set by the test instead of the wall clock.
///
/// Shared between a test and the engine under test via `Arc`, so moving
/// the clock mid-test is immediately visible to policy checks.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, to: DateTime<Local>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }

    /// Move forward, or backward with a negative duration.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_advance_move_now() {
        let clock = ManualClock::starting_at(local_time(2026, 1, 5, 9, 0).unwrap());
        assert_eq!(clock.now(), local_time(2026, 1, 5, 9, 0).unwrap());

        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now(), local_time(2026, 1, 5, 10, 30).unwrap());

        clock.set(local_time(2026, 1, 4, 23, 59).unwrap());
        assert_eq!(clock.now(), local_time(2026, 1, 4, 23, 59).unwrap());
    }

    #[test]
    fn today_follows_the_adjusted_now() {
        let clock = ManualClock::starting_at(local_time(2026, 1, 5, 23, 30).unwrap());
        let before = clock.today();

        clock.advance(Duration::hours(1));
        assert_eq!(clock.today(), before + Duration::days(1));
    }
}
