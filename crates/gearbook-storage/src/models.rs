// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types are defined in `gearbook-core::types` for use across
//! crate boundaries. This module re-exports them for convenience within the
//! storage crate.

pub use gearbook_core::types::{
    Cabinet, DayBooking, HourBooking, Item, NewDayBooking, NewHourBooking, ScheduleOverride,
    SyncTask, UserRecord, WeeklySchedule,
};
