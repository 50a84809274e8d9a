// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reservation engine for the Gearbook service.
//!
//! Business rules live here: capacity-checked day bookings, schedule-aligned
//! hour bookings, availability reads through the item cache, and the advance
//! window policy. The storage layer stays mechanism-only; this crate decides
//! whether a reservation is allowed.

pub mod availability;
pub mod cache;
pub mod engine;
pub mod policy;
pub mod slots;

pub use availability::{Availability, AvailabilityReader};
pub use cache::ItemCache;
pub use engine::{Actor, DayBookingRequest, HourBookingRequest, ReservationEngine};
pub use policy::BookingPolicy;
pub use slots::{ScheduleWindow, Slot, enumerate_slots, resolve_window, slots_for_date};
