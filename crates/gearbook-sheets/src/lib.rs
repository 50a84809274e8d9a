// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External spreadsheet mirror for the Gearbook reservation service.
//!
//! Bookings are mirrored one row per booking onto a values-API spreadsheet
//! tab, with a rendered schedule view on a second tab. This crate provides
//! the [`SheetWriter`] contract the sync worker drives, the HTTP client
//! implementation with its row cache, and an in-memory implementation for
//! local development and tests.

pub mod http;
pub mod memory;
pub mod rows;
pub mod writer;

pub use http::HttpSheetClient;
pub use memory::MemorySheet;
pub use writer::{BookingRow, ScheduleRow, SheetWriter};
