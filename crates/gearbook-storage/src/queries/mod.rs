// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for CRUD operations on storage entities.

pub mod bookings;
pub mod catalog;
pub mod hourly;
pub mod schedules;
pub mod sync_queue;
pub mod users;

use std::str::FromStr;

/// Parse a TEXT column into a typed enum, reporting parse failures as a
/// rusqlite conversion error so they surface through the normal query path.
pub(crate) fn parse_enum<T: FromStr>(idx: usize, raw: String) -> Result<T, rusqlite::Error>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
