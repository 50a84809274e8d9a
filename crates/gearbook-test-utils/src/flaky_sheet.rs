// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sheet mirror mock with scripted transient failures.
//!
//! `FlakySheet` delegates to a [`MemorySheet`] after failing a configured
//! number of mutation calls, enabling retry-ladder tests without a real
//! spreadsheet backend.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use gearbook_core::GearbookError;
use gearbook_core::types::{BookingStatus, ScheduleRange};
use gearbook_sheets::{BookingRow, MemorySheet, ScheduleRow, SheetWriter};

/// A [`SheetWriter`] whose first `n` mutation calls fail.
///
/// The failure script covers mutations only; `ping` always succeeds, so
/// readiness probes stay green while the mirror is "briefly down".
#[derive(Debug)]
pub struct FlakySheet {
    inner: MemorySheet,
    failures_left: AtomicI64,
    calls: AtomicI64,
}

impl FlakySheet {
    /// A sheet that never fails.
    pub fn reliable() -> Self {
        Self::failing(0)
    }

    /// A sheet whose first `n` mutation calls return a transient error.
    pub fn failing(n: i64) -> Self {
        Self {
            inner: MemorySheet::new(),
            failures_left: AtomicI64::new(n),
            calls: AtomicI64::new(0),
        }
    }

    /// Arm the next `n` mutation calls to fail.
    pub fn fail_next(&self, n: i64) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Mutation calls seen so far, failed ones included.
    pub fn calls(&self) -> i64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Current mirrored row for a booking, if any.
    pub fn row(&self, booking_id: i64) -> Option<BookingRow> {
        self.inner.row(booking_id)
    }

    pub fn row_count(&self) -> usize {
        self.inner.row_count()
    }

    /// Snapshot of the rendered schedule view.
    pub async fn schedule_rows(&self) -> Vec<ScheduleRow> {
        self.inner.schedule_rows().await
    }

    fn trip(&self) -> Result<(), GearbookError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failures_left.fetch_sub(1, Ordering::SeqCst) > 0 {
            return Err(GearbookError::Sheet {
                message: "sheet briefly down".into(),
                source: None,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SheetWriter for FlakySheet {
    async fn upsert_row(&self, row: &BookingRow) -> Result<(), GearbookError> {
        self.trip()?;
        self.inner.upsert_row(row).await
    }

    async fn delete_row(&self, booking_id: i64) -> Result<(), GearbookError> {
        self.trip()?;
        self.inner.delete_row(booking_id).await
    }

    async fn update_status(
        &self,
        booking_id: i64,
        status: BookingStatus,
        updated_at: &str,
    ) -> Result<(), GearbookError> {
        self.trip()?;
        self.inner.update_status(booking_id, status, updated_at).await
    }

    async fn write_schedule(
        &self,
        rows: &[ScheduleRow],
        range: &ScheduleRange,
    ) -> Result<(), GearbookError> {
        self.trip()?;
        self.inner.write_schedule(rows, range).await
    }

    async fn ping(&self) -> Result<(), GearbookError> {
        Ok(())
    }
}
