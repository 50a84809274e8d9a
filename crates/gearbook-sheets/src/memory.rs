// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`SheetWriter`] for local development and worker tests.

use async_trait::async_trait;
use dashmap::DashMap;
use gearbook_core::GearbookError;
use gearbook_core::types::{BookingStatus, ScheduleRange};
use tokio::sync::Mutex;

use crate::writer::{BookingRow, ScheduleRow, SheetWriter};

/// Keeps the mirrored rows in process memory.
///
/// Matches the HTTP client's semantics: deletes of absent rows succeed,
/// status patches of absent rows fail so the sync queue retries them.
#[derive(Debug, Default)]
pub struct MemorySheet {
    rows: DashMap<i64, BookingRow>,
    schedule: Mutex<Vec<ScheduleRow>>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mirrored row for a booking, if any.
    pub fn row(&self, booking_id: i64) -> Option<BookingRow> {
        self.rows.get(&booking_id).map(|r| r.clone())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Snapshot of the rendered schedule view.
    pub async fn schedule_rows(&self) -> Vec<ScheduleRow> {
        self.schedule.lock().await.clone()
    }
}

#[async_trait]
impl SheetWriter for MemorySheet {
    async fn upsert_row(&self, row: &BookingRow) -> Result<(), GearbookError> {
        self.rows.insert(row.id, row.clone());
        Ok(())
    }

    async fn delete_row(&self, booking_id: i64) -> Result<(), GearbookError> {
        self.rows.remove(&booking_id);
        Ok(())
    }

    async fn update_status(
        &self,
        booking_id: i64,
        status: BookingStatus,
        updated_at: &str,
    ) -> Result<(), GearbookError> {
        match self.rows.get_mut(&booking_id) {
            Some(mut row) => {
                row.status = status.to_string();
                row.updated_at = updated_at.to_string();
                Ok(())
            }
            None => Err(GearbookError::Sheet {
                message: format!("no sheet row for booking {booking_id}"),
                source: None,
            }),
        }
    }

    async fn write_schedule(
        &self,
        rows: &[ScheduleRow],
        _range: &ScheduleRange,
    ) -> Result<(), GearbookError> {
        *self.schedule.lock().await = rows.to_vec();
        Ok(())
    }

    async fn ping(&self) -> Result<(), GearbookError> {
        Ok(())
    }
}
