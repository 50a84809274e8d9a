// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable outbox for spreadsheet synchronization.
//!
//! Booking mutations enqueue their task inside the same transaction via
//! [`enqueue_tx`], so a committed booking always has its mirror task and a
//! rolled-back one never does. The worker claims due tasks with
//! [`due_batch`] and advances them with the `mark_*` functions; a completed
//! task is never reopened.

use gearbook_core::GearbookError;
use gearbook_core::types::{SyncTask, SyncTaskType};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::queries::parse_enum;

pub(crate) fn row_to_task(row: &rusqlite::Row) -> Result<SyncTask, rusqlite::Error> {
    Ok(SyncTask {
        id: row.get(0)?,
        task_type: parse_enum(1, row.get(1)?)?,
        booking_id: row.get(2)?,
        payload: row.get(3)?,
        status: parse_enum(4, row.get(4)?)?,
        retry_count: row.get(5)?,
        last_error: row.get(6)?,
        created_at: row.get(7)?,
        processed_at: row.get(8)?,
        next_retry_at: row.get(9)?,
    })
}

/// Insert a pending task as part of the caller's transaction.
///
/// `next_retry_at` is set to now, so the task is immediately due.
pub(crate) fn enqueue_tx(
    tx: &rusqlite::Transaction<'_>,
    task_type: SyncTaskType,
    booking_id: Option<i64>,
    payload: &str,
) -> Result<i64, rusqlite::Error> {
    tx.execute(
        "INSERT INTO sync_queue (task_type, booking_id, payload, next_retry_at)
         VALUES (?1, ?2, ?3, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        params![task_type.to_string(), booking_id, payload],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Insert a standalone pending task (outside any booking transaction).
pub async fn enqueue(
    db: &Database,
    task_type: SyncTaskType,
    booking_id: Option<i64>,
    payload: &str,
) -> Result<i64, GearbookError> {
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let id = enqueue_tx(&tx, task_type, booking_id, &payload)?;
            tx.commit()?;
            Ok(id)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Due tasks: pending or retry with `next_retry_at` in the past, oldest first.
pub async fn due_batch(db: &Database, limit: i64) -> Result<Vec<SyncTask>, GearbookError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_type, booking_id, payload, status, retry_count,
                        last_error, created_at, processed_at, next_retry_at
                 FROM sync_queue
                 WHERE status IN ('pending', 'retry')
                   AND (next_retry_at IS NULL
                        OR next_retry_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                 ORDER BY id ASC
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], row_to_task)?;
            let mut tasks = Vec::new();
            for row in rows {
                tasks.push(row?);
            }
            Ok(tasks)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get(db: &Database, id: i64) -> Result<Option<SyncTask>, GearbookError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, task_type, booking_id, payload, status, retry_count,
                        last_error, created_at, processed_at, next_retry_at
                 FROM sync_queue WHERE id = ?1",
                params![id],
                row_to_task,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a task completed. Returns false if the task was already completed
/// (or does not exist) -- completed tasks stay completed.
pub async fn mark_completed(db: &Database, id: i64) -> Result<bool, GearbookError> {
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(
                "UPDATE sync_queue SET status = 'completed',
                     processed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     last_error = NULL
                 WHERE id = ?1 AND status != 'completed'",
                params![id],
            )?;
            Ok(affected > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Schedule a retry after a handler failure.
pub async fn mark_retry(
    db: &Database,
    id: i64,
    retry_count: i64,
    next_retry_at: &str,
    last_error: &str,
) -> Result<bool, GearbookError> {
    let next_retry_at = next_retry_at.to_string();
    let last_error = last_error.to_string();
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(
                "UPDATE sync_queue SET status = 'retry', retry_count = ?1,
                     next_retry_at = ?2, last_error = ?3
                 WHERE id = ?4 AND status != 'completed'",
                params![retry_count, next_retry_at, last_error, id],
            )?;
            Ok(affected > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Dead-letter a task that exhausted its retries or has an undecodable payload.
pub async fn mark_failed(db: &Database, id: i64, last_error: &str) -> Result<bool, GearbookError> {
    let last_error = last_error.to_string();
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(
                "UPDATE sync_queue SET status = 'failed',
                     processed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     last_error = ?1
                 WHERE id = ?2 AND status != 'completed'",
                params![last_error, id],
            )?;
            Ok(affected > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of tasks still waiting to be processed (pending or retry).
pub async fn queue_depth(db: &Database) -> Result<i64, GearbookError> {
    db.connection()
        .call(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM sync_queue WHERE status IN ('pending', 'retry')",
                [],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}
