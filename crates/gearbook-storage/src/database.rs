// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;

use gearbook_core::GearbookError;
use tracing::{debug, info};

/// Convert a tokio-rusqlite error into GearbookError::Storage.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> GearbookError {
    GearbookError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the service database.
///
/// Holds a single tokio-rusqlite connection; the inner connection clones
/// cheaply and all clones share one background thread.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply connection PRAGMAs, and
    /// run all pending migrations.
    pub async fn open(path: &str) -> Result<Self, GearbookError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| GearbookError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| GearbookError::Storage {
                source: Box::new(e),
            })?;

        let db = Self { conn };
        db.init().await?;
        info!(path = %path, "database opened");
        Ok(db)
    }

    /// Open an in-memory database with the full schema applied.
    pub async fn open_in_memory() -> Result<Self, GearbookError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| GearbookError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.init().await?;
        Ok(db)
    }

    async fn init(&self) -> Result<(), GearbookError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = 5000;",
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.conn
            .call(|conn| crate::migrations::run_migrations(conn))
            .await
            .map_err(|e| GearbookError::Storage {
                source: Box::new(e),
            })?;

        Ok(())
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Switch the journal back to rollback mode. Opening always starts in
    /// WAL; deployments that set `storage.wal_mode = false` call this once.
    pub async fn disable_wal(&self) -> Result<(), GearbookError> {
        let mode: String = self
            .conn
            .call(|conn| -> Result<String, rusqlite::Error> {
                conn.query_row("PRAGMA journal_mode = DELETE", [], |row| row.get(0))
            })
            .await
            .map_err(map_tr_err)?;
        debug!(mode = %mode, "journal mode switched");
        Ok(())
    }

    /// Round-trip a trivial query. Used by readiness probes and the doctor.
    pub async fn ping(&self) -> Result<(), GearbookError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("SELECT 1", [], |_| Ok(()))
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint the WAL and release the connection.
    pub async fn close(self) -> Result<(), GearbookError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_parent_dirs_and_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("gearbook.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        // Every table from the V1 migration should exist.
        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                let mut names = Vec::new();
                for row in rows {
                    names.push(row?);
                }
                Ok(names)
            })
            .await
            .unwrap();

        for expected in [
            "items",
            "cabinets",
            "cabinet_schedules",
            "cabinet_schedule_overrides",
            "bookings",
            "hourly_bookings",
            "users",
            "sync_queue",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_is_idempotent_across_restarts() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("gearbook.db");

        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();

        // Re-opening must not re-run applied migrations.
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn wal_mode_is_enabled() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("gearbook.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        let mode: String = db
            .connection()
            .call(|conn| -> Result<String, rusqlite::Error> {
                conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn disable_wal_switches_journal_mode() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("gearbook.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        db.disable_wal().await.unwrap();

        let mode: String = db
            .connection()
            .call(|conn| -> Result<String, rusqlite::Error> {
                conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "delete");
    }
}
