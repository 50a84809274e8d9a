// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User records keyed by the external chat user id.

use gearbook_core::GearbookError;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::UserRecord;

fn row_to_user(row: &rusqlite::Row) -> Result<UserRecord, rusqlite::Error> {
    Ok(UserRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        blacklisted: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Insert or refresh a user. The blacklist flag is preserved on update.
pub async fn upsert_user(
    db: &Database,
    id: i64,
    name: Option<&str>,
    phone: Option<&str>,
) -> Result<UserRecord, GearbookError> {
    let name = name.map(str::to_string);
    let phone = phone.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (id, name, phone)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     phone = excluded.phone,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![id, name, phone],
            )?;
            conn.query_row(
                "SELECT id, name, phone, blacklisted, created_at, updated_at
                 FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_user(db: &Database, id: i64) -> Result<Option<UserRecord>, GearbookError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, name, phone, blacklisted, created_at, updated_at
                 FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Flip the blacklist flag. Returns false when the user does not exist.
pub async fn set_blacklisted(db: &Database, id: i64, flag: bool) -> Result<bool, GearbookError> {
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(
                "UPDATE users SET blacklisted = ?1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![flag, id],
            )?;
            Ok(affected > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Whether the user is blacklisted. Unknown users are not.
pub async fn is_blacklisted(db: &Database, id: i64) -> Result<bool, GearbookError> {
    db.connection()
        .call(move |conn| {
            let flag: Option<bool> = conn
                .query_row(
                    "SELECT blacklisted FROM users WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(flag.unwrap_or(false))
        })
        .await
        .map_err(crate::database::map_tr_err)
}
