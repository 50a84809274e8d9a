// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalog operations for items and cabinets.
//!
//! Names are unique per table; lookups trim and lower-case both sides so
//! "Projector" and " projector " resolve to the same row.

use gearbook_core::GearbookError;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{Cabinet, Item};

fn row_to_item(row: &rusqlite::Row) -> Result<Item, rusqlite::Error> {
    Ok(Item {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        total_quantity: row.get(3)?,
        sort_order: row.get(4)?,
        active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn row_to_cabinet(row: &rusqlite::Row) -> Result<Cabinet, rusqlite::Error> {
    Ok(Cabinet {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        active: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// All active items, sorted by (sort_order, id).
pub async fn list_active_items(db: &Database) -> Result<Vec<Item>, GearbookError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, total_quantity, sort_order, active,
                        created_at, updated_at
                 FROM items WHERE active = 1 ORDER BY sort_order ASC, id ASC",
            )?;
            let rows = stmt.query_map([], row_to_item)?;
            let mut items = Vec::new();
            for row in rows {
                items.push(row?);
            }
            Ok(items)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Every item regardless of the active flag, sorted by (sort_order, id).
pub async fn list_items(db: &Database) -> Result<Vec<Item>, GearbookError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, total_quantity, sort_order, active,
                        created_at, updated_at
                 FROM items ORDER BY sort_order ASC, id ASC",
            )?;
            let rows = stmt.query_map([], row_to_item)?;
            let mut items = Vec::new();
            for row in rows {
                items.push(row?);
            }
            Ok(items)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_item(db: &Database, id: i64) -> Result<Option<Item>, GearbookError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, name, description, total_quantity, sort_order, active,
                        created_at, updated_at
                 FROM items WHERE id = ?1",
                params![id],
                row_to_item,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Case-insensitive item lookup by name.
pub async fn find_item_by_name(db: &Database, name: &str) -> Result<Option<Item>, GearbookError> {
    let name = name.trim().to_lowercase();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, name, description, total_quantity, sort_order, active,
                        created_at, updated_at
                 FROM items WHERE LOWER(TRIM(name)) = ?1",
                params![name],
                row_to_item,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert an item or update an existing one by name. Reactivates the row.
///
/// Used by catalog seeding; repeated seeding with the same file is a no-op
/// apart from updated_at.
pub async fn upsert_item(
    db: &Database,
    name: &str,
    description: Option<&str>,
    total_quantity: i64,
    sort_order: i64,
) -> Result<Item, GearbookError> {
    let name = name.trim().to_string();
    let description = description.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO items (name, description, total_quantity, sort_order)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(name) DO UPDATE SET
                     description = excluded.description,
                     total_quantity = excluded.total_quantity,
                     sort_order = excluded.sort_order,
                     active = 1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![name, description, total_quantity, sort_order],
            )?;
            conn.query_row(
                "SELECT id, name, description, total_quantity, sort_order, active,
                        created_at, updated_at
                 FROM items WHERE name = ?1",
                params![name],
                row_to_item,
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Flip the active flag. Returns false when the item does not exist.
pub async fn set_item_active(db: &Database, id: i64, active: bool) -> Result<bool, GearbookError> {
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(
                "UPDATE items SET active = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![active, id],
            )?;
            Ok(affected > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All active cabinets, sorted by id.
pub async fn list_active_cabinets(db: &Database) -> Result<Vec<Cabinet>, GearbookError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, active, created_at, updated_at
                 FROM cabinets WHERE active = 1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([], row_to_cabinet)?;
            let mut cabinets = Vec::new();
            for row in rows {
                cabinets.push(row?);
            }
            Ok(cabinets)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_cabinet(db: &Database, id: i64) -> Result<Option<Cabinet>, GearbookError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, name, description, active, created_at, updated_at
                 FROM cabinets WHERE id = ?1",
                params![id],
                row_to_cabinet,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Case-insensitive cabinet lookup by name.
pub async fn find_cabinet_by_name(
    db: &Database,
    name: &str,
) -> Result<Option<Cabinet>, GearbookError> {
    let name = name.trim().to_lowercase();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, name, description, active, created_at, updated_at
                 FROM cabinets WHERE LOWER(TRIM(name)) = ?1",
                params![name],
                row_to_cabinet,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert a cabinet or update an existing one by name. Reactivates the row.
pub async fn upsert_cabinet(
    db: &Database,
    name: &str,
    description: Option<&str>,
) -> Result<Cabinet, GearbookError> {
    let name = name.trim().to_string();
    let description = description.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO cabinets (name, description)
                 VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET
                     description = excluded.description,
                     active = 1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![name, description],
            )?;
            conn.query_row(
                "SELECT id, name, description, active, created_at, updated_at
                 FROM cabinets WHERE name = ?1",
                params![name],
                row_to_cabinet,
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Flip the active flag. Returns false when the cabinet does not exist.
pub async fn set_cabinet_active(
    db: &Database,
    id: i64,
    active: bool,
) -> Result<bool, GearbookError> {
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(
                "UPDATE cabinets SET active = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![active, id],
            )?;
            Ok(affected > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn upsert_item_inserts_then_updates() {
        let db = setup_db().await;

        let first = upsert_item(&db, "Projector", Some("HD projector"), 3, 10)
            .await
            .unwrap();
        assert!(first.id > 0);
        assert_eq!(first.total_quantity, 3);
        assert!(first.active);

        let second = upsert_item(&db, "Projector", Some("4K projector"), 5, 10)
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.total_quantity, 5);
        assert_eq!(second.description.as_deref(), Some("4K projector"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_item_by_name_is_case_insensitive() {
        let db = setup_db().await;
        upsert_item(&db, "Projector", None, 1, 0).await.unwrap();

        let found = find_item_by_name(&db, "  pRoJeCtOr ").await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().name, "Projector");

        let missing = find_item_by_name(&db, "no such item").await.unwrap();
        assert!(missing.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_active_items_sorts_and_filters() {
        let db = setup_db().await;
        upsert_item(&db, "Zeta", None, 1, 20).await.unwrap();
        let alpha = upsert_item(&db, "Alpha", None, 1, 10).await.unwrap();
        let hidden = upsert_item(&db, "Hidden", None, 1, 0).await.unwrap();
        set_item_active(&db, hidden.id, false).await.unwrap();

        let items = list_active_items(&db).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, alpha.id);
        assert_eq!(items[0].name, "Alpha");
        assert_eq!(items[1].name, "Zeta");

        let all = list_items(&db).await.unwrap();
        assert_eq!(all.len(), 3);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_reactivates_deactivated_item() {
        let db = setup_db().await;
        let item = upsert_item(&db, "Camera", None, 2, 0).await.unwrap();
        set_item_active(&db, item.id, false).await.unwrap();
        assert!(!get_item(&db, item.id).await.unwrap().unwrap().active);

        let again = upsert_item(&db, "Camera", None, 2, 0).await.unwrap();
        assert!(again.active);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn cabinet_roundtrip() {
        let db = setup_db().await;
        let cab = upsert_cabinet(&db, "Room A", Some("ground floor"))
            .await
            .unwrap();
        assert!(cab.id > 0);

        let by_name = find_cabinet_by_name(&db, "room a").await.unwrap();
        assert_eq!(by_name.map(|c| c.id), Some(cab.id));

        set_cabinet_active(&db, cab.id, false).await.unwrap();
        assert!(list_active_cabinets(&db).await.unwrap().is_empty());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn set_item_active_on_missing_row_returns_false() {
        let db = setup_db().await;
        assert!(!set_item_active(&db, 424242, false).await.unwrap());
        db.close().await.unwrap();
    }
}
