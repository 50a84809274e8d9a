// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-through cache over the item catalog.
//!
//! Name lookups and item listings hit a TTL-bounded snapshot; booked counts
//! always go to the store so capacity decisions are never stale relative to
//! writes. A name missing from the snapshot falls through to a store read,
//! so items created since the last refresh are still bookable.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use gearbook_core::GearbookError;
use gearbook_core::types::Item;
use gearbook_storage::Database;
use gearbook_storage::queries::catalog;
use tracing::debug;

/// Item catalog snapshot with a TTL.
///
/// Readers take the shared lock; a refresh builds the new snapshot outside
/// any lock and takes the exclusive lock only for the swap.
pub struct ItemCache {
    ttl: Duration,
    inner: RwLock<Snapshot>,
}

struct Snapshot {
    /// Active items keyed by trimmed, lowercased name.
    by_name: HashMap<String, Item>,
    /// Active items in (sort_order, id) order.
    ordered: Vec<Item>,
    refreshed_at: Option<Instant>,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

impl ItemCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(Snapshot {
                by_name: HashMap::new(),
                ordered: Vec::new(),
                refreshed_at: None,
            }),
        }
    }

    /// Look up an active item by case-insensitive name.
    ///
    /// A snapshot miss falls through to the store; inactive items resolve
    /// to `None` either way.
    pub async fn find_by_name(
        &self,
        db: &Database,
        name: &str,
    ) -> Result<Option<Item>, GearbookError> {
        self.ensure_fresh(db).await?;

        let key = normalize(name);
        let cached = {
            let snapshot = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            snapshot.by_name.get(&key).cloned()
        };
        if cached.is_some() {
            return Ok(cached);
        }

        Ok(catalog::find_item_by_name(db, name)
            .await?
            .filter(|item| item.active))
    }

    /// All active items in (sort_order, id) order.
    pub async fn list_active(&self, db: &Database) -> Result<Vec<Item>, GearbookError> {
        self.ensure_fresh(db).await?;
        let snapshot = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(snapshot.ordered.clone())
    }

    /// Drop the snapshot so the next read refreshes from the store.
    pub fn invalidate(&self) {
        let mut snapshot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        snapshot.refreshed_at = None;
    }

    async fn ensure_fresh(&self, db: &Database) -> Result<(), GearbookError> {
        {
            let snapshot = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(at) = snapshot.refreshed_at
                && at.elapsed() < self.ttl
            {
                return Ok(());
            }
        }

        let items = catalog::list_active_items(db).await?;
        let mut by_name = HashMap::with_capacity(items.len());
        for item in &items {
            by_name.insert(normalize(&item.name), item.clone());
        }
        debug!(count = items.len(), "item cache refreshed");

        let mut snapshot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        snapshot.by_name = by_name;
        snapshot.ordered = items;
        snapshot.refreshed_at = Some(Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_db() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        catalog::upsert_item(&db, "Camera", None, 2, 1).await.unwrap();
        catalog::upsert_item(&db, "Lens", None, 3, 2).await.unwrap();
        db
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive_and_trimmed() {
        let db = seeded_db().await;
        let cache = ItemCache::new(Duration::from_secs(1800));

        let item = cache.find_by_name(&db, "  CAMERA ").await.unwrap().unwrap();
        assert_eq!(item.name, "Camera");
        assert!(cache.find_by_name(&db, "tripod").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn miss_falls_through_to_the_store() {
        let db = seeded_db().await;
        let cache = ItemCache::new(Duration::from_secs(1800));

        // Warm the snapshot, then add an item behind its back.
        cache.list_active(&db).await.unwrap();
        catalog::upsert_item(&db, "Tripod", None, 1, 3).await.unwrap();

        let item = cache.find_by_name(&db, "tripod").await.unwrap().unwrap();
        assert_eq!(item.name, "Tripod");
        // The listing stays on the snapshot until invalidated.
        assert_eq!(cache.list_active(&db).await.unwrap().len(), 2);

        cache.invalidate();
        assert_eq!(cache.list_active(&db).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn deactivated_item_disappears_after_invalidate() {
        let db = seeded_db().await;
        let cache = ItemCache::new(Duration::from_secs(1800));

        let item = cache.find_by_name(&db, "camera").await.unwrap().unwrap();
        catalog::set_item_active(&db, item.id, false).await.unwrap();
        cache.invalidate();

        assert!(cache.find_by_name(&db, "camera").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn zero_ttl_refreshes_every_read() {
        let db = seeded_db().await;
        let cache = ItemCache::new(Duration::from_secs(0));

        cache.list_active(&db).await.unwrap();
        catalog::upsert_item(&db, "Tripod", None, 1, 3).await.unwrap();
        assert_eq!(cache.list_active(&db).await.unwrap().len(), 3);
    }
}
