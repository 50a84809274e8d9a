// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cache of booking id to sheet row number.
//!
//! Column A of the bookings tab is scanned in full to rebuild the map. The
//! scan repeats once the refresh interval has elapsed, and again on any
//! lookup miss before the row is treated as absent.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Index {
    rows: HashMap<i64, u32>,
    refreshed_at: Option<Instant>,
}

/// Maps booking ids to 1-based sheet row numbers.
#[derive(Debug)]
pub struct RowCache {
    index: Mutex<Index>,
    refresh_interval: Duration,
}

impl RowCache {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            index: Mutex::new(Index::default()),
            refresh_interval,
        }
    }

    pub async fn get(&self, booking_id: i64) -> Option<u32> {
        self.index.lock().await.rows.get(&booking_id).copied()
    }

    pub async fn insert(&self, booking_id: i64, row: u32) {
        self.index.lock().await.rows.insert(booking_id, row);
    }

    pub async fn remove(&self, booking_id: i64) {
        self.index.lock().await.rows.remove(&booking_id);
    }

    /// Replaces the whole map from a fresh column scan and resets staleness.
    pub async fn replace_all(&self, pairs: Vec<(i64, u32)>) {
        let mut index = self.index.lock().await;
        index.rows = pairs.into_iter().collect();
        index.refreshed_at = Some(Instant::now());
    }

    /// True before the first scan and again once the refresh interval elapses.
    pub async fn is_stale(&self) -> bool {
        match self.index.lock().await.refreshed_at {
            Some(at) => at.elapsed() >= self.refresh_interval,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_cache_is_stale() {
        let cache = RowCache::new(Duration::from_secs(300));
        assert!(cache.is_stale().await);
    }

    #[tokio::test]
    async fn replace_all_resets_staleness_and_contents() {
        let cache = RowCache::new(Duration::from_secs(300));
        cache.insert(99, 42).await;

        cache.replace_all(vec![(7, 2), (8, 3)]).await;

        assert!(!cache.is_stale().await);
        assert_eq!(cache.get(7).await, Some(2));
        assert_eq!(cache.get(8).await, Some(3));
        // The stale entry did not survive the rebuild.
        assert_eq!(cache.get(99).await, None);
    }

    #[tokio::test]
    async fn zero_interval_is_always_stale() {
        let cache = RowCache::new(Duration::ZERO);
        cache.replace_all(vec![(1, 2)]).await;
        assert!(cache.is_stale().await);
    }

    #[tokio::test]
    async fn insert_and_remove_roundtrip() {
        let cache = RowCache::new(Duration::from_secs(300));
        cache.insert(5, 10).await;
        assert_eq!(cache.get(5).await, Some(10));
        cache.remove(5).await;
        assert_eq!(cache.get(5).await, None);
    }
}
