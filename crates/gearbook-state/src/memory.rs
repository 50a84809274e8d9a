// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory flow state store.
//!
//! Serves as the local-dev backend and as the failover target when Redis is
//! unreachable. Expiry is enforced lazily on read; counters reset once their
//! window has passed.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use gearbook_core::GearbookError;

use crate::store::{FlowState, FlowStateStore};

#[derive(Debug)]
struct Counter {
    count: u32,
    window_ends: Instant,
}

/// Flow state in process memory.
#[derive(Debug)]
pub struct MemoryStateStore {
    states: DashMap<i64, (FlowState, Instant)>,
    counters: DashMap<i64, Counter>,
    ttl: Duration,
}

impl MemoryStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            states: DashMap::new(),
            counters: DashMap::new(),
            ttl,
        }
    }
}

#[async_trait]
impl FlowStateStore for MemoryStateStore {
    async fn get(&self, user_id: i64) -> Result<Option<FlowState>, GearbookError> {
        // Clone out of the shard guard before touching the map again.
        let hit = self
            .states
            .get(&user_id)
            .map(|entry| (entry.0.clone(), entry.1));

        match hit {
            Some((state, deadline)) if deadline > Instant::now() => Ok(Some(state)),
            Some(_) => {
                self.states.remove(&user_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, state: &FlowState) -> Result<(), GearbookError> {
        self.states
            .insert(state.user_id, (state.clone(), Instant::now() + self.ttl));
        Ok(())
    }

    async fn clear(&self, user_id: i64) -> Result<(), GearbookError> {
        self.states.remove(&user_id);
        Ok(())
    }

    async fn check_rate_limit(
        &self,
        user_id: i64,
        limit: u32,
        window: Duration,
    ) -> Result<bool, GearbookError> {
        let now = Instant::now();
        let mut entry = self.counters.entry(user_id).or_insert_with(|| Counter {
            count: 0,
            window_ends: now + window,
        });

        if now >= entry.window_ends {
            entry.count = 0;
            entry.window_ends = now + window;
        }
        entry.count += 1;

        Ok(entry.count <= limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state(user_id: i64, step: &str) -> FlowState {
        FlowState {
            user_id,
            step: step.into(),
            values: serde_json::Map::new(),
            updated_at: "2025-11-20T09:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn set_get_clear_roundtrip() {
        let store = MemoryStateStore::new(Duration::from_secs(60));

        assert_eq!(store.get(1).await.unwrap(), None);

        let state = sample_state(1, "pick_item");
        store.set(&state).await.unwrap();
        assert_eq!(store.get(1).await.unwrap(), Some(state));

        store.clear(1).await.unwrap();
        assert_eq!(store.get(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_replaces_previous_state() {
        let store = MemoryStateStore::new(Duration::from_secs(60));
        store.set(&sample_state(1, "pick_item")).await.unwrap();
        store.set(&sample_state(1, "pick_date")).await.unwrap();

        let state = store.get(1).await.unwrap().unwrap();
        assert_eq!(state.step, "pick_date");
    }

    #[tokio::test]
    async fn expired_state_reads_as_absent() {
        let store = MemoryStateStore::new(Duration::from_millis(20));
        store.set(&sample_state(1, "pick_item")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn rate_limit_admits_first_burst_then_denies() {
        let store = MemoryStateStore::new(Duration::from_secs(60));

        for _ in 0..3 {
            assert!(
                store
                    .check_rate_limit(7, 3, Duration::from_secs(60))
                    .await
                    .unwrap()
            );
        }
        assert!(
            !store
                .check_rate_limit(7, 3, Duration::from_secs(60))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn rate_limit_window_resets() {
        let store = MemoryStateStore::new(Duration::from_secs(60));
        let window = Duration::from_millis(30);

        assert!(store.check_rate_limit(7, 1, window).await.unwrap());
        assert!(!store.check_rate_limit(7, 1, window).await.unwrap());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.check_rate_limit(7, 1, window).await.unwrap());
    }

    #[tokio::test]
    async fn counters_are_per_user() {
        let store = MemoryStateStore::new(Duration::from_secs(60));
        let window = Duration::from_secs(60);

        assert!(store.check_rate_limit(1, 1, window).await.unwrap());
        assert!(!store.check_rate_limit(1, 1, window).await.unwrap());
        assert!(store.check_rate_limit(2, 1, window).await.unwrap());
    }
}
