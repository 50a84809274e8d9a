// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Redis-backed flow state store.
//!
//! State lives at `user_state:{user_id}` as a JSON blob with a TTL; the
//! request counter at `user_rate:{user_id}` is a plain INCR whose window
//! starts when the first increment creates the key.

use std::time::Duration;

use async_trait::async_trait;
use gearbook_core::GearbookError;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, info};

use crate::store::{FlowState, FlowStateStore};

fn state_err(what: &str, e: redis::RedisError) -> GearbookError {
    GearbookError::State {
        message: format!("{what}: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Flow state on Redis, pooled through a [`ConnectionManager`].
#[derive(Clone)]
pub struct RedisStateStore {
    conn_manager: ConnectionManager,
    ttl_secs: u64,
}

impl RedisStateStore {
    /// Connects to Redis and verifies the connection.
    pub async fn connect(redis_url: &str, ttl: Duration) -> Result<Self, GearbookError> {
        let client = Client::open(redis_url)
            .map_err(|e| state_err("failed to create Redis client", e))?;
        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| state_err("failed to connect to Redis", e))?;

        info!(ttl_secs = ttl.as_secs(), "Redis flow state store connected");
        Ok(Self {
            conn_manager,
            ttl_secs: ttl.as_secs(),
        })
    }

    fn state_key(user_id: i64) -> String {
        format!("user_state:{user_id}")
    }

    fn counter_key(user_id: i64) -> String {
        format!("user_rate:{user_id}")
    }

    /// Round-trips a PING; used by readiness checks.
    pub async fn ping(&self) -> Result<(), GearbookError> {
        let mut conn = self.conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| state_err("Redis ping failed", e))?;
        Ok(())
    }
}

#[async_trait]
impl FlowStateStore for RedisStateStore {
    async fn get(&self, user_id: i64) -> Result<Option<FlowState>, GearbookError> {
        let mut conn = self.conn_manager.clone();
        let raw: Option<String> = conn
            .get(Self::state_key(user_id))
            .await
            .map_err(|e| state_err("failed to read flow state", e))?;

        match raw {
            Some(body) => {
                let state = serde_json::from_str(&body).map_err(|e| GearbookError::State {
                    message: format!("stored flow state is not valid JSON: {e}"),
                    source: Some(Box::new(e)),
                })?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, state: &FlowState) -> Result<(), GearbookError> {
        let body = serde_json::to_string(state).map_err(|e| GearbookError::State {
            message: format!("failed to encode flow state: {e}"),
            source: Some(Box::new(e)),
        })?;

        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .set_ex(Self::state_key(state.user_id), body, self.ttl_secs)
            .await
            .map_err(|e| state_err("failed to write flow state", e))?;

        debug!(user_id = state.user_id, step = %state.step, "flow state saved");
        Ok(())
    }

    async fn clear(&self, user_id: i64) -> Result<(), GearbookError> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .del(Self::state_key(user_id))
            .await
            .map_err(|e| state_err("failed to clear flow state", e))?;
        Ok(())
    }

    async fn check_rate_limit(
        &self,
        user_id: i64,
        limit: u32,
        window: Duration,
    ) -> Result<bool, GearbookError> {
        let key = Self::counter_key(user_id);
        let mut conn = self.conn_manager.clone();

        let count: u64 = conn
            .incr(&key, 1)
            .await
            .map_err(|e| state_err("failed to bump request counter", e))?;

        // INCR created the key on the first hit; the window starts here.
        if count == 1 {
            let _: () = conn
                .expire(&key, window.as_secs() as i64)
                .await
                .map_err(|e| state_err("failed to set counter window", e))?;
        }

        Ok(count <= u64::from(limit))
    }
}
