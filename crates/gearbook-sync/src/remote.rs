// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Redis-backed shared task queue and dead-letter list.
//!
//! Instances sharing one database coordinate through a Redis list: a
//! producer `RPUSH`es the task id after commit, and the worker `BLPOP`s it
//! as its idle wait before falling back to a table poll. A second list
//! parks dead-lettered tasks as JSON for operator attention.

use std::time::Duration;

use async_trait::async_trait;
use gearbook_core::GearbookError;
use gearbook_core::types::SyncTask;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::info;

use crate::worker::DeadLetterSink;

fn queue_err(what: &str, e: redis::RedisError) -> GearbookError {
    GearbookError::State {
        message: format!("{what}: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Shared task announcements plus the dead-letter list, on Redis.
#[derive(Clone)]
pub struct RemoteQueue {
    conn_manager: ConnectionManager,
    queue_key: String,
    dead_letter_key: String,
}

impl RemoteQueue {
    /// Connects to Redis and verifies the connection.
    pub async fn connect(
        redis_url: &str,
        queue_key: &str,
        dead_letter_key: &str,
    ) -> Result<Self, GearbookError> {
        let client = Client::open(redis_url)
            .map_err(|e| queue_err("failed to create Redis client", e))?;
        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| queue_err("failed to connect to Redis", e))?;

        info!(queue_key, dead_letter_key, "remote sync queue connected");
        Ok(Self {
            conn_manager,
            queue_key: queue_key.to_string(),
            dead_letter_key: dead_letter_key.to_string(),
        })
    }

    /// Announce a freshly committed task to whichever instance pops first.
    pub async fn push(&self, task_id: i64) -> Result<(), GearbookError> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .rpush(&self.queue_key, task_id)
            .await
            .map_err(|e| queue_err("failed to announce sync task", e))?;
        Ok(())
    }

    /// Pop the next announced task id, waiting up to `timeout`.
    ///
    /// `None` means the wait elapsed with nothing announced.
    pub async fn pop(&self, timeout: Duration) -> Result<Option<i64>, GearbookError> {
        let mut conn = self.conn_manager.clone();
        let reply: Option<(String, String)> = conn
            .blpop(&self.queue_key, timeout.as_secs_f64())
            .await
            .map_err(|e| queue_err("failed to pop from remote queue", e))?;

        match reply {
            Some((_, raw)) => {
                let id = raw.parse::<i64>().map_err(|e| GearbookError::State {
                    message: format!("remote queue entry is not a task id: {raw:?}"),
                    source: Some(Box::new(e)),
                })?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Dead-letter list length; surfaced by the doctor command.
    pub async fn dead_letter_depth(&self) -> Result<i64, GearbookError> {
        let mut conn = self.conn_manager.clone();
        conn.llen(&self.dead_letter_key)
            .await
            .map_err(|e| queue_err("failed to read dead-letter depth", e))
    }

    /// Round-trips a PING; used by readiness checks.
    pub async fn ping(&self) -> Result<(), GearbookError> {
        let mut conn = self.conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| queue_err("Redis ping failed", e))?;
        Ok(())
    }
}

#[async_trait]
impl DeadLetterSink for RemoteQueue {
    async fn park(&self, task: &SyncTask) -> Result<(), GearbookError> {
        let body = serde_json::to_string(task).map_err(|e| {
            GearbookError::Internal(format!("failed to encode dead-letter task {}: {e}", task.id))
        })?;

        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .rpush(&self.dead_letter_key, body)
            .await
            .map_err(|e| queue_err("failed to push dead-letter task", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearbook_core::types::{SyncTaskStatus, SyncTaskType};

    // These tests require a running Redis instance:
    //   docker run -d -p 6379:6379 redis:7-alpine

    const REDIS_URL: &str = "redis://127.0.0.1:6379";

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn push_pop_roundtrip() {
        let queue = RemoteQueue::connect(REDIS_URL, "test:sync:announce", "test:sync:dead")
            .await
            .unwrap();

        queue.push(12345).await.unwrap();
        assert_eq!(
            queue.pop(Duration::from_secs(1)).await.unwrap(),
            Some(12345)
        );
        // Queue drained; the next pop times out empty.
        assert_eq!(queue.pop(Duration::from_millis(100)).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn dead_letter_park_grows_the_list() {
        let queue = RemoteQueue::connect(REDIS_URL, "test:sync:announce2", "test:sync:dead2")
            .await
            .unwrap();

        let before = queue.dead_letter_depth().await.unwrap();
        queue
            .park(&SyncTask {
                id: 77,
                task_type: SyncTaskType::Upsert,
                booking_id: Some(77),
                payload: "{}".into(),
                status: SyncTaskStatus::Failed,
                retry_count: 2,
                last_error: Some("sheet down".into()),
                created_at: "2025-11-20T09:00:00.000Z".into(),
                processed_at: Some("2025-11-20T09:05:00.000Z".into()),
                next_retry_at: None,
            })
            .await
            .unwrap();
        assert_eq!(queue.dead_letter_depth().await.unwrap(), before + 1);
    }
}
