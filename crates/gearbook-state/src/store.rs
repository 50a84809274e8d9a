// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The flow state contract shared by all backends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gearbook_core::GearbookError;
use serde::{Deserialize, Serialize};

/// Partially collected answers of one user's booking flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowState {
    pub user_id: i64,
    /// Name of the flow step the user is currently on.
    pub step: String,
    /// Answers collected so far, keyed by field name.
    #[serde(default)]
    pub values: serde_json::Map<String, serde_json::Value>,
    pub updated_at: String,
}

/// Keyed flow state with TTL plus a single-window request counter.
#[async_trait]
pub trait FlowStateStore: Send + Sync {
    async fn get(&self, user_id: i64) -> Result<Option<FlowState>, GearbookError>;

    async fn set(&self, state: &FlowState) -> Result<(), GearbookError>;

    async fn clear(&self, user_id: i64) -> Result<(), GearbookError>;

    /// Counts this attempt against a fixed window and reports whether it is
    /// admitted. The first burst up to `limit` passes.
    async fn check_rate_limit(
        &self,
        user_id: i64,
        limit: u32,
        window: Duration,
    ) -> Result<bool, GearbookError>;
}

#[async_trait]
impl<T: FlowStateStore + ?Sized> FlowStateStore for Arc<T> {
    async fn get(&self, user_id: i64) -> Result<Option<FlowState>, GearbookError> {
        (**self).get(user_id).await
    }

    async fn set(&self, state: &FlowState) -> Result<(), GearbookError> {
        (**self).set(state).await
    }

    async fn clear(&self, user_id: i64) -> Result<(), GearbookError> {
        (**self).clear(user_id).await
    }

    async fn check_rate_limit(
        &self,
        user_id: i64,
        limit: u32,
        window: Duration,
    ) -> Result<bool, GearbookError> {
        (**self).check_rate_limit(user_id, limit, window).await
    }
}
