// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failover adapter over a primary and a fallback state store.
//!
//! Any primary error flips the adapter onto the fallback; the primary is
//! reprobed by at most one request per reprobe interval. State written to the
//! fallback while the primary is down is not replayed on recovery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gearbook_core::GearbookError;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::store::{FlowState, FlowStateStore};

const DEFAULT_REPROBE_INTERVAL: Duration = Duration::from_secs(60);

/// Routes to `primary` while it is healthy, to `fallback` otherwise.
pub struct FailoverStateStore<P, F> {
    primary: P,
    fallback: F,
    primary_down: AtomicBool,
    last_probe: Mutex<Option<Instant>>,
    reprobe_interval: Duration,
}

impl<P: FlowStateStore, F: FlowStateStore> FailoverStateStore<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self {
            primary,
            fallback,
            primary_down: AtomicBool::new(false),
            last_probe: Mutex::new(None),
            reprobe_interval: DEFAULT_REPROBE_INTERVAL,
        }
    }

    /// Overrides how long the adapter waits before retrying the primary.
    pub fn with_reprobe_interval(mut self, interval: Duration) -> Self {
        self.reprobe_interval = interval;
        self
    }

    /// True if this request should try the primary: either it is healthy, or
    /// it is down and this request wins the one probe slot for the interval.
    async fn primary_usable(&self) -> bool {
        if !self.primary_down.load(Ordering::Relaxed) {
            return true;
        }

        let mut last = self.last_probe.lock().await;
        match *last {
            Some(at) if at.elapsed() < self.reprobe_interval => false,
            _ => {
                *last = Some(Instant::now());
                true
            }
        }
    }

    fn mark_up(&self) {
        if self.primary_down.swap(false, Ordering::Relaxed) {
            info!("primary state store recovered");
        }
    }

    async fn mark_down(&self, e: &GearbookError) {
        if !self.primary_down.swap(true, Ordering::Relaxed) {
            warn!(error = %e, "primary state store failed, switching to fallback");
        }
        *self.last_probe.lock().await = Some(Instant::now());
    }
}

#[async_trait]
impl<P: FlowStateStore, F: FlowStateStore> FlowStateStore for FailoverStateStore<P, F> {
    async fn get(&self, user_id: i64) -> Result<Option<FlowState>, GearbookError> {
        if self.primary_usable().await {
            match self.primary.get(user_id).await {
                Ok(v) => {
                    self.mark_up();
                    return Ok(v);
                }
                Err(e) => self.mark_down(&e).await,
            }
        }
        self.fallback.get(user_id).await
    }

    async fn set(&self, state: &FlowState) -> Result<(), GearbookError> {
        if self.primary_usable().await {
            match self.primary.set(state).await {
                Ok(()) => {
                    self.mark_up();
                    return Ok(());
                }
                Err(e) => self.mark_down(&e).await,
            }
        }
        self.fallback.set(state).await
    }

    async fn clear(&self, user_id: i64) -> Result<(), GearbookError> {
        if self.primary_usable().await {
            match self.primary.clear(user_id).await {
                Ok(()) => {
                    self.mark_up();
                    return Ok(());
                }
                Err(e) => self.mark_down(&e).await,
            }
        }
        self.fallback.clear(user_id).await
    }

    async fn check_rate_limit(
        &self,
        user_id: i64,
        limit: u32,
        window: Duration,
    ) -> Result<bool, GearbookError> {
        if self.primary_usable().await {
            match self.primary.check_rate_limit(user_id, limit, window).await {
                Ok(allowed) => {
                    self.mark_up();
                    return Ok(allowed);
                }
                Err(e) => self.mark_down(&e).await,
            }
        }
        self.fallback.check_rate_limit(user_id, limit, window).await
    }
}
