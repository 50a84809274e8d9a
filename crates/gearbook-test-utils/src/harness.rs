// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete reservation stack over a temp SQLite
//! database: catalog, engine, availability reader, sync worker, and a
//! scriptable sheet mirror. Driver methods book through the real engine and
//! drain the sync queue deterministically.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use gearbook_core::GearbookError;
use gearbook_core::types::{DayBooking, HourBooking, SyncTask};
use gearbook_engine::{
    AvailabilityReader, BookingPolicy, DayBookingRequest, HourBookingRequest, ItemCache,
    ReservationEngine,
};
use gearbook_state::MemoryStateStore;
use gearbook_storage::Database;
use gearbook_storage::queries::{catalog, schedules, sync_queue};
use gearbook_sync::{DeadLetterSink, RetryPolicy, SyncWorker, WorkerOptions};
use tokio_util::sync::CancellationToken;

use crate::flaky_sheet::FlakySheet;
use crate::manual_clock::{ManualClock, local_time};

/// How far due tasks are fetched when a test inspects the queue.
const DUE_BATCH: i64 = 100;

struct CabinetSpec {
    name: String,
    start: String,
    end: String,
    slot_minutes: i64,
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    clock_start: (i32, u32, u32, u32, u32),
    policy: BookingPolicy,
    retry_policy: RetryPolicy,
    sheet_failures: i64,
    items: Vec<(String, i64)>,
    cabinets: Vec<CabinetSpec>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            // A Monday morning, so weekly schedules seeded by the builder
            // are open on "today".
            clock_start: (2026, 1, 5, 9, 0),
            policy: BookingPolicy::default(),
            retry_policy: RetryPolicy::default(),
            sheet_failures: 0,
            items: Vec::new(),
            cabinets: Vec::new(),
        }
    }

    /// Set the clock's starting local time.
    pub fn at(mut self, year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        self.clock_start = (year, month, day, hour, minute);
        self
    }

    /// Replace the booking policy.
    pub fn with_policy(mut self, policy: BookingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the sync retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Fail the sheet mirror's first `n` mutation calls.
    pub fn with_sheet_failures(mut self, n: i64) -> Self {
        self.sheet_failures = n;
        self
    }

    /// Seed a catalog item; sort order follows call order.
    pub fn with_item(mut self, name: &str, quantity: i64) -> Self {
        self.items.push((name.to_string(), quantity));
        self
    }

    /// Seed a cabinet open every day of the week with one window.
    pub fn with_cabinet(mut self, name: &str, start: &str, end: &str, slot_minutes: i64) -> Self {
        self.cabinets.push(CabinetSpec {
            name: name.to_string(),
            start: start.to_string(),
            end: end.to_string(),
            slot_minutes,
        });
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, GearbookError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| GearbookError::Storage {
            source: Box::new(e),
        })?;
        let db_path = temp_dir.path().join("gearbook.db");
        let db = Arc::new(Database::open(&db_path.to_string_lossy()).await?);

        for (position, (name, quantity)) in self.items.iter().enumerate() {
            catalog::upsert_item(&db, name, None, *quantity, position as i64 + 1).await?;
        }
        for spec in &self.cabinets {
            let cabinet = catalog::upsert_cabinet(&db, &spec.name, None).await?;
            for day_of_week in 1..=7 {
                schedules::upsert_weekly(
                    &db,
                    cabinet.id,
                    day_of_week,
                    &spec.start,
                    &spec.end,
                    spec.slot_minutes,
                )
                .await?;
            }
        }

        let (year, month, day, hour, minute) = self.clock_start;
        let start = local_time(year, month, day, hour, minute).ok_or_else(|| {
            GearbookError::InvalidArgument("clock start is not a valid local time".to_string())
        })?;
        let clock = Arc::new(ManualClock::starting_at(start));

        let sheet = Arc::new(FlakySheet::failing(self.sheet_failures));
        let dead_letters = Arc::new(DeadLetterLog::default());
        let worker = SyncWorker::new(
            db.clone(),
            sheet.clone(),
            self.retry_policy,
            WorkerOptions::default(),
        )
        .with_dead_letter(dead_letters.clone());

        let cache = Arc::new(ItemCache::new(Duration::from_secs(1800)));
        let engine = ReservationEngine::new(db.clone(), cache.clone(), clock.clone(), self.policy)
            .with_sync_hint(worker.hint_sender());
        let reader = AvailabilityReader::new(db.clone(), cache.clone());
        let state = Arc::new(MemoryStateStore::new(Duration::from_secs(86_400)));

        Ok(TestHarness {
            db,
            cache,
            clock,
            engine,
            reader,
            sheet,
            dead_letters,
            state,
            worker,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment over a temp database.
///
/// Subsystems are public for assertions; `book_day()`, `book_hour()`, and
/// `drain_sync()` drive the pipeline the way the service does in production
/// (engine transaction, queue task, sheet mirror).
pub struct TestHarness {
    /// Temp-file database with all migrations applied.
    pub db: Arc<Database>,
    /// Catalog snapshot shared by the engine and the reader.
    pub cache: Arc<ItemCache>,
    /// Clock driving advance-window rules; move it mid-test as needed.
    pub clock: Arc<ManualClock>,
    /// Engine wired to the worker's hint channel.
    pub engine: ReservationEngine,
    /// Availability reads as the API serves them.
    pub reader: AvailabilityReader,
    /// Sheet mirror with scripted failures.
    pub sheet: Arc<FlakySheet>,
    /// Tasks parked after exhausting their retries.
    pub dead_letters: Arc<DeadLetterLog>,
    /// Flow state store (memory backend).
    pub state: Arc<MemoryStateStore>,
    worker: SyncWorker,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Book an item for a day through the real engine, with canned contact
    /// details.
    pub async fn book_day(
        &self,
        user_id: i64,
        item: &str,
        date: &str,
    ) -> Result<DayBooking, GearbookError> {
        self.engine
            .create_day_booking(DayBookingRequest {
                user_id,
                item_name: item.to_string(),
                date: date.to_string(),
                comment: None,
                user_name: Some(format!("User {user_id}")),
                user_phone: Some("+79123456789".to_string()),
            })
            .await
    }

    /// Book a cabinet slot through the real engine.
    pub async fn book_hour(
        &self,
        user_id: i64,
        cabinet: &str,
        date: &str,
        time_label: &str,
    ) -> Result<HourBooking, GearbookError> {
        self.engine
            .create_hour_booking(HourBookingRequest {
                user_id,
                cabinet_name: cabinet.to_string(),
                date: date.to_string(),
                time_label: time_label.to_string(),
                client_name: format!("Client {user_id}"),
                client_phone: "+79123456789".to_string(),
                external_item_name: None,
                comment: None,
            })
            .await
    }

    /// Process every sync task that is currently due, then return.
    ///
    /// Tasks parked on the retry ladder stay put; backdate them with
    /// [`TestHarness::force_due`] to walk the ladder without sleeping.
    pub async fn drain_sync(&self) {
        self.worker.drain_due(&CancellationToken::new()).await;
    }

    /// Tasks the queue would hand out right now, in id order.
    pub async fn due_tasks(&self) -> Result<Vec<SyncTask>, GearbookError> {
        sync_queue::due_batch(&self.db, DUE_BATCH).await
    }

    /// Backdate a retry so the next [`TestHarness::drain_sync`] picks the
    /// task up immediately.
    pub async fn force_due(&self, task_id: i64) -> Result<(), GearbookError> {
        let task = sync_queue::get(&self.db, task_id)
            .await?
            .ok_or_else(|| GearbookError::NotFound {
                what: "sync task",
                name: task_id.to_string(),
            })?;
        sync_queue::mark_retry(
            &self.db,
            task_id,
            task.retry_count,
            "2020-01-01T00:00:00.000Z",
            task.last_error.as_deref().unwrap_or(""),
        )
        .await?;
        Ok(())
    }
}

/// Dead-letter sink that records parked tasks for assertions.
#[derive(Debug, Default)]
pub struct DeadLetterLog {
    parked: Mutex<Vec<SyncTask>>,
}

impl DeadLetterLog {
    /// All tasks parked so far, in arrival order.
    pub fn parked(&self) -> Vec<SyncTask> {
        self.parked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn parked_count(&self) -> usize {
        self.parked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl DeadLetterSink for DeadLetterLog {
    async fn park(&self, task: &SyncTask) -> Result<(), GearbookError> {
        self.parked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task.clone());
        Ok(())
    }
}
