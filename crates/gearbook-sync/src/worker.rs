// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The sync worker: a single consumer draining the durable queue.
//!
//! Wakeups are checked in priority order: the in-process hint channel the
//! engine nudges after each commit, the shared remote queue where other
//! instances announce task ids, and the poll timer that catches retry
//! delays expiring. Either way the work itself always comes from the
//! table, so a lost announcement only costs latency, never a task.
//!
//! Handlers run under a per-task timeout. A transient failure walks the
//! retry ladder; an undecodable payload or an exhausted ladder marks the
//! task failed and parks it on the dead-letter sink.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use gearbook_core::GearbookError;
use gearbook_core::types::{SyncTask, SyncTaskStatus};
use gearbook_sheets::SheetWriter;
use gearbook_storage::Database;
use gearbook_storage::queries::sync_queue;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::RetryPolicy;
use crate::handlers::{self, TaskError};
use crate::remote::RemoteQueue;

/// How long a remote `BLPOP` blocks before the loop re-checks its other
/// wakeup sources.
const REMOTE_POP_TIMEOUT: Duration = Duration::from_secs(1);

/// A full hint channel already holds a wakeup, so senders drop overflow.
const HINT_CAPACITY: usize = 16;

/// Where permanently failed tasks are parked for operator attention.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn park(&self, task: &SyncTask) -> Result<(), GearbookError>;
}

/// Tuning knobs from the `sync` config section.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Due tasks fetched per poll.
    pub batch_size: i64,
    /// Sleep between empty polls.
    pub poll_interval: Duration,
    /// Per-task handler timeout.
    pub task_timeout: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            batch_size: 20,
            poll_interval: Duration::from_secs(5),
            task_timeout: Duration::from_secs(30),
        }
    }
}

/// What woke the worker up.
enum Wake {
    /// The engine committed something in this process.
    Hint,
    /// Another instance announced a task id on the remote queue.
    Remote,
    /// The poll timer came due (or the worker just started).
    Poll,
    Shutdown,
}

pub struct SyncWorker {
    db: Arc<Database>,
    sheet: Arc<dyn SheetWriter>,
    policy: RetryPolicy,
    options: WorkerOptions,
    remote: Option<RemoteQueue>,
    dead_letter: Option<Arc<dyn DeadLetterSink>>,
    hint_tx: mpsc::Sender<()>,
    hint_rx: mpsc::Receiver<()>,
}

impl SyncWorker {
    pub fn new(
        db: Arc<Database>,
        sheet: Arc<dyn SheetWriter>,
        policy: RetryPolicy,
        options: WorkerOptions,
    ) -> Self {
        let (hint_tx, hint_rx) = mpsc::channel(HINT_CAPACITY);
        Self {
            db,
            sheet,
            policy,
            options,
            remote: None,
            dead_letter: None,
            hint_tx,
            hint_rx,
        }
    }

    /// Attach the shared remote queue. It doubles as the dead-letter sink
    /// unless one was set explicitly.
    pub fn with_remote(mut self, remote: RemoteQueue) -> Self {
        if self.dead_letter.is_none() {
            self.dead_letter = Some(Arc::new(remote.clone()));
        }
        self.remote = Some(remote);
        self
    }

    /// Replace the dead-letter sink.
    pub fn with_dead_letter(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letter = Some(sink);
        self
    }

    /// Sender half of the hint channel; the engine nudges it after commits.
    pub fn hint_sender(&self) -> mpsc::Sender<()> {
        self.hint_tx.clone()
    }

    /// Run until cancelled. Once the token fires, no further task is
    /// dispatched or marked; anything still due stays for the next run.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            batch_size = self.options.batch_size,
            poll_interval_secs = self.options.poll_interval.as_secs(),
            remote = self.remote.is_some(),
            "sync worker running"
        );

        // First poll fires immediately so a backlog from a previous run
        // drains without waiting out the interval.
        let mut next_poll = Instant::now();
        loop {
            match self.next_wake(&cancel, next_poll).await {
                Wake::Shutdown => {
                    info!("shutdown signal received, stopping sync worker");
                    break;
                }
                Wake::Hint | Wake::Remote => {
                    self.drain_hints();
                    self.drain_due(&cancel).await;
                }
                Wake::Poll => {
                    self.drain_hints();
                    self.drain_due(&cancel).await;
                    next_poll = Instant::now() + self.options.poll_interval;
                }
            }
        }
    }

    /// Block until something signals due work, in priority order: local
    /// hints, remote announcements, then the poll timer.
    async fn next_wake(&mut self, cancel: &CancellationToken, next_poll: Instant) -> Wake {
        loop {
            if cancel.is_cancelled() {
                return Wake::Shutdown;
            }
            if self.hint_rx.try_recv().is_ok() {
                return Wake::Hint;
            }
            if Instant::now() >= next_poll {
                return Wake::Poll;
            }

            match &self.remote {
                Some(remote) => match remote.pop(REMOTE_POP_TIMEOUT).await {
                    Ok(Some(task_id)) => {
                        debug!(task_id, "task announced on remote queue");
                        return Wake::Remote;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, "remote queue pop failed");
                        // Pace the loop while Redis is down.
                        tokio::select! {
                            _ = cancel.cancelled() => return Wake::Shutdown,
                            Some(()) = self.hint_rx.recv() => return Wake::Hint,
                            _ = tokio::time::sleep(REMOTE_POP_TIMEOUT) => {}
                        }
                    }
                },
                None => {
                    let wait = next_poll.saturating_duration_since(Instant::now());
                    tokio::select! {
                        _ = cancel.cancelled() => return Wake::Shutdown,
                        Some(()) = self.hint_rx.recv() => return Wake::Hint,
                        _ = tokio::time::sleep(wait) => return Wake::Poll,
                    }
                }
            }
        }
    }

    /// Collapse queued-up hints into the batch that is about to run.
    fn drain_hints(&mut self) {
        while self.hint_rx.try_recv().is_ok() {}
    }

    /// Work off due tasks until the table stops handing out full batches.
    ///
    /// [`SyncWorker::run`] calls this on every wakeup; test harnesses call
    /// it directly to drain the queue without the long-running loop.
    pub async fn drain_due(&self, cancel: &CancellationToken) {
        loop {
            let processed = self.run_due_batch(cancel).await;
            if cancel.is_cancelled() || (processed as i64) < self.options.batch_size {
                break;
            }
        }
    }

    /// Fetch one batch of due tasks and run them in id order.
    async fn run_due_batch(&self, cancel: &CancellationToken) -> usize {
        let batch = match sync_queue::due_batch(&self.db, self.options.batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "failed to fetch due sync tasks");
                return 0;
            }
        };
        if batch.is_empty() {
            return 0;
        }

        debug!(count = batch.len(), "processing due sync tasks");
        let mut processed = 0;
        for task in &batch {
            // Stop dispatching once shutdown begins; the rest stays due.
            if cancel.is_cancelled() {
                break;
            }
            self.run_one(task).await;
            processed += 1;
        }
        processed
    }

    /// Run one task under the handler timeout and record its outcome.
    async fn run_one(&self, task: &SyncTask) {
        let started = Instant::now();
        let result = match tokio::time::timeout(
            self.options.task_timeout,
            handlers::run_task(&self.db, self.sheet.as_ref(), task),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TaskError::Transient(GearbookError::Timeout {
                duration: self.options.task_timeout,
            })),
        };

        match result {
            Ok(()) => match sync_queue::mark_completed(&self.db, task.id).await {
                Ok(true) => {
                    metrics::counter!("gearbook_sync_tasks_total", "outcome" => "completed")
                        .increment(1);
                    debug!(
                        task_id = task.id,
                        task_type = %task.task_type,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "sync task completed"
                    );
                }
                Ok(false) => debug!(task_id = task.id, "task already completed elsewhere"),
                Err(e) => error!(task_id = task.id, error = %e, "failed to mark task completed"),
            },
            Err(TaskError::BadPayload(reason)) => {
                warn!(
                    task_id = task.id,
                    task_type = %task.task_type,
                    error = %reason,
                    "task payload is undecodable"
                );
                self.fail_task(task, &reason).await;
            }
            Err(TaskError::Transient(e)) => self.retry_or_fail(task, &e.to_string()).await,
        }
    }

    /// Schedule the next attempt, or dead-letter when the ladder is spent.
    async fn retry_or_fail(&self, task: &SyncTask, reason: &str) {
        if self.policy.exhausted(task.retry_count) {
            warn!(
                task_id = task.id,
                task_type = %task.task_type,
                retry_count = task.retry_count,
                error = reason,
                "sync task out of retries"
            );
            self.fail_task(task, reason).await;
            return;
        }

        let attempt = task.retry_count + 1;
        let delay = self.policy.delay(attempt);
        let next_retry_at = retry_timestamp(delay);
        match sync_queue::mark_retry(&self.db, task.id, attempt, &next_retry_at, reason).await {
            Ok(true) => {
                metrics::counter!("gearbook_sync_tasks_total", "outcome" => "retry").increment(1);
                debug!(
                    task_id = task.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = reason,
                    "sync task scheduled for retry"
                );
            }
            Ok(false) => debug!(task_id = task.id, "task completed elsewhere, not retrying"),
            Err(e) => error!(task_id = task.id, error = %e, "failed to schedule task retry"),
        }
    }

    /// Mark the task failed and park it on the dead-letter sink.
    async fn fail_task(&self, task: &SyncTask, reason: &str) {
        match sync_queue::mark_failed(&self.db, task.id, reason).await {
            Ok(true) => {
                metrics::counter!("gearbook_sync_tasks_total", "outcome" => "failed").increment(1);
            }
            Ok(false) => {
                debug!(task_id = task.id, "task completed elsewhere, not failing");
                return;
            }
            Err(e) => {
                // Leave the row as is; it stays due and will come back.
                error!(task_id = task.id, error = %e, "failed to mark task failed");
                return;
            }
        }

        let mut parked = task.clone();
        parked.status = SyncTaskStatus::Failed;
        parked.last_error = Some(reason.to_string());
        match &self.dead_letter {
            Some(sink) => {
                if let Err(e) = sink.park(&parked).await {
                    warn!(task_id = task.id, error = %e, "dead-letter push failed");
                }
            }
            None => warn!(
                task_id = task.id,
                task_type = %task.task_type,
                error = reason,
                "task dead-lettered with no sink configured"
            ),
        }
    }
}

/// UTC timestamp `after` from now, millisecond precision, in the format
/// the queue table compares lexicographically against SQLite's `now`.
fn retry_timestamp(after: Duration) -> String {
    let at = Utc::now() + chrono::Duration::milliseconds(after.as_millis() as i64);
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI64, Ordering};

    use gearbook_core::types::{
        BookingSnapshot, BookingStatus, DayBooking, ScheduleRange, SyncTaskType,
    };
    use gearbook_sheets::{BookingRow, MemorySheet, ScheduleRow};

    /// Delegates to a [`MemorySheet`] after failing the first `n` calls.
    struct FlakySheet {
        inner: MemorySheet,
        failures_left: AtomicI64,
    }

    impl FlakySheet {
        fn failing(n: i64) -> Self {
            Self {
                inner: MemorySheet::new(),
                failures_left: AtomicI64::new(n),
            }
        }

        fn trip(&self) -> Result<(), GearbookError> {
            if self.failures_left.fetch_sub(1, Ordering::SeqCst) > 0 {
                return Err(GearbookError::Sheet {
                    message: "sheet briefly down".into(),
                    source: None,
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SheetWriter for FlakySheet {
        async fn upsert_row(&self, row: &BookingRow) -> Result<(), GearbookError> {
            self.trip()?;
            self.inner.upsert_row(row).await
        }

        async fn delete_row(&self, booking_id: i64) -> Result<(), GearbookError> {
            self.trip()?;
            self.inner.delete_row(booking_id).await
        }

        async fn update_status(
            &self,
            booking_id: i64,
            status: BookingStatus,
            updated_at: &str,
        ) -> Result<(), GearbookError> {
            self.trip()?;
            self.inner.update_status(booking_id, status, updated_at).await
        }

        async fn write_schedule(
            &self,
            rows: &[ScheduleRow],
            range: &ScheduleRange,
        ) -> Result<(), GearbookError> {
            self.trip()?;
            self.inner.write_schedule(rows, range).await
        }

        async fn ping(&self) -> Result<(), GearbookError> {
            Ok(())
        }
    }

    /// Sleeps long enough for the task timeout to fire.
    struct StalledSheet;

    #[async_trait]
    impl SheetWriter for StalledSheet {
        async fn upsert_row(&self, _row: &BookingRow) -> Result<(), GearbookError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }

        async fn delete_row(&self, _booking_id: i64) -> Result<(), GearbookError> {
            Ok(())
        }

        async fn update_status(
            &self,
            _booking_id: i64,
            _status: BookingStatus,
            _updated_at: &str,
        ) -> Result<(), GearbookError> {
            Ok(())
        }

        async fn write_schedule(
            &self,
            _rows: &[ScheduleRow],
            _range: &ScheduleRange,
        ) -> Result<(), GearbookError> {
            Ok(())
        }

        async fn ping(&self) -> Result<(), GearbookError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct ParkingLot {
        parked: Mutex<Vec<SyncTask>>,
    }

    impl ParkingLot {
        fn tasks(&self) -> Vec<SyncTask> {
            self.parked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeadLetterSink for ParkingLot {
        async fn park(&self, task: &SyncTask) -> Result<(), GearbookError> {
            self.parked.lock().unwrap().push(task.clone());
            Ok(())
        }
    }

    fn day_snapshot(id: i64) -> String {
        serde_json::to_string(&BookingSnapshot::Day(DayBooking {
            id,
            user_id: 100,
            item_id: 3,
            item_name: "camera".into(),
            date: "2025-12-01".into(),
            status: BookingStatus::Pending,
            comment: None,
            version: 1,
            user_name: None,
            user_phone: None,
            created_at: "2025-11-20T09:00:00.000Z".into(),
            updated_at: "2025-11-20T09:00:00.000Z".into(),
        }))
        .unwrap()
    }

    fn scenario_policy() -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
            max_retries: 3,
        }
    }

    /// Backdate a retry so the next `due_batch` hands the task out again.
    async fn force_due(db: &Database, task_id: i64) {
        let task = sync_queue::get(db, task_id).await.unwrap().unwrap();
        sync_queue::mark_retry(
            db,
            task_id,
            task.retry_count,
            "2020-01-01T00:00:00.000Z",
            task.last_error.as_deref().unwrap_or(""),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn failing_attempt_schedules_retry_then_completes() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let sheet = Arc::new(FlakySheet::failing(1));
        let worker = SyncWorker::new(
            db.clone(),
            sheet.clone(),
            scenario_policy(),
            WorkerOptions::default(),
        );
        let cancel = CancellationToken::new();

        let id = sync_queue::enqueue(&db, SyncTaskType::Upsert, Some(7), &day_snapshot(7))
            .await
            .unwrap();

        // First attempt trips the sheet and lands on the retry ladder.
        assert_eq!(worker.run_due_batch(&cancel).await, 1);
        let task = sync_queue::get(&db, id).await.unwrap().unwrap();
        assert_eq!(task.status, SyncTaskStatus::Retry);
        assert_eq!(task.retry_count, 1);
        assert!(task.last_error.as_deref().unwrap().contains("briefly down"));
        let next = task.next_retry_at.clone().unwrap();
        assert!(next > retry_timestamp(Duration::ZERO), "retry not delayed: {next}");

        // Not due yet, so the next poll hands out nothing.
        assert_eq!(worker.run_due_batch(&cancel).await, 0);

        // Once due, the retry succeeds and the row reaches the sheet.
        force_due(&db, id).await;
        assert_eq!(worker.run_due_batch(&cancel).await, 1);
        let task = sync_queue::get(&db, id).await.unwrap().unwrap();
        assert_eq!(task.status, SyncTaskStatus::Completed);
        assert!(task.processed_at.is_some());
        assert!(sheet.inner.row(7).is_some());
    }

    #[tokio::test]
    async fn third_failure_dead_letters_the_task() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let sheet = Arc::new(FlakySheet::failing(100));
        let lot = Arc::new(ParkingLot::default());
        let worker = SyncWorker::new(
            db.clone(),
            sheet,
            scenario_policy(),
            WorkerOptions::default(),
        )
        .with_dead_letter(lot.clone());
        let cancel = CancellationToken::new();

        let id = sync_queue::enqueue(&db, SyncTaskType::Upsert, Some(8), &day_snapshot(8))
            .await
            .unwrap();

        for expected_retry in 1..=2 {
            worker.run_due_batch(&cancel).await;
            let task = sync_queue::get(&db, id).await.unwrap().unwrap();
            assert_eq!(task.status, SyncTaskStatus::Retry);
            assert_eq!(task.retry_count, expected_retry);
            force_due(&db, id).await;
        }

        // Third failure exhausts max_retries=3.
        worker.run_due_batch(&cancel).await;
        let task = sync_queue::get(&db, id).await.unwrap().unwrap();
        assert_eq!(task.status, SyncTaskStatus::Failed);
        assert!(task.processed_at.is_some());

        let parked = lot.tasks();
        assert_eq!(parked.len(), 1);
        assert_eq!(parked[0].id, id);
        assert_eq!(parked[0].status, SyncTaskStatus::Failed);

        // Failed tasks never come back on their own.
        assert_eq!(worker.run_due_batch(&cancel).await, 0);
    }

    #[tokio::test]
    async fn undecodable_payload_fails_without_retries() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let lot = Arc::new(ParkingLot::default());
        let worker = SyncWorker::new(
            db.clone(),
            Arc::new(MemorySheet::new()),
            scenario_policy(),
            WorkerOptions::default(),
        )
        .with_dead_letter(lot.clone());
        let cancel = CancellationToken::new();

        let id = sync_queue::enqueue(&db, SyncTaskType::Upsert, Some(9), "not json")
            .await
            .unwrap();
        worker.run_due_batch(&cancel).await;

        let task = sync_queue::get(&db, id).await.unwrap().unwrap();
        assert_eq!(task.status, SyncTaskStatus::Failed);
        assert_eq!(task.retry_count, 0);
        assert_eq!(lot.tasks().len(), 1);
    }

    #[tokio::test]
    async fn stalled_handler_hits_the_task_timeout() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let worker = SyncWorker::new(
            db.clone(),
            Arc::new(StalledSheet),
            scenario_policy(),
            WorkerOptions {
                task_timeout: Duration::from_millis(50),
                ..WorkerOptions::default()
            },
        );
        let cancel = CancellationToken::new();

        let id = sync_queue::enqueue(&db, SyncTaskType::Upsert, Some(3), &day_snapshot(3))
            .await
            .unwrap();
        worker.run_due_batch(&cancel).await;

        let task = sync_queue::get(&db, id).await.unwrap().unwrap();
        assert_eq!(task.status, SyncTaskStatus::Retry);
        assert!(task.last_error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn cancelled_batch_dispatches_nothing_further() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let worker = SyncWorker::new(
            db.clone(),
            Arc::new(MemorySheet::new()),
            scenario_policy(),
            WorkerOptions::default(),
        );

        let id = sync_queue::enqueue(&db, SyncTaskType::Upsert, Some(4), &day_snapshot(4))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(worker.run_due_batch(&cancel).await, 0);

        let task = sync_queue::get(&db, id).await.unwrap().unwrap();
        assert_eq!(task.status, SyncTaskStatus::Pending);
    }

    #[tokio::test]
    async fn full_batches_drain_without_waiting_for_the_next_poll() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let sheet = Arc::new(MemorySheet::new());
        let worker = SyncWorker::new(
            db.clone(),
            sheet.clone(),
            scenario_policy(),
            WorkerOptions {
                batch_size: 2,
                ..WorkerOptions::default()
            },
        );
        let cancel = CancellationToken::new();

        for i in 1..=5 {
            sync_queue::enqueue(&db, SyncTaskType::Upsert, Some(i), &day_snapshot(i))
                .await
                .unwrap();
        }
        worker.drain_due(&cancel).await;

        assert_eq!(sheet.row_count(), 5);
        assert_eq!(sync_queue::queue_depth(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn hint_wakes_a_sleeping_worker() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let sheet = Arc::new(MemorySheet::new());
        let worker = SyncWorker::new(
            db.clone(),
            sheet.clone(),
            scenario_policy(),
            WorkerOptions {
                // Far enough out that only a hint explains a fast pickup.
                poll_interval: Duration::from_secs(60),
                ..WorkerOptions::default()
            },
        );
        let hint = worker.hint_sender();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));

        // Let the startup poll find an empty table and go to sleep.
        tokio::time::sleep(Duration::from_millis(100)).await;
        sync_queue::enqueue(&db, SyncTaskType::Upsert, Some(6), &day_snapshot(6))
            .await
            .unwrap();
        hint.try_send(()).unwrap();

        let mut picked_up = false;
        for _ in 0..50 {
            if sheet.row(6).is_some() {
                picked_up = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(picked_up, "hint did not wake the worker");

        cancel.cancel();
        handle.await.unwrap();
    }
}
