// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable spreadsheet synchronization for the Gearbook reservation service.
//!
//! Booking mutations land in a queue table inside the same transaction that
//! commits them; the worker here consumes that queue, drives the
//! [`SheetWriter`](gearbook_sheets::SheetWriter) mirror, retries transient
//! failures with exponential backoff, and parks permanently failed tasks on
//! a dead-letter sink.

pub mod backoff;
pub mod handlers;
pub mod remote;
pub mod worker;

pub use backoff::RetryPolicy;
pub use handlers::TaskError;
pub use remote::RemoteQueue;
pub use worker::{DeadLetterSink, SyncWorker, WorkerOptions};
