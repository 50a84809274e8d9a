// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Gearbook integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`TestHarness`] - Complete reservation stack over a temp database
//! - [`FlakySheet`] - Sheet mirror with scripted transient failures
//! - [`ManualClock`] - Adjustable clock for advance-window boundaries

pub mod flaky_sheet;
pub mod harness;
pub mod manual_clock;

pub use flaky_sheet::FlakySheet;
pub use harness::{DeadLetterLog, TestHarness};
pub use manual_clock::{ManualClock, local_time};
