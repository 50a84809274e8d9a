// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User flow state for the Gearbook reservation service.
//!
//! A booking front-end walks users through multi-step flows; the partially
//! collected answers live here, keyed by user id with a 24-hour TTL. The
//! primary backend is Redis; an in-memory store doubles as the local-dev
//! backend and as the failover target when Redis is unreachable.

pub mod failover;
pub mod memory;
pub mod redis;
pub mod store;

// The `redis` module shares its name with the redis crate, so these
// re-exports spell out the crate root.
pub use crate::failover::FailoverStateStore;
pub use crate::memory::MemoryStateStore;
pub use crate::redis::RedisStateStore;
pub use crate::store::{FlowState, FlowStateStore};
