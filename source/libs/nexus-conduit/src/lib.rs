// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Byte conduit shared by pipes, pseudo-terminals, sockets and char devices
//! OWNERS: @kernel-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit + proptest (dual/tests_prop.rs) + tests/scenarios.rs
//! PUBLIC API: CrossDomainBuffer, DualBuffer, StreamPair, Waker, ConduitConfig
//! DEPENDS_ON: spin, bitflags, static_assertions, riscv (OS builds)
//! INVARIANTS: Never blocks; never dereferences foreign memory outside hal::UserAccess;
//!             every transfer is all-or-nothing with respect to the bytes it reports
//!
//! Layers, leaf first:
//! - [`CrossDomainBuffer`]: fault-safe copies to and from an endpoint.
//! - [`DualBuffer`]: bounded two-region FIFO with a lock-free status word.
//! - [`StreamPair`]: producer/consumer glue with wake and hang-up handling.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), forbid(clippy::unwrap_used))]

extern crate alloc;

pub mod log;

pub mod config;
pub mod dual;
pub mod error;
pub mod hal;
#[cfg(feature = "sim")]
pub mod sim;
pub mod stream;
pub mod types;
pub mod user_buffer;
pub mod waker;

pub use config::{ConduitConfig, DEFAULT_CAPACITY, MAX_CAPACITY};
pub use dual::{DualBuffer, Snapshot};
pub use error::{ConduitError, CopyError};
pub use hal::{IrqGuard, UserAccess, UserFault};
pub use stream::{Readiness, StreamPair};
pub use types::UserAddr;
pub use user_buffer::CrossDomainBuffer;
pub use waker::{WakeEvent, Waker};
