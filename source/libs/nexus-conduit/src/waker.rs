// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Wake notification interface for callers that suspend outside the conduit.

/// Condition that just changed on a conduit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WakeEvent {
    /// Buffer went from empty to holding data.
    Readable,
    /// Space became available after the buffer was full.
    Writable,
    /// Producer closed; consumers should re-check for EOF.
    HangUp,
}

/// Registered once per conduit and invoked synchronously from the
/// transfer path after the conduit lock is released.
///
/// Implementations must not call back into the conduit that woke them;
/// typically they unblock a wait queue and return.
pub trait Waker: Send + Sync {
    fn wake(&self, event: WakeEvent);
}
