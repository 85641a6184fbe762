// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Construction parameters for a conduit instance.

use crate::error::ConduitError;

/// Capacity used by pipes and pseudo-terminals unless the channel asks otherwise.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Upper bound on a single region. The arena holds two regions.
pub const MAX_CAPACITY: usize = 1 << 24;

/// Name and sizing of one conduit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConduitConfig {
    /// Short label used in log lines ("pipe", "pty-master", ...).
    pub name: &'static str,
    /// Bytes per region.
    pub capacity: usize,
}

impl ConduitConfig {
    pub const fn new(name: &'static str, capacity: usize) -> Self {
        Self { name, capacity }
    }

    /// Checks the capacity and returns the arena length (`2 * capacity`).
    pub fn validate(&self) -> Result<usize, ConduitError> {
        if self.capacity == 0 || self.capacity > MAX_CAPACITY {
            return Err(ConduitError::InvalidCapacity);
        }
        self.capacity.checked_mul(2).ok_or(ConduitError::InvalidCapacity)
    }
}

impl Default for ConduitConfig {
    fn default() -> Self {
        Self::new("conduit", DEFAULT_CAPACITY)
    }
}
