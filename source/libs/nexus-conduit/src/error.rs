// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types surfaced by the conduit.
//!
//! Backpressure and end-of-file are not errors: they travel as short or zero
//! byte counts. Only boundary faults, bad arguments and construction failures
//! show up here.

use core::fmt;

use crate::hal::UserFault;

/// Failure of a single cross-domain copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyError {
    /// `offset + len` wrapped around.
    Overflow,
    /// Requested range extends past the endpoint.
    OutOfBounds,
    /// Foreign endpoint with a null base address.
    NullEndpoint,
    /// Attempted to write into a read-only local endpoint.
    ReadOnly,
    /// Foreign memory faulted mid-copy.
    Fault(UserFault),
}

impl From<UserFault> for CopyError {
    fn from(value: UserFault) -> Self {
        Self::Fault(value)
    }
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault(fault) => write!(f, "fault at {:#x}", fault.addr),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Error returned by conduit construction and transfer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConduitError {
    /// Capacity is zero, above `MAX_CAPACITY`, or overflows the arena size.
    InvalidCapacity,
    /// The backing arena could not be allocated.
    OutOfMemory,
    /// A waker is already registered on this instance.
    WakerAlreadySet,
    /// Boundary fault or bad endpoint during a copy.
    Copy(CopyError),
}

impl From<CopyError> for ConduitError {
    fn from(value: CopyError) -> Self {
        Self::Copy(value)
    }
}

impl fmt::Display for ConduitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy(err) => write!(f, "copy failed: {}", err),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = core::result::Result<T, ConduitError>;
