// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Newtypes for addresses owned by a foreign (untrusted) domain
//! OWNERS: @kernel-team
//! PUBLIC API: UserAddr
//! INVARIANTS: A UserAddr is never null; offsets use checked arithmetic

use core::fmt;

/// Address inside a foreign address space.
///
/// Never dereferenced directly; only handed to a [`crate::hal::UserAccess`]
/// implementation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct UserAddr(usize);

impl UserAddr {
    /// Wraps `raw`, rejecting the null address.
    #[inline]
    pub const fn new(raw: usize) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self(raw))
        }
    }

    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }

    /// Returns the address `offset` bytes further on, or `None` on overflow.
    #[inline]
    pub fn checked_add(self, offset: usize) -> Option<Self> {
        self.0.checked_add(offset).map(Self)
    }
}

impl fmt::Display for UserAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
