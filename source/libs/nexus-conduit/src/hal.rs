// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Platform hooks the conduit core depends on
//! OWNERS: @kernel-team
//! PUBLIC API: UserAccess, UserFault, IrqGuard
//! DEPENDS_ON: riscv::register::sstatus (OS builds only)
//! INVARIANTS: UserAccess never partially reports success; IrqGuard restores the prior SIE state
//!
//! The fault-recovering copy routines live in the architecture layer (trap
//! fixup tables); the conduit only sees their outcome through [`UserAccess`].

use core::marker::PhantomData;
use core::sync::atomic::{compiler_fence, Ordering};

use crate::types::UserAddr;

/// Fault raised while touching foreign memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UserFault {
    /// First address that could not be accessed.
    pub addr: usize,
}

/// Fault-safe accessors for memory owned by another trust domain.
///
/// Implementations must return `Err` instead of trapping when any byte in
/// the range is inaccessible. On error the kernel-side destination may hold
/// garbage; callers treat it as unwritten.
pub trait UserAccess: Sync {
    /// Copies `dst.len()` bytes starting at `src` into `dst`.
    fn copy_from_user(&self, dst: &mut [u8], src: UserAddr) -> Result<(), UserFault>;
    /// Copies `src` to the foreign range starting at `dst`.
    fn copy_to_user(&self, dst: UserAddr, src: &[u8]) -> Result<(), UserFault>;
    /// Sets `len` bytes starting at `dst` to `value`.
    fn fill_user(&self, dst: UserAddr, value: u8, len: usize) -> Result<(), UserFault>;
}

/// Scoped interrupt-disable section.
///
/// Holding a guard is the only way to obtain the `&IrqGuard` token that the
/// snapshot publisher requires, so cached status words are only ever
/// rewritten with interrupts masked on the local hart.
pub struct IrqGuard {
    was_enabled: bool,
    // Interrupt state is hart-local; the guard must not migrate.
    _not_send: PhantomData<*mut ()>,
}

impl IrqGuard {
    /// Masks supervisor interrupts until the guard is dropped.
    #[inline]
    pub fn new() -> Self {
        let was_enabled = disable();
        compiler_fence(Ordering::SeqCst);
        Self { was_enabled, _not_send: PhantomData }
    }
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IrqGuard {
    #[inline]
    fn drop(&mut self) {
        compiler_fence(Ordering::SeqCst);
        restore(self.was_enabled);
    }
}

static_assertions::assert_not_impl_any!(IrqGuard: Send, Sync);

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
#[inline(always)]
fn disable() -> bool {
    use riscv::register::sstatus;
    let was_enabled = sstatus::read().sie();
    // SAFETY: clearing SIE only masks interrupts on this hart; restored on drop.
    unsafe { sstatus::clear_sie() };
    was_enabled
}

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
#[inline(always)]
fn restore(was_enabled: bool) {
    use riscv::register::sstatus;
    if was_enabled {
        // SAFETY: re-enables interrupts that were enabled when the guard was taken.
        unsafe { sstatus::set_sie() };
    }
}

// Host builds have no interrupt context; the fences keep ordering identical.
#[cfg(not(all(target_arch = "riscv64", target_os = "none")))]
#[inline(always)]
fn disable() -> bool {
    false
}

#[cfg(not(all(target_arch = "riscv64", target_os = "none")))]
#[inline(always)]
fn restore(_was_enabled: bool) {}
