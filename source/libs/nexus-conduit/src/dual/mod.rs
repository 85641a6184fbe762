// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Fixed-capacity two-region FIFO byte queue
//! OWNERS: @kernel-team
//! PUBLIC API: DualBuffer::{create, try_create, write, read, peek, set_waker, snapshot,
//!             is_empty, space_for_writing, bytes_buffered}
//! DEPENDS_ON: user_buffer::CrossDomainBuffer, hal::IrqGuard, spin::{Mutex, Once}
//! INVARIANTS: read_cursor <= read_size <= capacity; write_size <= capacity;
//!             flip only when the read region is drained; status word rewritten only
//!             under IrqGuard; waker runs with no conduit lock held
//!
//! One arena of `2 * capacity` bytes holds both regions. A role index picks
//! which half is being filled and which is being drained. Once the drained
//! half is empty and the filling half holds data the roles swap (a *flip*),
//! so data never moves inside the arena.
//!
//! The transfer path runs under a spin lock. Interrupt handlers that only
//! need "is there data / is there room" read [`DualBuffer::snapshot`], a
//! single atomic word republished after every state change.

extern crate alloc;

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::{Mutex, Once};

use crate::config::{ConduitConfig, MAX_CAPACITY};
use crate::error::{ConduitError, Result};
use crate::hal::IrqGuard;
use crate::user_buffer::CrossDomainBuffer;
use crate::waker::{WakeEvent, Waker};
use crate::{log_error, log_info, log_trace, log_warn};

#[cfg(test)]
mod tests_prop;

/// Status pair readable without the conduit lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// Nothing left to read in either region.
    pub is_empty: bool,
    /// Bytes the next write can accept.
    pub space_available: usize,
}

const EMPTY_BIT: usize = 1 << (usize::BITS - 1);

static_assertions::const_assert!(MAX_CAPACITY < EMPTY_BIT);

impl Snapshot {
    const fn pack(self) -> usize {
        let empty = if self.is_empty { EMPTY_BIT } else { 0 };
        empty | self.space_available
    }

    const fn unpack(word: usize) -> Self {
        Self { is_empty: word & EMPTY_BIT != 0, space_available: word & !EMPTY_BIT }
    }
}

/// Both status fields packed into one word so readers never see a torn pair.
struct StatusWord(AtomicUsize);

impl StatusWord {
    fn publish(&self, snapshot: Snapshot, _irq: &IrqGuard) {
        self.0.store(snapshot.pack(), Ordering::Release);
    }

    fn load(&self) -> Snapshot {
        Snapshot::unpack(self.0.load(Ordering::Acquire))
    }
}

/// Arena bookkeeping; only reachable through the conduit lock.
struct Regions {
    arena: Box<[u8]>,
    capacity: usize,
    /// Index (0 or 1) of the half currently being filled.
    write_role: usize,
    write_size: usize,
    read_size: usize,
    read_cursor: usize,
}

impl Regions {
    fn new(arena: Box<[u8]>, capacity: usize) -> Self {
        Self { arena, capacity, write_role: 0, write_size: 0, read_size: 0, read_cursor: 0 }
    }

    fn read_role(&self) -> usize {
        self.write_role ^ 1
    }

    fn region(&self, role: usize) -> &[u8] {
        let start = role * self.capacity;
        &self.arena[start..start + self.capacity]
    }

    fn region_mut(&mut self, role: usize) -> &mut [u8] {
        let start = role * self.capacity;
        &mut self.arena[start..start + self.capacity]
    }

    fn unread(&self) -> usize {
        self.read_size - self.read_cursor
    }

    fn drained(&self) -> bool {
        self.read_cursor >= self.read_size
    }

    fn status(&self) -> Snapshot {
        Snapshot {
            is_empty: self.drained() && self.write_size == 0,
            space_available: self.capacity - self.write_size,
        }
    }

    /// Swaps region roles. Aborts if unread bytes would be discarded.
    fn flip(&mut self, name: &'static str) {
        if !self.drained() {
            log_error!(
                target: "conduit",
                "{}: flip with {} unread bytes (cursor={} size={})",
                name,
                self.unread(),
                self.read_cursor,
                self.read_size
            );
            panic!("conduit: flip with undrained read region");
        }
        self.write_role = self.read_role();
        self.read_size = self.write_size;
        self.read_cursor = 0;
        self.write_size = 0;
        log_trace!(target: "conduit", "{}: flip read_size={}", name, self.read_size);
    }

    /// Exposes pending writes to the reader as soon as the read side is empty.
    fn normalize(&mut self, name: &'static str) -> bool {
        let flip = self.drained() && self.write_size > 0;
        if flip {
            self.flip(name);
        }
        flip
    }

    fn check(&self) {
        if self.read_cursor > self.read_size
            || self.read_size > self.capacity
            || self.write_size > self.capacity
        {
            log_error!(
                target: "conduit",
                "corrupt counters write_size={} read_cursor={} read_size={} capacity={}",
                self.write_size,
                self.read_cursor,
                self.read_size,
                self.capacity
            );
            panic!("conduit: counter invariant violated");
        }
    }
}

/// Bounded single-producer/single-consumer byte queue over two regions.
pub struct DualBuffer {
    name: &'static str,
    capacity: usize,
    regions: Mutex<Regions>,
    status: StatusWord,
    waker: Once<Arc<dyn Waker>>,
}

static_assertions::assert_impl_all!(DualBuffer: Send, Sync);

impl DualBuffer {
    /// Allocates both regions up front. Nothing is created on failure.
    pub fn create(config: ConduitConfig) -> Result<Self> {
        let arena_len = config.validate()?;
        let mut arena = Vec::new();
        arena.try_reserve_exact(arena_len).map_err(|_| ConduitError::OutOfMemory)?;
        arena.resize(arena_len, 0);
        let regions = Regions::new(arena.into_boxed_slice(), config.capacity);
        let initial = regions.status();
        log_info!(target: "conduit", "{}: created capacity={}", config.name, config.capacity);
        Ok(Self {
            name: config.name,
            capacity: config.capacity,
            regions: Mutex::new(regions),
            status: StatusWord(AtomicUsize::new(initial.pack())),
            waker: Once::new(),
        })
    }

    pub fn try_create(name: &'static str, capacity: usize) -> Result<Self> {
        Self::create(ConduitConfig::new(name, capacity))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Registers the single waker for this instance.
    pub fn set_waker(&self, waker: Arc<dyn Waker>) -> Result<()> {
        let mut installed = false;
        self.waker.call_once(|| {
            installed = true;
            waker
        });
        if installed {
            Ok(())
        } else {
            Err(ConduitError::WakerAlreadySet)
        }
    }

    /// Lock-free status; safe from interrupt context.
    #[inline]
    pub fn snapshot(&self) -> Snapshot {
        self.status.load()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty
    }

    #[inline]
    pub fn space_for_writing(&self) -> usize {
        self.snapshot().space_available
    }

    /// Exact count of unread bytes across both regions. Takes the lock.
    pub fn bytes_buffered(&self) -> usize {
        let regions = self.regions.lock();
        regions.unread() + regions.write_size
    }

    /// Appends up to `len` bytes read from `src`.
    ///
    /// Returns how many bytes were accepted, which is
    /// `min(len, space_for_writing())`; a short count is backpressure.
    /// On error nothing was appended. A null foreign `src` is rejected even
    /// when nothing would be copied.
    pub fn write(&self, src: &CrossDomainBuffer<'_>, len: usize) -> Result<usize> {
        let outcome = {
            let mut regions = self.regions.lock();
            self.write_locked(&mut regions, src, len)
        };
        self.finish(outcome)
    }

    /// Moves up to `len` buffered bytes into `dst`. Returns 0 when empty.
    pub fn read(&self, dst: &mut CrossDomainBuffer<'_>, len: usize) -> Result<usize> {
        self.read_impl(dst, len, false)
    }

    /// Like [`read`](Self::read) but leaves the bytes queued.
    pub fn peek(&self, dst: &mut CrossDomainBuffer<'_>, len: usize) -> Result<usize> {
        self.read_impl(dst, len, true)
    }

    fn read_impl(&self, dst: &mut CrossDomainBuffer<'_>, len: usize, peek: bool) -> Result<usize> {
        let outcome = {
            let mut regions = self.regions.lock();
            self.read_locked(&mut regions, dst, len, peek)
        };
        self.finish(outcome)
    }

    fn write_locked(
        &self,
        regions: &mut Regions,
        src: &CrossDomainBuffer<'_>,
        len: usize,
    ) -> Result<(usize, Option<WakeEvent>)> {
        src.ensure_reachable()?;
        let before = regions.status();
        let bytes = len.min(before.space_available);
        if bytes == 0 {
            return Ok((0, None));
        }
        let offset = regions.write_size;
        let role = regions.write_role;
        src.read(&mut regions.region_mut(role)[offset..offset + bytes], 0)?;

        regions.write_size = match offset.checked_add(bytes) {
            Some(size) if size <= regions.capacity => size,
            _ => {
                log_error!(target: "conduit", "{}: write_size overflow", self.name);
                panic!("conduit: write_size overflow");
            }
        };
        regions.normalize(self.name);
        regions.check();
        let after = self.publish(regions);
        let wake = (before.is_empty && !after.is_empty).then_some(WakeEvent::Readable);
        Ok((bytes, wake))
    }

    fn read_locked(
        &self,
        regions: &mut Regions,
        dst: &mut CrossDomainBuffer<'_>,
        len: usize,
        peek: bool,
    ) -> Result<(usize, Option<WakeEvent>)> {
        dst.ensure_reachable()?;
        let before = regions.status();
        if regions.normalize(self.name) {
            self.publish(regions);
        }

        // Tail of the read region, then the head of the write region once the
        // former is exhausted. Nothing is committed until both copies land.
        let first = len.min(regions.unread());
        let second = (len - first).min(regions.write_size);
        if first > 0 {
            let start = regions.read_cursor;
            let read_role = regions.read_role();
            dst.write(&regions.region(read_role)[start..start + first], 0)?;
        }
        if second > 0 {
            let write_role = regions.write_role;
            dst.write(&regions.region(write_role)[..second], first)?;
        }

        if !peek {
            if second > 0 {
                regions.read_cursor = regions.read_size;
                regions.flip(self.name);
                regions.read_cursor = second;
            } else {
                regions.read_cursor += first;
            }
            regions.normalize(self.name);
        }
        regions.check();
        let after = self.publish(regions);
        let wake = (before.space_available == 0 && after.space_available > 0)
            .then_some(WakeEvent::Writable);
        Ok((first + second, wake))
    }

    fn publish(&self, regions: &Regions) -> Snapshot {
        let irq = IrqGuard::new();
        let snapshot = regions.status();
        self.status.publish(snapshot, &irq);
        snapshot
    }

    /// Runs after the lock is released: logs faults and fires the waker.
    fn finish(&self, outcome: Result<(usize, Option<WakeEvent>)>) -> Result<usize> {
        match outcome {
            Ok((bytes, wake)) => {
                if let Some(event) = wake {
                    self.wake(event);
                }
                Ok(bytes)
            }
            Err(err) => {
                log_warn!(target: "conduit", "{}: transfer failed: {}", self.name, err);
                Err(err)
            }
        }
    }

    pub(crate) fn wake(&self, event: WakeEvent) {
        if let Some(waker) = self.waker.get() {
            waker.wake(event);
        }
    }

    #[cfg(test)]
    fn counters(&self) -> (usize, usize, usize) {
        let regions = self.regions.lock();
        (regions.write_size, regions.read_cursor, regions.read_size)
    }
}
