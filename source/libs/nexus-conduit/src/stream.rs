// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Producer/consumer stream over one DualBuffer with hang-up semantics
//! OWNERS: @kernel-team
//! PUBLIC API: StreamPair::{create, producer_write, consumer_read, consumer_peek,
//!             close_producer, poll, is_eof}, Readiness
//! DEPENDS_ON: dual::DualBuffer, bitflags
//! INVARIANTS: EOF is reported only once the producer hung up AND the buffer drained;
//!             no call here suspends; 0 bytes means "retry later" unless is_eof()
//!
//! This is the piece pipes, pseudo-terminals and character devices embed.
//! Blocking is done by the caller: on a 0-byte read it parks itself and
//! retries when its [`Waker`] fires.

extern crate alloc;

use alloc::sync::Arc;
use bitflags::bitflags;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::config::ConduitConfig;
use crate::dual::DualBuffer;
use crate::error::Result;
use crate::user_buffer::CrossDomainBuffer;
use crate::waker::{WakeEvent, Waker};
use crate::log_debug;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    /// Poll-style readiness derived from the lock-free snapshot.
    pub struct Readiness: u32 {
        const READABLE = 1 << 0;
        const WRITABLE = 1 << 1;
        const HANGUP = 1 << 2;
    }
}

/// One producer and one consumer joined by a bounded buffer.
pub struct StreamPair {
    buffer: DualBuffer,
    hung_up: AtomicBool,
}

static_assertions::assert_impl_all!(StreamPair: Send, Sync);

impl StreamPair {
    pub fn create(config: ConduitConfig) -> Result<Self> {
        Ok(Self { buffer: DualBuffer::create(config)?, hung_up: AtomicBool::new(false) })
    }

    /// Registers the waker shared by both sides.
    pub fn set_waker(&self, waker: Arc<dyn Waker>) -> Result<()> {
        self.buffer.set_waker(waker)
    }

    pub fn buffer(&self) -> &DualBuffer {
        &self.buffer
    }

    /// Queues up to `len` bytes from `src`; fewer under backpressure.
    ///
    /// A producer that already hung up has nowhere to write; it gets 0.
    pub fn producer_write(&self, src: &CrossDomainBuffer<'_>, len: usize) -> Result<usize> {
        if self.is_producer_closed() {
            log_debug!(target: "conduit", "{}: write after hang-up ignored", self.buffer.name());
            return Ok(0);
        }
        self.buffer.write(src, len)
    }

    /// Returns buffered bytes, or 0. Check [`is_eof`](Self::is_eof) to tell
    /// "nothing yet" from "nothing ever again".
    pub fn consumer_read(&self, dst: &mut CrossDomainBuffer<'_>, len: usize) -> Result<usize> {
        if self.is_eof() {
            return Ok(0);
        }
        self.buffer.read(dst, len)
    }

    pub fn consumer_peek(&self, dst: &mut CrossDomainBuffer<'_>, len: usize) -> Result<usize> {
        if self.is_eof() {
            return Ok(0);
        }
        self.buffer.peek(dst, len)
    }

    /// Marks the producer gone. Buffered bytes stay readable.
    pub fn close_producer(&self) {
        if self.hung_up.swap(true, Ordering::AcqRel) {
            return;
        }
        log_debug!(target: "conduit", "{}: producer hung up", self.buffer.name());
        self.buffer.wake(WakeEvent::HangUp);
    }

    pub fn is_producer_closed(&self) -> bool {
        self.hung_up.load(Ordering::Acquire)
    }

    /// Producer closed and every byte consumed; permanent once true.
    pub fn is_eof(&self) -> bool {
        self.is_producer_closed() && self.buffer.is_empty()
    }

    /// Lock-free readiness; callable from interrupt context.
    pub fn poll(&self) -> Readiness {
        let hung_up = self.is_producer_closed();
        let status = self.buffer.snapshot();
        let mut ready = Readiness::empty();
        if !status.is_empty {
            ready |= Readiness::READABLE;
        }
        if hung_up {
            ready |= Readiness::HANGUP;
        } else if status.space_available > 0 {
            ready |= Readiness::WRITABLE;
        }
        ready
    }
}
