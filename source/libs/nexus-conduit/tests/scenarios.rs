// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: End-to-end conduit scenarios on the host
//! OWNERS: @kernel-team
//! NOTE: Drives StreamPair/DualBuffer through the public API only, with the simulated
//!       user address space standing in for a process.
//!
//! TEST_SCENARIOS:
//!   - short_write_then_read(): 10 bytes through a 16-byte conduit, then an empty read
//!   - backpressure_and_retry(): 4-byte conduit accepts partial writes, caller retries
//!   - hangup_drains_then_eof(): buffered bytes survive close_producer, then EOF sticks
//!   - bad_foreign_endpoint_is_isolated(): a faulting write fails alone
//!   - blocked_reader_is_woken(): a reader parked on a flag resumes after a write

#![cfg(feature = "sim")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use nexus_conduit::sim::{SimUserSpace, PAGE_SIZE};
use nexus_conduit::{
    ConduitConfig, ConduitError, CopyError, CrossDomainBuffer, DualBuffer, StreamPair, UserFault,
    WakeEvent, Waker,
};

const USER_BASE: usize = 0x4000_0000;

fn stream(capacity: usize) -> StreamPair {
    StreamPair::create(ConduitConfig::new("scenario", capacity)).expect("create")
}

fn send(pair: &StreamPair, data: &[u8]) -> usize {
    pair.producer_write(&CrossDomainBuffer::for_local_const(data), data.len()).expect("write")
}

fn recv(pair: &StreamPair, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    let n = pair
        .consumer_read(&mut CrossDomainBuffer::for_local(&mut out), len)
        .expect("read");
    out.truncate(n);
    out
}

#[test]
fn short_write_then_read() {
    let pair = stream(16);
    assert_eq!(send(&pair, b"AAAAAAAAAA"), 10);
    assert_eq!(recv(&pair, 20), b"AAAAAAAAAA");
    assert!(recv(&pair, 5).is_empty());
    assert!(!pair.is_eof());
}

#[test]
fn backpressure_and_retry() {
    let pair = stream(4);
    let data = b"0123456789";
    let mut sent = send(&pair, data);
    assert_eq!(sent, 4);
    let n = send(&pair, &data[sent..]);
    assert_eq!(n, 4);
    sent += n;
    assert_eq!(recv(&pair, 8), b"01234567");
    assert!(recv(&pair, 8).is_empty());
    assert_eq!(send(&pair, &data[sent..]), 2);
    assert_eq!(recv(&pair, 8), b"89");
}

#[test]
fn hangup_drains_then_eof() {
    let pair = stream(8);
    send(&pair, b"abc");
    pair.close_producer();
    assert_eq!(recv(&pair, 10), b"abc");
    assert!(recv(&pair, 10).is_empty());
    assert!(pair.is_eof());
    assert!(recv(&pair, 10).is_empty());
}

#[test]
fn bad_foreign_endpoint_is_isolated() {
    let space = SimUserSpace::new();
    space.map(USER_BASE, PAGE_SIZE);
    space.poke(USER_BASE, b"0123456789");
    let buffer = DualBuffer::try_create("tty", 32).expect("create");

    let unmapped = USER_BASE + 4 * PAGE_SIZE;
    let bad = CrossDomainBuffer::for_foreign(&space, unmapped, 10);
    assert_eq!(
        buffer.write(&bad, 10),
        Err(ConduitError::Copy(CopyError::Fault(UserFault { addr: unmapped })))
    );
    assert!(buffer.is_empty());
    assert_eq!(buffer.space_for_writing(), 32);

    let good = CrossDomainBuffer::for_foreign(&space, USER_BASE, 10);
    assert_eq!(buffer.write(&good, 10), Ok(10));

    let mut dst = CrossDomainBuffer::for_foreign(&space, USER_BASE + 0x100, 10);
    assert_eq!(buffer.read(&mut dst, 10), Ok(10));
    assert_eq!(space.peek(USER_BASE + 0x100, 10).expect("mapped"), b"0123456789");
}

#[test]
fn null_foreign_endpoint_is_rejected() {
    let space = SimUserSpace::new();
    let buffer = DualBuffer::try_create("tty", 8).expect("create");
    let null = CrossDomainBuffer::for_foreign(&space, 0, 4);
    assert_eq!(buffer.write(&null, 4), Err(ConduitError::Copy(CopyError::NullEndpoint)));
}

struct Doorbell(AtomicUsize);

impl Waker for Doorbell {
    fn wake(&self, event: WakeEvent) {
        if event == WakeEvent::Readable || event == WakeEvent::HangUp {
            self.0.fetch_add(1, Ordering::Release);
        }
    }
}

#[test]
fn blocked_reader_is_woken() {
    let pair = Arc::new(stream(64));
    let bell = Arc::new(Doorbell(AtomicUsize::new(0)));
    pair.set_waker(bell.clone()).expect("waker");

    let reader = {
        let pair = Arc::clone(&pair);
        let bell = Arc::clone(&bell);
        thread::spawn(move || {
            let mut got = Vec::new();
            loop {
                let seen = bell.0.load(Ordering::Acquire);
                let chunk = recv(&pair, 16);
                if !chunk.is_empty() {
                    got.extend_from_slice(&chunk);
                    continue;
                }
                if pair.is_eof() {
                    return got;
                }
                // Park until the doorbell moves past what we observed.
                while bell.0.load(Ordering::Acquire) == seen {
                    thread::yield_now();
                }
            }
        })
    };

    let payload: Vec<u8> = (0..200u8).collect();
    let mut sent = 0;
    while sent < payload.len() {
        let n = send(&pair, &payload[sent..]);
        if n == 0 {
            thread::yield_now();
        }
        sent += n;
    }
    pair.close_producer();

    assert_eq!(reader.join().expect("reader"), payload);
}
