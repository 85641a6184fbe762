// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg(test)]
//! CONTEXT: Property-based tests for the dual-region byte queue
//! OWNERS: @kernel-team
//! NOTE: Tests only; no conduit logic. Checks the queue against a VecDeque model.
//!
//! TEST_SCOPE:
//!   - FIFO ordering across arbitrary write/read/peek interleavings
//!   - Backpressure: writes accept exactly min(len, space_available)
//!   - Counter invariants hold after every step (flip never loses data)
//!
//! TEST_SCENARIOS:
//!   - matches_vecdeque_model(): every read/peek returns the model's front bytes
//!   - write_accepts_exact_space(): short writes equal the advertised space
//!   - drain_returns_everything(): a final drain yields all bytes still queued

use std::collections::VecDeque;
use std::vec::Vec;

use super::DualBuffer;
use crate::user_buffer::CrossDomainBuffer;
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Write(Vec<u8>),
    Read(usize),
    Peek(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        proptest::collection::vec(any::<u8>(), 0..24).prop_map(Op::Write),
        (0usize..24).prop_map(Op::Read),
        (0usize..24).prop_map(Op::Peek),
    ]
}

fn write(buf: &DualBuffer, data: &[u8]) -> usize {
    buf.write(&CrossDomainBuffer::for_local_const(data), data.len()).unwrap()
}

fn read(buf: &DualBuffer, len: usize, peek: bool) -> Vec<u8> {
    let mut out = vec![0u8; len];
    let mut dst = CrossDomainBuffer::for_local(&mut out);
    let n = (if peek { buf.peek(&mut dst, len) } else { buf.read(&mut dst, len) }).unwrap();
    out.truncate(n);
    out
}

fn assert_counters(buf: &DualBuffer) -> Result<(), TestCaseError> {
    let (write_size, read_cursor, read_size) = buf.counters();
    prop_assert!(read_cursor <= read_size);
    prop_assert!(read_size <= buf.capacity());
    prop_assert!(write_size <= buf.capacity());
    // Pending writes are always exposed once the read side drains.
    prop_assert!(write_size == 0 || read_cursor < read_size);
    Ok(())
}

proptest! {
    #[test]
    fn matches_vecdeque_model(capacity in 1usize..16, ops in proptest::collection::vec(arb_op(), 1..64)) {
        let buf = DualBuffer::try_create("prop", capacity).unwrap();
        let mut model: VecDeque<u8> = VecDeque::new();
        for op in ops {
            match op {
                Op::Write(data) => {
                    let n = write(&buf, &data);
                    model.extend(&data[..n]);
                }
                Op::Read(len) => {
                    let got = read(&buf, len, false);
                    let want: Vec<u8> = model.drain(..len.min(model.len())).collect();
                    prop_assert_eq!(got, want);
                }
                Op::Peek(len) => {
                    let got = read(&buf, len, true);
                    let want: Vec<u8> = model.iter().take(len).copied().collect();
                    prop_assert_eq!(got, want);
                }
            }
            assert_counters(&buf)?;
            prop_assert_eq!(buf.bytes_buffered(), model.len());
            prop_assert_eq!(buf.is_empty(), model.is_empty());
        }
    }

    #[test]
    fn write_accepts_exact_space(capacity in 1usize..32, chunks in proptest::collection::vec(1usize..40, 1..16)) {
        let buf = DualBuffer::try_create("prop", capacity).unwrap();
        for len in chunks {
            let space = buf.space_for_writing();
            let data = vec![0x5a; len];
            prop_assert_eq!(write(&buf, &data), len.min(space));
            assert_counters(&buf)?;
        }
    }

    #[test]
    fn drain_returns_everything(capacity in 1usize..16, writes in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..20), 1..8)) {
        let buf = DualBuffer::try_create("prop", capacity).unwrap();
        let mut expected = Vec::new();
        for data in &writes {
            let n = write(&buf, data);
            expected.extend_from_slice(&data[..n]);
        }
        let got = read(&buf, 2 * capacity, false);
        prop_assert_eq!(got, expected);
        prop_assert!(buf.is_empty());
        prop_assert_eq!(buf.space_for_writing(), capacity);
    }
}
