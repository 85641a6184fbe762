// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Copy primitive between kernel memory and a trusted or untrusted endpoint
//! OWNERS: @kernel-team
//! PUBLIC API: CrossDomainBuffer::{for_local, for_local_const, for_foreign, read, write, fill,
//!             offset, copy_into_owned_buffer, read_chunked, write_chunked}
//! DEPENDS_ON: hal::UserAccess
//! INVARIANTS: Foreign addresses are only touched through UserAccess; ranges are checked
//!             before any byte moves; descriptors are borrowed for one call only

extern crate alloc;

use alloc::vec::Vec;
use core::ops::Range;

use crate::error::{ConduitError, CopyError};
use crate::hal::UserAccess;
use crate::types::UserAddr;

enum Endpoint<'a> {
    Local(&'a mut [u8]),
    LocalConst(&'a [u8]),
    Foreign { space: &'a dyn UserAccess, base: usize, len: usize },
}

/// Borrowed view of a byte range that may live in another trust domain.
pub struct CrossDomainBuffer<'a> {
    endpoint: Endpoint<'a>,
}

impl<'a> CrossDomainBuffer<'a> {
    /// Kernel-owned memory usable as source and destination.
    pub fn for_local(bytes: &'a mut [u8]) -> Self {
        Self { endpoint: Endpoint::Local(bytes) }
    }

    /// Kernel-owned memory usable as a source only.
    pub fn for_local_const(bytes: &'a [u8]) -> Self {
        Self { endpoint: Endpoint::LocalConst(bytes) }
    }

    /// `len` bytes at `base` inside `space`. A null `base` is accepted here
    /// and rejected by every access.
    pub fn for_foreign(space: &'a dyn UserAccess, base: usize, len: usize) -> Self {
        Self { endpoint: Endpoint::Foreign { space, base, len } }
    }

    pub fn len(&self) -> usize {
        match &self.endpoint {
            Endpoint::Local(bytes) => bytes.len(),
            Endpoint::LocalConst(bytes) => bytes.len(),
            Endpoint::Foreign { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_local(&self) -> bool {
        !matches!(self.endpoint, Endpoint::Foreign { .. })
    }

    /// Returns a view starting `skip` bytes into this one.
    pub fn offset(&mut self, skip: usize) -> Result<CrossDomainBuffer<'_>, CopyError> {
        if skip > self.len() {
            return Err(CopyError::OutOfBounds);
        }
        let endpoint = match &mut self.endpoint {
            Endpoint::Local(bytes) => Endpoint::Local(&mut bytes[skip..]),
            Endpoint::LocalConst(bytes) => Endpoint::LocalConst(&bytes[skip..]),
            Endpoint::Foreign { space, base, len } => {
                let base = if *base == 0 {
                    0
                } else {
                    base.checked_add(skip).ok_or(CopyError::Overflow)?
                };
                Endpoint::Foreign { space: *space, base, len: *len - skip }
            }
        };
        Ok(CrossDomainBuffer { endpoint })
    }

    /// Copies `dest.len()` bytes starting at `offset` of this endpoint into `dest`.
    pub fn read(&self, dest: &mut [u8], offset: usize) -> Result<(), CopyError> {
        let range = self.range(offset, dest.len())?;
        match &self.endpoint {
            Endpoint::Local(bytes) => dest.copy_from_slice(&bytes[range]),
            Endpoint::LocalConst(bytes) => dest.copy_from_slice(&bytes[range]),
            Endpoint::Foreign { space, base, .. } => {
                space.copy_from_user(dest, foreign_addr(*base, offset)?)?
            }
        }
        Ok(())
    }

    /// Copies `src` into this endpoint starting at `offset`.
    pub fn write(&mut self, src: &[u8], offset: usize) -> Result<(), CopyError> {
        let range = self.range(offset, src.len())?;
        match &mut self.endpoint {
            Endpoint::Local(bytes) => bytes[range].copy_from_slice(src),
            Endpoint::LocalConst(_) => return Err(CopyError::ReadOnly),
            Endpoint::Foreign { space, base, .. } => {
                space.copy_to_user(foreign_addr(*base, offset)?, src)?
            }
        }
        Ok(())
    }

    /// Sets `len` bytes starting at `offset` to `value`.
    pub fn fill(&mut self, value: u8, offset: usize, len: usize) -> Result<(), CopyError> {
        let range = self.range(offset, len)?;
        match &mut self.endpoint {
            Endpoint::Local(bytes) => bytes[range].fill(value),
            Endpoint::LocalConst(_) => return Err(CopyError::ReadOnly),
            Endpoint::Foreign { space, base, .. } => {
                space.fill_user(foreign_addr(*base, offset)?, value, len)?
            }
        }
        Ok(())
    }

    /// Reads the first `len` bytes into a freshly allocated kernel buffer.
    pub fn copy_into_owned_buffer(&self, len: usize) -> Result<Vec<u8>, ConduitError> {
        self.range(0, len)?;
        let mut owned = Vec::new();
        owned.try_reserve_exact(len).map_err(|_| ConduitError::OutOfMemory)?;
        owned.resize(len, 0);
        self.read(&mut owned, 0)?;
        Ok(owned)
    }

    /// Streams the first `len` bytes to `consume` in chunks of at most `N`
    /// bytes. `consume` returns how many bytes it accepted; a short count
    /// stops the walk. Returns the total accepted.
    ///
    /// A fault after some chunks were consumed ends the walk with a short
    /// count; the error is only returned when nothing was consumed.
    pub fn read_chunked<const N: usize, F>(&self, len: usize, mut consume: F) -> Result<usize, CopyError>
    where
        F: FnMut(&[u8]) -> usize,
    {
        self.range(0, len)?;
        if N == 0 {
            return Ok(0);
        }
        let mut bounce = [0u8; N];
        let mut done = 0;
        while done < len {
            let chunk = (len - done).min(N);
            if let Err(err) = self.read(&mut bounce[..chunk], done) {
                return partial(done, err);
            }
            let taken = consume(&bounce[..chunk]).min(chunk);
            done += taken;
            if taken < chunk {
                break;
            }
        }
        Ok(done)
    }

    /// Fills up to `len` bytes of this endpoint from `produce`, in chunks of
    /// at most `N` bytes. `produce` returns how many bytes of the chunk it
    /// wrote; a short count stops the walk. Returns the total written.
    ///
    /// A fault after some chunks landed ends the walk with a short count;
    /// bytes of the faulting chunk are not counted even if some were stored.
    pub fn write_chunked<const N: usize, F>(&mut self, len: usize, mut produce: F) -> Result<usize, CopyError>
    where
        F: FnMut(&mut [u8]) -> usize,
    {
        self.range(0, len)?;
        if N == 0 {
            return Ok(0);
        }
        let mut bounce = [0u8; N];
        let mut done = 0;
        while done < len {
            let chunk = (len - done).min(N);
            let made = produce(&mut bounce[..chunk]).min(chunk);
            if made == 0 {
                break;
            }
            if let Err(err) = self.write(&bounce[..made], done) {
                return partial(done, err);
            }
            done += made;
            if made < chunk {
                break;
            }
        }
        Ok(done)
    }

    /// Fails only for an endpoint no access can ever succeed on.
    pub(crate) fn ensure_reachable(&self) -> Result<(), CopyError> {
        self.range(0, 0).map(|_| ())
    }

    fn range(&self, offset: usize, len: usize) -> Result<Range<usize>, CopyError> {
        if let Endpoint::Foreign { base: 0, .. } = self.endpoint {
            return Err(CopyError::NullEndpoint);
        }
        let end = offset.checked_add(len).ok_or(CopyError::Overflow)?;
        if end > self.len() {
            return Err(CopyError::OutOfBounds);
        }
        Ok(offset..end)
    }
}

/// Progress wins over the error once any chunk went through.
fn partial(done: usize, err: CopyError) -> Result<usize, CopyError> {
    if done > 0 {
        Ok(done)
    } else {
        Err(err)
    }
}

fn foreign_addr(base: usize, offset: usize) -> Result<UserAddr, CopyError> {
    UserAddr::new(base)
        .ok_or(CopyError::NullEndpoint)?
        .checked_add(offset)
        .ok_or(CopyError::Overflow)
}
