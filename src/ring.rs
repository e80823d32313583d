//! Circular byte buffers holding encoded records.
//!
//! A ring stores whole records back to back. When a new record does not fit,
//! the oldest records are discarded until it does, so a ring always holds the
//! most recent history and never blocks its producer. Records may wrap around
//! the physical end of the buffer; because every record is a multiple of 8
//! bytes and so is the capacity, the 8-byte head of a record (which carries
//! its length) is always contiguous.

use std::collections::TryReserveError;

use crate::record::{encoded_len, MAX_RECORD_SIZE};

/// Smallest ring capacity. Must hold at least one maximum-size record.
pub const MIN_RING_SIZE: usize = 4096;

const _: () = assert!(MIN_RING_SIZE > MAX_RECORD_SIZE);

/// Where a ring sits in its context's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingState {
    /// Empty and in the idle queue
    Idle,
    /// Receiving records from producers
    Active,
    /// Queued for the writer thread
    Locked,
    /// The permanent write-through ring
    WriteThrough,
}

/// A fixed-capacity ring of encoded records.
///
/// # Examples
///
/// ```
/// # use ring_logger::{Kind, Record};
/// # use ring_logger::ring::{Ring, RingState};
/// let mut ring = Ring::try_new(4096, RingState::Idle).unwrap();
/// let record = Record::format(Kind::Debug1, 1, "hello").encode();
/// ring.put(&record);
/// assert_eq!(ring.get(), Some(record));
/// assert!(ring.is_empty());
/// ```
#[derive(Debug)]
pub struct Ring {
    buf: Box<[u8]>,
    wr: usize,
    rd: usize,
    pub state: RingState,
}

impl Ring {
    /// Allocates a ring of `capacity` bytes, rounded up to a multiple of 8
    /// and to at least [`MIN_RING_SIZE`].
    ///
    /// Allocation failure is reported instead of aborting the process.
    pub fn try_new(capacity: usize, state: RingState) -> Result<Self, TryReserveError> {
        let capacity = round_ring_size(capacity);
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)?;
        buf.resize(capacity, 0);
        Ok(Self {
            buf: buf.into_boxed_slice(),
            wr: 0,
            rd: 0,
            state,
        })
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wr == self.rd
    }

    /// Bytes currently occupied by records.
    pub fn used(&self) -> usize {
        (self.wr + self.capacity() - self.rd) % self.capacity()
    }

    /// Free bytes. A record of `len` bytes fits only if this is strictly
    /// greater than `len`, so the write cursor never catches the read cursor.
    pub fn space_remaining(&self) -> usize {
        self.capacity() - self.used()
    }

    /// Appends one encoded record, discarding the oldest records as needed.
    ///
    /// Returns how many records were discarded. A record that could never
    /// fit is dropped.
    pub fn put(&mut self, record: &[u8]) -> usize {
        let len = record.len();
        debug_assert!(len % 8 == 0 && len > 0);
        if len == 0 || len >= self.capacity() {
            return 0;
        }

        let mut evicted = 0;
        while self.space_remaining() <= len {
            self.discard_oldest();
            evicted += 1;
        }

        let cap = self.capacity();
        if self.wr + len >= cap {
            let first = cap - self.wr;
            self.buf[self.wr..].copy_from_slice(&record[..first]);
            self.buf[..len - first].copy_from_slice(&record[first..]);
            self.wr = len - first;
        } else {
            self.buf[self.wr..self.wr + len].copy_from_slice(record);
            self.wr += len;
        }
        evicted
    }

    /// Pops the oldest record into `out`, replacing its contents.
    /// Returns false when the ring is empty.
    pub fn pop_into(&mut self, out: &mut Vec<u8>) -> bool {
        let Some(len) = self.head_len() else {
            return false;
        };

        out.clear();
        let cap = self.capacity();
        if self.rd + len >= cap {
            out.extend_from_slice(&self.buf[self.rd..]);
            out.extend_from_slice(&self.buf[..len - (cap - self.rd)]);
            self.rd = len - (cap - self.rd);
        } else {
            out.extend_from_slice(&self.buf[self.rd..self.rd + len]);
            self.rd += len;
        }
        true
    }

    /// Pops the oldest record.
    pub fn get(&mut self) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        self.pop_into(&mut out).then_some(out)
    }

    /// Drops all content.
    pub fn clear(&mut self) {
        self.wr = 0;
        self.rd = 0;
    }

    fn head_len(&self) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        // Only ever fails on a corrupted ring; treat it as empty from here on
        let len = encoded_len(&self.buf[self.rd..]);
        if len.is_none() {
            tracing::warn!(rd = self.rd, wr = self.wr, "corrupt record header in ring");
        }
        len
    }

    fn discard_oldest(&mut self) {
        match self.head_len() {
            Some(len) => self.rd = (self.rd + len) % self.capacity(),
            None => self.clear(),
        }
    }
}

/// Rounds a requested ring size to what [`Ring::try_new`] allocates.
pub const fn round_ring_size(size: usize) -> usize {
    let size = size.saturating_add(7) & !7;
    if size < MIN_RING_SIZE {
        MIN_RING_SIZE
    } else {
        size
    }
}
