//! Size-classed buffer reuse.
//!
//! A [`BufferPool`] remembers every block it ever allocated. Released blocks
//! go back on a free list keyed by their originally requested size, and a
//! later request is served from the smallest size class that is at least as
//! large. Blocks are never split or merged: fixed-shape numerical workloads
//! converge to a handful of sizes after a few iterations.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use snafu::ensure;
use tracing::{debug, trace};

use crate::allocator::{MemorySource, RawBuffer};
use crate::error::{AlreadyReleasedSnafu, Result, UnknownBufferSnafu};

/// Address of a pooled block, in the address space of its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferPtr(usize);

impl BufferPtr {
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    pub const fn addr(self) -> usize {
        self.0
    }

    /// Reinterpret as a host pointer.
    ///
    /// Only meaningful for host blocks; dereferencing a device address is UB.
    pub fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

impl fmt::Display for BufferPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Bookkeeping for one issued block.
#[derive(Debug)]
pub struct MemoryRecord {
    raw: RawBuffer,
    /// Size originally requested, also the size class the block returns to.
    size: usize,
    device: Option<usize>,
    in_use: bool,
}

impl MemoryRecord {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn device(&self) -> Option<usize> {
        self.device
    }

    pub fn in_use(&self) -> bool {
        self.in_use
    }
}

/// Reusable buffer allocator over a [`MemorySource`].
///
/// Not internally synchronized; the owner serializes access.
#[derive(Debug)]
pub struct BufferPool<S: MemorySource> {
    source: S,
    /// Size class -> released blocks. Empty lists are removed eagerly.
    free: BTreeMap<usize, Vec<BufferPtr>>,
    records: HashMap<BufferPtr, MemoryRecord>,
}

impl<S: MemorySource> BufferPool<S> {
    pub fn new(source: S) -> Self {
        Self { source, free: BTreeMap::new(), records: HashMap::new() }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Get a block of at least `size` bytes.
    pub fn acquire(&mut self, size: usize) -> Result<BufferPtr> {
        // Free lists only hold recorded pointers.
        if let Some(ptr) = self.take_free(size)
            && let Some(record) = self.records.get_mut(&ptr)
        {
            record.in_use = true;
            trace!(pool = self.source.name(), size, class = record.size, %ptr, "reused pooled buffer");
            return Ok(ptr);
        }

        let raw = self.source.alloc(size)?;
        let ptr = raw.address();
        let device = raw.device();
        debug!(pool = self.source.name(), size, ?device, %ptr, "allocated pooled buffer");
        self.records.insert(ptr, MemoryRecord { raw, size, device, in_use: true });
        Ok(ptr)
    }

    /// Return a block to its size class.
    pub fn release(&mut self, ptr: BufferPtr) -> Result<()> {
        let record = self.records.get_mut(&ptr).ok_or_else(|| UnknownBufferSnafu { ptr }.build())?;
        ensure!(record.in_use, AlreadyReleasedSnafu { ptr });

        record.in_use = false;
        self.free.entry(record.size).or_default().push(ptr);
        trace!(pool = self.source.name(), size = record.size, %ptr, "released pooled buffer");
        Ok(())
    }

    /// Free every block ever issued, checked out or not.
    pub fn clear(&mut self) {
        if self.records.is_empty() {
            return;
        }
        let count = self.records.len();
        let bytes = self.reserved_bytes();
        self.free.clear();
        for (_, record) in self.records.drain() {
            self.source.free(record.raw);
        }
        debug!(pool = self.source.name(), count, bytes, "cleared buffer pool");
    }

    pub fn record(&self, ptr: BufferPtr) -> Option<&MemoryRecord> {
        self.records.get(&ptr)
    }

    /// Number of blocks issued since the last clear.
    pub fn issued(&self) -> usize {
        self.records.len()
    }

    /// Number of blocks currently checked out.
    pub fn in_use(&self) -> usize {
        self.records.values().filter(|r| r.in_use).count()
    }

    /// Number of blocks waiting on free lists.
    pub fn free(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    /// Total bytes held by the pool.
    pub fn reserved_bytes(&self) -> usize {
        self.records.values().map(|r| r.raw.size()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn take_free(&mut self, size: usize) -> Option<BufferPtr> {
        let (&class, list) = self.free.range_mut(size..).next()?;
        let ptr = list.pop();
        if list.is_empty() {
            self.free.remove(&class);
        }
        ptr
    }
}

impl<S: MemorySource> Drop for BufferPool<S> {
    fn drop(&mut self) {
        self.clear();
    }
}
