use tracing::debug;

use crate::allocator::{MemorySource, RawBuffer};
use crate::error::Result;
use crate::pool::BufferPtr;

/// Single reusable scratch block, grown on demand.
///
/// Unlike a [`BufferPool`](crate::BufferPool) there is only ever one live
/// block: a request that fits returns it again, a larger one replaces it.
#[derive(Debug, Default)]
pub struct Workspace {
    raw: Option<RawBuffer>,
    size: usize,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the scratch block, growing it to at least `size` bytes.
    pub fn reserve<S: MemorySource + ?Sized>(&mut self, source: &S, size: usize) -> Result<BufferPtr> {
        if let Some(raw) = &self.raw
            && size <= self.size
        {
            return Ok(raw.address());
        }

        if let Some(old) = self.raw.take() {
            source.free(old);
        }
        self.size = 0;

        let raw = source.alloc(size)?;
        let ptr = raw.address();
        debug!(workspace = source.name(), size, %ptr, "grew workspace");
        self.raw = Some(raw);
        self.size = size;
        Ok(ptr)
    }

    /// Release the scratch block.
    pub fn clear<S: MemorySource + ?Sized>(&mut self, source: &S) {
        if let Some(raw) = self.raw.take() {
            source.free(raw);
        }
        self.size = 0;
    }

    /// Current workspace size in bytes, zero when nothing is held.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn ptr(&self) -> Option<BufferPtr> {
        self.raw.as_ref().map(RawBuffer::address)
    }
}
