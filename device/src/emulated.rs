//! Host-backed accelerator emulation.
//!
//! [`EmulatedDriver`] exposes a configurable number of device ordinals whose
//! memory lives on the host heap. Individual ordinals can be marked
//! unavailable, session creation of a given kind can be made to fail, and the
//! driver counts live sessions and allocations, which makes it the backend of
//! host-only builds and of the accelerator tests.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use snafu::ensure;

use crate::allocator::{RawBuffer, zeroed};
use crate::driver::{Accelerator, DeviceProperties, Driver};
use crate::error::{AllocationSnafu, DeviceUnavailableSnafu, Result, SessionCreationSnafu, UnsupportedSnafu};
use crate::session::{Session, SessionKind};

const DEFAULT_MEMORY: usize = 8 << 30;

#[derive(Debug, Default)]
struct Counters {
    sessions: AtomicUsize,
    allocations: AtomicUsize,
    bytes: AtomicUsize,
}

/// Emulated accelerator driver.
///
/// Clones share their live-resource counters.
#[derive(Debug, Clone)]
pub struct EmulatedDriver {
    count: usize,
    unavailable: BTreeSet<usize>,
    failing_session: Option<SessionKind>,
    failing_on: BTreeMap<usize, SessionKind>,
    kernels: bool,
    memory: usize,
    counters: Arc<Counters>,
}

impl EmulatedDriver {
    /// Driver with `count` working devices.
    pub fn new(count: usize) -> Self {
        Self {
            count,
            unavailable: BTreeSet::new(),
            failing_session: None,
            failing_on: BTreeMap::new(),
            kernels: true,
            memory: DEFAULT_MEMORY,
            counters: Arc::default(),
        }
    }

    /// Ordinals that exist but refuse activation.
    pub fn with_unavailable(mut self, ordinals: impl IntoIterator<Item = usize>) -> Self {
        self.unavailable.extend(ordinals);
        self
    }

    /// Make creation of `kind` sessions fail on every device.
    pub fn with_failing_session(mut self, kind: SessionKind) -> Self {
        self.failing_session = Some(kind);
        self
    }

    /// Make creation of `kind` sessions fail on device `ordinal` only.
    pub fn with_failing_session_on(mut self, ordinal: usize, kind: SessionKind) -> Self {
        self.failing_on.insert(ordinal, kind);
        self
    }

    /// Devices without a specialized-kernel library.
    pub fn without_kernels(mut self) -> Self {
        self.kernels = false;
        self
    }

    /// Per-device memory capacity in bytes.
    pub fn with_memory(mut self, bytes: usize) -> Self {
        self.memory = bytes;
        self
    }

    /// Sessions currently alive across all devices of this driver.
    pub fn live_sessions(&self) -> usize {
        self.counters.sessions.load(Ordering::SeqCst)
    }

    /// Device allocations currently alive across all devices of this driver.
    pub fn live_allocations(&self) -> usize {
        self.counters.allocations.load(Ordering::SeqCst)
    }

    /// Bytes of device memory currently allocated.
    pub fn live_bytes(&self) -> usize {
        self.counters.bytes.load(Ordering::SeqCst)
    }
}

impl Driver for EmulatedDriver {
    fn name(&self) -> &str {
        "emulated"
    }

    fn device_count(&self) -> Result<usize> {
        Ok(self.count)
    }

    fn open(&self, ordinal: usize) -> Result<Arc<dyn Accelerator>> {
        ensure!(
            !self.unavailable.contains(&ordinal),
            DeviceUnavailableSnafu { ordinal, reason: "device is marked unavailable" }
        );
        Ok(Arc::new(EmulatedAccelerator {
            ordinal,
            kernels: self.kernels,
            failing_session: self.failing_on.get(&ordinal).copied().or(self.failing_session),
            memory: self.memory,
            counters: Arc::clone(&self.counters),
        }))
    }
}

#[derive(Debug)]
struct EmulatedAccelerator {
    ordinal: usize,
    kernels: bool,
    failing_session: Option<SessionKind>,
    memory: usize,
    counters: Arc<Counters>,
}

impl Accelerator for EmulatedAccelerator {
    fn ordinal(&self) -> usize {
        self.ordinal
    }

    fn properties(&self) -> Result<DeviceProperties> {
        Ok(DeviceProperties {
            ordinal: self.ordinal,
            name: format!("Emulated Accelerator {}", self.ordinal),
            compute_capability: (8, 0),
            total_memory: self.memory,
            shared_memory_per_block: 48 << 10,
            registers_per_block: 65536,
            warp_size: 32,
            max_threads_per_block: 1024,
            max_block_dims: [1024, 1024, 64],
            max_grid_dims: [i32::MAX as u32, 65535, 65535],
            clock_rate_khz: 1_410_000,
            multiprocessor_count: 108,
            kernel_timeout: false,
        })
    }

    fn alloc(&self, size: usize) -> Result<RawBuffer> {
        let used = self.counters.bytes.load(Ordering::SeqCst);
        ensure!(
            used.saturating_add(size) <= self.memory,
            AllocationSnafu { size, reason: format!("out of memory ({used} of {} bytes in use)", self.memory) }
        );

        let data = zeroed(size)?;
        let lease = AllocationLease::new(Arc::clone(&self.counters), size);
        Ok(RawBuffer::Emulated { data, ordinal: self.ordinal, lease })
    }

    fn supports(&self, kind: SessionKind) -> bool {
        kind != SessionKind::Kernels || self.kernels
    }

    fn create_session(&self, kind: SessionKind, seed: u64) -> Result<Box<dyn Session>> {
        ensure!(
            self.failing_session != Some(kind) && self.supports(kind),
            SessionCreationSnafu { kind, ordinal: self.ordinal, reason: "emulated session failure" }
        );
        self.counters.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(EmulatedSession { kind, seed, counters: Arc::clone(&self.counters) }))
    }
}

struct EmulatedSession {
    kind: SessionKind,
    seed: u64,
    counters: Arc<Counters>,
}

impl fmt::Debug for EmulatedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmulatedSession").field("kind", &self.kind).field("seed", &self.seed).finish()
    }
}

impl Session for EmulatedSession {
    fn kind(&self) -> SessionKind {
        self.kind
    }

    fn reseed(&mut self, seed: u64) -> Result<()> {
        ensure!(self.kind == SessionKind::Rng, UnsupportedSnafu { operation: format!("reseed on {} session", self.kind) });
        self.seed = seed;
        Ok(())
    }
}

impl Drop for EmulatedSession {
    fn drop(&mut self) {
        self.counters.sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Accounting token carried by emulated device memory.
pub struct AllocationLease {
    counters: Arc<Counters>,
    size: usize,
}

impl AllocationLease {
    fn new(counters: Arc<Counters>, size: usize) -> Self {
        counters.allocations.fetch_add(1, Ordering::SeqCst);
        counters.bytes.fetch_add(size, Ordering::SeqCst);
        Self { counters, size }
    }
}

impl fmt::Debug for AllocationLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocationLease").field("size", &self.size).finish()
    }
}

impl Drop for AllocationLease {
    fn drop(&mut self) {
        self.counters.allocations.fetch_sub(1, Ordering::SeqCst);
        self.counters.bytes.fetch_sub(self.size, Ordering::SeqCst);
    }
}
