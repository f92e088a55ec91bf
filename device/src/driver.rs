//! Accelerator driver abstraction.
//!
//! A [`Driver`] enumerates the devices of one accelerator family and opens
//! them. An opened device is an [`Accelerator`]: it hands out device memory
//! and creates the [`Session`] handles needed to issue work.
//!
//! Two drivers ship with this crate:
//! - [`EmulatedDriver`](crate::EmulatedDriver): host memory standing in for
//!   device memory, used for host-only builds and tests
//! - `CudaDriver` (`cuda` feature): NVIDIA devices through `cudarc`

use std::fmt;
use std::sync::Arc;

use crate::allocator::RawBuffer;
use crate::error::Result;
use crate::session::{Session, SessionKind};

/// Accelerator family: enumerates and opens devices.
pub trait Driver: Send + Sync + fmt::Debug {
    /// Short driver name used in log fields.
    fn name(&self) -> &str;

    /// Number of device ordinals known to the driver.
    ///
    /// # Returns
    ///
    /// The count of addressable ordinals, including devices that exist but
    /// may refuse activation. [`Error::DeviceCount`](crate::Error::DeviceCount)
    /// when the driver cannot enumerate at all.
    fn device_count(&self) -> Result<usize>;

    /// Open a device.
    ///
    /// # Arguments
    ///
    /// * `ordinal` - Device ordinal, already range-checked by the caller
    ///
    /// # Returns
    ///
    /// A shared handle to the opened device, or
    /// [`Error::DeviceUnavailable`](crate::Error::DeviceUnavailable) when the
    /// driver refuses it.
    fn open(&self, ordinal: usize) -> Result<Arc<dyn Accelerator>>;
}

/// An opened device.
pub trait Accelerator: Send + Sync + fmt::Debug {
    fn ordinal(&self) -> usize;

    /// Hardware capabilities reported by the driver.
    fn properties(&self) -> Result<DeviceProperties>;

    /// Allocate device memory.
    ///
    /// # Arguments
    ///
    /// * `size` - Requested size in bytes; zero is backed by one byte
    ///
    /// # Returns
    ///
    /// An owned block that releases itself when dropped, or
    /// [`Error::Allocation`](crate::Error::Allocation).
    fn alloc(&self, size: usize) -> Result<RawBuffer>;

    /// Release a block allocated by this device. Dropping it is the default.
    fn free(&self, _buffer: RawBuffer) {}

    /// Wait for all outstanding work on the device.
    fn synchronize(&self) -> Result<()> {
        Ok(())
    }

    /// Whether sessions of `kind` can be created on this device.
    fn supports(&self, kind: SessionKind) -> bool;

    /// Create a device-bound session.
    ///
    /// # Arguments
    ///
    /// * `kind` - Which library session to create
    /// * `seed` - Initial seed, used by [`SessionKind::Rng`] sessions only
    ///
    /// # Returns
    ///
    /// The session handle, or
    /// [`Error::SessionCreation`](crate::Error::SessionCreation).
    fn create_session(&self, kind: SessionKind, seed: u64) -> Result<Box<dyn Session>>;
}

/// Hardware capabilities of a device, as reported by its driver.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DeviceProperties {
    pub ordinal: usize,
    pub name: String,
    /// Compute capability as (major, minor).
    pub compute_capability: (u32, u32),
    pub total_memory: usize,
    pub shared_memory_per_block: usize,
    pub registers_per_block: u32,
    pub warp_size: u32,
    pub max_threads_per_block: u32,
    pub max_block_dims: [u32; 3],
    pub max_grid_dims: [u32; 3],
    pub clock_rate_khz: u32,
    pub multiprocessor_count: u32,
    pub kernel_timeout: bool,
}

impl fmt::Display for DeviceProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [bx, by, bz] = self.max_block_dims;
        let [gx, gy, gz] = self.max_grid_dims;
        writeln!(f, "Device id:                     {}", self.ordinal)?;
        writeln!(f, "Name:                          {}", self.name)?;
        writeln!(f, "Compute capability:            {}.{}", self.compute_capability.0, self.compute_capability.1)?;
        writeln!(f, "Total global memory:           {}", self.total_memory)?;
        writeln!(f, "Shared memory per block:       {}", self.shared_memory_per_block)?;
        writeln!(f, "Registers per block:           {}", self.registers_per_block)?;
        writeln!(f, "Warp size:                     {}", self.warp_size)?;
        writeln!(f, "Maximum threads per block:     {}", self.max_threads_per_block)?;
        writeln!(f, "Maximum dimension of block:    {bx}, {by}, {bz}")?;
        writeln!(f, "Maximum dimension of grid:     {gx}, {gy}, {gz}")?;
        writeln!(f, "Clock rate (kHz):              {}", self.clock_rate_khz)?;
        writeln!(f, "Number of multiprocessors:     {}", self.multiprocessor_count)?;
        write!(f, "Kernel execution timeout:      {}", if self.kernel_timeout { "Yes" } else { "No" })
    }
}
