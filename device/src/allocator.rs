use std::sync::Arc;

#[cfg(feature = "cuda")]
use cudarc::driver::{CudaContext, CudaSlice, DevicePtr};

use crate::device::ActiveDevice;
use crate::driver::Accelerator;
use crate::emulated::AllocationLease;
use crate::error::{AllocationSnafu, NoActiveDeviceSnafu, Result};
use crate::pool::BufferPtr;

/// Owned block of host or device memory.
///
/// Zero-byte requests are backed by one byte so every live block has a
/// distinct address.
#[derive(Debug)]
pub enum RawBuffer {
    Host {
        data: Box<[u8]>,
    },
    /// Host memory standing in for the memory of an emulated accelerator.
    Emulated {
        data: Box<[u8]>,
        ordinal: usize,
        lease: AllocationLease,
    },
    #[cfg(feature = "cuda")]
    Cuda {
        data: CudaSlice<u8>,
        device: Arc<CudaContext>,
    },
}

impl RawBuffer {
    pub(crate) fn host(size: usize) -> Result<Self> {
        Ok(RawBuffer::Host { data: zeroed(size)? })
    }

    /// Capacity of the block in bytes.
    pub fn size(&self) -> usize {
        match self {
            RawBuffer::Host { data } | RawBuffer::Emulated { data, .. } => data.len(),
            #[cfg(feature = "cuda")]
            RawBuffer::Cuda { data, .. } => data.len(),
        }
    }

    /// Address of the first byte, in the address space of the owning device.
    pub fn address(&self) -> BufferPtr {
        match self {
            RawBuffer::Host { data } | RawBuffer::Emulated { data, .. } => BufferPtr::new(data.as_ptr() as usize),
            #[cfg(feature = "cuda")]
            RawBuffer::Cuda { data, .. } => {
                let (ptr, _record) = data.device_ptr(data.stream());
                BufferPtr::new(ptr as usize)
            }
        }
    }

    /// Device ordinal the memory belongs to, `None` for host memory.
    pub fn device(&self) -> Option<usize> {
        match self {
            RawBuffer::Host { .. } => None,
            RawBuffer::Emulated { ordinal, .. } => Some(*ordinal),
            #[cfg(feature = "cuda")]
            RawBuffer::Cuda { device, .. } => Some(device.ordinal()),
        }
    }
}

/// Zero-filled host block of `size.max(1)` bytes.
///
/// Reports allocator failure as [`Error::Allocation`](crate::Error::Allocation)
/// instead of aborting.
pub(crate) fn zeroed(size: usize) -> Result<Box<[u8]>> {
    let len = size.max(1);
    let mut data = Vec::new();
    data.try_reserve_exact(len).map_err(|e| AllocationSnafu { size, reason: e.to_string() }.build())?;
    data.resize(len, 0u8);
    Ok(data.into_boxed_slice())
}

/// Backing memory strategy for a [`BufferPool`](crate::BufferPool) or
/// [`Workspace`](crate::Workspace).
pub trait MemorySource: Send + std::fmt::Debug {
    fn alloc(&self, size: usize) -> Result<RawBuffer>;
    fn free(&self, _buffer: RawBuffer) {}
    fn name(&self) -> &str;
}

/// Host heap memory.
#[derive(Debug, Clone, Default)]
pub struct HostMemory;

impl MemorySource for HostMemory {
    fn alloc(&self, size: usize) -> Result<RawBuffer> {
        RawBuffer::host(size)
    }

    fn name(&self) -> &str {
        "host"
    }
}

/// Memory of whichever accelerator is currently bound.
///
/// Binding requires an [`ActiveDevice`], so accelerator memory can only be
/// allocated after a device was successfully activated.
#[derive(Debug, Default)]
pub struct AcceleratorMemory {
    device: Option<Arc<dyn Accelerator>>,
}

impl AcceleratorMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, active: &ActiveDevice) {
        self.device = Some(Arc::clone(active.accelerator()));
    }

    pub fn unbind(&mut self) {
        self.device = None;
    }

    /// Ordinal of the bound device.
    pub fn ordinal(&self) -> Option<usize> {
        self.device.as_ref().map(|d| d.ordinal())
    }
}

impl MemorySource for AcceleratorMemory {
    fn alloc(&self, size: usize) -> Result<RawBuffer> {
        let device = self.device.as_ref().ok_or_else(|| NoActiveDeviceSnafu.build())?;
        device.alloc(size)
    }

    fn free(&self, buffer: RawBuffer) {
        // Blocks carry their own device, dropping releases them on it.
        match &self.device {
            Some(device) => device.free(buffer),
            None => drop(buffer),
        }
    }

    fn name(&self) -> &str {
        "accelerator"
    }
}
