//! NVIDIA devices through `cudarc`.

use std::fmt;
use std::sync::Arc;

use cudarc::cublas::CudaBlas;
use cudarc::curand::CudaRng;
use cudarc::driver::sys::CUdevice_attribute;
use cudarc::driver::{CudaContext, result};
use snafu::ResultExt;

use crate::allocator::RawBuffer;
use crate::driver::{Accelerator, DeviceProperties, Driver};
use crate::error::{
    AllocationSnafu, CudaSnafu, DeviceCountSnafu, DeviceUnavailableSnafu, Result, SessionCreationSnafu,
    UnsupportedSnafu,
};
use crate::session::{Session, SessionKind};

/// CUDA driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct CudaDriver;

impl Driver for CudaDriver {
    fn name(&self) -> &str {
        "cuda"
    }

    fn device_count(&self) -> Result<usize> {
        let count = CudaContext::device_count().map_err(|e| DeviceCountSnafu { reason: e.to_string() }.build())?;
        Ok(count.max(0) as usize)
    }

    fn open(&self, ordinal: usize) -> Result<Arc<dyn Accelerator>> {
        let context =
            CudaContext::new(ordinal).map_err(|e| DeviceUnavailableSnafu { ordinal, reason: e.to_string() }.build())?;
        Ok(Arc::new(CudaAccelerator { ordinal, context }))
    }
}

#[derive(Debug)]
struct CudaAccelerator {
    ordinal: usize,
    context: Arc<CudaContext>,
}

impl CudaAccelerator {
    fn attribute(&self, attribute: CUdevice_attribute) -> Result<u32> {
        let value = self.context.attribute(attribute).context(CudaSnafu)?;
        Ok(value.max(0) as u32)
    }
}

impl Accelerator for CudaAccelerator {
    fn ordinal(&self) -> usize {
        self.ordinal
    }

    fn properties(&self) -> Result<DeviceProperties> {
        use CUdevice_attribute::*;

        self.context.bind_to_thread().context(CudaSnafu)?;
        let (_free, total) = result::mem_get_info().context(CudaSnafu)?;

        Ok(DeviceProperties {
            ordinal: self.ordinal,
            name: self.context.name().context(CudaSnafu)?,
            compute_capability: (
                self.attribute(CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR)?,
                self.attribute(CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR)?,
            ),
            total_memory: total,
            shared_memory_per_block: self.attribute(CU_DEVICE_ATTRIBUTE_MAX_SHARED_MEMORY_PER_BLOCK)? as usize,
            registers_per_block: self.attribute(CU_DEVICE_ATTRIBUTE_MAX_REGISTERS_PER_BLOCK)?,
            warp_size: self.attribute(CU_DEVICE_ATTRIBUTE_WARP_SIZE)?,
            max_threads_per_block: self.attribute(CU_DEVICE_ATTRIBUTE_MAX_THREADS_PER_BLOCK)?,
            max_block_dims: [
                self.attribute(CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_X)?,
                self.attribute(CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_Y)?,
                self.attribute(CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_Z)?,
            ],
            max_grid_dims: [
                self.attribute(CU_DEVICE_ATTRIBUTE_MAX_GRID_DIM_X)?,
                self.attribute(CU_DEVICE_ATTRIBUTE_MAX_GRID_DIM_Y)?,
                self.attribute(CU_DEVICE_ATTRIBUTE_MAX_GRID_DIM_Z)?,
            ],
            clock_rate_khz: self.attribute(CU_DEVICE_ATTRIBUTE_CLOCK_RATE)?,
            multiprocessor_count: self.attribute(CU_DEVICE_ATTRIBUTE_MULTIPROCESSOR_COUNT)?,
            kernel_timeout: self.attribute(CU_DEVICE_ATTRIBUTE_KERNEL_EXEC_TIMEOUT)? != 0,
        })
    }

    fn alloc(&self, size: usize) -> Result<RawBuffer> {
        let data = self
            .context
            .default_stream()
            .alloc_zeros::<u8>(size.max(1))
            .map_err(|e| AllocationSnafu { size, reason: e.to_string() }.build())?;
        Ok(RawBuffer::Cuda { data, device: Arc::clone(&self.context) })
    }

    fn synchronize(&self) -> Result<()> {
        self.context.synchronize().context(CudaSnafu)
    }

    fn supports(&self, kind: SessionKind) -> bool {
        kind != SessionKind::Kernels || cfg!(feature = "cudnn")
    }

    fn create_session(&self, kind: SessionKind, seed: u64) -> Result<Box<dyn Session>> {
        let ordinal = self.ordinal;
        let stream = self.context.default_stream();
        let session: Box<dyn Session> = match kind {
            SessionKind::Blas => {
                let blas =
                    CudaBlas::new(stream).map_err(|e| SessionCreationSnafu { kind, ordinal, reason: e.to_string() }.build())?;
                Box::new(CudaSession { ordinal, handle: CudaHandle::Blas(blas) })
            }
            SessionKind::Rng => {
                let rng = CudaRng::new(seed, stream)
                    .map_err(|e| SessionCreationSnafu { kind, ordinal, reason: e.to_string() }.build())?;
                Box::new(CudaSession { ordinal, handle: CudaHandle::Rng(rng) })
            }
            #[cfg(feature = "cudnn")]
            SessionKind::Kernels => {
                let cudnn = cudarc::cudnn::Cudnn::new(stream)
                    .map_err(|e| SessionCreationSnafu { kind, ordinal, reason: e.to_string() }.build())?;
                Box::new(CudaSession { ordinal, handle: CudaHandle::Kernels(cudnn) })
            }
            #[cfg(not(feature = "cudnn"))]
            SessionKind::Kernels => {
                return SessionCreationSnafu { kind, ordinal, reason: "built without the cudnn feature" }.fail();
            }
        };
        Ok(session)
    }
}

enum CudaHandle {
    Blas(CudaBlas),
    Rng(CudaRng),
    #[cfg(feature = "cudnn")]
    Kernels(Arc<cudarc::cudnn::Cudnn>),
}

struct CudaSession {
    ordinal: usize,
    handle: CudaHandle,
}

// cudarc handles are raw driver pointers bound to their context; the owning
// context serializes all use.
unsafe impl Send for CudaSession {}

impl fmt::Debug for CudaSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CudaSession").field("ordinal", &self.ordinal).field("kind", &self.kind()).finish()
    }
}

impl Session for CudaSession {
    fn kind(&self) -> SessionKind {
        match self.handle {
            CudaHandle::Blas(_) => SessionKind::Blas,
            CudaHandle::Rng(_) => SessionKind::Rng,
            #[cfg(feature = "cudnn")]
            CudaHandle::Kernels(_) => SessionKind::Kernels,
        }
    }

    fn reseed(&mut self, seed: u64) -> Result<()> {
        let (ordinal, kind) = (self.ordinal, self.kind());
        match &mut self.handle {
            CudaHandle::Rng(rng) => rng
                .set_seed(seed)
                .map_err(|e| SessionCreationSnafu { kind, ordinal, reason: e.to_string() }.build()),
            _ => UnsupportedSnafu { operation: format!("reseed on {kind} session") }.fail(),
        }
    }
}
