//! Device enumeration, accelerator sessions and pooled memory for vesta.
//!
//! - [`DeviceRegistry`] validates and opens devices through a [`Driver`]
//! - [`ActiveDevice`] is an opened device together with its [`SessionHandles`]
//! - [`BufferPool`] reuses host or accelerator blocks by size class
//! - [`Workspace`] is a single grow-only scratch block

pub mod allocator;
#[cfg(feature = "cuda")]
pub mod cuda;
pub mod device;
pub mod driver;
pub mod emulated;
pub mod error;
pub mod pool;
pub mod registry;
pub mod session;
pub mod workspace;


pub use allocator::{AcceleratorMemory, HostMemory, MemorySource, RawBuffer};
#[cfg(feature = "cuda")]
pub use cuda::CudaDriver;
pub use device::{ActiveDevice, DeviceState};
pub use driver::{Accelerator, DeviceProperties, Driver};
pub use emulated::EmulatedDriver;
pub use error::{Error, Result};
pub use pool::{BufferPool, BufferPtr, MemoryRecord};
pub use registry::{DeviceRegistry, registry};
pub use session::{Session, SessionHandles, SessionKind};
pub use workspace::Workspace;
