use snafu::Snafu;

use crate::pool::BufferPtr;
use crate::session::SessionKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Device ordinal is outside of the range reported by the driver.
    #[snafu(display("invalid device ordinal {ordinal}: driver reports {count} device(s)"))]
    InvalidDevice { ordinal: usize, count: usize },

    /// Device exists but the driver refused to activate it.
    #[snafu(display("device {ordinal} is unavailable: {reason}"))]
    DeviceUnavailable { ordinal: usize, reason: String },

    /// Driver could not enumerate devices at all.
    #[snafu(display("unable to query device count: {reason}"))]
    DeviceCount { reason: String },

    #[snafu(display("failed to allocate {size} bytes: {reason}"))]
    Allocation { size: usize, reason: String },

    /// Pointer was never issued by the pool it is released to.
    #[snafu(display("buffer {ptr} was not issued by this pool"))]
    UnknownBuffer { ptr: BufferPtr },

    #[snafu(display("buffer {ptr} is already released"))]
    AlreadyReleased { ptr: BufferPtr },

    /// Accelerator resource requested while no device is active.
    #[snafu(display("no accelerator device is active"))]
    NoActiveDevice,

    #[snafu(display("failed to create {kind} session on device {ordinal}: {reason}"))]
    SessionCreation { kind: SessionKind, ordinal: usize, reason: String },

    #[snafu(display("unsupported operation: {operation}"))]
    Unsupported { operation: String },

    #[cfg(feature = "cuda")]
    /// CUDA driver errors.
    #[snafu(display("CUDA error: {source}"))]
    Cuda { source: cudarc::driver::DriverError },
}
