//! Process-wide execution context for vesta.
//!
//! Provides the [`ExecutionContext`] that higher-level computations consult
//! for the current [`Mode`], the active device, pooled host and accelerator
//! buffers, per-mode scratch workspaces and the shared [`RandomGenerator`].
//!
//! # Access
//!
//! [`global_context`] returns the single process-wide instance. Components
//! that prefer explicit wiring construct an [`ExecutionContext`] over their
//! own [`DeviceRegistry`] and pass it down.
//!
//! # Configuration
//!
//! [`ContextConfig`] carries the optional startup device ordinal and random
//! seed, built explicitly or read from `VESTA_*` environment variables.

pub mod config;
pub mod context;
pub mod error;
pub mod rng;


pub use config::ContextConfig;
pub use context::{ExecutionContext, Mode, global_context};
pub use error::*;
pub use rng::{GeneratorKind, RandomGenerator, entropy_seed};
pub use vesta_device::{BufferPtr, DeviceProperties, DeviceRegistry, EmulatedDriver};
