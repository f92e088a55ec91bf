//! Process-wide execution context.
//!
//! The [`ExecutionContext`] owns everything a computation needs besides its
//! own data: the current [`Mode`], the active device with its session
//! handles, the host and accelerator buffer pools, one scratch workspace per
//! mode, and the shared random stream.
//!
//! # Mode and device switches
//!
//! Switching mode or device is meant to happen at well-defined boundaries,
//! before a run starts. Buffers handed out under the previous mode or device
//! stay owned by their pool but are only valid for the device that allocated
//! them; using them after a switch is the caller's responsibility.
//!
//! # Failures
//!
//! Environment failures (device cannot be activated, sessions cannot be
//! created) and accelerator requests without an active device are fatal in
//! the plain methods. Every fatal method has a `try_` counterpart returning
//! a [`Result`] instead. Releasing a pointer the pool never issued is logged
//! and ignored. Probing with [`check_device`](ExecutionContext::check_device)
//! or [`find_device`](ExecutionContext::find_device) never fails loudly.
//!
//! # Example
//!
//! ```ignore
//! let mut context = vesta_runtime::global_context();
//! context.set_device(0);
//! context.set_mode(Mode::Accelerator);
//! let scratch = context.accelerator_workspace(1 << 20);
//! ```

use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};
use snafu::ResultExt;
use tracing::{debug, info, trace, warn};

use vesta_device::{
    AcceleratorMemory, ActiveDevice, BufferPool, BufferPtr, DeviceProperties, DeviceRegistry, DeviceState,
    HostMemory, MemorySource, SessionHandles, Workspace, registry,
};

use crate::config::ContextConfig;
use crate::error::{DeviceSnafu, OrAbort, Result};
use crate::rng::{GeneratorKind, RandomGenerator, entropy_seed};

/// Where computation runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    Host,
    Accelerator,
}

impl Mode {
    fn generator_kind(self) -> GeneratorKind {
        match self {
            Mode::Host => GeneratorKind::Host,
            Mode::Accelerator => GeneratorKind::Accelerator,
        }
    }
}

/// Execution context: mode, device, memory pools and random stream.
///
/// Not internally synchronized. The process-wide instance returned by
/// [`global_context`] is serialized by its mutex; explicitly constructed
/// instances belong to whoever owns them.
#[derive(Debug)]
pub struct ExecutionContext {
    registry: DeviceRegistry,
    mode: Mode,
    device: DeviceState,
    host_pool: BufferPool<HostMemory>,
    accelerator_pool: BufferPool<AcceleratorMemory>,
    host_workspace: Workspace,
    accelerator_workspace: Workspace,
    random_generator: Option<RandomGenerator>,
    /// Explicit seed, reused for device generators created by later switches.
    seed: Option<u64>,
    kernel_sessions: bool,
}

impl ExecutionContext {
    /// Context in host mode with no active device.
    pub fn new(registry: DeviceRegistry) -> Self {
        Self {
            registry,
            mode: Mode::Host,
            device: DeviceState::NoDevice,
            host_pool: BufferPool::new(HostMemory),
            accelerator_pool: BufferPool::new(AcceleratorMemory::new()),
            host_workspace: Workspace::new(),
            accelerator_workspace: Workspace::new(),
            random_generator: None,
            seed: None,
            kernel_sessions: true,
        }
    }

    /// Create a context and apply `config` to it.
    pub fn with_config(registry: DeviceRegistry, config: &ContextConfig) -> Result<Self> {
        let mut context = Self::new(registry);
        context.configure(config)?;
        Ok(context)
    }

    /// Apply startup configuration: seed first, then device and accelerator mode.
    pub fn configure(&mut self, config: &ContextConfig) -> Result<()> {
        self.kernel_sessions = config.kernel_sessions;
        if let Some(seed) = config.seed {
            self.set_random_seed(seed)?;
        }
        if let Some(ordinal) = config.device {
            self.try_set_device(ordinal)?;
            self.set_mode(Mode::Accelerator);
        }
        Ok(())
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Record the mode for subsequent requests. Allocates nothing.
    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            debug!(from = ?self.mode, to = ?mode, "mode changed");
        }
        self.mode = mode;
    }

    /// Ordinal of the active device.
    pub fn active_device(&self) -> Option<usize> {
        self.device.ordinal()
    }

    /// Session handles of the active device.
    pub fn sessions(&self) -> Option<&SessionHandles> {
        self.device.active().map(ActiveDevice::sessions)
    }

    /// Activate `ordinal`, aborting the process if it cannot be activated.
    pub fn set_device(&mut self, ordinal: usize) {
        self.try_set_device(ordinal).or_abort(format_args!("cannot activate device {ordinal}"))
    }

    /// Activate `ordinal`.
    ///
    /// An ordinal that is out of range or cannot be opened leaves the context
    /// untouched. Once the new device is open, the current device's sessions
    /// are torn down before the new ones are created; if session creation
    /// fails the context is left without an active device. Pooled buffers are
    /// kept.
    pub fn try_set_device(&mut self, ordinal: usize) -> Result<()> {
        self.registry.validate(ordinal).context(DeviceSnafu)?;
        if self.device.ordinal() == Some(ordinal) {
            return Ok(());
        }
        let accelerator = self.registry.activate(ordinal).context(DeviceSnafu)?;

        self.accelerator_workspace.clear(self.accelerator_pool.source());
        self.accelerator_pool.source_mut().unbind();
        self.device.reset();

        let seed = self.seed.unwrap_or_else(entropy_seed);
        let active = ActiveDevice::from_opened(accelerator, seed, self.kernel_sessions).context(DeviceSnafu)?;
        self.accelerator_pool.source_mut().bind(&active);
        self.device = DeviceState::Active(active);

        if self.mode == Mode::Accelerator
            && let Some(rng) = self.random_generator.as_mut()
            && rng.kind() == GeneratorKind::Accelerator
        {
            rng.reseed(seed);
        }

        info!(ordinal, "device activated");
        Ok(())
    }

    /// Whether `ordinal` could be activated. Leaves the context untouched.
    pub fn check_device(&self, ordinal: usize) -> bool {
        if self.device.ordinal() == Some(ordinal) {
            return true;
        }
        match ActiveDevice::activate(&self.registry, ordinal, 0, self.kernel_sessions) {
            Ok(probe) => {
                probe.deactivate();
                trace!(ordinal, "device probe succeeded");
                true
            }
            Err(e) => {
                trace!(ordinal, reason = %e, "device probe failed");
                false
            }
        }
    }

    /// First ordinal at or after `start` that can be activated.
    pub fn find_device(&self, start: usize) -> Option<usize> {
        let count = match self.registry.device_count() {
            Ok(count) => count,
            Err(e) => {
                trace!(reason = %e, "device enumeration failed");
                return None;
            }
        };
        (start..count).find(|&ordinal| self.check_device(ordinal))
    }

    /// Properties of the active device, logged at info.
    pub fn device_query(&self) -> Result<DeviceProperties> {
        let properties = self.require_device()?.properties().context(DeviceSnafu)?;
        info!("device query:\n{properties}");
        Ok(properties)
    }

    /// The shared random stream, created on first use for the current mode.
    pub fn random_stream(&mut self) -> &mut RandomGenerator {
        let kind = self.mode.generator_kind();
        let seed = self.seed;
        self.random_generator.get_or_insert_with(|| match seed {
            Some(seed) => RandomGenerator::with_seed(kind, seed),
            None => RandomGenerator::new(kind),
        })
    }

    /// Reseed the device generator and restart the shared stream from `seed`.
    pub fn set_random_seed(&mut self, seed: u64) -> Result<()> {
        self.seed = Some(seed);
        if let Some(active) = self.device.active_mut() {
            active.sessions_mut().reseed(seed).context(DeviceSnafu)?;
        }
        self.random_generator = Some(RandomGenerator::with_seed(self.mode.generator_kind(), seed));
        debug!(seed, "random seed set");
        Ok(())
    }

    pub fn host_buffer(&mut self, size: usize) -> BufferPtr {
        self.host_pool.acquire(size).or_abort(format_args!("cannot allocate {size} host bytes"))
    }

    /// Return a host buffer to its pool. Unknown pointers are logged and ignored.
    pub fn release_host_buffer(&mut self, ptr: BufferPtr) -> bool {
        release_or_warn(&mut self.host_pool, ptr)
    }

    pub fn clear_host_buffers(&mut self) {
        self.host_pool.clear();
    }

    pub fn accelerator_buffer(&mut self, size: usize) -> BufferPtr {
        self.try_accelerator_buffer(size).or_abort(format_args!("cannot allocate {size} accelerator bytes"))
    }

    pub fn try_accelerator_buffer(&mut self, size: usize) -> Result<BufferPtr> {
        self.require_device()?;
        self.accelerator_pool.acquire(size).context(DeviceSnafu)
    }

    pub fn release_accelerator_buffer(&mut self, ptr: BufferPtr) -> bool {
        self.try_release_accelerator_buffer(ptr).or_abort("cannot release accelerator buffer")
    }

    pub fn try_release_accelerator_buffer(&mut self, ptr: BufferPtr) -> Result<bool> {
        self.require_device()?;
        Ok(release_or_warn(&mut self.accelerator_pool, ptr))
    }

    pub fn clear_accelerator_buffers(&mut self) {
        self.try_clear_accelerator_buffers().or_abort("cannot clear accelerator buffers")
    }

    pub fn try_clear_accelerator_buffers(&mut self) -> Result<()> {
        self.require_device()?;
        self.accelerator_pool.clear();
        Ok(())
    }

    /// The host scratch block, grown to at least `size` bytes.
    pub fn host_workspace(&mut self, size: usize) -> BufferPtr {
        self.host_workspace
            .reserve(self.host_pool.source(), size)
            .or_abort(format_args!("cannot allocate {size} bytes of host workspace"))
    }

    /// The accelerator scratch block, grown to at least `size` bytes.
    pub fn accelerator_workspace(&mut self, size: usize) -> BufferPtr {
        self.try_accelerator_workspace(size)
            .or_abort(format_args!("cannot allocate {size} bytes of accelerator workspace"))
    }

    pub fn try_accelerator_workspace(&mut self, size: usize) -> Result<BufferPtr> {
        self.require_device()?;
        self.accelerator_workspace.reserve(self.accelerator_pool.source(), size).context(DeviceSnafu)
    }

    pub fn host_pool(&self) -> &BufferPool<HostMemory> {
        &self.host_pool
    }

    pub fn accelerator_pool(&self) -> &BufferPool<AcceleratorMemory> {
        &self.accelerator_pool
    }

    /// Current workspace size for `mode`, zero when none is held.
    pub fn workspace_size(&self, mode: Mode) -> usize {
        match mode {
            Mode::Host => self.host_workspace.size(),
            Mode::Accelerator => self.accelerator_workspace.size(),
        }
    }

    fn require_device(&self) -> Result<&ActiveDevice> {
        self.device.active().ok_or(vesta_device::Error::NoActiveDevice).context(DeviceSnafu)
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        self.accelerator_workspace.clear(self.accelerator_pool.source());
        self.host_workspace.clear(self.host_pool.source());
        self.accelerator_pool.clear();
        self.host_pool.clear();
        self.device.reset();
    }
}

fn release_or_warn<S: MemorySource>(pool: &mut BufferPool<S>, ptr: BufferPtr) -> bool {
    match pool.release(ptr) {
        Ok(()) => true,
        Err(e) => {
            warn!(pool = pool.source().name(), %ptr, error = %e, "ignoring invalid buffer release");
            false
        }
    }
}

/// Global execution context.
///
/// Lazily constructed on first access in host mode, with no active device
/// and the global device registry.
static CONTEXT: Lazy<Mutex<ExecutionContext>> = Lazy::new(|| Mutex::new(ExecutionContext::new(registry().clone())));

/// Lock the process-wide execution context.
pub fn global_context() -> MutexGuard<'static, ExecutionContext> {
    CONTEXT.lock()
}
