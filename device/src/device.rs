//! Device activation state.
//!
//! An [`ActiveDevice`] is the proof that a device was opened and its session
//! handles were created. It is the only way to bind accelerator memory, so no
//! accelerator work can be issued while in [`DeviceState::NoDevice`].

use std::sync::Arc;

use tracing::debug;

use crate::driver::{Accelerator, DeviceProperties};
use crate::error::Result;
use crate::registry::DeviceRegistry;
use crate::session::SessionHandles;

/// An opened device together with its session handles.
#[derive(Debug)]
pub struct ActiveDevice {
    // Sessions are declared first so they drop before the device handle.
    sessions: SessionHandles,
    accelerator: Arc<dyn Accelerator>,
}

impl ActiveDevice {
    /// Open `ordinal` and create its sessions.
    pub fn activate(registry: &DeviceRegistry, ordinal: usize, seed: u64, with_kernels: bool) -> Result<Self> {
        Self::from_opened(registry.activate(ordinal)?, seed, with_kernels)
    }

    /// Create the sessions of an already opened device.
    ///
    /// # Arguments
    ///
    /// * `accelerator` - Device returned by [`DeviceRegistry::activate`]
    /// * `seed` - Seed of the device random-number session
    /// * `with_kernels` - Also create the specialized-kernel session where supported
    pub fn from_opened(accelerator: Arc<dyn Accelerator>, seed: u64, with_kernels: bool) -> Result<Self> {
        let sessions = SessionHandles::create(accelerator.as_ref(), seed, with_kernels)?;
        debug!(ordinal = accelerator.ordinal(), sessions = sessions.len(), "device activated");
        Ok(Self { sessions, accelerator })
    }

    pub fn ordinal(&self) -> usize {
        self.accelerator.ordinal()
    }

    pub fn accelerator(&self) -> &Arc<dyn Accelerator> {
        &self.accelerator
    }

    pub fn sessions(&self) -> &SessionHandles {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut SessionHandles {
        &mut self.sessions
    }

    pub fn properties(&self) -> Result<DeviceProperties> {
        self.accelerator.properties()
    }

    pub fn synchronize(&self) -> Result<()> {
        self.accelerator.synchronize()
    }

    /// Tear down the sessions, then release the device.
    pub fn deactivate(mut self) {
        let ordinal = self.ordinal();
        self.sessions.destroy();
        drop(self);
        debug!(ordinal, "device deactivated");
    }
}

/// Whether an accelerator is active.
#[derive(Debug, Default)]
pub enum DeviceState {
    #[default]
    NoDevice,
    Active(ActiveDevice),
}

impl DeviceState {
    pub fn ordinal(&self) -> Option<usize> {
        match self {
            DeviceState::NoDevice => None,
            DeviceState::Active(device) => Some(device.ordinal()),
        }
    }

    pub fn active(&self) -> Option<&ActiveDevice> {
        match self {
            DeviceState::NoDevice => None,
            DeviceState::Active(device) => Some(device),
        }
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveDevice> {
        match self {
            DeviceState::NoDevice => None,
            DeviceState::Active(device) => Some(device),
        }
    }

    /// Leave the current state, deactivating any active device.
    pub fn reset(&mut self) {
        if let DeviceState::Active(device) = std::mem::take(self) {
            device.deactivate();
        }
    }
}
