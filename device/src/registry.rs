use std::sync::Arc;

use once_cell::sync::Lazy;
use snafu::ensure;
use tracing::{debug, trace};

use crate::driver::{Accelerator, Driver};
use crate::error::{InvalidDeviceSnafu, Result};

/// Environment variable with the number of emulated accelerators exposed by
/// the default registry of a build without a hardware driver.
pub const EMULATED_DEVICES_ENV: &str = "VESTA_EMULATED_DEVICES";

/// Enumerates, validates and opens the devices of one driver.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    driver: Arc<dyn Driver>,
}

impl DeviceRegistry {
    /// Create a registry over `driver`.
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Number of device ordinals reported by the driver.
    pub fn device_count(&self) -> Result<usize> {
        self.driver.device_count()
    }

    /// Check that `ordinal` names a device known to the driver.
    pub fn validate(&self, ordinal: usize) -> Result<()> {
        let count = self.device_count()?;
        ensure!(ordinal < count, InvalidDeviceSnafu { ordinal, count });
        Ok(())
    }

    /// Validate and open a device.
    ///
    /// # Arguments
    ///
    /// * `ordinal` - Device ordinal to open
    ///
    /// # Returns
    ///
    /// The opened device. [`Error::InvalidDevice`](crate::Error::InvalidDevice)
    /// when the ordinal is out of range, or the driver's error when it
    /// refuses to open the device.
    pub fn activate(&self, ordinal: usize) -> Result<Arc<dyn Accelerator>> {
        self.validate(ordinal)?;
        let device = self.driver.open(ordinal)?;
        debug!(driver = self.driver.name(), ordinal, "device opened");
        Ok(device)
    }

    /// Whether `ordinal` can be opened. The device is released again immediately.
    pub fn probe(&self, ordinal: usize) -> bool {
        match self.activate(ordinal) {
            Ok(_) => true,
            Err(e) => {
                trace!(driver = self.driver.name(), ordinal, reason = %e, "probe failed");
                false
            }
        }
    }
}

fn default_driver() -> Arc<dyn Driver> {
    #[cfg(feature = "cuda")]
    {
        Arc::new(crate::cuda::CudaDriver)
    }

    #[cfg(not(feature = "cuda"))]
    {
        let count = std::env::var(EMULATED_DEVICES_ENV).ok().and_then(|s| s.parse().ok()).unwrap_or(0);
        Arc::new(crate::emulated::EmulatedDriver::new(count))
    }
}

/// Global device registry instance.
static REGISTRY: Lazy<DeviceRegistry> = Lazy::new(|| DeviceRegistry::new(default_driver()));

/// Get the global device registry.
pub fn registry() -> &'static DeviceRegistry {
    &REGISTRY
}
