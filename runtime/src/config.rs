//! Startup configuration for the execution context.
//!
//! Supports both explicit configuration through a bon builder and
//! environment variable fallbacks.

use bon::bon;

use crate::error::{ConfigSnafu, Result};

/// Device ordinal to activate at startup.
pub const DEVICE_ENV: &str = "VESTA_DEVICE";
/// Explicit random seed.
pub const SEED_ENV: &str = "VESTA_SEED";
/// Set to `0`/`false` to skip the specialized-kernel session.
pub const KERNEL_SESSIONS_ENV: &str = "VESTA_KERNEL_SESSIONS";

/// Process-wide settings consumed by [`ExecutionContext::configure`](crate::ExecutionContext::configure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Device to activate; implies accelerator mode.
    pub device: Option<usize>,
    /// Seed for every random stream; fresh entropy when absent.
    pub seed: Option<u64>,
    /// Create the specialized-kernel session where the device supports it.
    pub kernel_sessions: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { device: None, seed: None, kernel_sessions: true }
    }
}

#[bon]
impl ContextConfig {
    /// Create a configuration with builder pattern.
    #[builder]
    pub fn new(device: Option<usize>, seed: Option<u64>, #[builder(default = true)] kernel_sessions: bool) -> Self {
        Self { device, seed, kernel_sessions }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `VESTA_DEVICE` - Device ordinal (default: none, host mode)
    /// * `VESTA_SEED` - Random seed (default: fresh entropy)
    /// * `VESTA_KERNEL_SESSIONS` - `0`/`false` disables the kernel session (default: enabled)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let device = lookup(DEVICE_ENV).map(|value| parse(DEVICE_ENV, value)).transpose()?;
        let seed = lookup(SEED_ENV).map(|value| parse(SEED_ENV, value)).transpose()?;
        let kernel_sessions = match lookup(KERNEL_SESSIONS_ENV) {
            None => true,
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => true,
                "0" | "false" | "off" | "no" => false,
                _ => return ConfigSnafu { key: KERNEL_SESSIONS_ENV, value }.fail(),
            },
        };

        Ok(Self { device, seed, kernel_sessions })
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: String) -> Result<T> {
    match value.trim().parse() {
        Ok(parsed) => Ok(parsed),
        Err(_) => ConfigSnafu { key, value }.fail(),
    }
}
