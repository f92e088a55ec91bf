//! Long-lived accelerator session handles.
//!
//! Issuing work to an accelerator requires a handful of device-bound sessions:
//! a linear-algebra session, a device random-number session, and optionally a
//! specialized-kernel session. [`SessionHandles`] owns all of them for one
//! device and tears them down in reverse creation order.

use std::fmt;

use tracing::debug;

use crate::driver::Accelerator;
use crate::error::{Result, UnsupportedSnafu};

/// Kind of accelerator session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// Linear-algebra library session (BLAS).
    Blas,
    /// Device-side pseudo-random generator.
    Rng,
    /// Specialized neural-network kernel library session.
    Kernels,
}

impl SessionKind {
    /// Creation order. Teardown walks this backwards.
    pub const ORDER: [SessionKind; 3] = [SessionKind::Blas, SessionKind::Rng, SessionKind::Kernels];
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Blas => f.write_str("blas"),
            SessionKind::Rng => f.write_str("rng"),
            SessionKind::Kernels => f.write_str("kernels"),
        }
    }
}

/// Opaque, device-bound session handle.
///
/// Dropping the handle releases the underlying driver resource.
pub trait Session: Send + fmt::Debug {
    fn kind(&self) -> SessionKind;

    /// Reseed a generator session.
    fn reseed(&mut self, _seed: u64) -> Result<()> {
        UnsupportedSnafu { operation: format!("reseed on {} session", self.kind()) }.fail()
    }
}

/// Session handles bound to a single device.
#[derive(Debug)]
pub struct SessionHandles {
    ordinal: usize,
    blas: Option<Box<dyn Session>>,
    rng: Option<Box<dyn Session>>,
    kernels: Option<Box<dyn Session>>,
}

impl SessionHandles {
    /// Create the sessions for `device`.
    ///
    /// The specialized-kernel session is only created when `with_kernels` is set
    /// and the device supports it. If any creation fails, the sessions created so
    /// far are destroyed before the error is returned.
    pub fn create(device: &dyn Accelerator, seed: u64, with_kernels: bool) -> Result<Self> {
        let mut handles = Self { ordinal: device.ordinal(), blas: None, rng: None, kernels: None };

        for kind in SessionKind::ORDER {
            if kind == SessionKind::Kernels && !(with_kernels && device.supports(kind)) {
                continue;
            }
            match device.create_session(kind, seed) {
                Ok(session) => {
                    debug!(ordinal = handles.ordinal, %kind, "session created");
                    *handles.slot(kind) = Some(session);
                }
                Err(e) => {
                    handles.destroy();
                    return Err(e);
                }
            }
        }

        Ok(handles)
    }

    /// Release every session in reverse creation order.
    ///
    /// Slots that were never filled are skipped, so this is safe on a partially
    /// constructed set and on repeated calls.
    pub fn destroy(&mut self) {
        for kind in SessionKind::ORDER.into_iter().rev() {
            if let Some(session) = self.slot(kind).take() {
                drop(session);
                debug!(ordinal = self.ordinal, %kind, "session destroyed");
            }
        }
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn blas(&self) -> Option<&dyn Session> {
        self.blas.as_deref()
    }

    pub fn rng(&self) -> Option<&dyn Session> {
        self.rng.as_deref()
    }

    pub fn kernels(&self) -> Option<&dyn Session> {
        self.kernels.as_deref()
    }

    /// Reseed the device random-number session, if one exists.
    pub fn reseed(&mut self, seed: u64) -> Result<()> {
        match self.rng.as_mut() {
            Some(rng) => rng.reseed(seed),
            None => Ok(()),
        }
    }

    /// Number of live sessions held.
    pub fn len(&self) -> usize {
        [&self.blas, &self.rng, &self.kernels].iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&mut self, kind: SessionKind) -> &mut Option<Box<dyn Session>> {
        match kind {
            SessionKind::Blas => &mut self.blas,
            SessionKind::Rng => &mut self.rng,
            SessionKind::Kernels => &mut self.kernels,
        }
    }
}

impl Drop for SessionHandles {
    fn drop(&mut self) {
        self.destroy();
    }
}
