//! Error types and the fatal-abort path for the execution context.

use std::fmt::Display;

use snafu::Snafu;

/// Result type for execution-context operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur in the execution context.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Device, session or pool error.
    #[snafu(display("Device error: {source}"))]
    Device { source: vesta_device::Error },

    /// Malformed configuration value.
    #[snafu(display("Invalid value {value:?} for {key}"))]
    Config { key: String, value: String },
}

/// Log an unrecoverable environment failure and abort the process.
pub fn fatal(message: impl Display) -> ! {
    tracing::error!("{message}");
    std::process::abort()
}

/// Turn an error into a fatal abort.
pub trait OrAbort<T> {
    fn or_abort(self, what: impl Display) -> T;
}

impl<T, E: Display> OrAbort<T> for std::result::Result<T, E> {
    fn or_abort(self, what: impl Display) -> T {
        match self {
            Ok(value) => value,
            Err(e) => fatal(format_args!("{what}: {e}")),
        }
    }
}
