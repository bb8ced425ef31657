//! Unified error types for the Bugg hardware core.
//!
//! A single `Error` enum that every driver and the factory test funnel into,
//! keeping the caller's error handling uniform.  The variants follow the
//! failure taxonomy of the device:
//!
//! | Variant               | Meaning                                          |
//! |-----------------------|--------------------------------------------------|
//! | `ResourceBusy`        | exclusive lock held elsewhere (fatal to caller)  |
//! | `HardwareTimeout`     | expected hardware response never arrived         |
//! | `ProtocolNegative`    | well-formed but negative response                |
//! | `InvalidParameter`    | caller value outside the defined domain          |
//! | `PersistenceDegraded` | state file missing or corrupt                    |

use std::path::PathBuf;

use crate::drivers::leds::{Colour, LedId};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The exclusive lock guarding a physical resource is held by another
    /// owner (or could not be obtained before the timeout).
    #[error("resource busy: {} is locked by another owner", .path.display())]
    ResourceBusy { path: PathBuf },

    /// The hardware did not answer within its bounded window.
    #[error("hardware timeout: {0}")]
    HardwareTimeout(&'static str),

    /// The hardware answered, but negatively (e.g. `ERROR`, no SIM).
    #[error("negative response: {0}")]
    ProtocolNegative(String),

    /// A caller-supplied value is outside the defined domain.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Persisted state could not be used; defaults were substituted.
    #[error("persisted state degraded: {0}")]
    PersistenceDegraded(String),

    /// The requested colour conflicts with a hard-wired LED channel.
    #[error("{colour:?} cannot be displayed on the {led:?} LED: {channel} is hard-wired to {wired}")]
    UnsupportedColour {
        led: LedId,
        colour: Colour,
        channel: &'static str,
        wired: bool,
    },

    /// A bus transaction (SPI / I2C) failed.
    #[error("bus transfer failed: {0}")]
    Bus(String),

    /// Filesystem or device-node I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::Bus`] from any embedded-hal bus error.
    pub fn bus(context: &str, err: impl core::fmt::Debug) -> Self {
        Self::Bus(format!("{context}: {err:?}"))
    }

    /// Whether the error invalidates the whole run rather than one step.
    ///
    /// Only a resource conflict is fatal: it means another process owns a
    /// peripheral the caller was about to drive.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ResourceBusy { .. })
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
