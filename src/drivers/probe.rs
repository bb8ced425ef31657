//! I²C presence probe.
//!
//! I²C has no presence primitive, so this is a heuristic: a bare one-byte
//! read from the address.
//!
//! | Outcome                     | Verdict     |
//! |-----------------------------|-------------|
//! | read succeeds               | present     |
//! | bus reports busy (`EBUSY`)  | present     |
//! | any other error             | not present |
//!
//! The busy case covers devices a kernel driver has already claimed (the RTC
//! at 0x68 is bound to `rtc-ds1307`), where the adapter refuses the address
//! with `EBUSY`.  Transient contention also reads as busy, so this is
//! diagnostic-only; do not reuse it as a general presence check, and
//! expect false negatives for devices that NAK a bare read.

use embedded_hal::i2c::I2c;
use log::debug;

/// Errors that can tell a "device busy" condition apart from other faults.
///
/// Implemented by the I²C error types of the adapters and test mocks.
pub trait BusyCondition {
    fn is_busy(&self) -> bool;
}

/// Probe `address` with a single-byte read.
pub fn is_present<I>(i2c: &mut I, address: u8) -> bool
where
    I: I2c,
    I::Error: BusyCondition,
{
    let mut buf = [0u8; 1];
    match i2c.read(address, &mut buf) {
        Ok(()) => {
            debug!("probe 0x{:02x}: answered", address);
            true
        }
        Err(e) if e.is_busy() => {
            debug!("probe 0x{:02x}: busy, counted as present", address);
            true
        }
        Err(e) => {
            debug!("probe 0x{:02x}: absent ({:?})", address, e);
            false
        }
    }
}
