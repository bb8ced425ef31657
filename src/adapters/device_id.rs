//! Device identity derived from the Raspberry Pi CPU serial.
//!
//! Produces a stable device ID of the form `RPiID-<serial>`, where
//! `<serial>` is the `Serial` field of `/proc/cpuinfo`.  This ID is:
//! - Deterministic across reboots (OTP-burned serial)
//! - Printed at the top of the factory results record
//! - The name the device reports to the backend

use std::fs;
use std::path::Path;

use log::warn;

/// `RPiID-` + up to 16 hex digits, with headroom.
pub type DeviceIdString = heapless::String<32>;

/// Placeholder used when no serial can be read.
pub const UNKNOWN_SERIAL: &str = "ERROR000000001";

const CPUINFO: &str = "/proc/cpuinfo";

/// Extract the `Serial` field from cpuinfo text.
pub fn parse_serial(cpuinfo: &str) -> Option<&str> {
    cpuinfo
        .lines()
        .filter(|l| l.starts_with("Serial"))
        .filter_map(|l| l.split_once(':'))
        .map(|(_, v)| v.trim())
        .rfind(|v| !v.is_empty())
}

/// Format `RPiID-<serial>`.  Serials too long to fit are truncated.
pub fn device_id(serial: &str) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    use core::fmt::Write;
    let _ = write!(id, "RPiID-");
    for c in serial.chars() {
        if id.push(c).is_err() {
            break;
        }
    }
    id
}

/// Read the serial from `path` (normally `/proc/cpuinfo`).
pub fn device_id_from(path: &Path) -> DeviceIdString {
    match fs::read_to_string(path) {
        Ok(text) => match parse_serial(&text) {
            Some(serial) => device_id(serial),
            None => {
                warn!("device id: no Serial line in {}", path.display());
                device_id(UNKNOWN_SERIAL)
            }
        },
        Err(e) => {
            warn!("device id: cannot read {}: {}", path.display(), e);
            device_id(UNKNOWN_SERIAL)
        }
    }
}

/// Device ID of the running board.
pub fn current() -> DeviceIdString {
    device_id_from(Path::new(CPUINFO))
}
