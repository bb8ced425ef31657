//! Application boundary: port traits and outbound events.
//!
//! All interaction with hardware and the host happens through the **port
//! traits** defined in [`ports`], keeping the drivers and the factory test
//! fully testable without real peripherals.

pub mod events;
pub mod ports;
