//! Bugg hardware core.
//!
//! Drivers for the recorder's modem, soundcard, I2S bridge and status LEDs,
//! the cross-process lock that keeps one owner per peripheral, and the
//! factory self-test.  Hardware access goes through the port traits in
//! [`app::ports`]; the Linux implementations live in [`adapters`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod factory;
pub mod pins;

mod error;

pub use error::{Error, Result};
