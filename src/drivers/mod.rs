//! Peripheral drivers, the AT protocol helpers, and the cross-process lock.

pub mod at;
pub mod bridge;
pub mod leds;
pub mod lock;
pub mod modem;
pub mod probe;
pub mod soundcard;
