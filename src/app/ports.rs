//! Port traits: the boundary between the hardware core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ drivers / FactoryTest (domain)
//! ```
//!
//! The drivers and the factory orchestrator consume these traits via
//! generics, so the core never touches device nodes directly.  Linux
//! implementations live in [`crate::adapters`]; tests use in-memory mocks.
//!
//! SPI and I2C are not redefined here: drivers take
//! [`embedded_hal::spi::SpiDevice`] and [`embedded_hal::i2c::I2c`].
//!
//! Every trait has a blanket impl for `&mut T`, following the embedded-hal
//! convention, so a driver can either own its primitive or borrow it for
//! the duration of one test phase.

use std::io;
use std::time::Duration;

use super::events::FactoryEvent;

// ───────────────────────────────────────────────────────────────
// GPIO
// ───────────────────────────────────────────────────────────────

/// Logic level of a digital pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}

/// Digital pins addressed by BCM number (see [`crate::pins`]).
pub trait GpioPort {
    /// Configure `pin` as an output and drive it to `level`.
    fn set_output(&mut self, pin: u8, level: Level) -> io::Result<()>;

    /// Configure `pin` as an input (high impedance), neither driving nor
    /// loading the line.
    fn set_input(&mut self, pin: u8) -> io::Result<()>;

    /// Read the pin.  For an output this returns the driven level.
    fn read(&mut self, pin: u8) -> io::Result<Level>;

    /// Whether `pin` is currently configured as an output.
    fn is_output(&mut self, pin: u8) -> io::Result<bool>;
}

// ───────────────────────────────────────────────────────────────
// USB
// ───────────────────────────────────────────────────────────────

/// Vendor / product pair a USB device enumerates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbId {
    pub vendor: u16,
    pub product: u16,
}

/// Query the host's USB device table.
pub trait UsbBus {
    /// True if a device with this identity is currently enumerated.
    fn is_present(&mut self, id: UsbId) -> bool;
}

// ───────────────────────────────────────────────────────────────
// AT command channel (serial)
// ───────────────────────────────────────────────────────────────

/// Raw byte channel to the modem's AT command port.
///
/// The channel is opened lazily by the modem driver.  Reads never block
/// and return whatever bytes have arrived, possibly none.
pub trait AtChannel {
    fn open(&mut self) -> io::Result<()>;
    fn is_open(&self) -> bool;
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;
    /// Drain all bytes currently buffered by the device.
    fn read_available(&mut self) -> io::Result<Vec<u8>>;
    fn close(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Time
// ───────────────────────────────────────────────────────────────

/// Blocking delays.  Every retry loop in the crate sleeps through this
/// port so tests can simulate elapsed polls without wall-clock time.
pub trait Clock {
    fn sleep(&mut self, duration: Duration);

    fn sleep_ms(&mut self, ms: u64) {
        self.sleep(Duration::from_millis(ms));
    }
}

// ───────────────────────────────────────────────────────────────
// Host services
// ───────────────────────────────────────────────────────────────

/// Control over host services that compete for hardware.
pub trait ServiceControl {
    /// Stop a service.  Stopping an already-stopped service succeeds.
    fn stop(&mut self, service: &str) -> io::Result<()>;
}

// ───────────────────────────────────────────────────────────────
// Audio capture
// ───────────────────────────────────────────────────────────────

/// Which microphone path to record from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSource {
    /// On-board PDM microphone behind the PCMD3180 bridge.
    Internal,
    /// Microphone on the soundcard's M12 connector.
    External,
}

/// Record mono 16-bit audio.
pub trait AudioCapture {
    fn record(&mut self, source: AudioSource, duration: Duration) -> io::Result<Vec<i16>>;
}

// ───────────────────────────────────────────────────────────────
// Event sink (domain → logging / console)
// ───────────────────────────────────────────────────────────────

/// The factory test emits structured [`FactoryEvent`]s through this port.
/// Adapters decide where they go (log, console, journal).
pub trait EventSink {
    fn emit(&mut self, event: &FactoryEvent);
}

// ───────────────────────────────────────────────────────────────
// Blanket impls for borrowed ports
// ───────────────────────────────────────────────────────────────

impl<T: GpioPort + ?Sized> GpioPort for &mut T {
    fn set_output(&mut self, pin: u8, level: Level) -> io::Result<()> {
        T::set_output(self, pin, level)
    }
    fn set_input(&mut self, pin: u8) -> io::Result<()> {
        T::set_input(self, pin)
    }
    fn read(&mut self, pin: u8) -> io::Result<Level> {
        T::read(self, pin)
    }
    fn is_output(&mut self, pin: u8) -> io::Result<bool> {
        T::is_output(self, pin)
    }
}

impl<T: UsbBus + ?Sized> UsbBus for &mut T {
    fn is_present(&mut self, id: UsbId) -> bool {
        T::is_present(self, id)
    }
}

impl<T: AtChannel + ?Sized> AtChannel for &mut T {
    fn open(&mut self) -> io::Result<()> {
        T::open(self)
    }
    fn is_open(&self) -> bool {
        T::is_open(self)
    }
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        T::write(self, bytes)
    }
    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        T::read_available(self)
    }
    fn close(&mut self) {
        T::close(self);
    }
}

impl<T: Clock + ?Sized> Clock for &mut T {
    fn sleep(&mut self, duration: Duration) {
        T::sleep(self, duration);
    }
}

impl<T: ServiceControl + ?Sized> ServiceControl for &mut T {
    fn stop(&mut self, service: &str) -> io::Result<()> {
        T::stop(self, service)
    }
}

impl<T: AudioCapture + ?Sized> AudioCapture for &mut T {
    fn record(&mut self, source: AudioSource, duration: Duration) -> io::Result<Vec<i16>> {
        T::record(self, source, duration)
    }
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn emit(&mut self, event: &FactoryEvent) {
        T::emit(self, event);
    }
}
