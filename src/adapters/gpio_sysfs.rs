//! `/sys/class/gpio` adapter for the [`GpioPort`] port.
//!
//! Pins are exported on first use and left exported, so the level of an
//! output survives the process (the modem rail must not drop when the
//! control tool exits).  Writing `high`/`low` to `direction` switches a
//! pin to output with the level already set, without a glitch.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use log::debug;

use crate::app::ports::{GpioPort, Level};

const SYSFS_GPIO: &str = "/sys/class/gpio";

/// udev may need a moment to set permissions on a freshly exported pin.
const EXPORT_RETRIES: u32 = 20;
const EXPORT_RETRY_DELAY: Duration = Duration::from_millis(10);

pub struct SysfsGpio {
    root: PathBuf,
    /// Offset added to BCM numbers (non-zero on kernels with a dynamic
    /// gpiochip base).
    base: u32,
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl SysfsGpio {
    pub fn new() -> Self {
        Self::with_root(SYSFS_GPIO, 0)
    }

    pub fn with_root(root: impl Into<PathBuf>, base: u32) -> Self {
        Self {
            root: root.into(),
            base,
        }
    }

    fn pin_dir(&self, pin: u8) -> PathBuf {
        self.root.join(format!("gpio{}", self.base + u32::from(pin)))
    }

    fn ensure_exported(&self, pin: u8) -> io::Result<PathBuf> {
        let dir = self.pin_dir(pin);
        if dir.exists() {
            return Ok(dir);
        }
        let number = self.base + u32::from(pin);
        fs::write(self.root.join("export"), number.to_string())?;
        debug!("gpio: exported {}", number);

        for _ in 0..EXPORT_RETRIES {
            if fs::metadata(dir.join("direction")).is_ok_and(|m| !m.permissions().readonly()) {
                return Ok(dir);
            }
            thread::sleep(EXPORT_RETRY_DELAY);
        }
        Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("gpio{number} did not appear after export"),
        ))
    }
}

impl GpioPort for SysfsGpio {
    fn set_output(&mut self, pin: u8, level: Level) -> io::Result<()> {
        let dir = self.ensure_exported(pin)?;
        let direction = match level {
            Level::High => "high",
            Level::Low => "low",
        };
        fs::write(dir.join("direction"), direction)
    }

    fn set_input(&mut self, pin: u8) -> io::Result<()> {
        let dir = self.ensure_exported(pin)?;
        fs::write(dir.join("direction"), "in")
    }

    fn read(&mut self, pin: u8) -> io::Result<Level> {
        let dir = self.ensure_exported(pin)?;
        let value = fs::read_to_string(dir.join("value"))?;
        Ok(Level::from(value.trim() == "1"))
    }

    fn is_output(&mut self, pin: u8) -> io::Result<bool> {
        let dir = self.pin_dir(pin);
        match fs::read_to_string(dir.join("direction")) {
            Ok(direction) => Ok(direction.trim() == "out"),
            // Never exported means nobody configured it.
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
