//! USB enumeration check via `/sys/bus/usb/devices`.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::app::ports::{UsbBus, UsbId};

const SYSFS_USB_DEVICES: &str = "/sys/bus/usb/devices";

pub struct SysfsUsb {
    root: PathBuf,
}

impl Default for SysfsUsb {
    fn default() -> Self {
        Self::new()
    }
}

impl SysfsUsb {
    pub fn new() -> Self {
        Self::with_root(SYSFS_USB_DEVICES)
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn read_hex(path: &Path) -> Option<u16> {
    let text = fs::read_to_string(path).ok()?;
    u16::from_str_radix(text.trim(), 16).ok()
}

impl UsbBus for SysfsUsb {
    fn is_present(&mut self, id: UsbId) -> bool {
        let Ok(entries) = fs::read_dir(&self.root) else {
            debug!("usb: cannot list {}", self.root.display());
            return false;
        };
        // Interfaces (`1-1:1.0`) have no idVendor and are skipped naturally.
        entries.flatten().any(|entry| {
            let dir = entry.path();
            read_hex(&dir.join("idVendor")) == Some(id.vendor)
                && read_hex(&dir.join("idProduct")) == Some(id.product)
        })
    }
}
