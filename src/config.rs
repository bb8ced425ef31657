//! Device configuration parameters
//!
//! All tunable parameters for the Bugg hardware core.  Built once at start-up
//! (defaults, optionally overridden by a JSON file) and passed down to every
//! driver explicitly; nothing in the crate reads configuration globally.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::adapters::state_file::JsonStateFile;
use crate::error::{Error, Result};
use crate::pins;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub modem: ModemConfig,
    pub soundcard: SoundcardConfig,
    pub factory: FactoryConfig,
}

/// Modem driver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Lock file serialising access to the modem across processes.
    pub lock_path: PathBuf,
    /// How long construction waits for the lock before giving up.
    pub lock_timeout_ms: u64,
    /// Serial device carrying the AT command channel.
    pub at_device: PathBuf,
    pub usb_vendor: u16,
    pub usb_product: u16,
    pub timing: ModemTiming,
}

/// Power-sequencing and protocol timing for the modem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemTiming {
    /// Delay after energising the 3.7 V rail.
    pub rail_settle_ms: u64,
    /// Width of the POWER_ON strobe.
    pub power_on_pulse_ms: u64,
    /// Wait after the strobe before polling enumeration.
    pub boot_wait_ms: u64,
    pub enumerate_polls: u32,
    pub enumerate_interval_ms: u64,
    pub shutdown_polls: u32,
    pub shutdown_interval_ms: u64,
    /// Width of the emergency hard-reset pulse.
    pub reset_pulse_ms: u64,
    /// Wait between writing an AT command and reading its response.
    pub at_settle_ms: u64,
}

/// Soundcard driver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundcardConfig {
    pub lock_path: PathBuf,
    pub lock_timeout_ms: u64,
    /// Ephemeral record of the last register state (survives restarts,
    /// not reboots).
    pub state_path: PathBuf,
}

/// Factory test configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Presence of this file requests a factory run at boot.
    pub trigger_path: PathBuf,
    /// World-readable results record.
    pub results_path: PathBuf,
    /// Stable link to the record shown on the console before login.
    pub results_link: PathBuf,
    /// Service that would otherwise fight over the modem.
    pub modem_service: String,
    pub rssi_polls: u32,
    pub rssi_interval_ms: u64,
    /// Length of each microphone capture.
    pub record_ms: u64,
    /// Minimum sample variance for a microphone path to count as live.
    pub variance_threshold: f64,
    /// ALSA card of the internal I2S microphone.
    pub internal_capture_card: u32,
    /// ALSA card of the external soundcard.
    pub external_capture_card: u32,
    pub sample_rate_hz: u32,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            lock_path: PathBuf::from("/tmp/modem.lock"),
            lock_timeout_ms: 2000,
            at_device: PathBuf::from("/dev/ttyUSB2"),
            usb_vendor: pins::MODEM_USB_VENDOR,
            usb_product: pins::MODEM_USB_PRODUCT,
            timing: ModemTiming::default(),
        }
    }
}

impl Default for ModemTiming {
    fn default() -> Self {
        Self {
            rail_settle_ms: 500,
            power_on_pulse_ms: 1000,
            boot_wait_ms: 2000,
            enumerate_polls: 10,
            enumerate_interval_ms: 2000, // ≈20 s window
            shutdown_polls: 10,
            shutdown_interval_ms: 3000, // ≈30 s window
            reset_pulse_ms: 10_000,
            at_settle_ms: 500,
        }
    }
}

impl Default for SoundcardConfig {
    fn default() -> Self {
        Self {
            lock_path: PathBuf::from("/tmp/soundcard.lock"),
            lock_timeout_ms: 2000,
            state_path: PathBuf::from("/tmp/soundcard_state.json"),
        }
    }
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            trigger_path: PathBuf::from("/mnt/sd/factory-test-full.txt"),
            results_path: PathBuf::from("/var/lib/bugg/factory-test-results.txt"),
            results_link: PathBuf::from("/etc/issue.d/bugg-factory-test.issue"),
            modem_service: "ModemManager".into(),
            rssi_polls: 6,
            rssi_interval_ms: 1000,
            record_ms: 3000,
            variance_threshold: 100.0,
            internal_capture_card: 0,
            external_capture_card: 1,
            sample_rate_hz: 44_100,
        }
    }
}

impl ModemConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl SoundcardConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl DeviceConfig {
    /// Load configuration from a JSON file.
    ///
    /// A missing or unparsable file falls back to defaults (logged); a file
    /// that parses but fails validation is rejected.
    pub fn load(path: &Path) -> Result<Self> {
        let cfg = match JsonStateFile::new(path).load::<Self>() {
            Ok(Some(cfg)) => {
                info!("config: loaded {}", path.display());
                cfg
            }
            Ok(None) => {
                info!("config: {} not found, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("config: {} ({}), using defaults", path.display(), e);
                Self::default()
            }
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        let t = &self.modem.timing;
        if t.enumerate_polls == 0 || t.shutdown_polls == 0 {
            return Err(invalid("modem poll counts must be at least 1"));
        }
        if !(100..=30_000).contains(&self.modem.lock_timeout_ms)
            || !(100..=30_000).contains(&self.soundcard.lock_timeout_ms)
        {
            return Err(invalid("lock timeouts must be 100–30000 ms"));
        }
        if t.at_settle_ms > 10_000 {
            return Err(invalid("at_settle_ms must be at most 10000"));
        }
        let f = &self.factory;
        if !(1..=60).contains(&f.rssi_polls) {
            return Err(invalid("rssi_polls must be 1–60"));
        }
        if !(100..=60_000).contains(&f.record_ms) {
            return Err(invalid("record_ms must be 100–60000"));
        }
        if !(f.variance_threshold.is_finite() && f.variance_threshold >= 0.0) {
            return Err(invalid("variance_threshold must be a non-negative number"));
        }
        if !(8_000..=192_000).contains(&f.sample_rate_hz) {
            return Err(invalid("sample_rate_hz must be 8000–192000"));
        }
        if f.modem_service.is_empty() {
            return Err(invalid("modem_service must not be empty"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> Error {
    Error::InvalidParameter(msg.into())
}
