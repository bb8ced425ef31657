//! Sierra Wireless RC7620 cellular modem: power sequencing and AT channel.
//!
//! ## Power sequencing
//!
//! ```text
//!   power_on:   rail ON ─500ms─ strobe ▔▔1s▔▔ ─2s─ poll USB ×10 @2s
//!   power_off:  AT!POWERDOWN ─ reset → Hi-Z ─ poll USB ×10 @3s
//!                 └─ still there? reset ▔▔10s▔▔ ─ Hi-Z ─ poll ×10 ─ rail OFF
//! ```
//!
//! The rail is always cut at the end of `power_off`, whatever the modem
//! did; the boolean result only says whether it went away cleanly.
//!
//! RESET_IN_N is driven by the modem itself while it boots, so the line
//! stays high-impedance until the modem has enumerated on USB.
//!
//! All delays go through the [`Clock`] port.  Timeouts in the power paths
//! come back as `false`; only construction and AT exchanges return errors.

use std::time::Duration;

use log::{debug, error, info, warn};

use crate::app::ports::{AtChannel, Clock, GpioPort, Level, UsbBus, UsbId};
use crate::config::{ModemConfig, ModemTiming};
use crate::drivers::at::{self, AtResponse, Iccid};
use crate::drivers::lock::ExclusiveLock;
use crate::error::{Error, Result};
use crate::pins;

/// Command that asks the modem to shut down cleanly.
pub const POWER_DOWN_COMMAND: &str = "AT!POWERDOWN";

/// Last known power state of the modem, as seen by this driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemPowerState {
    RailOff,
    /// Rail energised, not yet on the USB bus.
    Booting,
    Enumerated,
    /// Enumerated and answering `AT`.
    Responsive,
    ShuttingDown,
    Off,
}

pub struct Modem<G, U, S, K>
where
    G: GpioPort,
    U: UsbBus,
    S: AtChannel,
    K: Clock,
{
    gpio: G,
    usb: U,
    channel: S,
    clock: K,
    usb_id: UsbId,
    timing: ModemTiming,
    state: ModemPowerState,
    _lock: ExclusiveLock,
}

impl<G, U, S, K> Modem<G, U, S, K>
where
    G: GpioPort,
    U: UsbBus,
    S: AtChannel,
    K: Clock,
{
    /// Take ownership of the modem.
    ///
    /// Fails with [`Error::ResourceBusy`] if another driver instance holds
    /// the modem lock.
    pub fn new(config: &ModemConfig, mut gpio: G, mut usb: U, channel: S, clock: K) -> Result<Self> {
        let lock = ExclusiveLock::acquire(&config.lock_path, config.lock_timeout())?;
        let usb_id = UsbId {
            vendor: config.usb_vendor,
            product: config.usb_product,
        };

        let enumerated = usb.is_present(usb_id);
        if enumerated {
            gpio.set_output(pins::MODEM_RESET, Level::Low)?;
        } else {
            gpio.set_input(pins::MODEM_RESET)?;
        }

        // Keep whatever the rail is doing; a running modem must not lose power
        // because a second tool started.
        let rail = if enumerated {
            Level::High
        } else if gpio.is_output(pins::MODEM_RAIL_EN)? {
            gpio.read(pins::MODEM_RAIL_EN)?
        } else {
            Level::Low
        };
        gpio.set_output(pins::MODEM_RAIL_EN, rail)?;
        gpio.set_output(pins::MODEM_POWER_ON, Level::Low)?;

        let state = match (enumerated, rail) {
            (true, _) => ModemPowerState::Enumerated,
            (false, Level::High) => ModemPowerState::Booting,
            (false, Level::Low) => ModemPowerState::RailOff,
        };
        info!("modem: driver initialised ({:?})", state);

        Ok(Self {
            gpio,
            usb,
            channel,
            clock,
            usb_id,
            timing: config.timing.clone(),
            state,
            _lock: lock,
        })
    }

    // ── Power ──────────────────────────────────────────────────

    /// Power the modem up and wait for it to enumerate.
    ///
    /// Returns `true` immediately if it is already on the bus.
    pub fn power_on(&mut self) -> bool {
        if self.is_enumerated() {
            info!("modem: already enumerated");
            self.take_reset_line();
            self.state = ModemPowerState::Enumerated;
            return true;
        }

        if let Err(e) = self.gpio.set_output(pins::MODEM_RAIL_EN, Level::High) {
            error!("modem: cannot energise rail: {}", e);
            return false;
        }
        self.state = ModemPowerState::Booting;
        self.clock.sleep_ms(self.timing.rail_settle_ms);

        let strobe = self
            .gpio
            .set_output(pins::MODEM_POWER_ON, Level::High)
            .and_then(|()| {
                self.clock.sleep_ms(self.timing.power_on_pulse_ms);
                self.gpio.set_output(pins::MODEM_POWER_ON, Level::Low)
            });
        if let Err(e) = strobe {
            error!("modem: POWER_ON strobe failed: {}", e);
            return false;
        }

        info!("modem: POWER_ON asserted, waiting for boot");
        self.clock.sleep_ms(self.timing.boot_wait_ms);

        for attempt in 1..=self.timing.enumerate_polls {
            debug!("modem: enumeration check {}/{}", attempt, self.timing.enumerate_polls);
            if self.is_enumerated() {
                info!("modem: enumerated after {} checks", attempt);
                self.take_reset_line();
                self.state = ModemPowerState::Enumerated;
                return true;
            }
            self.clock.sleep_ms(self.timing.enumerate_interval_ms);
        }

        error!("modem: timed out waiting for enumeration");
        false
    }

    /// Shut the modem down and cut its rail.
    ///
    /// Tries a graceful AT shutdown first, then a hard reset.  The rail is
    /// de-energised on every path; `false` means the modem never left the
    /// bus on its own.
    pub fn power_off(&mut self) -> bool {
        if !self.is_enumerated() {
            info!("modem: not enumerated, already off");
            self.release_reset_line();
            self.cut_rail();
            self.state = ModemPowerState::Off;
            return true;
        }

        self.state = ModemPowerState::ShuttingDown;
        match self.send_at_command(POWER_DOWN_COMMAND) {
            Ok(reply) => debug!("modem: power-down reply {:?}", reply.trim()),
            Err(e) => warn!("modem: power-down command not delivered: {}", e),
        }
        self.channel.close();
        self.release_reset_line();

        let shutdown = self.timing.shutdown_interval_ms;
        if self.wait_for_departure(shutdown) {
            info!("modem: shut down cleanly");
            self.cut_rail();
            self.state = ModemPowerState::Off;
            return true;
        }

        warn!("modem: still enumerated, applying emergency reset");
        if let Err(e) = self.gpio.set_output(pins::MODEM_RESET, Level::High) {
            error!("modem: cannot drive reset line: {}", e);
        }
        self.clock.sleep_ms(self.timing.reset_pulse_ms);
        self.release_reset_line();

        let gone = self.wait_for_departure(shutdown);
        self.cut_rail();
        self.state = ModemPowerState::Off;
        if gone {
            warn!("modem: went away after emergency reset");
        } else {
            error!("modem: unresponsive to reset, rail cut");
        }
        gone
    }

    pub fn is_enumerated(&mut self) -> bool {
        self.usb.is_present(self.usb_id)
    }

    /// The rail counts as on only while its enable pin is an output driven high.
    pub fn rail_is_on(&mut self) -> bool {
        matches!(self.gpio.is_output(pins::MODEM_RAIL_EN), Ok(true))
            && matches!(self.gpio.read(pins::MODEM_RAIL_EN), Ok(Level::High))
    }

    pub fn power_state(&self) -> ModemPowerState {
        self.state
    }

    fn wait_for_departure(&mut self, interval_ms: u64) -> bool {
        for attempt in 1..=self.timing.shutdown_polls {
            if !self.is_enumerated() {
                debug!("modem: left the bus after {} checks", attempt);
                return true;
            }
            self.clock.sleep_ms(interval_ms);
        }
        false
    }

    fn take_reset_line(&mut self) {
        if let Err(e) = self.gpio.set_output(pins::MODEM_RESET, Level::Low) {
            warn!("modem: cannot configure reset line: {}", e);
        }
    }

    fn release_reset_line(&mut self) {
        if let Err(e) = self.gpio.set_input(pins::MODEM_RESET) {
            warn!("modem: cannot release reset line: {}", e);
        }
    }

    fn cut_rail(&mut self) {
        if let Err(e) = self.gpio.set_output(pins::MODEM_RAIL_EN, Level::Low) {
            error!("modem: cannot de-energise rail: {}", e);
        }
    }

    // ── AT protocol ────────────────────────────────────────────

    /// Send one AT command and return the raw reply.
    ///
    /// An empty reply after the settle interval is a
    /// [`Error::HardwareTimeout`]; an `ERROR` reply is returned as text for
    /// the caller to classify.
    pub fn send_at_command(&mut self, command: &str) -> Result<String> {
        if !self.channel.is_open() {
            self.channel.open()?;
        }
        let exchange = self
            .channel
            .write(format!("{command}\r\n").as_bytes())
            .and_then(|()| {
                self.clock.sleep_ms(self.timing.at_settle_ms);
                self.channel.read_available()
            });

        let bytes = match exchange {
            Ok(bytes) => bytes,
            Err(e) => {
                // Reopen on the next command; the tty may have gone away.
                self.channel.close();
                return Err(Error::Io(e));
            }
        };
        if bytes.is_empty() {
            debug!("modem: no reply to {}", command);
            return Err(Error::HardwareTimeout("AT response"));
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// `AT` round trip.  Any failure counts as not responding.
    pub fn is_responding(&mut self) -> bool {
        let ok = match self.send_at_command("AT") {
            Ok(reply) => at::classify(&reply) == AtResponse::Ok,
            Err(e) => {
                debug!("modem: AT failed: {}", e);
                false
            }
        };
        if ok {
            self.state = ModemPowerState::Responsive;
        }
        ok
    }

    /// ICCID of the inserted SIM, or `None` if there is no readable SIM.
    pub fn sim_ccid(&mut self) -> Option<Iccid> {
        match self.send_at_command("AT+CCID?") {
            Ok(reply) => at::parse_ccid(&reply),
            Err(e) => {
                debug!("modem: CCID query failed: {}", e);
                None
            }
        }
    }

    pub fn sim_present(&mut self) -> bool {
        self.sim_ccid().is_some()
    }

    /// Signal quality from `AT+CSQ`.
    ///
    /// May return [`at::RSSI_UNKNOWN`], which callers must treat as "no
    /// signal found".
    pub fn rssi(&mut self) -> Result<u8> {
        let reply = self.send_at_command("AT+CSQ")?;
        if at::classify(&reply) == AtResponse::Error {
            return Err(Error::ProtocolNegative(format!("AT+CSQ: {}", reply.trim())));
        }
        at::parse_csq(&reply)
            .ok_or_else(|| Error::ProtocolNegative(format!("unparsable +CSQ reply {:?}", reply.trim())))
    }

    /// Poll [`rssi`](Self::rssi) until a known reading arrives.
    pub fn wait_for_signal(&mut self, polls: u32, interval: Duration) -> Option<u8> {
        for attempt in 1..=polls {
            match self.rssi() {
                Ok(rssi) if rssi != at::RSSI_UNKNOWN => {
                    info!("modem: rssi {} on check {}", rssi, attempt);
                    return Some(rssi);
                }
                Ok(_) => debug!("modem: rssi unknown ({}/{})", attempt, polls),
                Err(e) => debug!("modem: rssi query failed ({}/{}): {}", attempt, polls, e),
            }
            if attempt < polls {
                self.clock.sleep(interval);
            }
        }
        None
    }
}

impl<G, U, S, K> Drop for Modem<G, U, S, K>
where
    G: GpioPort,
    U: UsbBus,
    S: AtChannel,
    K: Clock,
{
    fn drop(&mut self) {
        self.channel.close();
        debug!("modem: driver released");
    }
}
