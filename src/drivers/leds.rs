//! Status LEDs on the PCF8574 I/O expander.
//!
//! Three RGB LEDs hang off the expander at I²C 0x23.  Outputs are active
//! LOW (the expander sinks LED current), so `0xFF` is "everything off".
//!
//! ```text
//!   LED      R      G      B
//!   top      P7     P6     P5
//!   middle   P4     P3     P2
//!   bottom   wired  P1     P0     (red tied on: power indicator)
//! ```
//!
//! Colours are binary per channel (no PWM).  A colour that needs a
//! hard-wired channel in the other state is rejected before anything is
//! written, so the bottom LED can show Red, Yellow, Magenta and White only.

use embedded_hal::i2c::I2c;
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::pins;

// ── Colour palette ─────────────────────────────────────────────

/// The eight colours an on/off RGB LED can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Colour {
    Red,
    Green,
    Blue,
    Yellow,
    Cyan,
    Magenta,
    White,
    Black,
}

impl Colour {
    /// `(red, green, blue)` channel states.
    pub const fn components(self) -> (bool, bool, bool) {
        match self {
            Self::Red => (true, false, false),
            Self::Green => (false, true, false),
            Self::Blue => (false, false, true),
            Self::Yellow => (true, true, false),
            Self::Cyan => (false, true, true),
            Self::Magenta => (true, false, true),
            Self::White => (true, true, true),
            Self::Black => (false, false, false),
        }
    }
}

// ── Wiring ─────────────────────────────────────────────────────

/// How one colour channel of an LED is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Expander output bit (0-7).
    Pin(u8),
    /// Tied permanently on (`true`) or off (`false`) in hardware.
    Wired(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedChannels {
    pub red: Channel,
    pub green: Channel,
    pub blue: Channel,
}

impl LedChannels {
    const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            red: Channel::Pin(r),
            green: Channel::Pin(g),
            blue: Channel::Pin(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedId {
    Top,
    Middle,
    Bottom,
}

impl LedId {
    pub const ALL: [Self; 3] = [Self::Top, Self::Middle, Self::Bottom];

    const fn index(self) -> usize {
        match self {
            Self::Top => 0,
            Self::Middle => 1,
            Self::Bottom => 2,
        }
    }
}

/// Board wiring: top and middle fully switchable, bottom red tied on.
pub const DEFAULT_WIRING: [LedChannels; 3] = [
    LedChannels::rgb(pins::LED_TOP.0, pins::LED_TOP.1, pins::LED_TOP.2),
    LedChannels::rgb(pins::LED_MIDDLE.0, pins::LED_MIDDLE.1, pins::LED_MIDDLE.2),
    LedChannels {
        red: Channel::Wired(true),
        green: Channel::Pin(pins::LED_BOTTOM_GB.0),
        blue: Channel::Pin(pins::LED_BOTTOM_GB.1),
    },
];

// ── PCF8574 ────────────────────────────────────────────────────

/// 8-bit quasi-bidirectional I/O expander.
///
/// The chip has no readable output register worth trusting, so the driver
/// keeps a shadow of the last byte written and always writes the whole byte.
pub struct Pcf8574<I2C> {
    i2c: I2C,
    address: u8,
    shadow: u8,
}

impl<I2C: I2c> Pcf8574<I2C> {
    /// Nothing is written until the first `set`/`write`.
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            shadow: 0xFF,
        }
    }

    /// Drive a single output.  `on` pulls the pin low.
    pub fn set(&mut self, bit: u8, on: bool) -> Result<()> {
        if bit > 7 {
            return Err(Error::InvalidParameter(format!(
                "expander bit {bit} out of range"
            )));
        }
        let byte = if on {
            self.shadow & !(1 << bit)
        } else {
            self.shadow | (1 << bit)
        };
        self.write(byte)
    }

    /// Write the full output byte.  The shadow only changes on success.
    pub fn write(&mut self, byte: u8) -> Result<()> {
        self.i2c
            .write(self.address, &[byte])
            .map_err(|e| Error::bus("pcf8574 write", e))?;
        self.shadow = byte;
        Ok(())
    }

    /// Last byte successfully written (bit clear = output on).
    pub fn state(&self) -> u8 {
        self.shadow
    }
}

// ── LED bank ───────────────────────────────────────────────────

/// The three status LEDs.
///
/// Dropping the bank turns every LED off unless
/// [`stay_on_at_exit`](Self::stay_on_at_exit) was requested, which is how the
/// factory test leaves its verdict visible after the process exits.
pub struct LedBank<I2C: I2c> {
    expander: Pcf8574<I2C>,
    wiring: [LedChannels; 3],
    colours: [Option<Colour>; 3],
    stay_on: bool,
}

impl<I2C: I2c> LedBank<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self::with_wiring(i2c, pins::LED_CONTROLLER_ADDR, DEFAULT_WIRING)
    }

    pub fn with_wiring(i2c: I2C, address: u8, wiring: [LedChannels; 3]) -> Self {
        Self {
            expander: Pcf8574::new(i2c, address),
            wiring,
            colours: [None; 3],
            stay_on: false,
        }
    }

    /// Show `colour` on `led`.
    pub fn set(&mut self, led: LedId, colour: Colour) -> Result<()> {
        let wiring = self.wiring[led.index()];
        let (r, g, b) = colour.components();
        let wanted = [(wiring.red, r, "red"), (wiring.green, g, "green"), (wiring.blue, b, "blue")];

        for (channel, on, name) in wanted {
            if let Channel::Wired(wired) = channel {
                if wired != on {
                    return Err(Error::UnsupportedColour {
                        led,
                        colour,
                        channel: name,
                        wired,
                    });
                }
            }
        }

        let mut byte = self.expander.state();
        for (channel, on, _) in wanted {
            if let Channel::Pin(bit) = channel {
                if bit > 7 {
                    return Err(Error::InvalidParameter(format!(
                        "expander bit {bit} out of range"
                    )));
                }
                if on {
                    byte &= !(1 << bit);
                } else {
                    byte |= 1 << bit;
                }
            }
        }
        self.expander.write(byte)?;
        self.colours[led.index()] = Some(colour);
        debug!("led {:?} -> {:?}", led, colour);
        Ok(())
    }

    /// Last colour successfully set on `led` (`None` after `all_off`).
    pub fn colour(&self, led: LedId) -> Option<Colour> {
        self.colours[led.index()]
    }

    /// Drive every expander output off.
    pub fn all_off(&mut self) -> Result<()> {
        self.expander.write(0xFF)?;
        self.colours = [None; 3];
        Ok(())
    }

    /// Keep the LEDs lit when the bank is dropped.
    pub fn stay_on_at_exit(&mut self, stay: bool) {
        self.stay_on = stay;
    }

    /// Raw expander byte.
    pub fn expander_state(&self) -> u8 {
        self.expander.state()
    }
}

impl<I2C: I2c> Drop for LedBank<I2C> {
    fn drop(&mut self) {
        if self.stay_on {
            return;
        }
        if let Err(e) = self.all_off() {
            warn!("leds: could not switch off on exit: {}", e);
        }
    }
}
