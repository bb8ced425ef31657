//! PCMD3180 PDM → I2S bridge for the on-board microphone.
//!
//! Held in shutdown through SHDNZ (BCM 0) whenever it is not recording.
//! After power-up it needs its register table written before the I2S
//! output carries audio.

use embedded_hal::i2c::I2c;
use log::info;

use crate::app::ports::{Clock, GpioPort, Level};
use crate::error::{Error, Result};
use crate::pins;

/// Start-up delay after releasing SHDNZ.
const POWER_ON_DELAY_MS: u64 = 500;
/// Hold time after asserting SHDNZ.
const POWER_OFF_DELAY_MS: u64 = 100;

/// `(register, value)` pairs written by [`I2sBridge::configure`], in order.
pub const CONFIGURATION: [(u8, u8); 16] = [
    (0x02, 0x81), // wake, AREG internal
    (0x3C, 0x40), // CH1 digital microphone input
    (0x41, 0x40), // CH2
    (0x46, 0x40), // CH3
    (0x4B, 0x40), // CH4
    (0x22, 0x41), // PDM clock
    (0x23, 0x41),
    (0x24, 0x41),
    (0x25, 0x41),
    (0x2B, 0x45),
    (0x2C, 0x67),
    (0x73, 0xFF), // input channels enabled
    (0x74, 0xFF), // output slots enabled
    (0x75, 0x60), // power up ADC and PLL
    (0x3E, 0xFF), // CH1 digital volume, max (+27 dB)
    (0x07, 0x80), // left-justified, 16 bit
];

pub struct I2sBridge<G: GpioPort, I: I2c, K: Clock> {
    gpio: G,
    i2c: I,
    clock: K,
    powered: bool,
}

impl<G: GpioPort, I: I2c, K: Clock> I2sBridge<G, I, K> {
    /// Claims SHDNZ and leaves the bridge shut down.
    pub fn new(gpio: G, i2c: I, clock: K) -> Result<Self> {
        let mut bridge = Self {
            gpio,
            i2c,
            clock,
            powered: true,
        };
        bridge.power_off()?;
        Ok(bridge)
    }

    pub fn power_on(&mut self) -> Result<()> {
        self.gpio.set_output(pins::I2S_BRIDGE_SHDNZ, Level::High)?;
        self.clock.sleep_ms(POWER_ON_DELAY_MS);
        self.powered = true;
        Ok(())
    }

    pub fn power_off(&mut self) -> Result<()> {
        self.gpio.set_output(pins::I2S_BRIDGE_SHDNZ, Level::Low)?;
        self.clock.sleep_ms(POWER_OFF_DELAY_MS);
        self.powered = false;
        Ok(())
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Write the register table.  Stops at the first failed write.
    pub fn configure(&mut self) -> Result<()> {
        if !self.powered {
            return Err(Error::InvalidParameter(
                "i2s bridge must be powered before configuration".into(),
            ));
        }
        for (reg, value) in CONFIGURATION {
            self.i2c
                .write(pins::I2S_BRIDGE_ADDR, &[reg, value])
                .map_err(|e| Error::bus(&format!("pcmd3180 reg 0x{reg:02x}"), e))?;
        }
        info!("i2s bridge: configuration sent");
        Ok(())
    }
}
