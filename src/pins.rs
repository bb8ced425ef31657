//! GPIO / bus assignments for the Bugg main board.
//!
//! Every driver references this module rather than
//! hard-coding pin numbers or bus addresses.  Pin numbers are BCM numbering
//! on the Raspberry Pi compute module header.

// ---------------------------------------------------------------------------
// Cellular modem (Sierra Wireless RC7620)
// ---------------------------------------------------------------------------

/// Digital output: enables the 3.7 V modem supply rail (active HIGH).
pub const MODEM_RAIL_EN: u8 = 7;
/// Digital output: POWER_ON_N strobe (pulsed HIGH through an inverting FET).
pub const MODEM_POWER_ON: u8 = 5;
/// RESET_IN_N handshake line.  Must stay high-impedance until the modem
/// has booted, otherwise it contends with the modem's own pull-up.
pub const MODEM_RESET: u8 = 6;

/// USB identity the modem enumerates with.
pub const MODEM_USB_VENDOR: u16 = 0x1199;
pub const MODEM_USB_PRODUCT: u16 = 0x68c0;

// ---------------------------------------------------------------------------
// Soundcard (external microphone front-end)
// ---------------------------------------------------------------------------

/// Digital output: external microphone power rail (active HIGH).
pub const EXT_MIC_EN: u8 = 12;

// ---------------------------------------------------------------------------
// PCMD3180 PDM → I2S bridge (internal microphone)
// ---------------------------------------------------------------------------

/// Digital output: SHDNZ, holds the bridge in shutdown when LOW.
pub const I2S_BRIDGE_SHDNZ: u8 = 0;

// ---------------------------------------------------------------------------
// I²C bus 1: fixed peripheral addresses
// ---------------------------------------------------------------------------

pub const I2C_BUS: u8 = 1;
/// PCMD3180 I2S bridge.
pub const I2S_BRIDGE_ADDR: u8 = 0x4c;
/// Real-time clock (claimed by the kernel rtc driver, answers EBUSY).
pub const RTC_ADDR: u8 = 0x68;
/// PCF8574 I/O expander driving the status LEDs.
pub const LED_CONTROLLER_ADDR: u8 = 0x23;

// ---------------------------------------------------------------------------
// Status LEDs (PCF8574 outputs, active LOW)
// ---------------------------------------------------------------------------

/// Expander bits for the top LED (R, G, B).
pub const LED_TOP: (u8, u8, u8) = (7, 6, 5);
/// Expander bits for the middle LED (R, G, B).
pub const LED_MIDDLE: (u8, u8, u8) = (4, 3, 2);
/// Expander bits for the bottom LED (G, B).  Its red channel is tied on in
/// hardware and doubles as the power indicator.
pub const LED_BOTTOM_GB: (u8, u8) = (1, 0);

// ---------------------------------------------------------------------------
// SPI bus: soundcard register channel
// ---------------------------------------------------------------------------

pub const SPI_BUS: u8 = 0;
pub const SPI_CHIP_SELECT: u8 = 0;
/// SPI clock for the soundcard shift registers.
pub const SPI_MAX_SPEED_HZ: u32 = 5_000_000;
