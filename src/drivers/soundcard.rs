//! External-microphone soundcard: gain and phantom power over SPI.
//!
//! The card has no readable registers.  Its whole configuration is one
//! 2-byte frame shifted in over SPI, so the driver keeps the state itself
//! and persists `{gain, phantom}` to a small JSON file that outlives the
//! process (but not a reboot, which also resets the card).
//!
//! ```text
//!   byte 0:  - - - G4 G3 G2 G1 G0        gain, 3 dB steps
//!   byte 1:  - - ZS ZG -  P2 P1 P0       zero-cross switch / gain, phantom
//! ```
//!
//! Phantom codes: 0 none, 1 plug-in power, 2 3.3 V, 4 48 V.  Parameters
//! are checked before anything is sent; a rejected call leaves both the
//! in-memory state and the last transmitted frame untouched.

use std::fmt;
use std::str::FromStr;

use embedded_hal::spi::SpiDevice;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::adapters::state_file::JsonStateFile;
use crate::app::ports::{GpioPort, Level};
use crate::config::SoundcardConfig;
use crate::drivers::lock::ExclusiveLock;
use crate::error::{Error, Result};
use crate::pins;

/// Highest accepted gain step.
pub const MAX_GAIN: u8 = 20;

// ── Phantom power ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PhantomMode {
    #[default]
    None,
    PlugInPower,
    ThreeVolt3,
    FortyEightVolt,
}

impl PhantomMode {
    pub const ALL: [Self; 4] = [
        Self::None,
        Self::PlugInPower,
        Self::ThreeVolt3,
        Self::FortyEightVolt,
    ];

    /// 3-bit field value in the register frame.
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::PlugInPower => 1,
            Self::ThreeVolt3 => 2,
            Self::FortyEightVolt => 4,
        }
    }

    /// Name accepted by [`FromStr`] and shown by the control tool.
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::PlugInPower => "pip",
            Self::ThreeVolt3 => "3v3",
            Self::FortyEightVolt => "p48",
        }
    }
}

impl TryFrom<u8> for PhantomMode {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::PlugInPower),
            2 => Ok(Self::ThreeVolt3),
            4 => Ok(Self::FortyEightVolt),
            other => Err(Error::InvalidParameter(format!(
                "phantom code {other} is not one of 0, 1, 2, 4"
            ))),
        }
    }
}

impl FromStr for PhantomMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::InvalidParameter(format!("unknown phantom mode {s:?} (none, pip, 3v3, p48)"))
            })
    }
}

impl fmt::Display for PhantomMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── State and frame ────────────────────────────────────────────

/// Full register-level state of the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundcardState {
    pub gain: u8,
    pub phantom: PhantomMode,
    pub zero_cross_gain: bool,
    pub zero_cross_switch: bool,
}

impl Default for SoundcardState {
    fn default() -> Self {
        Self {
            gain: 0,
            phantom: PhantomMode::None,
            zero_cross_gain: true,
            zero_cross_switch: true,
        }
    }
}

impl SoundcardState {
    pub fn frame(&self) -> RegisterFrame {
        let byte1 = (u8::from(self.zero_cross_switch) << 5)
            | (u8::from(self.zero_cross_gain) << 4)
            | self.phantom.code();
        RegisterFrame([self.gain & 0x1F, byte1])
    }
}

/// The two bytes shifted into the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterFrame(pub [u8; 2]);

impl RegisterFrame {
    pub fn bytes(&self) -> [u8; 2] {
        self.0
    }

    pub fn gain(&self) -> u8 {
        self.0[0] & 0x1F
    }

    pub fn phantom_code(&self) -> u8 {
        self.0[1] & 0x07
    }
}

/// On-disk record.  Only the user-settable fields are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub gain: u8,
    pub phantom: u8,
}

impl PersistedState {
    fn from_state(state: &SoundcardState) -> Self {
        Self {
            gain: state.gain,
            phantom: state.phantom.code(),
        }
    }

    fn into_state(self) -> Result<SoundcardState> {
        if self.gain > MAX_GAIN {
            return Err(Error::PersistenceDegraded(format!(
                "stored gain {} out of range",
                self.gain
            )));
        }
        let phantom = PhantomMode::try_from(self.phantom)
            .map_err(|e| Error::PersistenceDegraded(e.to_string()))?;
        Ok(SoundcardState {
            gain: self.gain,
            phantom,
            ..SoundcardState::default()
        })
    }
}

// ── Driver ─────────────────────────────────────────────────────

pub struct Soundcard<S: SpiDevice, G: GpioPort> {
    spi: S,
    gpio: G,
    store: JsonStateFile,
    state: SoundcardState,
    last_frame: Option<RegisterFrame>,
    enabled: bool,
    _lock: ExclusiveLock,
}

impl<S: SpiDevice, G: GpioPort> Soundcard<S, G> {
    /// Take ownership of the soundcard and restore its persisted state.
    ///
    /// Fails with [`Error::ResourceBusy`] if another instance holds the
    /// lock.  Missing or unusable state is replaced by defaults, which are
    /// written back immediately.
    pub fn new(config: &SoundcardConfig, spi: S, mut gpio: G) -> Result<Self> {
        let lock = ExclusiveLock::acquire(&config.lock_path, config.lock_timeout())?;

        let level = if gpio.is_output(pins::EXT_MIC_EN)? {
            gpio.read(pins::EXT_MIC_EN)?
        } else {
            Level::Low
        };
        gpio.set_output(pins::EXT_MIC_EN, level)?;

        let store = JsonStateFile::new(&config.state_path);
        let loaded = store
            .load::<PersistedState>()
            .and_then(|record| record.map(PersistedState::into_state).transpose());

        let mut card = Self {
            spi,
            gpio,
            store,
            state: SoundcardState::default(),
            last_frame: None,
            enabled: level == Level::High,
            _lock: lock,
        };

        match loaded {
            Ok(Some(state)) => {
                debug!("soundcard: restored {:?}", state);
                card.state = state;
            }
            Ok(None) => {
                info!("soundcard: no stored state, using defaults");
                card.persist();
            }
            Err(e) => {
                warn!("soundcard: {}; using defaults", e);
                card.persist();
            }
        }
        Ok(card)
    }

    /// Power the external microphone and reset it to gain 0, no phantom.
    pub fn enable(&mut self) -> Result<()> {
        self.gpio.set_output(pins::EXT_MIC_EN, Level::High)?;
        self.enabled = true;
        self.apply(SoundcardState {
            gain: 0,
            phantom: PhantomMode::None,
            ..self.state
        })?;
        info!("soundcard: enabled");
        Ok(())
    }

    pub fn disable(&mut self) -> Result<()> {
        self.gpio.set_output(pins::EXT_MIC_EN, Level::Low)?;
        self.enabled = false;
        info!("soundcard: disabled");
        Ok(())
    }

    pub fn set_gain(&mut self, gain: u8) -> Result<()> {
        if gain > MAX_GAIN {
            return Err(Error::InvalidParameter(format!(
                "gain {gain} outside 0..={MAX_GAIN}"
            )));
        }
        self.apply(SoundcardState { gain, ..self.state })
    }

    pub fn set_phantom_mode(&mut self, phantom: PhantomMode) -> Result<()> {
        self.apply(SoundcardState { phantom, ..self.state })
    }

    /// Retransmit the current state and persist it.
    pub fn write_register_frame(&mut self) -> Result<()> {
        self.apply(self.state)
    }

    pub fn state(&self) -> SoundcardState {
        self.state
    }

    /// Last frame successfully transmitted by this instance.
    pub fn last_frame(&self) -> Option<RegisterFrame> {
        self.last_frame
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Send `next` to the card; commit it only once the transfer succeeded.
    fn apply(&mut self, next: SoundcardState) -> Result<()> {
        let frame = next.frame();
        self.spi
            .write(&frame.0)
            .map_err(|e| Error::bus("soundcard frame", e))?;
        debug!("soundcard: sent {:02x?}", frame.0);
        self.state = next;
        self.last_frame = Some(frame);
        self.persist();
        Ok(())
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.store(&PersistedState::from_state(&self.state)) {
            warn!("soundcard: state not saved: {}", e);
        }
    }
}
