//! Fixed schema of factory test points.
//!
//! Every test point is a [`TestId`] variant, so a misspelt key is a compile
//! error and every `match` over tests or categories is exhaustive.

use core::fmt;

use crate::drivers::leds::Colour;

/// The nine test points, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TestId {
    ModemEnumerated,
    ModemResponsive,
    ModemSimReadable,
    ModemTowersFound,
    I2sBridgeResponding,
    RtcResponding,
    LedControllerResponding,
    InternalMicrophoneSignalPresent,
    ExternalMicrophoneSignalPresent,
}

impl TestId {
    pub const COUNT: usize = 9;

    pub const ALL: [Self; Self::COUNT] = [
        Self::ModemEnumerated,
        Self::ModemResponsive,
        Self::ModemSimReadable,
        Self::ModemTowersFound,
        Self::I2sBridgeResponding,
        Self::RtcResponding,
        Self::LedControllerResponding,
        Self::InternalMicrophoneSignalPresent,
        Self::ExternalMicrophoneSignalPresent,
    ];

    /// Stable key used in the results record.
    pub const fn key(self) -> &'static str {
        match self {
            Self::ModemEnumerated => "modem_enumerated",
            Self::ModemResponsive => "modem_responsive",
            Self::ModemSimReadable => "modem_sim_readable",
            Self::ModemTowersFound => "modem_towers_found",
            Self::I2sBridgeResponding => "i2s_bridge_responding",
            Self::RtcResponding => "rtc_responding",
            Self::LedControllerResponding => "led_controller_responding",
            Self::InternalMicrophoneSignalPresent => "internal_microphone_signal_present",
            Self::ExternalMicrophoneSignalPresent => "external_microphone_signal_present",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.key() == key)
    }

    pub const fn category(self) -> Category {
        match self {
            Self::ModemEnumerated
            | Self::ModemResponsive
            | Self::ModemSimReadable
            | Self::ModemTowersFound => Category::Modem,
            Self::I2sBridgeResponding | Self::RtcResponding | Self::LedControllerResponding => {
                Category::BusPresence
            }
            Self::InternalMicrophoneSignalPresent | Self::ExternalMicrophoneSignalPresent => {
                Category::Recording
            }
        }
    }

    /// Middle-LED colour shown when this is the only failing test.
    pub const fn indicator_colour(self) -> Colour {
        match self {
            Self::ModemEnumerated => Colour::Red,
            Self::ModemResponsive => Colour::Magenta,
            Self::ModemSimReadable => Colour::Blue,
            Self::ModemTowersFound => Colour::Yellow,
            Self::I2sBridgeResponding => Colour::Red,
            Self::RtcResponding => Colour::Magenta,
            Self::LedControllerResponding => Colour::Blue,
            Self::InternalMicrophoneSignalPresent => Colour::Red,
            Self::ExternalMicrophoneSignalPresent => Colour::Magenta,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Test phases, one per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Modem,
    BusPresence,
    Recording,
}

impl Category {
    pub const ALL: [Self; 3] = [Self::Modem, Self::BusPresence, Self::Recording];

    /// Top-LED colour shown when only this category failed.
    pub const fn colour(self) -> Colour {
        match self {
            Self::Modem => Colour::Yellow,
            Self::BusPresence => Colour::Red,
            Self::Recording => Colour::Blue,
        }
    }

    pub fn tests(self) -> impl Iterator<Item = TestId> {
        TestId::ALL.into_iter().filter(move |t| t.category() == self)
    }
}

/// Outcome of every test point.  All start as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TestResults([bool; TestId::COUNT]);

impl TestResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, test: TestId, passed: bool) {
        self.0[test.index()] = passed;
    }

    pub fn get(&self, test: TestId) -> bool {
        self.0[test.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (TestId, bool)> + '_ {
        TestId::ALL.into_iter().map(|t| (t, self.get(t)))
    }

    pub fn all_passed(&self) -> bool {
        self.0.iter().all(|&p| p)
    }

    pub fn failures(&self) -> impl Iterator<Item = TestId> + '_ {
        self.iter().filter(|(_, p)| !p).map(|(t, _)| t)
    }
}
