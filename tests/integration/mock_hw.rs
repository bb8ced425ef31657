//! Mock hardware for integration tests.
//!
//! `SimBoard` models the parts of the recorder whose behaviour couples
//! several ports: the modem enumerates on USB once its rail is on and the
//! POWER_ON strobe has been pulsed, answers AT commands while booted, and
//! drops off the bus on `AT!POWERDOWN` or when the rail is cut.  GPIO, USB
//! and the AT channel are handles onto that shared state.
//!
//! The remaining mocks (clock, services, audio, I2C, SPI, event sink) are
//! independent recorders.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::rc::Rc;
use std::time::Duration;

use bugg::app::events::FactoryEvent;
use bugg::app::ports::{
    AtChannel, AudioCapture, AudioSource, Clock, EventSink, GpioPort, Level, ServiceControl,
    UsbBus, UsbId,
};
use bugg::config::DeviceConfig;
use bugg::drivers::probe::BusyCondition;
use bugg::pins;
use embedded_hal::i2c::{self, ErrorKind, I2c, NoAcknowledgeSource};
use embedded_hal::spi::{self, SpiDevice};

// ── Config ────────────────────────────────────────────────────

/// Default configuration with every file path inside `dir` and short lock
/// timeouts.
pub fn test_config(dir: &std::path::Path) -> DeviceConfig {
    let mut cfg = DeviceConfig::default();
    cfg.modem.lock_path = dir.join("modem.lock");
    cfg.modem.lock_timeout_ms = 100;
    cfg.soundcard.lock_path = dir.join("soundcard.lock");
    cfg.soundcard.lock_timeout_ms = 100;
    cfg.soundcard.state_path = dir.join("soundcard_state.json");
    cfg.factory.trigger_path = dir.join("sd").join("factory-test-full.txt");
    cfg.factory.results_path = dir.join("var").join("factory-test-results.txt");
    cfg.factory.results_link = dir.join("issue.d").join("bugg-factory-test.issue");
    cfg
}

// ── Simulated board ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinState {
    pub output: bool,
    pub level: Level,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpioOp {
    Output(u8, Level),
    Input(u8),
}

pub struct BoardState {
    pub pins: HashMap<u8, PinState>,
    pub gpio_log: Vec<GpioOp>,
    pub modem_booted: bool,
    /// The modem never comes up, whatever the pins do.
    pub modem_dead: bool,
    /// The modem ignores `AT!POWERDOWN`.
    pub ignores_powerdown: bool,
    /// The modem stays up through a RESET_IN_N pulse.
    pub ignores_reset: bool,
    pub iccid: Option<String>,
    /// Successive `+CSQ` RSSI values; the last one repeats.
    pub rssi: VecDeque<u8>,
    pub at_log: Vec<String>,
    pending: Vec<u8>,
}

impl Default for BoardState {
    fn default() -> Self {
        Self {
            pins: HashMap::new(),
            gpio_log: Vec::new(),
            modem_booted: false,
            modem_dead: false,
            ignores_powerdown: false,
            ignores_reset: false,
            iccid: Some("89441000301234567890".into()),
            rssi: VecDeque::from([17]),
            at_log: Vec::new(),
            pending: Vec::new(),
        }
    }
}

#[allow(dead_code)]
impl BoardState {
    pub fn pin(&self, pin: u8) -> Option<PinState> {
        self.pins.get(&pin).copied()
    }

    pub fn is_driven(&self, pin: u8, level: Level) -> bool {
        self.pin(pin) == Some(PinState { output: true, level })
    }

    pub fn is_input(&self, pin: u8) -> bool {
        matches!(self.pin(pin), Some(PinState { output: false, .. }))
    }

    fn reply(&mut self, command: &str) -> String {
        match command {
            "AT" => "AT\r\r\nOK\r\n".into(),
            "AT+CCID?" => match &self.iccid {
                Some(iccid) => format!("AT+CCID?\r\r\n+CCID: {iccid}\r\n\r\nOK\r\n"),
                None => "AT+CCID?\r\r\n+CME ERROR: 10\r\n".into(),
            },
            "AT+CSQ" => {
                let rssi = if self.rssi.len() > 1 {
                    self.rssi.pop_front().unwrap_or(99)
                } else {
                    self.rssi.front().copied().unwrap_or(99)
                };
                format!("AT+CSQ\r\r\n+CSQ: {rssi},99\r\n\r\nOK\r\n")
            }
            "AT!POWERDOWN" => {
                if !self.ignores_powerdown {
                    self.modem_booted = false;
                }
                "AT!POWERDOWN\r\r\nOK\r\n".into()
            }
            _ => "\r\nERROR\r\n".into(),
        }
    }
}

#[derive(Clone, Default)]
pub struct SimBoard(pub Rc<RefCell<BoardState>>);

#[allow(dead_code)]
impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gpio(&self) -> SimGpio {
        SimGpio(self.0.clone())
    }

    pub fn usb(&self) -> SimUsb {
        SimUsb(self.0.clone())
    }

    pub fn at(&self) -> SimAt {
        SimAt {
            board: self.0.clone(),
            open: false,
        }
    }

    pub fn state(&self) -> std::cell::Ref<'_, BoardState> {
        self.0.borrow()
    }

    pub fn state_mut(&self) -> std::cell::RefMut<'_, BoardState> {
        self.0.borrow_mut()
    }
}

pub struct SimGpio(Rc<RefCell<BoardState>>);

impl GpioPort for SimGpio {
    fn set_output(&mut self, pin: u8, level: Level) -> io::Result<()> {
        let mut b = self.0.borrow_mut();
        let previous = b.pin(pin);
        b.pins.insert(pin, PinState { output: true, level });
        b.gpio_log.push(GpioOp::Output(pin, level));

        let rail_on = b.is_driven(pins::MODEM_RAIL_EN, Level::High);
        if pin == pins::MODEM_RAIL_EN && level == Level::Low {
            b.modem_booted = false;
        }
        if pin == pins::MODEM_RESET && level == Level::High && !b.ignores_reset {
            b.modem_booted = false;
        }
        // Falling edge of the strobe with the rail up boots the modem.
        let strobe_released = pin == pins::MODEM_POWER_ON
            && level == Level::Low
            && previous.is_some_and(|p| p.level == Level::High);
        if strobe_released && rail_on && !b.modem_dead {
            b.modem_booted = true;
        }
        Ok(())
    }

    fn set_input(&mut self, pin: u8) -> io::Result<()> {
        let mut b = self.0.borrow_mut();
        let level = b.pin(pin).map_or(Level::Low, |p| p.level);
        b.pins.insert(pin, PinState { output: false, level });
        b.gpio_log.push(GpioOp::Input(pin));
        Ok(())
    }

    fn read(&mut self, pin: u8) -> io::Result<Level> {
        Ok(self.0.borrow().pin(pin).map_or(Level::Low, |p| p.level))
    }

    fn is_output(&mut self, pin: u8) -> io::Result<bool> {
        Ok(self.0.borrow().pin(pin).is_some_and(|p| p.output))
    }
}

pub struct SimUsb(Rc<RefCell<BoardState>>);

impl UsbBus for SimUsb {
    fn is_present(&mut self, id: UsbId) -> bool {
        id.vendor == pins::MODEM_USB_VENDOR
            && id.product == pins::MODEM_USB_PRODUCT
            && self.0.borrow().modem_booted
    }
}

pub struct SimAt {
    board: Rc<RefCell<BoardState>>,
    open: bool,
}

impl AtChannel for SimAt {
    fn open(&mut self) -> io::Result<()> {
        if !self.board.borrow().modem_booted {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no ttyUSB2"));
        }
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut b = self.board.borrow_mut();
        if !b.modem_booted {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "modem gone"));
        }
        let command = String::from_utf8_lossy(bytes).trim_end().to_string();
        b.at_log.push(command.clone());
        let reply = b.reply(&command);
        b.pending.extend_from_slice(reply.as_bytes());
        Ok(())
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        Ok(std::mem::take(&mut self.board.borrow_mut().pending))
    }

    fn close(&mut self) {
        self.open = false;
    }
}

// ── Scripted USB ──────────────────────────────────────────────

/// Answers `is_present` from a script, then a fixed default.
pub struct ScriptedUsb {
    script: VecDeque<bool>,
    default: bool,
    pub calls: usize,
}

#[allow(dead_code)]
impl ScriptedUsb {
    pub fn new(script: &[bool], default: bool) -> Self {
        Self {
            script: script.iter().copied().collect(),
            default,
            calls: 0,
        }
    }
}

impl UsbBus for ScriptedUsb {
    fn is_present(&mut self, _id: UsbId) -> bool {
        self.calls += 1;
        self.script.pop_front().unwrap_or(self.default)
    }
}

// ── Clock ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockClock {
    pub sleeps: Vec<Duration>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn total(&self) -> Duration {
        self.sleeps.iter().sum()
    }

    pub fn count(&self, d: Duration) -> usize {
        self.sleeps.iter().filter(|&&s| s == d).count()
    }
}

impl Clock for MockClock {
    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
    }
}

// ── Services ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockServices {
    pub stopped: Vec<String>,
    pub fail: bool,
}

impl ServiceControl for MockServices {
    fn stop(&mut self, service: &str) -> io::Result<()> {
        if self.fail {
            return Err(io::Error::other(format!("Failed to stop {service}.service")));
        }
        self.stopped.push(service.to_string());
        Ok(())
    }
}

// ── Audio ─────────────────────────────────────────────────────

/// Deterministic "room noise": variance 250 000.
pub fn noise(n: usize) -> Vec<i16> {
    (0..n).map(|i| if i % 2 == 0 { 500 } else { -500 }).collect()
}

pub struct MockAudio {
    pub internal: Option<Vec<i16>>,
    pub external: Option<Vec<i16>>,
    pub calls: Vec<(AudioSource, Duration)>,
}

impl Default for MockAudio {
    fn default() -> Self {
        Self {
            internal: Some(noise(4410)),
            external: Some(noise(4410)),
            calls: Vec::new(),
        }
    }
}

impl AudioCapture for MockAudio {
    fn record(&mut self, source: AudioSource, duration: Duration) -> io::Result<Vec<i16>> {
        self.calls.push((source, duration));
        let samples = match source {
            AudioSource::Internal => &self.internal,
            AudioSource::External => &self.external,
        };
        samples
            .clone()
            .ok_or_else(|| io::Error::other("arecord: audio open error: No such device"))
    }
}

// ── I2C ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Present,
    /// Claimed by a kernel driver (EBUSY).
    Busy,
}

#[derive(Debug)]
pub enum MockI2cError {
    Busy,
    Nak,
}

impl i2c::Error for MockI2cError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Busy => ErrorKind::Other,
            Self::Nak => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
        }
    }
}

impl BusyCondition for MockI2cError {
    fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

pub struct MockI2c {
    pub devices: HashMap<u8, Device>,
    pub writes: Vec<(u8, Vec<u8>)>,
    pub reads: Vec<u8>,
}

#[allow(dead_code)]
impl MockI2c {
    /// Bridge, RTC (kernel-claimed) and LED expander all fitted.
    pub fn full_board() -> Self {
        Self {
            devices: HashMap::from([
                (pins::I2S_BRIDGE_ADDR, Device::Present),
                (pins::RTC_ADDR, Device::Busy),
                (pins::LED_CONTROLLER_ADDR, Device::Present),
            ]),
            writes: Vec::new(),
            reads: Vec::new(),
        }
    }

    pub fn without(mut self, address: u8) -> Self {
        self.devices.remove(&address);
        self
    }

    /// Last byte written to the LED expander.
    pub fn led_byte(&self) -> Option<u8> {
        self.writes
            .iter()
            .rev()
            .find(|(a, _)| *a == pins::LED_CONTROLLER_ADDR)
            .and_then(|(_, b)| b.first().copied())
    }
}

impl i2c::ErrorType for MockI2c {
    type Error = MockI2cError;
}

impl I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        match self.devices.get(&address) {
            None => return Err(MockI2cError::Nak),
            Some(Device::Busy) => return Err(MockI2cError::Busy),
            Some(Device::Present) => {}
        }
        for op in operations {
            match op {
                i2c::Operation::Read(buf) => {
                    self.reads.push(address);
                    buf.fill(0xFF);
                }
                i2c::Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
            }
        }
        Ok(())
    }
}

// ── SPI ───────────────────────────────────────────────────────

#[derive(Debug)]
pub struct MockSpiError;

impl spi::Error for MockSpiError {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

#[derive(Default)]
pub struct MockSpi {
    pub frames: Vec<Vec<u8>>,
    pub fail: bool,
}

impl spi::ErrorType for MockSpi {
    type Error = MockSpiError;
}

impl SpiDevice for MockSpi {
    fn transaction(&mut self, operations: &mut [spi::Operation<'_, u8>]) -> Result<(), MockSpiError> {
        if self.fail {
            return Err(MockSpiError);
        }
        for op in operations {
            if let spi::Operation::Write(bytes) = op {
                self.frames.push(bytes.to_vec());
            }
        }
        Ok(())
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct CollectingSink {
    pub events: Vec<FactoryEvent>,
}

impl EventSink for CollectingSink {
    fn emit(&mut self, event: &FactoryEvent) {
        self.events.push(event.clone());
    }
}
