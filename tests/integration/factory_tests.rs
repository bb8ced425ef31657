//! Integration tests for the factory self-test against a simulated board.

use std::cell::RefCell;

use bugg::app::events::FactoryEvent;
use bugg::app::ports::{AudioSource, Level};
use bugg::config::DeviceConfig;
use bugg::drivers::leds::{Colour, LedBank, LedId};
use bugg::drivers::lock::ExclusiveLock;
use bugg::factory::classify::Indication;
use bugg::factory::record::ResultsRecord;
use bugg::factory::results::{Category, TestId};
use bugg::factory::{self, Bench, FactoryOutcome, FactoryTest};
use bugg::{Error, Result, pins};
use embedded_hal_bus::i2c::RefCellDevice;

use crate::mock_hw::{
    CollectingSink, MockAudio, MockClock, MockI2c, MockServices, MockSpi, SimBoard, test_config,
};

const SERIAL: &str = "RPiID-00000000a1b2c3d4";

struct Rig {
    board: SimBoard,
    i2c: RefCell<MockI2c>,
    spi: MockSpi,
    clock: MockClock,
    services: MockServices,
    audio: MockAudio,
    events: Vec<FactoryEvent>,
}

impl Rig {
    fn new() -> Self {
        Self {
            board: SimBoard::new(),
            i2c: RefCell::new(MockI2c::full_board()),
            spi: MockSpi::default(),
            clock: MockClock::default(),
            services: MockServices::default(),
            audio: MockAudio::default(),
            events: Vec::new(),
        }
    }

    fn run(&mut self, cfg: &DeviceConfig) -> Result<FactoryOutcome> {
        let mut gpio = self.board.gpio();
        let mut usb = self.board.usb();
        let mut at = self.board.at();
        let mut sink = CollectingSink::default();

        let outcome = {
            let mut leds = LedBank::new(RefCellDevice::new(&self.i2c));
            let mut bench = Bench {
                gpio: &mut gpio,
                usb: &mut usb,
                at: &mut at,
                clock: &mut self.clock,
                services: &mut self.services,
                audio: &mut self.audio,
                i2c: &self.i2c,
                spi: &mut self.spi,
            };
            FactoryTest::new(cfg, SERIAL, &mut sink).run(&mut bench, &mut leds)
        };
        self.events = sink.events;
        outcome
    }

    fn phase_failures(&self) -> Vec<Category> {
        self.events
            .iter()
            .filter_map(|e| match e {
                FactoryEvent::PhaseFailed { phase, .. } => Some(*phase),
                _ => None,
            })
            .collect()
    }
}

fn indication(top: Colour, middle: Colour) -> Indication {
    Indication { top, middle }
}

fn failing(outcome: &FactoryOutcome) -> Vec<TestId> {
    outcome.results.failures().collect()
}

// ── Verdicts ──────────────────────────────────────────────────

#[test]
fn healthy_board_passes() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut rig = Rig::new();

    let outcome = rig.run(&cfg).unwrap();

    assert!(outcome.passed(), "unexpected failures: {:?}", failing(&outcome));
    assert_eq!(outcome.indication, indication(Colour::Green, Colour::Black));
    assert_eq!(rig.services.stopped, vec!["ModemManager".to_string()]);
    // Top green (bit 6 low), everything else off.
    assert_eq!(rig.i2c.borrow().led_byte(), Some(0xBF));

    assert_eq!(rig.events.first(), Some(&FactoryEvent::PhaseStarted(Category::Modem)));
    assert_eq!(rig.events.last(), Some(&FactoryEvent::Finished { passed: true }));
    let completed = rig
        .events
        .iter()
        .filter(|e| matches!(e, FactoryEvent::TestCompleted { passed: true, .. }))
        .count();
    assert_eq!(completed, TestId::COUNT);
}

#[test]
fn healthy_run_leaves_everything_powered_down() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut rig = Rig::new();

    rig.run(&cfg).unwrap();

    let b = rig.board.state();
    assert!(!b.modem_booted);
    assert!(b.is_driven(pins::MODEM_RAIL_EN, Level::Low));
    assert!(b.is_input(pins::MODEM_RESET));
    assert!(b.is_driven(pins::I2S_BRIDGE_SHDNZ, Level::Low));
    assert!(b.is_driven(pins::EXT_MIC_EN, Level::Low));
    assert_eq!(b.at_log.last().map(String::as_str), Some("AT!POWERDOWN"));

    // Both peripheral locks were released.
    assert!(ExclusiveLock::acquire(&cfg.modem.lock_path, cfg.modem.lock_timeout()).is_ok());
    assert!(ExclusiveLock::acquire(&cfg.soundcard.lock_path, cfg.soundcard.lock_timeout()).is_ok());
}

#[test]
fn bridge_is_configured_before_internal_capture() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut rig = Rig::new();

    rig.run(&cfg).unwrap();

    let writes = rig
        .i2c
        .borrow()
        .writes
        .iter()
        .filter(|(addr, _)| *addr == pins::I2S_BRIDGE_ADDR)
        .count();
    assert_eq!(writes, bugg::drivers::bridge::CONFIGURATION.len());
    assert_eq!(rig.audio.calls.len(), 2);
}

#[test]
fn missing_sim_shows_yellow_over_blue() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut rig = Rig::new();
    rig.board.state_mut().iccid = None;

    let outcome = rig.run(&cfg).unwrap();

    assert_eq!(failing(&outcome), vec![TestId::ModemSimReadable]);
    assert_eq!(outcome.indication, indication(Colour::Yellow, Colour::Blue));
}

#[test]
fn no_towers_shows_yellow_over_yellow() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut rig = Rig::new();
    rig.board.state_mut().rssi = [99].into();

    let outcome = rig.run(&cfg).unwrap();

    assert_eq!(failing(&outcome), vec![TestId::ModemTowersFound]);
    assert_eq!(outcome.indication, indication(Colour::Yellow, Colour::Yellow));
}

#[test]
fn dead_modem_fails_the_whole_category() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut rig = Rig::new();
    rig.board.state_mut().modem_dead = true;

    let outcome = rig.run(&cfg).unwrap();

    assert_eq!(failing(&outcome), Category::Modem.tests().collect::<Vec<_>>());
    assert_eq!(outcome.indication, indication(Colour::Yellow, Colour::White));
    assert!(rig.board.state().is_driven(pins::MODEM_RAIL_EN, Level::Low));
}

#[test]
fn missing_rtc_shows_red_over_magenta() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut rig = Rig::new();
    rig.i2c = RefCell::new(MockI2c::full_board().without(pins::RTC_ADDR));

    let outcome = rig.run(&cfg).unwrap();

    assert_eq!(failing(&outcome), vec![TestId::RtcResponding]);
    assert_eq!(outcome.indication, indication(Colour::Red, Colour::Magenta));
}

#[test]
fn rtc_claimed_by_kernel_counts_as_present() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut rig = Rig::new();

    let outcome = rig.run(&cfg).unwrap();

    assert!(outcome.results.get(TestId::RtcResponding));
    assert!(!rig.i2c.borrow().reads.contains(&pins::RTC_ADDR));
}

#[test]
fn missing_led_controller_still_publishes_a_record() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut rig = Rig::new();
    rig.i2c = RefCell::new(MockI2c::full_board().without(pins::LED_CONTROLLER_ADDR));

    let outcome = rig.run(&cfg).unwrap();

    assert_eq!(outcome.indication, indication(Colour::Red, Colour::Blue));
    assert!(!ResultsRecord::parse(&std::fs::read_to_string(&outcome.record_path).unwrap())
        .unwrap()
        .passed());
}

#[test]
fn silent_external_microphone_shows_blue_over_magenta() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut rig = Rig::new();
    rig.audio.external = Some(vec![3; 4410]);

    let outcome = rig.run(&cfg).unwrap();

    assert_eq!(failing(&outcome), vec![TestId::ExternalMicrophoneSignalPresent]);
    assert_eq!(outcome.indication, indication(Colour::Blue, Colour::Magenta));
}

#[test]
fn failures_in_two_categories_show_white() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut rig = Rig::new();
    rig.board.state_mut().iccid = None;
    rig.audio.internal = Some(vec![0; 4410]);

    let outcome = rig.run(&cfg).unwrap();

    assert_eq!(outcome.indication, indication(Colour::White, Colour::Black));
    assert_eq!(rig.events.last(), Some(&FactoryEvent::Finished { passed: false }));
}

// ── Phase errors ──────────────────────────────────────────────

#[test]
fn failed_service_stop_skips_only_the_modem_phase() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut rig = Rig::new();
    rig.services.fail = true;

    let outcome = rig.run(&cfg).unwrap();

    assert_eq!(rig.phase_failures(), vec![Category::Modem]);
    assert_eq!(failing(&outcome), Category::Modem.tests().collect::<Vec<_>>());
    assert!(rig.board.state().at_log.is_empty(), "modem never touched");
    assert_eq!(outcome.indication, indication(Colour::Yellow, Colour::White));
}

#[test]
fn internal_capture_error_still_tests_the_external_microphone() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut rig = Rig::new();
    rig.audio.internal = None;

    let outcome = rig.run(&cfg).unwrap();

    assert_eq!(rig.phase_failures(), vec![Category::Recording]);
    assert_eq!(failing(&outcome), vec![TestId::InternalMicrophoneSignalPresent]);
    assert_eq!(outcome.indication, indication(Colour::Blue, Colour::Red));
    let sources: Vec<AudioSource> = rig.audio.calls.iter().map(|(source, _)| *source).collect();
    assert_eq!(sources, vec![AudioSource::Internal, AudioSource::External]);
    assert!(rig.board.state().is_driven(pins::I2S_BRIDGE_SHDNZ, Level::Low));
}

#[test]
fn external_capture_error_fails_only_the_external_microphone() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut rig = Rig::new();
    rig.audio.external = None;

    let outcome = rig.run(&cfg).unwrap();

    assert_eq!(rig.phase_failures(), vec![Category::Recording]);
    assert_eq!(failing(&outcome), vec![TestId::ExternalMicrophoneSignalPresent]);
    assert_eq!(outcome.indication, indication(Colour::Blue, Colour::Magenta));
}

#[test]
fn held_modem_lock_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let _other = ExclusiveLock::acquire(&cfg.modem.lock_path, cfg.modem.lock_timeout()).unwrap();
    let mut rig = Rig::new();

    let err = rig.run(&cfg).unwrap_err();

    assert!(matches!(err, Error::ResourceBusy { .. }));
    assert!(!cfg.factory.results_path.exists(), "no record for an invalid run");
    assert!(!rig.events.iter().any(|e| matches!(e, FactoryEvent::Finished { .. })));
}

#[test]
fn held_soundcard_lock_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let _other =
        ExclusiveLock::acquire(&cfg.soundcard.lock_path, cfg.soundcard.lock_timeout()).unwrap();
    let mut rig = Rig::new();

    let err = rig.run(&cfg).unwrap_err();
    assert!(matches!(err, Error::ResourceBusy { .. }));
}

// ── Record and boot status ────────────────────────────────────

#[test]
fn record_is_published_and_linked() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let mut rig = Rig::new();
    rig.board.state_mut().iccid = None;

    let outcome = rig.run(&cfg).unwrap();

    let text = std::fs::read_to_string(&cfg.factory.results_path).unwrap();
    assert!(text.contains(&format!("Device serial: {SERIAL}")));
    assert!(text.contains("modem_sim_readable: FAIL"));
    assert!(text.contains("Overall: FAIL"));
    assert_eq!(outcome.record_path, cfg.factory.results_path);

    let target = std::fs::read_link(&cfg.factory.results_link).unwrap();
    assert_eq!(target, cfg.factory.results_path);

    let parsed = ResultsRecord::parse(&text).unwrap();
    assert_eq!(parsed.serial, SERIAL);
    assert_eq!(parsed.results, outcome.results);
}

#[test]
fn rerun_replaces_record_and_link() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());

    let mut failing_rig = Rig::new();
    failing_rig.board.state_mut().iccid = None;
    failing_rig.run(&cfg).unwrap();

    let mut healthy = Rig::new();
    healthy.run(&cfg).unwrap();

    let text = std::fs::read_to_string(&cfg.factory.results_link).unwrap();
    assert!(text.contains("Overall: PASS"));
}

#[test]
fn boot_status_follows_the_stored_verdict() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let i2c = RefCell::new(MockI2c::full_board());

    {
        let mut leds = LedBank::new(RefCellDevice::new(&i2c));
        assert!(!factory::show_boot_status(&mut leds, &cfg.factory).unwrap());
        assert_eq!(leds.colour(LedId::Middle), Some(Colour::Red));
    }

    Rig::new().run(&cfg).unwrap();

    let mut leds = LedBank::new(RefCellDevice::new(&i2c));
    assert!(factory::show_boot_status(&mut leds, &cfg.factory).unwrap());
    assert_eq!(leds.colour(LedId::Top), Some(Colour::Magenta));
    assert_eq!(leds.colour(LedId::Middle), Some(Colour::Green));
    assert_eq!(leds.colour(LedId::Bottom), Some(Colour::Red));
}

#[test]
fn trigger_file_requests_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    assert!(!factory::trigger_present(&cfg.factory));

    std::fs::create_dir_all(cfg.factory.trigger_path.parent().unwrap()).unwrap();
    std::fs::write(&cfg.factory.trigger_path, "").unwrap();
    assert!(factory::trigger_present(&cfg.factory));
}
