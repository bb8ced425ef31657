//! Factory self-test.
//!
//! Three phases run in order against the real peripherals:
//!
//! | Phase        | Tests                                               |
//! |--------------|-----------------------------------------------------|
//! | modem        | enumerated, responsive, SIM readable, towers found  |
//! | bus presence | I2S bridge, RTC, LED controller answer on I²C       |
//! | recording    | internal and external microphone carry signal      |
//!
//! A phase that fails part-way is reported with
//! [`FactoryEvent::PhaseFailed`] and its remaining tests stay failed; the
//! next phase still runs.  The exception is [`Error::ResourceBusy`]: another
//! process owns a peripheral, so the whole run is invalid and the error is
//! returned to the caller.  In the recording phase the two microphones are
//! independent: a failed internal capture is reported the same way and the
//! external microphone is still tested.
//!
//! The verdict is shown on the top and middle LEDs (see [`classify`]) and
//! written to a results record (see [`record`]).

pub mod classify;
pub mod record;
pub mod results;
pub mod signal;

use core::cell::RefCell;
use std::path::PathBuf;
use std::time::Duration;

use embedded_hal::i2c::I2c;
use embedded_hal::spi::SpiDevice;
use embedded_hal_bus::i2c::RefCellDevice;
use log::{debug, info, warn};

use crate::app::events::FactoryEvent;
use crate::app::ports::{
    AtChannel, AudioCapture, AudioSource, Clock, EventSink, GpioPort, ServiceControl, UsbBus,
};
use crate::config::{DeviceConfig, FactoryConfig};
use crate::drivers::bridge::I2sBridge;
use crate::drivers::leds::{Colour, LedBank, LedId};
use crate::drivers::modem::Modem;
use crate::drivers::probe::{self, BusyCondition};
use crate::drivers::soundcard::Soundcard;
use crate::error::{Error, Result};
use crate::pins;

use self::classify::Indication;
use self::record::ResultsRecord;
use self::results::{Category, TestId, TestResults};

/// Everything the factory test drives.
///
/// The I²C bus is shared with the LED bank through a `RefCell`, so the
/// caller builds the bank from the same cell.
pub struct Bench<'a, I, S> {
    pub gpio: &'a mut dyn GpioPort,
    pub usb: &'a mut dyn UsbBus,
    pub at: &'a mut dyn AtChannel,
    pub clock: &'a mut dyn Clock,
    pub services: &'a mut dyn ServiceControl,
    pub audio: &'a mut dyn AudioCapture,
    pub i2c: &'a RefCell<I>,
    pub spi: &'a mut S,
}

/// Result of a complete run.
#[derive(Debug, Clone, PartialEq)]
pub struct FactoryOutcome {
    pub results: TestResults,
    pub indication: Indication,
    pub record_path: PathBuf,
}

impl FactoryOutcome {
    pub fn passed(&self) -> bool {
        self.results.all_passed()
    }
}

pub struct FactoryTest<'c, E: EventSink> {
    config: &'c DeviceConfig,
    serial: String,
    events: E,
}

impl<'c, E: EventSink> FactoryTest<'c, E> {
    pub fn new(config: &'c DeviceConfig, serial: impl Into<String>, events: E) -> Self {
        Self {
            config,
            serial: serial.into(),
            events,
        }
    }

    /// Run all phases, show the verdict and publish the record.
    ///
    /// The LED bank is left lit after it is dropped.
    pub fn run<I, S, L>(
        &mut self,
        bench: &mut Bench<'_, I, S>,
        leds: &mut LedBank<L>,
    ) -> Result<FactoryOutcome>
    where
        I: I2c,
        I::Error: BusyCondition,
        S: SpiDevice,
        L: I2c,
    {
        info!("factory: test running");
        let mut results = TestResults::new();

        for phase in Category::ALL {
            self.events.emit(&FactoryEvent::PhaseStarted(phase));
            let outcome = match phase {
                Category::Modem => self.modem_phase(bench, &mut results),
                Category::BusPresence => self.bus_phase(bench, &mut results),
                Category::Recording => self.recording_phase(bench, &mut results),
            };
            match outcome {
                Ok(()) => {}
                Err(e) if e.is_fatal() => {
                    warn!("factory: aborting, {}", e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("factory: {:?} phase did not complete: {}", phase, e);
                    self.events.emit(&FactoryEvent::PhaseFailed {
                        phase,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let indication = classify::classify(&results);
        for (led, colour) in [(LedId::Top, indication.top), (LedId::Middle, indication.middle)] {
            if let Err(e) = leds.set(led, colour) {
                warn!("factory: cannot show {:?} on {:?} LED: {}", colour, led, e);
            }
        }
        leds.stay_on_at_exit(true);
        self.events.emit(&FactoryEvent::Indicated(indication));

        let passed = results.all_passed();
        self.events.emit(&FactoryEvent::Finished { passed });
        info!("factory: test completed, {}", if passed { "PASS" } else { "FAIL" });

        let factory = &self.config.factory;
        ResultsRecord::new(self.serial.clone(), results)
            .publish(&factory.results_path, &factory.results_link)?;

        Ok(FactoryOutcome {
            results,
            indication,
            record_path: factory.results_path.clone(),
        })
    }

    fn record(&mut self, results: &mut TestResults, test: TestId, passed: bool) {
        results.set(test, passed);
        debug!("factory: {} -> {}", test, passed);
        self.events.emit(&FactoryEvent::TestCompleted { test, passed });
    }

    // ── Phases ─────────────────────────────────────────────────

    fn modem_phase<I, S>(&mut self, bench: &mut Bench<'_, I, S>, results: &mut TestResults) -> Result<()> {
        let cfg = self.config;
        bench.services.stop(&cfg.factory.modem_service)?;

        let mut modem = Modem::new(
            &cfg.modem,
            &mut *bench.gpio,
            &mut *bench.usb,
            &mut *bench.at,
            &mut *bench.clock,
        )?;

        // Power-cycle so the test starts from a cold boot.
        modem.power_off();
        let enumerated = modem.power_on() && modem.is_enumerated();
        self.record(results, TestId::ModemEnumerated, enumerated);

        let responsive = modem.is_responding();
        self.record(results, TestId::ModemResponsive, responsive);

        let sim = modem.sim_present();
        self.record(results, TestId::ModemSimReadable, sim);

        let interval = Duration::from_millis(cfg.factory.rssi_interval_ms);
        let towers = modem.wait_for_signal(cfg.factory.rssi_polls, interval).is_some();
        self.record(results, TestId::ModemTowersFound, towers);

        if !modem.power_off() {
            warn!("factory: modem did not shut down cleanly");
        }
        Ok(())
    }

    fn bus_phase<I, S>(&mut self, bench: &mut Bench<'_, I, S>, results: &mut TestResults) -> Result<()>
    where
        I: I2c,
        I::Error: BusyCondition,
    {
        let mut bridge =
            I2sBridge::new(&mut *bench.gpio, RefCellDevice::new(bench.i2c), &mut *bench.clock)?;
        let powered = bridge.power_on();

        if powered.is_ok() {
            let mut bus = RefCellDevice::new(bench.i2c);
            let probes = [
                (TestId::I2sBridgeResponding, pins::I2S_BRIDGE_ADDR),
                (TestId::RtcResponding, pins::RTC_ADDR),
                (TestId::LedControllerResponding, pins::LED_CONTROLLER_ADDR),
            ];
            for (test, address) in probes {
                let present = probe::is_present(&mut bus, address);
                self.record(results, test, present);
            }
        }

        let off = bridge.power_off();
        powered.and(off)
    }

    fn recording_phase<I, S>(&mut self, bench: &mut Bench<'_, I, S>, results: &mut TestResults) -> Result<()>
    where
        I: I2c,
        S: SpiDevice,
    {
        let cfg = self.config;
        let factory: &FactoryConfig = &cfg.factory;
        let duration = Duration::from_millis(factory.record_ms);
        let threshold = factory.variance_threshold;

        // Internal microphone, behind the I2S bridge.  A capture failure here
        // fails only this microphone; the external one is still tested.
        let internal = I2sBridge::new(
            &mut *bench.gpio,
            RefCellDevice::new(bench.i2c),
            &mut *bench.clock,
        )
        .and_then(|mut bridge| {
            let captured = bridge
                .power_on()
                .and_then(|()| bridge.configure())
                .and_then(|()| {
                    bench
                        .audio
                        .record(AudioSource::Internal, duration)
                        .map_err(Error::from)
                });
            if let Err(e) = bridge.power_off() {
                warn!("factory: i2s bridge did not power off: {}", e);
            }
            captured
        });
        let live = match internal {
            Ok(samples) => self.judge("internal", &samples, threshold),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("factory: internal microphone capture failed: {}", e);
                self.events.emit(&FactoryEvent::PhaseFailed {
                    phase: Category::Recording,
                    reason: e.to_string(),
                });
                false
            }
        };
        self.record(results, TestId::InternalMicrophoneSignalPresent, live);

        // External microphone, through the soundcard.
        let mut card = Soundcard::new(&cfg.soundcard, &mut *bench.spi, &mut *bench.gpio)?;
        card.enable()?;
        let captured = bench.audio.record(AudioSource::External, duration);
        if let Err(e) = card.disable() {
            warn!("factory: soundcard did not power off: {}", e);
        }
        drop(card);
        let external = captured?;
        let live = self.judge("external", &external, threshold);
        self.record(results, TestId::ExternalMicrophoneSignalPresent, live);
        Ok(())
    }

    fn judge(&self, which: &str, samples: &[i16], threshold: f64) -> bool {
        let variance = signal::variance(samples);
        info!(
            "factory: {} microphone variance {:.1} over {} samples (threshold {:.1})",
            which,
            variance,
            samples.len(),
            threshold
        );
        signal::signal_present(samples, threshold)
    }
}

/// Whether a factory run has been requested for this boot.
pub fn trigger_present(config: &FactoryConfig) -> bool {
    config.trigger_path.exists()
}

/// Boot-time status display.
///
/// Top Magenta and bottom Red mark "booted"; the middle LED is Green if the
/// stored record says the device passed at the factory, Red otherwise.
pub fn show_boot_status<L: I2c>(leds: &mut LedBank<L>, config: &FactoryConfig) -> Result<bool> {
    let passed = record::passed_at_factory(&config.results_path);
    leds.set(LedId::Top, Colour::Magenta)?;
    leds.set(LedId::Bottom, Colour::Red)?;
    leds.set(LedId::Middle, if passed { Colour::Green } else { Colour::Red })?;
    Ok(passed)
}
