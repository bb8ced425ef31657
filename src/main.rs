//! buggctl: control tool for the Bugg recorder hardware.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  buggctl (clap)                                              │
//! │      │                                                       │
//! │      ▼                                                       │
//! │  Linux adapters            SysfsGpio  SysfsUsb  TtyChannel   │
//! │                            Spidev     I2cDev    Arecord      │
//! │  ─────────────── Port Trait Boundary ────────────────────    │
//! │  Drivers                   Modem  Soundcard  LedBank  Bridge │
//! │  FactoryTest               phases · classify · record        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every command constructs its drivers, so the per-peripheral locks keep
//! concurrent invocations (and the recorder daemon) from interleaving.

use std::cell::RefCell;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use embedded_hal_bus::i2c::RefCellDevice;
use log::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use bugg::adapters::arecord::Arecord;
use bugg::adapters::clock::SystemClock;
use bugg::adapters::device_id;
use bugg::adapters::gpio_sysfs::SysfsGpio;
use bugg::adapters::i2c_dev::I2cDev;
use bugg::adapters::log_sink::LogEventSink;
use bugg::adapters::spidev::Spidev;
use bugg::adapters::systemctl::Systemctl;
use bugg::adapters::tty::TtyChannel;
use bugg::adapters::usb_sysfs::SysfsUsb;
use bugg::config::DeviceConfig;
use bugg::drivers::at::RSSI_UNKNOWN;
use bugg::drivers::leds::LedBank;
use bugg::drivers::modem::Modem;
use bugg::drivers::soundcard::{PhantomMode, Soundcard};
use bugg::factory::{self, Bench, FactoryTest};
use bugg::pins;

/// Exit code when no factory run was requested.
const EXIT_SKIPPED: u8 = 2;

/// buggctl - Bugg recorder hardware control
#[derive(Parser, Debug)]
#[command(name = "buggctl")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "/etc/bugg/bugg.json")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Soundcard power, gain and phantom control
    Soundcard {
        #[command(subcommand)]
        action: SoundcardAction,
    },

    /// Modem power control and status
    Modem {
        #[command(subcommand)]
        action: ModemAction,
    },

    /// Run the factory self-test
    FactoryTest {
        /// Run even if the trigger file is absent
        #[arg(long)]
        force: bool,
    },

    /// Show the stored factory verdict on the LEDs
    FactoryStatus,
}

#[derive(Subcommand, Debug)]
enum SoundcardAction {
    /// Switch the external microphone rail
    Power { state: Switch },
    /// Set the gain step (0-20, 3 dB each)
    Gain { gain: u8 },
    /// Set phantom power: none, pip, 3v3 or p48
    Phantom { mode: PhantomMode },
    /// Print the current state
    Status,
}

#[derive(Subcommand, Debug)]
enum ModemAction {
    On,
    Off,
    Status,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Switch {
    On,
    Off,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("buggctl: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = DeviceConfig::load(&cli.config).context("loading configuration")?;

    match cli.command {
        Commands::Soundcard { action } => soundcard(&config, action)?,
        Commands::Modem { action } => return modem(&config, action),
        Commands::FactoryTest { force } => return factory_test(&config, force),
        Commands::FactoryStatus => factory_status(&config)?,
    }
    Ok(ExitCode::SUCCESS)
}

// ── Soundcard ──────────────────────────────────────────────────

fn soundcard(config: &DeviceConfig, action: SoundcardAction) -> Result<()> {
    let spi = Spidev::open(pins::SPI_BUS, pins::SPI_CHIP_SELECT, pins::SPI_MAX_SPEED_HZ)
        .context("opening soundcard SPI device")?;
    let mut card = Soundcard::new(&config.soundcard, spi, SysfsGpio::new())?;

    match action {
        SoundcardAction::Power { state: Switch::On } => card.enable()?,
        SoundcardAction::Power { state: Switch::Off } => card.disable()?,
        SoundcardAction::Gain { gain } => card.set_gain(gain)?,
        SoundcardAction::Phantom { mode } => card.set_phantom_mode(mode)?,
        SoundcardAction::Status => {}
    }

    let state = card.state();
    println!("power:   {}", if card.is_enabled() { "on" } else { "off" });
    println!("gain:    {} ({} dB)", state.gain, u32::from(state.gain) * 3);
    println!("phantom: {}", state.phantom);
    Ok(())
}

// ── Modem ──────────────────────────────────────────────────────

fn modem(config: &DeviceConfig, action: ModemAction) -> Result<ExitCode> {
    let mut modem = Modem::new(
        &config.modem,
        SysfsGpio::new(),
        SysfsUsb::new(),
        TtyChannel::new(&config.modem.at_device),
        SystemClock::new(),
    )?;

    match action {
        ModemAction::On => {
            if !modem.power_on() {
                bail!("modem did not enumerate");
            }
            println!("modem on");
        }
        ModemAction::Off => {
            if !modem.power_off() {
                warn!("modem needed an emergency reset; rail is off");
                return Ok(ExitCode::FAILURE);
            }
            println!("modem off");
        }
        ModemAction::Status => {
            let enumerated = modem.is_enumerated();
            println!("rail:       {}", if modem.rail_is_on() { "on" } else { "off" });
            println!("enumerated: {}", enumerated);
            if enumerated {
                println!("responding: {}", modem.is_responding());
                match modem.sim_ccid() {
                    Some(iccid) => println!("sim:        {}", iccid),
                    None => println!("sim:        not readable"),
                }
                match modem.rssi() {
                    Ok(RSSI_UNKNOWN) => println!("rssi:       unknown"),
                    Ok(rssi) => println!("rssi:       {}", rssi),
                    Err(e) => println!("rssi:       {}", e),
                }
            }
            println!("state:      {:?}", modem.power_state());
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ── Factory test ───────────────────────────────────────────────

fn factory_test(config: &DeviceConfig, force: bool) -> Result<ExitCode> {
    if !force && !factory::trigger_present(&config.factory) {
        info!(
            "no factory test requested ({} absent)",
            config.factory.trigger_path.display()
        );
        return Ok(ExitCode::from(EXIT_SKIPPED));
    }

    let i2c = RefCell::new(I2cDev::open(pins::I2C_BUS).context("opening I2C bus")?);
    let mut spi = Spidev::open(pins::SPI_BUS, pins::SPI_CHIP_SELECT, pins::SPI_MAX_SPEED_HZ)
        .context("opening soundcard SPI device")?;
    let mut gpio = SysfsGpio::new();
    let mut usb = SysfsUsb::new();
    let mut at = TtyChannel::new(&config.modem.at_device);
    let mut clock = SystemClock::new();
    let mut services = Systemctl;
    let mut audio = Arecord::new(&config.factory);
    let mut leds = LedBank::new(RefCellDevice::new(&i2c));

    let serial = device_id::current();
    let mut bench = Bench {
        gpio: &mut gpio,
        usb: &mut usb,
        at: &mut at,
        clock: &mut clock,
        services: &mut services,
        audio: &mut audio,
        i2c: &i2c,
        spi: &mut spi,
    };

    let outcome = FactoryTest::new(config, serial.as_str(), LogEventSink::new())
        .run(&mut bench, &mut leds)
        .context("factory test")?;

    println!("{}", std::fs::read_to_string(&outcome.record_path).unwrap_or_default());
    Ok(if outcome.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn factory_status(config: &DeviceConfig) -> Result<()> {
    let i2c = I2cDev::open(pins::I2C_BUS).context("opening I2C bus")?;
    let mut leds = LedBank::new(i2c);
    let passed = factory::show_boot_status(&mut leds, &config.factory)?;
    leds.stay_on_at_exit(true);
    println!("passed at factory: {}", if passed { "yes" } else { "no" });
    Ok(())
}
