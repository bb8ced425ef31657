//! Adapters: concrete Linux implementations of the port traits.
//!
//! | Adapter      | Implements            | Connects to                      |
//! |--------------|-----------------------|----------------------------------|
//! | `gpio_sysfs` | GpioPort              | `/sys/class/gpio`                |
//! | `usb_sysfs`  | UsbBus                | `/sys/bus/usb/devices`           |
//! | `tty`        | AtChannel             | modem AT tty (`/dev/ttyUSB2`)    |
//! | `clock`      | Clock                 | `std::thread::sleep`             |
//! | `systemctl`  | ServiceControl        | systemd                          |
//! | `arecord`    | AudioCapture          | ALSA via `arecord`               |
//! | `spidev`     | embedded-hal SpiDevice| `/dev/spidevB.C`                 |
//! | `i2c_dev`    | embedded-hal I2c      | `/dev/i2c-N`                     |
//! | `log_sink`   | EventSink             | `log` facade                     |
//! | `state_file` |                       | JSON records, atomic replace     |
//! | `device_id`  |                       | `/proc/cpuinfo` serial           |

pub mod arecord;
pub mod clock;
pub mod device_id;
pub mod gpio_sysfs;
pub mod i2c_dev;
pub mod log_sink;
pub mod spidev;
pub mod state_file;
pub mod systemctl;
pub mod tty;
pub mod usb_sysfs;
