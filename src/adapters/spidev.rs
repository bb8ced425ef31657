//! Linux `spidev` adapter implementing [`embedded_hal::spi::SpiDevice`].
//!
//! Plain `write(2)`/`read(2)` on `/dev/spidevB.C`: each call is one
//! chip-select assertion.  That is all the soundcard needs (one 2-byte
//! frame per update); full-duplex transfers are emulated as a write
//! followed by a read.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use embedded_hal::spi::{self, ErrorKind, ErrorType, Operation, SpiDevice};
use log::debug;

/// `_IOW('k', 4, u32)`
const SPI_IOC_WR_MAX_SPEED_HZ: u32 = 0x4004_6b04;

#[derive(Debug)]
pub struct SpidevError(pub io::Error);

impl spi::Error for SpidevError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl From<io::Error> for SpidevError {
    fn from(e: io::Error) -> Self {
        Self(e)
    }
}

pub struct Spidev {
    path: PathBuf,
    file: File,
}

impl Spidev {
    /// Open `/dev/spidev{bus}.{chip_select}` and set the clock rate.
    pub fn open(bus: u8, chip_select: u8, max_speed_hz: u32) -> io::Result<Self> {
        let path = PathBuf::from(format!("/dev/spidev{bus}.{chip_select}"));
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        // SAFETY: valid fd for the lifetime of `file`; the request takes a
        // pointer to a u32 that outlives the call.
        let rc = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                SPI_IOC_WR_MAX_SPEED_HZ as _,
                &max_speed_hz as *const u32,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        debug!("spidev: {} at {} Hz", path.display(), max_speed_hz);
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl ErrorType for Spidev {
    type Error = SpidevError;
}

impl SpiDevice for Spidev {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), SpidevError> {
        for op in operations {
            match op {
                Operation::Write(buf) => self.file.write_all(buf)?,
                Operation::Read(buf) => self.file.read_exact(buf)?,
                Operation::Transfer(read, write) => {
                    self.file.write_all(write)?;
                    self.file.read_exact(read)?;
                }
                Operation::TransferInPlace(buf) => {
                    self.file.write_all(buf)?;
                    self.file.read_exact(buf)?;
                }
                Operation::DelayNs(ns) => thread::sleep(Duration::from_nanos(u64::from(*ns))),
            }
        }
        Ok(())
    }
}
