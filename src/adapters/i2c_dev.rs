//! Linux `i2c-dev` adapter implementing [`embedded_hal::i2c::I2c`].
//!
//! Selects the target with the `I2C_SLAVE` ioctl, then uses plain
//! `read(2)`/`write(2)`.  The kernel refuses `I2C_SLAVE` with `EBUSY` for
//! an address a kernel driver has claimed (the RTC), which is what
//! [`BusyCondition`] reports.  Multi-operation transactions are issued as
//! separate transfers (no repeated start).

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;

use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::drivers::probe::BusyCondition;

/// `I2C_SLAVE` from `linux/i2c-dev.h`.
const I2C_SLAVE: u32 = 0x0703;

#[derive(Debug)]
pub enum I2cDevError {
    /// Address claimed by a kernel driver, or the device answered busy.
    Busy,
    Io(io::Error),
}

impl From<io::Error> for I2cDevError {
    fn from(e: io::Error) -> Self {
        if e.raw_os_error() == Some(libc::EBUSY) {
            Self::Busy
        } else {
            Self::Io(e)
        }
    }
}

impl i2c::Error for I2cDevError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Busy => ErrorKind::Other,
            Self::Io(e) => match e.raw_os_error() {
                Some(libc::ENXIO | libc::EREMOTEIO) => {
                    ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
                }
                Some(libc::EAGAIN) => ErrorKind::ArbitrationLoss,
                _ => ErrorKind::Other,
            },
        }
    }
}

impl BusyCondition for I2cDevError {
    fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

pub struct I2cDev {
    file: File,
}

impl I2cDev {
    /// Open `/dev/i2c-{bus}`.
    pub fn open(bus: u8) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(format!("/dev/i2c-{bus}"))?;
        Ok(Self { file })
    }

    fn select(&mut self, address: u8) -> Result<(), I2cDevError> {
        // SAFETY: valid fd; I2C_SLAVE takes the address by value.
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                I2C_SLAVE as _,
                libc::c_ulong::from(address),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }
}

impl ErrorType for I2cDev {
    type Error = I2cDevError;
}

impl I2c for I2cDev {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.select(address)?;
        for op in operations {
            match op {
                Operation::Read(buf) => self.file.read_exact(buf)?,
                Operation::Write(buf) => self.file.write_all(buf)?,
            }
        }
        Ok(())
    }
}
