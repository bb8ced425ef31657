//! Non-blocking tty adapter for the modem's AT port.
//!
//! The RC7620 exposes its AT interface as a USB serial function
//! (`/dev/ttyUSB2`).  Baud rate is irrelevant on a USB function, so the
//! port is used as-is.  Reads never block: they drain whatever the driver
//! has buffered.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

use log::debug;

use crate::app::ports::AtChannel;

pub struct TtyChannel {
    path: PathBuf,
    file: Option<File>,
}

impl TtyChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "AT channel not open"))
    }
}

impl AtChannel for TtyChannel {
    fn open(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
            .open(&self.path)?;
        debug!("tty: opened {}", self.path.display());
        self.file = Some(file);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let file = self.file()?;
        file.write_all(bytes)?;
        file.flush()
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let file = self.file()?;
        let mut out = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            debug!("tty: closed {}", self.path.display());
        }
    }
}
