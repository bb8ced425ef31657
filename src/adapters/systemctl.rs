//! systemd adapter for the [`ServiceControl`] port.

use std::io;
use std::process::Command;

use log::info;

use crate::app::ports::ServiceControl;

#[derive(Debug, Default)]
pub struct Systemctl;

impl ServiceControl for Systemctl {
    fn stop(&mut self, service: &str) -> io::Result<()> {
        let output = Command::new("systemctl").args(["stop", service]).output()?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "systemctl stop {service}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        info!("stopped {}", service);
        Ok(())
    }
}
