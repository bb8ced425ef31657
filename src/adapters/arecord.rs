//! ALSA capture through `arecord` for the [`AudioCapture`] port.
//!
//! Records mono S16_LE raw PCM to stdout and decodes it in memory.

use std::io;
use std::process::Command;
use std::time::Duration;

use log::debug;

use crate::app::ports::{AudioCapture, AudioSource};
use crate::config::FactoryConfig;

pub struct Arecord {
    internal_card: u32,
    external_card: u32,
    sample_rate_hz: u32,
}

impl Arecord {
    pub fn new(config: &FactoryConfig) -> Self {
        Self {
            internal_card: config.internal_capture_card,
            external_card: config.external_capture_card,
            sample_rate_hz: config.sample_rate_hz,
        }
    }

    fn card(&self, source: AudioSource) -> u32 {
        match source {
            AudioSource::Internal => self.internal_card,
            AudioSource::External => self.external_card,
        }
    }
}

/// Decode little-endian 16-bit samples; a trailing odd byte is dropped.
pub fn decode_s16le(raw: &[u8]) -> Vec<i16> {
    raw.chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

impl AudioCapture for Arecord {
    fn record(&mut self, source: AudioSource, duration: Duration) -> io::Result<Vec<i16>> {
        // arecord only takes whole seconds.
        let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
        let device = format!("plughw:{},0", self.card(source));
        debug!("arecord: {:?} from {} for {}s", source, device, secs);

        let output = Command::new("arecord")
            .args(["-q", "-D", &device, "-t", "raw", "-f", "S16_LE", "-c", "1"])
            .args(["-r", &self.sample_rate_hz.to_string()])
            .args(["-d", &secs.max(1).to_string()])
            .output()?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "arecord on {device}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(decode_s16le(&output.stdout))
    }
}
