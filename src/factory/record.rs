//! Human-readable factory results record.
//!
//! ```text
//!   Bugg factory test results
//!   Device serial: RPiID-00000000a1b2c3d4
//!   modem_enumerated: PASS
//!   ...
//!   external_microphone_signal_present: FAIL
//!   Overall: FAIL
//! ```
//!
//! The record is written world-readable and linked from `/etc/issue.d`,
//! so getty prints it above the login prompt.  The same file is read back
//! at boot to decide the status LED colour.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::Path;

use log::{info, warn};

use crate::adapters::state_file::write_atomic;
use crate::error::{Error, Result};
use crate::factory::results::{TestId, TestResults};

const HEADER: &str = "Bugg factory test results";
const SERIAL_PREFIX: &str = "Device serial: ";
const OVERALL_PREFIX: &str = "Overall: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsRecord {
    pub serial: String,
    pub results: TestResults,
}

fn verdict(passed: bool) -> &'static str {
    if passed { "PASS" } else { "FAIL" }
}

fn parse_verdict(s: &str) -> Option<bool> {
    match s.trim() {
        "PASS" => Some(true),
        "FAIL" => Some(false),
        _ => None,
    }
}

impl ResultsRecord {
    pub fn new(serial: impl Into<String>, results: TestResults) -> Self {
        Self {
            serial: serial.into(),
            results,
        }
    }

    pub fn passed(&self) -> bool {
        self.results.all_passed()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{HEADER}");
        let _ = writeln!(out, "{SERIAL_PREFIX}{}", self.serial);
        for (test, passed) in self.results.iter() {
            let _ = writeln!(out, "{}: {}", test.key(), verdict(passed));
        }
        let _ = writeln!(out, "{OVERALL_PREFIX}{}", verdict(self.passed()));
        out
    }

    /// Parse a rendered record.
    ///
    /// Every test line must be present and the overall line must agree
    /// with them; anything else is [`Error::PersistenceDegraded`].
    pub fn parse(text: &str) -> Result<Self> {
        let corrupt = |what: &str| Error::PersistenceDegraded(format!("results record: {what}"));

        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        if lines.next() != Some(HEADER) {
            return Err(corrupt("missing header"));
        }
        let serial = lines
            .next()
            .and_then(|l| l.strip_prefix(SERIAL_PREFIX))
            .ok_or_else(|| corrupt("missing serial"))?
            .to_string();

        let mut results = TestResults::new();
        let mut seen = [false; TestId::COUNT];
        let mut overall = None;
        for line in lines {
            if let Some(v) = line.strip_prefix(OVERALL_PREFIX) {
                overall = Some(parse_verdict(v).ok_or_else(|| corrupt("bad overall verdict"))?);
                continue;
            }
            let (key, v) = line.split_once(':').ok_or_else(|| corrupt("malformed line"))?;
            let test = TestId::from_key(key.trim()).ok_or_else(|| corrupt("unknown test key"))?;
            let passed = parse_verdict(v).ok_or_else(|| corrupt("bad test verdict"))?;
            results.set(test, passed);
            seen[test as usize] = true;
        }

        if !seen.iter().all(|&s| s) {
            return Err(corrupt("missing test lines"));
        }
        let record = Self { serial, results };
        match overall {
            Some(o) if o == record.passed() => Ok(record),
            Some(_) => Err(corrupt("overall verdict disagrees with tests")),
            None => Err(corrupt("missing overall verdict")),
        }
    }

    /// Write the record (mode 0644) and point `link` at it.
    pub fn publish(&self, path: &Path, link: &Path) -> Result<()> {
        write_atomic(path, self.render().as_bytes(), 0o644)?;
        info!("factory: results written to {}", path.display());

        if let Some(parent) = link.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        match fs::symlink_metadata(link) {
            Ok(_) => fs::remove_file(link)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        symlink(path, link)?;
        Ok(())
    }
}

/// Whether a stored record says the device passed its factory test.
///
/// A missing or unreadable record counts as not passed.
pub fn passed_at_factory(path: &Path) -> bool {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("factory: cannot read {}: {}", path.display(), e);
            }
            return false;
        }
    };
    match ResultsRecord::parse(&text) {
        Ok(record) => record.passed(),
        Err(e) => {
            warn!("factory: {}", e);
            false
        }
    }
}
