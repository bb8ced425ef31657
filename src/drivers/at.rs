//! AT response classification and field parsing.
//!
//! Pure functions over the free-text replies the modem returns.  Replies
//! usually carry the echoed command, the information lines and a final
//! result code, separated by CR/LF:
//!
//! ```text
//!   AT+CSQ\r\r\n+CSQ: 17,99\r\n\r\nOK\r\n
//! ```

use heapless::String;

/// Signal-quality value meaning "not known or not detectable".
pub const RSSI_UNKNOWN: u8 = 99;

/// Longest ICCID we accept (ITU-T E.118 allows up to 22 characters).
pub const ICCID_MAX_LEN: usize = 22;

pub type Iccid = String<24>;

/// Final result code of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtResponse {
    Ok,
    Error,
    /// Neither `OK` nor an error code found.
    Other,
}

fn lines(response: &str) -> impl Iterator<Item = &str> {
    response
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
}

fn is_error_line(line: &str) -> bool {
    line == "ERROR" || line.starts_with("+CME ERROR") || line.starts_with("+CMS ERROR")
}

/// Classify a reply by its last result-code line.
pub fn classify(response: &str) -> AtResponse {
    let mut verdict = AtResponse::Other;
    for line in lines(response) {
        if line == "OK" {
            verdict = AtResponse::Ok;
        } else if is_error_line(line) {
            verdict = AtResponse::Error;
        }
    }
    verdict
}

/// Extract the ICCID from an `AT+CCID?` reply.
///
/// Returns `None` when any line is an error code, or when no `+CCID:` line
/// carries a plausible identifier.
pub fn parse_ccid(response: &str) -> Option<Iccid> {
    if lines(response).any(is_error_line) {
        return None;
    }
    let value = lines(response).find_map(|line| {
        let (tag, rest) = line.split_once(':')?;
        tag.trim_start_matches('+')
            .eq_ignore_ascii_case("CCID")
            .then(|| rest.trim().trim_matches('"'))
    })?;

    // Digits, with an optional trailing 'F' pad on odd-length identifiers.
    let digits = value.strip_suffix(['F', 'f']).unwrap_or(value);
    let plausible = (18..=ICCID_MAX_LEN).contains(&value.len())
        && !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit());
    if !plausible {
        return None;
    }
    let mut out = Iccid::new();
    out.push_str(value).ok()?;
    Some(out)
}

/// Extract the RSSI field from an `AT+CSQ` reply.
///
/// Valid values are 0-31 and [`RSSI_UNKNOWN`]; anything else is `None`.
pub fn parse_csq(response: &str) -> Option<u8> {
    let fields = lines(response).find_map(|line| line.strip_prefix("+CSQ:"))?;
    let rssi: u8 = fields.split(',').next()?.trim().parse().ok()?;
    (rssi <= 31 || rssi == RSSI_UNKNOWN).then_some(rssi)
}
