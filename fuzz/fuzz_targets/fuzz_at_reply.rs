//! Fuzz target: AT reply parsing
//!
//! Feeds arbitrary modem output through the classifier and the `+CCID` /
//! `+CSQ` field parsers and checks that:
//! - nothing panics on malformed or non-UTF-8 input
//! - a parsed RSSI is 0-31 or the unknown sentinel
//! - a parsed ICCID is 18-22 characters and never comes from an error reply
//!
//! cargo fuzz run fuzz_at_reply

#![no_main]

use bugg::drivers::at::{self, AtResponse, ICCID_MAX_LEN, RSSI_UNKNOWN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The modem driver decodes replies lossily; do the same here.
    let reply = String::from_utf8_lossy(data);

    let verdict = at::classify(&reply);

    if let Some(rssi) = at::parse_csq(&reply) {
        assert!(rssi <= 31 || rssi == RSSI_UNKNOWN, "rssi {rssi} out of domain");
    }

    if let Some(iccid) = at::parse_ccid(&reply) {
        assert!((18..=ICCID_MAX_LEN).contains(&iccid.len()));
        assert_ne!(verdict, AtResponse::Error, "ICCID accepted from an error reply");
    }
});
