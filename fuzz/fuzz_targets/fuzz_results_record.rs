//! Fuzz target: `ResultsRecord::parse`
//!
//! The record is read back at every boot from a file that may have been
//! truncated or hand-edited.  Any accepted record must render to text that
//! parses to the same record.
//!
//! cargo fuzz run fuzz_results_record

#![no_main]

use bugg::factory::record::ResultsRecord;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(record) = ResultsRecord::parse(text) {
        let again = ResultsRecord::parse(&record.render()).expect("rendered record must parse");
        assert_eq!(again, record);
    }
});
