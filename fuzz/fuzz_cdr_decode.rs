//! Fuzz target for the CDR record decoder.
//!
//! Run with: cargo +nightly fuzz run fuzz_cdr_decode
//!
//! This exercises `Record::decode()` with arbitrary byte sequences to
//! find panics or out-of-bounds reads in header validation and typed
//! element access.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(record) = auxproc_cdr::Record::decode(data) {
        // Typed accessors must never panic on a validated record.
        let _ = record.text();
        let _ = record.numbers();
        let _ = record.payload();
    }
});
