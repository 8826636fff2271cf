//! Fuzz target for the record processor's open-command parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_open_command
//!
//! This exercises the comma-separated, quote-delimited command-line
//! parser with arbitrary strings — it must reject garbage without
//! panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        let _ = auxproc_core::ap210::command::parse(line);
    }
});
