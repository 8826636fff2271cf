//! CDR record builders for tests.
//!
//! Thin wrappers around the codec that return raw byte images, which is
//! what the assignment paths consume, plus helpers for building
//! deliberately malformed inputs.

use auxproc_cdr::Record;

/// A rank-1 char record image.
pub fn char_record(text: &str) -> Vec<u8> {
    Record::chars(text).into_bytes()
}

/// A rank-1 int32 record image.
pub fn int_record(values: &[i32]) -> Vec<u8> {
    Record::ints(values).into_bytes()
}

/// A record-processor sub-command image: opcode, optional record
/// number, optional record size.
pub fn subcommand(elems: &[i32]) -> Vec<u8> {
    Record::ints(elems).into_bytes()
}

/// The zero-element close sub-command.
pub fn close_subcommand() -> Vec<u8> {
    Record::ints(&[]).into_bytes()
}

/// A record image with its rank byte forced to the given value.
pub fn with_rank(mut bytes: Vec<u8>, rank: u8) -> Vec<u8> {
    bytes[13] = rank;
    bytes
}

/// The status carried by an acknowledgement image.
pub fn ack_status(bytes: &[u8]) -> i64 {
    Record::decode(bytes)
        .expect("not an acknowledgement record")
        .numbers()
        .expect("acknowledgement must be numeric")[0]
}
