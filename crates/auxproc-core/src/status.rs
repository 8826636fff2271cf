//! Numeric status vocabulary for acknowledgement records.
//!
//! Every AP operation reports its outcome as a signed status inside a
//! fixed-shape acknowledgement record (see [`auxproc_cdr::Record::ack`]).
//! Zero is success. Negative codes are protocol-level failures defined
//! here. Positive values come from outside the protocol: platform errnos
//! for filesystem operations, shell exit statuses for the command
//! executor.

/// Operation completed.
pub const OK: i32 = 0;

/// Incoming record shorter than the CDR header.
pub const TOO_SHORT: i32 = -1;

/// Record rank is not the one the operation requires.
pub const BAD_RANK: i32 = -2;

/// Record element type is not the one the operation requires.
pub const BAD_TYPE: i32 = -3;

/// Record failed CDR validation (length arithmetic, unknown tag).
pub const BAD_RECORD: i32 = -4;

/// Shell command could not be spawned. Reserved sentinel, distinct from
/// every exit-status value.
pub const SPAWN_FAILED: i32 = -5;

/// Sub-command not valid in the current bound state, or unknown opcode.
pub const INVALID_SUBCOMMAND: i32 = -6;

/// Open-command string could not be parsed.
pub const BAD_COMMAND: i32 = -7;

/// Control variable has no registered data variable to pair with.
pub const NOT_PAIRED: i32 = -8;

/// No value has ever been assigned to the variable.
pub const NO_VALUE: i32 = -9;

/// Key is not coupled to this processor.
pub const UNKNOWN_KEY: i32 = -10;

/// File ended before a full record frame (truncated/corrupt file).
pub const TRUNCATED: i32 = -11;

/// Fewer bytes were written than the record declares.
pub const PARTIAL_WRITE: i32 = -12;
