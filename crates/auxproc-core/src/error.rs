//! Caller-facing errors for processor operations.
//!
//! Most failures in this subsystem are recovered locally and reported as
//! a numeric status inside an acknowledgement record (see [`crate::status`]).
//! `ApError` covers the cases the dispatcher itself must distinguish: a
//! key it has never coupled, a read of a never-assigned variable, and
//! I/O plumbing.

use crate::registry::SvarKey;

/// Errors surfaced to the dispatcher rather than encoded as a status.
#[derive(Debug, thiserror::Error)]
pub enum ApError {
    #[error("key {0} is not coupled to this processor")]
    UnknownKey(SvarKey),

    #[error("no value has been assigned to {0}")]
    NoValue(SvarKey),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abort after an internal consistency violation.
///
/// Used only when the process state can no longer be trusted (e.g. a
/// variable pointing at a context that does not exist). Everything
/// recoverable is reported as a status instead.
pub fn fatal(msg: &str) -> ! {
    tracing::error!(msg, "internal consistency violation, aborting");
    std::process::abort()
}
