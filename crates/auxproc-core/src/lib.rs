#![deny(unsafe_code)]

//! Core runtime of the auxproc shared-variable processor.
//!
//! An auxproc process couples to named shared variables owned jointly
//! with a host interpreter. Writes to a control variable trigger the
//! processor kind's side effect — shell execution, record-oriented
//! file/pipe I/O, or plain pass-through — and the interpreter reads the
//! outcome back as an acknowledgement record. One single-threaded event
//! loop serializes every variable mutation and every effect.

/// Shell-command executor processor (AP100).
pub mod ap100;
/// File/pipe record-I/O processor (AP210).
pub mod ap210;
/// Signal dispatch and the main event loop.
pub mod dispatch;
/// Caller-facing errors and the fatal-abort path.
pub mod error;
/// Synchronous shell execution.
pub mod exec;
/// Pass-through processor (APnnn).
pub mod passthrough;
/// Parent-process liveness probing.
pub mod process;
/// The per-kind behavior contract and startup-time selection.
pub mod processor;
/// Registry of coupled variables.
pub mod registry;
/// The fixed signal vocabulary.
pub mod signal;
/// Acknowledgement status codes.
pub mod status;
/// Coordination-store client surface and in-memory implementation.
pub mod store;
/// Datagram transport for the signal channel.
pub mod transport;

pub use dispatch::{Dispatcher, EventLoop, Step};
pub use error::ApError;
pub use processor::{Processor, ProcessorKind, select_processor};
pub use registry::{Registry, SvarKey};
pub use store::{CoordStore, MemoryStore};
pub use transport::UdpTransport;
