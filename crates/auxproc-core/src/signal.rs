//! The fixed signal vocabulary exchanged with the host interpreter.
//!
//! Signals arrive over a datagram channel and are dispatched by the
//! event loop; replies go back to the sender. These types are the
//! complete vocabulary — this is not a general RPC surface. The exact
//! wire framing is the transport adapter's concern (see
//! [`crate::transport`]).

use serde::{Deserialize, Serialize};

use crate::registry::SvarKey;

/// Inbound signals consumed by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    /// Terminate the event loop.
    Disconnect,
    /// A new, not-yet-matched offer names a variable for this process.
    NewVariable { key: SvarKey, name: String },
    /// A peer offer awaiting a counter-offer decision.
    MakeOffer { key: SvarKey, name: String },
    /// An earlier offer has been matched by the peer.
    OfferMatched { key: SvarKey, name: String },
    /// The peer withdraws a coupled variable.
    RetractOffer { key: SvarKey },
    /// Read the current value of a coupled variable.
    GetValue { key: SvarKey },
    /// Assign a raw CDR record to a coupled variable.
    AssignValue { key: SvarKey, bytes: Vec<u8> },
    /// Begin forwarding asynchronous events to a local port.
    StartEventReporting { port: u16 },
    /// Stop forwarding asynchronous events.
    StopEventReporting,
    /// An asynchronous event to forward to the registered destination.
    NewEvent { kind: u32, key: SvarKey },
}

/// Outbound replies produced by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    /// Response to [`Signal::GetValue`]: status, variable location, and
    /// the raw record image (empty unless the status is OK).
    ValueIs {
        status: i32,
        key: SvarKey,
        bytes: Vec<u8>,
    },
    /// Response to [`Signal::AssignValue`].
    Assigned { status: i32, key: SvarKey },
    /// Forwarded event notification.
    GotEvent { kind: u32, key: SvarKey },
}
