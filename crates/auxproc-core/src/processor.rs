//! The behavior contract every auxiliary-processor kind implements.
//!
//! One running process serves exactly one kind, chosen at startup via
//! [`select_processor`]; the contract is not switchable at runtime.
//! All methods are synchronous — the event loop is the only thread of
//! control, and every side effect (shell execution, record I/O)
//! deliberately blocks it.

use std::fmt;
use std::str::FromStr;

use crate::ap100::CommandProcessor;
use crate::ap210::RecordProcessor;
use crate::error::ApError;
use crate::passthrough::PassthroughProcessor;
use crate::registry::{CoupledVar, Registry, SvarKey};
use crate::store::CoordStore;

/// The available auxiliary-processor kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorKind {
    /// Shell-command executor (AP100).
    Command,
    /// Store-and-return pass-through (APnnn).
    Passthrough,
    /// File/pipe record I/O controller (AP210).
    Record,
}

impl ProcessorKind {
    /// Default processor identity for this kind.
    pub fn default_identity(self) -> &'static str {
        match self {
            ProcessorKind::Command => "AP100",
            ProcessorKind::Passthrough => "AP001",
            ProcessorKind::Record => "AP210",
        }
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorKind::Command => write!(f, "command"),
            ProcessorKind::Passthrough => write!(f, "passthrough"),
            ProcessorKind::Record => write!(f, "record"),
        }
    }
}

impl FromStr for ProcessorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "command" => Ok(ProcessorKind::Command),
            "passthrough" => Ok(ProcessorKind::Passthrough),
            "record" => Ok(ProcessorKind::Record),
            other => Err(format!("unknown processor kind '{other}'")),
        }
    }
}

/// Capability set implemented per AP kind.
///
/// The dispatcher owns the registry and the store and passes them in
/// explicitly, keeping processors free of ambient state.
pub trait Processor: Send {
    /// Which kind this processor is.
    fn kind(&self) -> ProcessorKind;

    /// Whether this AP services a given variable name.
    fn accepts(&self, name: &str) -> bool;

    /// Called once when a key first becomes known to this process.
    fn initialize(&mut self, var: &mut CoupledVar, store: &mut dyn CoordStore)
    -> Result<(), ApError>;

    /// Policy decision on receipt of an unmatched peer offer. A `false`
    /// answer may queue an offer-mismatch event for the host instead.
    fn make_counter_offer(&mut self, key: SvarKey, store: &mut dyn CoordStore) -> bool;

    /// Store a raw CDR record into the variable and trigger the
    /// kind-specific side effect. Returns the acknowledgement status for
    /// the signal reply.
    fn assign_value(
        &mut self,
        registry: &mut Registry,
        key: SvarKey,
        bytes: Vec<u8>,
        store: &mut dyn CoordStore,
    ) -> Result<i32, ApError>;

    /// The variable's current record image, unchanged.
    fn get_value(&self, registry: &Registry, key: SvarKey) -> Result<Vec<u8>, ApError>;

    /// Release any owned context. Must be idempotent against an
    /// already-absent context.
    fn retract(&mut self, registry: &mut Registry, key: SvarKey);
}

/// Construct the processor implementation for a kind.
pub fn select_processor(kind: ProcessorKind, identity: &str) -> Box<dyn Processor> {
    match kind {
        ProcessorKind::Command => Box::new(CommandProcessor::new(identity)),
        ProcessorKind::Passthrough => Box::new(PassthroughProcessor::new(identity)),
        ProcessorKind::Record => Box::new(RecordProcessor::new(identity)),
    }
}

/// Shared helper: read a variable's current value or report the
/// appropriate error.
pub(crate) fn value_of(registry: &Registry, key: SvarKey) -> Result<Vec<u8>, ApError> {
    let var = registry.get(key).ok_or(ApError::UnknownKey(key))?;
    var.value()
        .map(<[u8]>::to_vec)
        .ok_or(ApError::NoValue(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("command".parse(), Ok(ProcessorKind::Command));
        assert_eq!("passthrough".parse(), Ok(ProcessorKind::Passthrough));
        assert_eq!("record".parse(), Ok(ProcessorKind::Record));
        assert!("ap9000".parse::<ProcessorKind>().is_err());
    }

    #[test]
    fn test_kind_display_round_trip() {
        for kind in [
            ProcessorKind::Command,
            ProcessorKind::Passthrough,
            ProcessorKind::Record,
        ] {
            assert_eq!(kind.to_string().parse(), Ok(kind));
        }
    }

    #[test]
    fn test_select_processor() {
        let p = select_processor(ProcessorKind::Command, "AP100");
        assert_eq!(p.kind(), ProcessorKind::Command);
        let p = select_processor(ProcessorKind::Passthrough, "AP001");
        assert_eq!(p.kind(), ProcessorKind::Passthrough);
        let p = select_processor(ProcessorKind::Record, "AP210");
        assert_eq!(p.kind(), ProcessorKind::Record);
    }

    #[test]
    fn test_default_identities() {
        assert_eq!(ProcessorKind::Command.default_identity(), "AP100");
        assert_eq!(ProcessorKind::Record.default_identity(), "AP210");
    }
}
