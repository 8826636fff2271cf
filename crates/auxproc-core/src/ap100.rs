//! Command-executor processor (AP100).
//!
//! Writing a rank-1 character vector to any variable serviced by this
//! processor runs the text as a shell command line. The command's exit
//! status is written back into the same variable as an acknowledgement
//! record; its output goes to the diagnostic stream.

use auxproc_cdr::{CdrError, ElemType, HEADER_LEN, Record};
use tracing::warn;

use crate::error::ApError;
use crate::exec::run_shell;
use crate::processor::{Processor, ProcessorKind, value_of};
use crate::registry::{CoupledVar, Registry, SvarKey};
use crate::store::{CoordStore, Discipline};
use crate::status;

/// The AP100-like shell-command executor.
pub struct CommandProcessor {
    identity: String,
}

impl CommandProcessor {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
        }
    }

    /// Validate that the stored record is a rank-1 character vector and
    /// extract the command line.
    ///
    /// Malformed inputs map to distinct nonzero statuses; the stored
    /// value is deliberately left as the attempted input (the
    /// interpreter sees the ack status, not a reverted record).
    fn command_line(bytes: &[u8]) -> Result<String, i32> {
        let record = match Record::decode(bytes) {
            Ok(record) => record,
            Err(CdrError::BadRank(_)) => return Err(status::BAD_RANK),
            Err(CdrError::BadType(_)) => return Err(status::BAD_TYPE),
            Err(_) => return Err(status::BAD_RECORD),
        };
        if record.rank() != 1 {
            return Err(status::BAD_RANK);
        }
        if record.elem_type() != ElemType::Char {
            return Err(status::BAD_TYPE);
        }
        match record.text() {
            Ok(text) => Ok(text),
            Err(_) => Err(status::BAD_TYPE),
        }
    }
}

impl Processor for CommandProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Command
    }

    fn accepts(&self, name: &str) -> bool {
        !name.is_empty()
    }

    fn initialize(
        &mut self,
        var: &mut CoupledVar,
        store: &mut dyn CoordStore,
    ) -> Result<(), ApError> {
        // Each command write is consumed whole: single assignment, then
        // the flag clears when the interpreter reads the ack.
        store.set_control(var.key(), Discipline::SingleAssign);
        Ok(())
    }

    fn make_counter_offer(&mut self, _key: SvarKey, _store: &mut dyn CoordStore) -> bool {
        true
    }

    fn assign_value(
        &mut self,
        registry: &mut Registry,
        key: SvarKey,
        bytes: Vec<u8>,
        store: &mut dyn CoordStore,
    ) -> Result<i32, ApError> {
        let var = registry.get_mut(key).ok_or(ApError::UnknownKey(key))?;
        if bytes.len() < HEADER_LEN {
            warn!(%key, len = bytes.len(), "command record shorter than header");
            return Ok(status::TOO_SHORT);
        }
        var.set_value(bytes);

        let command = match Self::command_line(var.value().unwrap_or(&[])) {
            Ok(command) => command,
            Err(code) => {
                warn!(%key, code, "malformed command record");
                return Ok(code);
            }
        };

        let outcome = run_shell(&command);
        var.set_value(Record::ack(outcome.status).into_bytes());
        store.set_state(key, true, &self.identity);
        Ok(outcome.status)
    }

    fn get_value(&self, registry: &Registry, key: SvarKey) -> Result<Vec<u8>, ApError> {
        value_of(registry, key)
    }

    fn retract(&mut self, _registry: &mut Registry, _key: SvarKey) {
        // No owned context.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use auxproc_cdr::Record;
    use pretty_assertions::assert_eq;

    fn setup() -> (CommandProcessor, Registry, MemoryStore) {
        let mut registry = Registry::new();
        registry.insert_if_absent(SvarKey(1), "CMD");
        (CommandProcessor::new("AP100"), registry, MemoryStore::new())
    }

    fn ack_status(bytes: &[u8]) -> i64 {
        Record::decode(bytes).unwrap().numbers().unwrap()[0]
    }

    #[test]
    fn test_echo_command_acknowledged() {
        let (mut proc, mut reg, mut store) = setup();
        let cmd = Record::chars("echo hi").into_bytes();
        let st = proc
            .assign_value(&mut reg, SvarKey(1), cmd, &mut store)
            .unwrap();
        assert_eq!(st, 0);

        // The stored value is now the acknowledgement record.
        let value = proc.get_value(&reg, SvarKey(1)).unwrap();
        assert_eq!(ack_status(&value), 0);
        assert_eq!(store.state(SvarKey(1)), Some(true));
    }

    #[test]
    fn test_exit_status_in_ack() {
        let (mut proc, mut reg, mut store) = setup();
        let cmd = Record::chars("exit 7").into_bytes();
        let st = proc
            .assign_value(&mut reg, SvarKey(1), cmd, &mut store)
            .unwrap();
        assert_eq!(st, 7);
        let value = proc.get_value(&reg, SvarKey(1)).unwrap();
        assert_eq!(ack_status(&value), 7);
    }

    #[test]
    fn test_bad_rank_keeps_invalid_value() {
        let (mut proc, mut reg, mut store) = setup();
        // Rank-2 record: decode rejects rank > 1.
        let mut bytes = Record::chars("ls").into_bytes();
        bytes[13] = 2;
        let st = proc
            .assign_value(&mut reg, SvarKey(1), bytes.clone(), &mut store)
            .unwrap();
        assert_eq!(st, status::BAD_RANK);

        // The attempted (invalid) input stays stored.
        let value = proc.get_value(&reg, SvarKey(1)).unwrap();
        assert_eq!(value, bytes);
        // No unread-value flag raised for the malformed path.
        assert_ne!(store.state(SvarKey(1)), Some(true));
    }

    #[test]
    fn test_char_scalar_is_bad_rank() {
        let (mut proc, mut reg, mut store) = setup();
        let bytes = Record::encode(ElemType::Char, 0, b"x").into_bytes();
        let st = proc
            .assign_value(&mut reg, SvarKey(1), bytes, &mut store)
            .unwrap();
        assert_eq!(st, status::BAD_RANK);
    }

    #[test]
    fn test_numeric_record_is_bad_type() {
        let (mut proc, mut reg, mut store) = setup();
        let bytes = Record::ints(&[1, 2, 3]).into_bytes();
        let st = proc
            .assign_value(&mut reg, SvarKey(1), bytes.clone(), &mut store)
            .unwrap();
        assert_eq!(st, status::BAD_TYPE);
        assert_eq!(proc.get_value(&reg, SvarKey(1)).unwrap(), bytes);
    }

    #[test]
    fn test_too_short_stores_nothing() {
        let (mut proc, mut reg, mut store) = setup();
        let st = proc
            .assign_value(&mut reg, SvarKey(1), vec![1, 2, 3], &mut store)
            .unwrap();
        assert_eq!(st, status::TOO_SHORT);
        assert!(matches!(
            proc.get_value(&reg, SvarKey(1)),
            Err(ApError::NoValue(_))
        ));
    }

    #[test]
    fn test_get_before_assign_is_value_error() {
        let (proc, reg, _) = setup();
        assert!(matches!(
            proc.get_value(&reg, SvarKey(1)),
            Err(ApError::NoValue(_))
        ));
    }

    #[test]
    fn test_unknown_key() {
        let (mut proc, mut reg, mut store) = setup();
        let cmd = Record::chars("true").into_bytes();
        assert!(matches!(
            proc.assign_value(&mut reg, SvarKey(99), cmd, &mut store),
            Err(ApError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_accepts_any_nonempty_name() {
        let (proc, _, _) = setup();
        assert!(proc.accepts("anything"));
        assert!(proc.accepts("Z"));
        assert!(!proc.accepts(""));
    }

    #[test]
    fn test_initialize_sets_discipline() {
        let (mut proc, mut reg, mut store) = setup();
        let var = reg.get_mut(SvarKey(1)).unwrap();
        proc.initialize(var, &mut store).unwrap();
        assert_eq!(store.control(SvarKey(1)), Some(Discipline::SingleAssign));
    }
}
