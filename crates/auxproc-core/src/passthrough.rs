//! Pass-through processor (APnnn).
//!
//! Stores whatever the interpreter assigns and hands it back on read.
//! Unlike the active kinds it never counter-offers: an unmatched peer
//! offer raises an offer-mismatch event for the host to observe.

use auxproc_cdr::HEADER_LEN;
use tracing::{debug, warn};

use crate::error::ApError;
use crate::processor::{Processor, ProcessorKind, value_of};
use crate::registry::{CoupledVar, Registry, SvarKey};
use crate::store::{CoordStore, events};
use crate::status;

/// The generic numbered pass-through AP.
pub struct PassthroughProcessor {
    identity: String,
}

impl PassthroughProcessor {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
        }
    }
}

impl Processor for PassthroughProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Passthrough
    }

    fn accepts(&self, name: &str) -> bool {
        !name.is_empty()
    }

    fn initialize(
        &mut self,
        _var: &mut CoupledVar,
        _store: &mut dyn CoordStore,
    ) -> Result<(), ApError> {
        Ok(())
    }

    fn make_counter_offer(&mut self, key: SvarKey, store: &mut dyn CoordStore) -> bool {
        debug!(%key, "declining counter-offer, raising mismatch event");
        store.add_event(events::OFFER_MISMATCH, &self.identity, key);
        false
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
            warn!(%key, len = bytes.len(), "record shorter than header");
            return Ok(status::TOO_SHORT);
        }
        var.set_value(bytes);
        store.set_state(key, true, &self.identity);
        Ok(status::OK)
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

    fn setup() -> (PassthroughProcessor, Registry, MemoryStore) {
        let mut registry = Registry::new();
        registry.insert_if_absent(SvarKey(1), "VAL");
        (
            PassthroughProcessor::new("AP001"),
            registry,
            MemoryStore::new(),
        )
    }

    #[test]
    fn test_store_and_return_unchanged() {
        let (mut proc, mut reg, mut store) = setup();
        let bytes = Record::ints(&[10, 20]).into_bytes();
        let st = proc
            .assign_value(&mut reg, SvarKey(1), bytes.clone(), &mut store)
            .unwrap();
        assert_eq!(st, status::OK);
        assert_eq!(proc.get_value(&reg, SvarKey(1)).unwrap(), bytes);
        assert_eq!(store.state(SvarKey(1)), Some(true));
    }

    #[test]
    fn test_counter_offer_declined_with_event() {
        let (mut proc, _, mut store) = setup();
        assert!(!proc.make_counter_offer(SvarKey(5), &mut store));
        let (mask, key) = store.get_events("AP001").unwrap();
        assert_eq!(mask, events::OFFER_MISMATCH);
        assert_eq!(key, SvarKey(5));
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
    fn test_too_short_rejected() {
        let (mut proc, mut reg, mut store) = setup();
        let st = proc
            .assign_value(&mut reg, SvarKey(1), vec![0; 5], &mut store)
            .unwrap();
        assert_eq!(st, status::TOO_SHORT);
        assert!(proc.get_value(&reg, SvarKey(1)).is_err());
    }
}
