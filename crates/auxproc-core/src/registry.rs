//! Registry of the shared variables currently coupled to this process.
//!
//! Maps an opaque, process-independent key to the variable's state: its
//! name, its current value (the raw CDR record image), and an optional
//! behavioral context handle. All mutation happens from the event-loop
//! thread; the registry is passed explicitly into the dispatcher rather
//! than living in ambient state.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque key identifying a shared variable.
///
/// The same key is used by the coordination store and by the host
/// interpreter; this process never interprets its bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SvarKey(pub u64);

impl fmt::Display for SvarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a processor-owned behavioral context (see the record
/// processor's context arena). Opaque to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u32);

/// One shared variable coupled to this process.
#[derive(Debug)]
pub struct CoupledVar {
    key: SvarKey,
    name: String,
    /// Raw CDR record image. `None` means no value has ever been
    /// assigned, which reads as a value error.
    value: Option<Vec<u8>>,
    /// Back-reference into the owning processor's context arena, present
    /// once role-specific setup (e.g. a file open) has occurred.
    pub context: Option<ContextId>,
}

impl CoupledVar {
    fn new(key: SvarKey, name: &str) -> Self {
        Self {
            key,
            name: name.to_string(),
            value: None,
            context: None,
        }
    }

    pub fn key(&self) -> SvarKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current record image, if any.
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    /// Replace the current record. The previous record is destroyed
    /// atomically; no partial state is observable.
    pub fn set_value(&mut self, bytes: Vec<u8>) {
        self.value = Some(bytes);
    }

    /// Consume the current record, leaving the variable unassigned.
    pub fn take_value(&mut self) -> Option<Vec<u8>> {
        self.value.take()
    }
}

/// Owned mapping from key to coupled-variable state.
#[derive(Debug, Default)]
pub struct Registry {
    vars: HashMap<SvarKey, CoupledVar>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: SvarKey) -> Option<&CoupledVar> {
        self.vars.get(&key)
    }

    pub fn get_mut(&mut self, key: SvarKey) -> Option<&mut CoupledVar> {
        self.vars.get_mut(&key)
    }

    pub fn contains(&self, key: SvarKey) -> bool {
        self.vars.contains_key(&key)
    }

    /// Insert a fresh slot for `key` unless one already exists.
    ///
    /// Returns the slot and whether it was newly inserted (a first
    /// inbound offer/match for a previously-unseen key).
    pub fn insert_if_absent(&mut self, key: SvarKey, name: &str) -> (&mut CoupledVar, bool) {
        let mut inserted = false;
        let var = self.vars.entry(key).or_insert_with(|| {
            inserted = true;
            CoupledVar::new(key, name)
        });
        (var, inserted)
    }

    /// Remove the slot for `key`. Callers must have torn down any owned
    /// context first.
    pub fn remove(&mut self, key: SvarKey) -> Option<CoupledVar> {
        self.vars.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = SvarKey> + '_ {
        self.vars.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_if_absent() {
        let mut reg = Registry::new();
        let (var, inserted) = reg.insert_if_absent(SvarKey(7), "CTL");
        assert!(inserted);
        assert_eq!(var.name(), "CTL");
        assert_eq!(var.key(), SvarKey(7));

        let (var, inserted) = reg.insert_if_absent(SvarKey(7), "other");
        assert!(!inserted);
        // Existing slot keeps its original name.
        assert_eq!(var.name(), "CTL");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_value_lifecycle() {
        let mut reg = Registry::new();
        let (var, _) = reg.insert_if_absent(SvarKey(1), "X");
        assert!(var.value().is_none());

        var.set_value(vec![1, 2, 3]);
        assert_eq!(var.value(), Some(&[1u8, 2, 3][..]));

        var.set_value(vec![9]);
        assert_eq!(var.value(), Some(&[9u8][..]));

        assert_eq!(var.take_value(), Some(vec![9]));
        assert!(var.value().is_none());
    }

    #[test]
    fn test_remove() {
        let mut reg = Registry::new();
        reg.insert_if_absent(SvarKey(1), "A");
        reg.insert_if_absent(SvarKey(2), "B");
        assert_eq!(reg.len(), 2);

        let removed = reg.remove(SvarKey(1)).unwrap();
        assert_eq!(removed.name(), "A");
        assert!(!reg.contains(SvarKey(1)));
        assert_eq!(reg.len(), 1);

        assert!(reg.remove(SvarKey(1)).is_none());
    }

    #[test]
    fn test_empty_registry() {
        let reg = Registry::new();
        assert!(reg.is_empty());
        assert!(reg.get(SvarKey(0)).is_none());
    }
}
