//! Coordination-store client surface.
//!
//! The shared coordination store brokers variable offers between
//! independently started processes and persists per-key coupling,
//! control-discipline, and state flags. The store itself is an external
//! collaborator; this subsystem only calls into it, treating every call
//! as a transactional point read/write with no partial-update
//! visibility.
//!
//! [`MemoryStore`] is the in-process implementation used by the
//! standalone binary and by tests. A deployment that shares variables
//! with a real interpreter supplies its own [`CoordStore`] client.

use std::collections::{HashMap, VecDeque};

use crate::registry::SvarKey;

/// Coupling state of a key as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coupling {
    /// Nobody is offering this key.
    #[default]
    None,
    /// One side has offered; waiting for a match.
    Offered,
    /// Both sides are present; the variable is shared.
    Coupled,
}

/// Control discipline for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Discipline {
    /// No access constraint.
    #[default]
    None,
    /// Single assignment, then the flag clears on read.
    SingleAssign,
}

/// Event kinds carried through the store's pending-event queues.
///
/// Bitmask values so a drained queue can be reported as one combined
/// mask.
pub mod events {
    pub const OFFER_MISMATCH: u32 = 1 << 0;
    pub const OFFER_MATCHED: u32 = 1 << 1;
    pub const VALUE_ASSIGNED: u32 = 1 << 2;
    pub const RETRACTED: u32 = 1 << 3;
}

/// The consumed API of the shared coordination store.
pub trait CoordStore: Send {
    /// Announce this processor to the store.
    fn register_processor(&mut self, identity: &str, pid: u32, port: u16);

    /// Withdraw this processor from the store.
    fn unregister_processor(&mut self, identity: &str);

    /// Name of the variable behind a key, if the store knows it.
    fn get_varname(&self, key: SvarKey) -> Option<String>;

    /// Set or clear the per-key "has unread value" flag.
    fn set_state(&mut self, key: SvarKey, has_value: bool, origin: &str);

    /// Record the control discipline for a key.
    fn set_control(&mut self, key: SvarKey, discipline: Discipline);

    /// The key this one pairs with (control ↔ data), if any.
    fn find_pairing_key(&self, key: SvarKey) -> Option<SvarKey>;

    /// Match an existing offer for `key` or create one. Returns the
    /// resulting coupling state.
    fn match_or_make(&mut self, key: SvarKey, identity: &str) -> Coupling;

    /// Queue an event for the host to observe.
    fn add_event(&mut self, kind: u32, identity: &str, key: SvarKey);

    /// Drain pending events for an identity into one (mask, key) pair;
    /// the key is the first queued event's. `None` when nothing is
    /// pending.
    fn get_events(&mut self, identity: &str) -> Option<(u32, SvarKey)>;
}

#[derive(Debug, Default)]
struct Entry {
    name: String,
    has_value: bool,
    origin: String,
    discipline: Discipline,
    coupling: Coupling,
}

/// In-process coordination store.
///
/// Pairing follows the control/data name classes: `C<suffix>` pairs
/// with `D<suffix>` and vice versa. The interpreter side of an offer is
/// seeded with [`MemoryStore::offer`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    processors: HashMap<String, (u32, u16)>,
    entries: HashMap<SvarKey, Entry>,
    pending: HashMap<String, VecDeque<(u32, SvarKey)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an offer as the interpreter side would: the store learns the
    /// key's name and marks it offered.
    pub fn offer(&mut self, key: SvarKey, name: &str) {
        let entry = self.entries.entry(key).or_default();
        entry.name = name.to_string();
        if entry.coupling == Coupling::None {
            entry.coupling = Coupling::Offered;
        }
    }

    /// Whether a processor identity is currently registered.
    pub fn is_registered(&self, identity: &str) -> bool {
        self.processors.contains_key(identity)
    }

    /// The "has unread value" flag for a key (test observability).
    pub fn state(&self, key: SvarKey) -> Option<bool> {
        self.entries.get(&key).map(|e| e.has_value)
    }

    /// The recorded control discipline for a key.
    pub fn control(&self, key: SvarKey) -> Option<Discipline> {
        self.entries.get(&key).map(|e| e.discipline)
    }

    fn paired_name(name: &str) -> Option<String> {
        let mut chars = name.chars();
        let head = chars.next()?;
        let tail: String = chars.collect();
        match head {
            'C' => Some(format!("D{tail}")),
            'D' => Some(format!("C{tail}")),
            _ => None,
        }
    }
}

impl CoordStore for MemoryStore {
    fn register_processor(&mut self, identity: &str, pid: u32, port: u16) {
        self.processors.insert(identity.to_string(), (pid, port));
    }

    fn unregister_processor(&mut self, identity: &str) {
        self.processors.remove(identity);
        self.pending.remove(identity);
    }

    fn get_varname(&self, key: SvarKey) -> Option<String> {
        self.entries
            .get(&key)
            .filter(|e| !e.name.is_empty())
            .map(|e| e.name.clone())
    }

    fn set_state(&mut self, key: SvarKey, has_value: bool, origin: &str) {
        let entry = self.entries.entry(key).or_default();
        entry.has_value = has_value;
        entry.origin = origin.to_string();
    }

    fn set_control(&mut self, key: SvarKey, discipline: Discipline) {
        self.entries.entry(key).or_default().discipline = discipline;
    }

    fn find_pairing_key(&self, key: SvarKey) -> Option<SvarKey> {
        let name = self.get_varname(key)?;
        let wanted = Self::paired_name(&name)?;
        self.entries
            .iter()
            .find(|(k, e)| **k != key && e.name == wanted)
            .map(|(k, _)| *k)
    }

    fn match_or_make(&mut self, key: SvarKey, _identity: &str) -> Coupling {
        let entry = self.entries.entry(key).or_default();
        entry.coupling = match entry.coupling {
            Coupling::None => Coupling::Offered,
            Coupling::Offered | Coupling::Coupled => Coupling::Coupled,
        };
        entry.coupling
    }

    fn add_event(&mut self, kind: u32, identity: &str, key: SvarKey) {
        self.pending
            .entry(identity.to_string())
            .or_default()
            .push_back((kind, key));
    }

    fn get_events(&mut self, identity: &str) -> Option<(u32, SvarKey)> {
        let queue = self.pending.get_mut(identity)?;
        let (first_kind, first_key) = queue.pop_front()?;
        let mut mask = first_kind;
        while let Some((kind, _)) = queue.pop_front() {
            mask |= kind;
        }
        Some((mask, first_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_unregister() {
        let mut store = MemoryStore::new();
        store.register_processor("AP100", 1234, 9901);
        assert!(store.is_registered("AP100"));
        store.unregister_processor("AP100");
        assert!(!store.is_registered("AP100"));
    }

    #[test]
    fn test_varname_after_offer() {
        let mut store = MemoryStore::new();
        assert!(store.get_varname(SvarKey(1)).is_none());
        store.offer(SvarKey(1), "CTL");
        assert_eq!(store.get_varname(SvarKey(1)).as_deref(), Some("CTL"));
    }

    #[test]
    fn test_pairing_by_name_class() {
        let mut store = MemoryStore::new();
        store.offer(SvarKey(1), "Cfile");
        store.offer(SvarKey(2), "Dfile");
        store.offer(SvarKey(3), "Dother");

        assert_eq!(store.find_pairing_key(SvarKey(1)), Some(SvarKey(2)));
        assert_eq!(store.find_pairing_key(SvarKey(2)), Some(SvarKey(1)));
        assert_eq!(store.find_pairing_key(SvarKey(3)), None);
    }

    #[test]
    fn test_match_or_make_progression() {
        let mut store = MemoryStore::new();
        assert_eq!(store.match_or_make(SvarKey(5), "AP100"), Coupling::Offered);
        assert_eq!(store.match_or_make(SvarKey(5), "AP100"), Coupling::Coupled);

        // An interpreter-seeded offer couples on first match.
        store.offer(SvarKey(6), "X");
        assert_eq!(store.match_or_make(SvarKey(6), "AP100"), Coupling::Coupled);
    }

    #[test]
    fn test_state_and_control_flags() {
        let mut store = MemoryStore::new();
        store.set_state(SvarKey(1), true, "AP100");
        assert_eq!(store.state(SvarKey(1)), Some(true));
        store.set_state(SvarKey(1), false, "AP100");
        assert_eq!(store.state(SvarKey(1)), Some(false));

        store.set_control(SvarKey(1), Discipline::SingleAssign);
        assert_eq!(store.control(SvarKey(1)), Some(Discipline::SingleAssign));
    }

    #[test]
    fn test_event_queue_coalesces() {
        let mut store = MemoryStore::new();
        assert!(store.get_events("AP210").is_none());

        store.add_event(events::OFFER_MISMATCH, "AP210", SvarKey(1));
        store.add_event(events::OFFER_MATCHED, "AP210", SvarKey(2));

        let (mask, key) = store.get_events("AP210").unwrap();
        assert_eq!(mask, events::OFFER_MISMATCH | events::OFFER_MATCHED);
        assert_eq!(key, SvarKey(1));
        assert!(store.get_events("AP210").is_none());
    }
}
