//! Single-flight guard for mutating operations
//!
//! The UI enforces mutual exclusion by disabling the triggering control
//! while a call is outstanding; this guard is the engine-side expression
//! of the same rule. One permit per logical target — a second begin for
//! the same key fails until the first permit is dropped.

use crate::order::{LineId, SectionKey};
use dashmap::DashMap;
use std::sync::Arc;

/// The logical target of an in-flight mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlightKey {
    /// Edit or delete of one line.
    Line(LineId),
    /// "Add product" on one section.
    SectionAdd(SectionKey),
}

impl std::fmt::Display for FlightKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Line(id) => write!(f, "line {}", id),
            Self::SectionAdd(key) => write!(f, "add to {}", key),
        }
    }
}

/// Tracks which targets have an outstanding remote call.
#[derive(Debug, Default)]
pub struct FlightGuard {
    active: Arc<DashMap<FlightKey, ()>>,
}

impl FlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a key. Returns `None` while a permit for it is outstanding.
    pub fn try_begin(&self, key: FlightKey) -> Option<FlightPermit> {
        use dashmap::mapref::entry::Entry;
        match self.active.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(FlightPermit {
                    key,
                    active: Arc::clone(&self.active),
                })
            }
        }
    }

    pub fn in_flight(&self, key: &FlightKey) -> bool {
        self.active.contains_key(key)
    }
}

/// RAII permit: the key is released when the permit drops, whether the
/// operation succeeded, failed, or was cancelled.
#[derive(Debug)]
pub struct FlightPermit {
    key: FlightKey,
    active: Arc<DashMap<FlightKey, ()>>,
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.active.remove(&self.key);
    }
}
