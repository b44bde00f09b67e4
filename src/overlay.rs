//! Local overlay store: transient, unsaved UI state
//!
//! Pending values shadow the authoritative tree until a write confirms
//! them. Values are the user's raw input text — numbers are parsed only
//! at save time, where the validation gate lives. The store itself has
//! no network or rendering side effects.

use crate::order::{LineId, SectionKey};
use dashmap::DashMap;

/// Which field of a line an overlay entry shadows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineField {
    Name,
    Quantity,
    UnitPrice,
}

impl LineField {
    pub const ALL: [LineField; 3] = [LineField::Name, LineField::Quantity, LineField::UnitPrice];
}

/// Key addressing one pending value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OverlayKey {
    /// Per-section particular-conditions text.
    Conditions(SectionKey),
    /// One field of an in-progress line edit.
    Field(LineId, LineField),
}

/// Transient pending values keyed independently of the normalized tree.
///
/// An overlay value always wins over the authoritative value for reads,
/// but is never merged into a write payload implicitly — every write
/// re-sends its own explicit values.
#[derive(Debug, Default)]
pub struct OverlayStore {
    entries: DashMap<OverlayKey, String>,
}

impl OverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a pending value.
    pub fn set(&self, key: OverlayKey, value: impl Into<String>) {
        self.entries.insert(key, value.into());
    }

    /// Plain read: the pending value if present. No side effects.
    pub fn get(&self, key: &OverlayKey) -> Option<String> {
        self.entries.get(key).map(|v| v.clone())
    }

    /// Overlay value if present, else the authoritative fallback — which
    /// is written into the store so repeated reads stay stable even when
    /// the authoritative tree is rebuilt before the next save.
    ///
    /// Frontends depend on this read-with-write-back behavior; it lives
    /// behind its own named operation so call sites that mean a plain
    /// read use [`get`](Self::get) instead.
    pub fn get_or_seed(&self, key: OverlayKey, authoritative: &str) -> String {
        self.entries
            .entry(key)
            .or_insert_with(|| authoritative.to_string())
            .clone()
    }

    /// Remove one pending value (confirmed persistence or explicit cancel).
    pub fn clear(&self, key: &OverlayKey) {
        self.entries.remove(key);
    }

    /// Remove every field overlay belonging to a line.
    pub fn clear_line(&self, id: LineId) {
        for field in LineField::ALL {
            self.entries.remove(&OverlayKey::Field(id, field));
        }
    }

    /// Drop everything, including cached section conditions.
    pub fn clear_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conditions_key() -> OverlayKey {
        OverlayKey::Conditions(SectionKey::new("Cap A", "Sec 1"))
    }

    // === Scenario: overlay precedence over the authoritative value ===
    #[test]
    fn pending_value_wins_until_cleared() {
        let store = OverlayStore::new();
        store.set(conditions_key(), "draft");
        assert_eq!(store.get_or_seed(conditions_key(), "authoritative"), "draft");

        store.clear(&conditions_key());
        assert_eq!(
            store.get_or_seed(conditions_key(), "authoritative"),
            "authoritative"
        );
    }

    // === Scenario: first authoritative read seeds the cache ===
    #[test]
    fn seeded_read_is_stable_across_tree_rebuilds() {
        let store = OverlayStore::new();
        assert_eq!(store.get_or_seed(conditions_key(), "v1"), "v1");
        // The authoritative tree was rebuilt and now says "v2"; the
        // seeded value still wins until the key is cleared.
        assert_eq!(store.get_or_seed(conditions_key(), "v2"), "v1");

        store.clear(&conditions_key());
        assert_eq!(store.get_or_seed(conditions_key(), "v2"), "v2");
    }

    #[test]
    fn plain_get_has_no_side_effects() {
        let store = OverlayStore::new();
        assert_eq!(store.get(&conditions_key()), None);
        assert!(store.is_empty());
    }

    #[test]
    fn clear_line_drops_all_fields_but_not_conditions() {
        let store = OverlayStore::new();
        let id = LineId::new(7);
        store.set(OverlayKey::Field(id, LineField::Name), "Widget XL");
        store.set(OverlayKey::Field(id, LineField::Quantity), "3");
        store.set(OverlayKey::Field(id, LineField::UnitPrice), "9.99");
        store.set(conditions_key(), "keep me");

        store.clear_line(id);

        assert_eq!(store.get(&OverlayKey::Field(id, LineField::Quantity)), None);
        assert_eq!(store.get(&conditions_key()).as_deref(), Some("keep me"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn clear_all_empties_the_store() {
        let store = OverlayStore::new();
        store.set(conditions_key(), "x");
        store.set(OverlayKey::Field(LineId::new(1), LineField::Name), "y");
        store.clear_all();
        assert!(store.is_empty());
    }

    #[test]
    fn distinct_sections_do_not_collide() {
        let store = OverlayStore::new();
        store.set(
            OverlayKey::Conditions(SectionKey::new("Cap A", "Sec 1")),
            "a",
        );
        store.set(
            OverlayKey::Conditions(SectionKey::new("Cap A", "Sec 2")),
            "b",
        );
        assert_eq!(
            store.get(&OverlayKey::Conditions(SectionKey::new("Cap A", "Sec 1"))),
            Some("a".to_string())
        );
        assert_eq!(store.len(), 2);
    }
}
