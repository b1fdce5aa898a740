//! Per-attribute value cache.
//!
//! Each attribute instance owns exactly one cache; two instances wrapping
//! structurally identical rules still cache independently. Keys are node
//! identities (plus an auxiliary parameter for parameterized attributes),
//! never structural node equality.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;

use strum::{EnumIs, EnumTryAs};

/// State of one cache cell.
///
/// Absent cells are simply missing map entries, so the full per-cell state
/// machine is `absent -> in-progress -> computed`, with `in-progress ->
/// absent` when an evaluation unwinds.
#[derive(Debug, Clone, PartialEq, Eq, EnumIs, EnumTryAs)]
pub enum CellState<V> {
    /// Evaluation has started and not yet completed. The payload is the
    /// current approximation for circular attributes and `None` for
    /// attributes that treat re-entrance as an error.
    InProgress(Option<V>),
    /// Evaluation completed; the value is served on every later lookup.
    Computed(V),
}

/// Unsynchronized keyed cell store backing one attribute instance.
pub struct AttrCache<K, V> {
    cells: RefCell<HashMap<K, CellState<V>>>,
}

impl<K: Hash + Eq + Clone, V: Clone> AttrCache<K, V> {
    pub fn new() -> Self {
        Self {
            cells: RefCell::new(HashMap::new()),
        }
    }

    /// Cached value, if the cell has reached the computed state.
    pub fn computed(&self, key: &K) -> Option<V> {
        match self.cells.borrow().get(key) {
            Some(CellState::Computed(v)) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn is_computed(&self, key: &K) -> bool {
        matches!(self.cells.borrow().get(key), Some(s) if s.is_computed())
    }

    pub fn is_in_progress(&self, key: &K) -> bool {
        matches!(self.cells.borrow().get(key), Some(s) if s.is_in_progress())
    }

    pub fn mark_in_progress(&self, key: K, approximation: Option<V>) {
        self.cells
            .borrow_mut()
            .insert(key, CellState::InProgress(approximation));
    }

    pub fn store(&self, key: K, value: V) {
        self.cells.borrow_mut().insert(key, CellState::Computed(value));
    }

    /// Drop the cell entirely, returning it to the absent state.
    pub fn remove(&self, key: &K) {
        self.cells.borrow_mut().remove(key);
    }

    /// Explicit whole-cache reset. Subsequent lookups re-evaluate.
    pub fn clear(&self) {
        self.cells.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.cells.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.borrow().is_empty()
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Default for AttrCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_state_transitions() {
        let cache: AttrCache<u32, &str> = AttrCache::new();
        assert!(!cache.is_in_progress(&1));

        cache.mark_in_progress(1, None);
        assert!(cache.is_in_progress(&1));
        assert!(!cache.is_computed(&1));
        assert_eq!(cache.computed(&1), None);

        cache.store(1, "done");
        assert!(cache.is_computed(&1));
        assert_eq!(cache.computed(&1), Some("done"));

        cache.remove(&1);
        assert!(!cache.is_computed(&1));
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_forgets_everything() {
        let cache: AttrCache<u32, u32> = AttrCache::new();
        cache.store(1, 10);
        cache.store(2, 20);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
