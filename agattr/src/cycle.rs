//! Re-entrance tracking for non-circular attribute evaluation.
//!
//! A cell being evaluated is marked in-progress in its attribute's cache;
//! re-entering that cell from within its own rule body is the cycle
//! condition and fails with [`Error::Cycle`]. The mark is held by a drop
//! guard, so any exit that is not an explicit completion (rule failure,
//! unwinding) returns the cell to the absent state instead of poisoning it.
//!
//! Circular attributes do not use this guard: during a fixpoint pass,
//! re-entrance is the mechanism that reads the current approximation.

use std::hash::Hash;

use crate::cache::AttrCache;
use crate::error::Error;

pub(crate) struct EvalGuard<'c, K: Hash + Eq + Clone, V: Clone> {
    cache: &'c AttrCache<K, V>,
    key: K,
    armed: bool,
}

impl<'c, K: Hash + Eq + Clone, V: Clone> EvalGuard<'c, K, V> {
    /// Mark `key` as in-progress, or fail if it already is.
    ///
    /// `render` is only invoked on the failure path to describe the
    /// offending node.
    pub fn begin(
        attribute: &str,
        render: impl FnOnce() -> String,
        cache: &'c AttrCache<K, V>,
        key: K,
    ) -> Result<Self, Error> {
        if cache.is_in_progress(&key) {
            return Err(Error::Cycle {
                attribute: attribute.to_string(),
                node: render(),
            });
        }
        cache.mark_in_progress(key.clone(), None);
        Ok(Self {
            cache,
            key,
            armed: true,
        })
    }

    /// Transition the cell to computed and disarm the guard.
    pub fn complete(mut self, value: V) {
        self.cache.store(self.key.clone(), value);
        self.armed = false;
    }
}

impl<K: Hash + Eq + Clone, V: Clone> std::fmt::Debug for EvalGuard<'_, K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalGuard")
            .field("armed", &self.armed)
            .finish_non_exhaustive()
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Drop for EvalGuard<'_, K, V> {
    fn drop(&mut self) {
        if self.armed {
            self.cache.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentering_an_in_progress_cell_is_a_cycle() {
        let cache: AttrCache<u32, u32> = AttrCache::new();
        let guard = EvalGuard::begin("depth", || "Leaf(1)".into(), &cache, 7).unwrap();
        let err = EvalGuard::begin("depth", || "Leaf(1)".into(), &cache, 7).unwrap_err();
        assert!(err.is_cycle());
        guard.complete(3);
        assert_eq!(cache.computed(&7), Some(3));
    }

    #[test]
    fn dropped_guard_leaves_the_cell_absent() {
        let cache: AttrCache<u32, u32> = AttrCache::new();
        {
            let _guard = EvalGuard::begin("depth", || "Leaf(1)".into(), &cache, 7).unwrap();
        }
        assert!(!cache.is_in_progress(&7));
        assert!(cache.is_empty());
    }
}
