//! The evaluation-cache capability.

use crate::evaluator::Evaluation;
use rustc_hash::FxHashMap;
use std::sync::Mutex;

/// Cache of evaluator outputs keyed by position fingerprint. Thread-safe;
/// shared by every worker of a search and across searches.
pub trait EvalCache: Send + Sync {
    fn contains(&self, key: u64) -> bool;
    fn lookup(&self, key: u64) -> Option<Evaluation>;
    fn insert(&self, key: u64, eval: Evaluation);
    /// Entries currently stored (for hashfull reporting).
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Entry budget (for hashfull reporting).
    fn capacity(&self) -> usize;
}

/// Mutexed map cache with a hard entry bound.
///
/// Inserts into a full cache are dropped rather than evicting: entries stay
/// valid for as long as the network does, and the search only ever treats
/// the cache as an amortization, never as ground truth.
pub struct SharedEvalCache {
    entries: Mutex<FxHashMap<u64, Evaluation>>,
    capacity: usize,
}

impl SharedEvalCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
            capacity,
        }
    }
}

impl EvalCache for SharedEvalCache {
    fn contains(&self, key: u64) -> bool {
        self.entries.lock().unwrap().contains_key(&key)
    }

    fn lookup(&self, key: u64) -> Option<Evaluation> {
        self.entries.lock().unwrap().get(&key).cloned()
    }

    fn insert(&self, key: u64, eval: Evaluation) {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() < self.capacity || entries.contains_key(&key) {
            entries.insert(key, eval);
        }
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(q: f32) -> Evaluation {
        Evaluation {
            q,
            policy: vec![(1, 1.0)],
        }
    }

    #[test]
    fn stores_and_returns_entries() {
        let cache = SharedEvalCache::new(4);
        assert!(!cache.contains(1));
        cache.insert(1, eval(0.5));
        assert!(cache.contains(1));
        assert_eq!(cache.lookup(1).unwrap().q, 0.5);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.capacity(), 4);
    }

    #[test]
    fn full_cache_drops_new_keys_but_updates_existing() {
        let cache = SharedEvalCache::new(2);
        cache.insert(1, eval(0.1));
        cache.insert(2, eval(0.2));
        cache.insert(3, eval(0.3));
        assert!(!cache.contains(3));
        cache.insert(1, eval(0.9));
        assert_eq!(cache.lookup(1).unwrap().q, 0.9);
        assert_eq!(cache.len(), 2);
    }
}
