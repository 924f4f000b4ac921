//! Batch assembly with cache dedup.
//!
//! A `CachingBatch` collects the positions one search iteration wants
//! evaluated. Fingerprints already covered by the cache (or by an earlier
//! slot of the same batch) are served without evaluator work; the rest go
//! out as a single blocking call, after which both the batch slots and the
//! cache hold the results.

use crate::cache::EvalCache;
use crate::evaluator::{EvalError, EvalRequest, Evaluation, Evaluator};
use pz_features::InputPlanes;
use rustc_hash::FxHashMap;

struct Slot {
    key: u64,
    eval: Option<Evaluation>,
}

pub struct CachingBatch<'a> {
    cache: &'a dyn EvalCache,
    slots: Vec<Slot>,
    /// Pending slot index per outstanding request, parallel to `requests`.
    pending: Vec<usize>,
    requests: Vec<EvalRequest>,
    /// First slot per fingerprint, for in-batch dedup.
    index: FxHashMap<u64, usize>,
    cache_misses: usize,
}

impl<'a> CachingBatch<'a> {
    pub fn new(cache: &'a dyn EvalCache) -> Self {
        Self {
            cache,
            slots: Vec::new(),
            pending: Vec::new(),
            requests: Vec::new(),
            index: FxHashMap::default(),
            cache_misses: 0,
        }
    }

    /// Serve a fingerprint from this batch or from the cache, allocating a
    /// readable slot on a cache hit. `None` means the caller has to encode
    /// and [`push_miss`](Self::push_miss) the position.
    pub fn deduped_or_cached(&mut self, key: u64) -> Option<usize> {
        if let Some(&slot) = self.index.get(&key) {
            return Some(slot);
        }
        let eval = self.cache.lookup(key)?;
        let slot = self.slots.len();
        self.slots.push(Slot {
            key,
            eval: Some(eval),
        });
        self.index.insert(key, slot);
        Some(slot)
    }

    /// Whether the cache already covers a fingerprint. Allocates nothing;
    /// the speculative path only wants the yes/no.
    pub fn cached(&self, key: u64) -> bool {
        self.cache.contains(key)
    }

    /// Enqueue evaluator work for a position. Returns its slot.
    pub fn push_miss(&mut self, key: u64, planes: InputPlanes, moves: Vec<u16>) -> usize {
        let slot = self.slots.len();
        self.slots.push(Slot { key, eval: None });
        self.pending.push(slot);
        self.requests.push(EvalRequest {
            fingerprint: key,
            planes,
            moves,
        });
        self.index.entry(key).or_insert(slot);
        self.cache_misses += 1;
        slot
    }

    /// Slots that need actual evaluator work.
    pub fn cache_misses(&self) -> usize {
        self.cache_misses
    }

    /// Total slots, cache hits included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Run the pending requests as one evaluator call. On return every slot
    /// is readable and every computed fingerprint is in the cache.
    pub fn compute(&mut self, evaluator: &dyn Evaluator) -> Result<(), EvalError> {
        if self.requests.is_empty() {
            return Ok(());
        }
        let results = evaluator.compute(&self.requests)?;
        if results.len() != self.requests.len() {
            return Err(EvalError::BatchMismatch {
                want: self.requests.len(),
                got: results.len(),
            });
        }
        let pending = std::mem::take(&mut self.pending);
        for (slot, result) in pending.into_iter().zip(results) {
            self.cache.insert(self.slots[slot].key, result.clone());
            self.slots[slot].eval = Some(result);
        }
        self.requests.clear();
        Ok(())
    }

    /// Value of a slot. Only meaningful after [`compute`](Self::compute).
    pub fn q(&self, slot: usize) -> f32 {
        debug_assert!(self.slots[slot].eval.is_some(), "slot read before compute");
        self.slots[slot].eval.as_ref().map(|e| e.q).unwrap_or(0.0)
    }

    /// Prior of one move of a slot. Only meaningful after
    /// [`compute`](Self::compute).
    pub fn p(&self, slot: usize, move_index: u16) -> f32 {
        debug_assert!(self.slots[slot].eval.is_some(), "slot read before compute");
        self.slots[slot]
            .eval
            .as_ref()
            .map(|e| e.prior(move_index))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SharedEvalCache;
    use crate::evaluator::UniformEvaluator;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEvaluator {
        calls: AtomicUsize,
        inputs: AtomicUsize,
    }

    impl CountingEvaluator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                inputs: AtomicUsize::new(0),
            }
        }
    }

    impl Evaluator for CountingEvaluator {
        fn compute(&self, batch: &[EvalRequest]) -> Result<Vec<Evaluation>, EvalError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.inputs.fetch_add(batch.len(), Ordering::Relaxed);
            UniformEvaluator.compute(batch)
        }
    }

    #[test]
    fn misses_are_computed_and_cached() {
        let cache = SharedEvalCache::new(16);
        let eval = CountingEvaluator::new();
        let mut batch = CachingBatch::new(&cache);

        assert!(batch.deduped_or_cached(42).is_none());
        let slot = batch.push_miss(42, Vec::new(), vec![5, 6]);
        assert_eq!(batch.cache_misses(), 1);
        batch.compute(&eval).unwrap();

        assert_eq!(eval.calls.load(Ordering::Relaxed), 1);
        assert_eq!(batch.q(slot), 0.0);
        assert!((batch.p(slot, 5) - 0.5).abs() < 1e-6);
        assert_eq!(batch.p(slot, 7), 0.0);
        assert!(cache.contains(42));
    }

    #[test]
    fn cache_hits_allocate_readable_slots_without_work() {
        let cache = SharedEvalCache::new(16);
        cache.insert(
            42,
            Evaluation {
                q: 0.25,
                policy: vec![(5, 1.0)],
            },
        );
        let eval = CountingEvaluator::new();
        let mut batch = CachingBatch::new(&cache);

        let slot = batch.deduped_or_cached(42).unwrap();
        assert_eq!(batch.cache_misses(), 0);
        assert_eq!(batch.len(), 1);
        batch.compute(&eval).unwrap();
        assert_eq!(eval.calls.load(Ordering::Relaxed), 0);
        assert_eq!(batch.q(slot), 0.25);
    }

    #[test]
    fn in_batch_dedup_reuses_pending_slots() {
        let cache = SharedEvalCache::new(16);
        let mut batch = CachingBatch::new(&cache);

        let slot = batch.push_miss(42, Vec::new(), vec![1]);
        assert_eq!(batch.deduped_or_cached(42), Some(slot));
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.cache_misses(), 1);
    }

    #[test]
    fn speculative_contains_check_allocates_nothing() {
        let cache = SharedEvalCache::new(16);
        cache.insert(
            7,
            Evaluation {
                q: 0.0,
                policy: Vec::new(),
            },
        );
        let batch = CachingBatch::new(&cache);
        assert!(batch.cached(7));
        assert!(!batch.cached(8));
        assert_eq!(batch.len(), 0);
    }

    #[test]
    fn compute_batches_all_pending_in_one_call() {
        let cache = SharedEvalCache::new(16);
        let eval = CountingEvaluator::new();
        let mut batch = CachingBatch::new(&cache);
        for key in 0..5u64 {
            batch.push_miss(key, Vec::new(), vec![1, 2]);
        }
        batch.compute(&eval).unwrap();
        assert_eq!(eval.calls.load(Ordering::Relaxed), 1);
        assert_eq!(eval.inputs.load(Ordering::Relaxed), 5);
        // A second compute with nothing pending is a no-op.
        batch.compute(&eval).unwrap();
        assert_eq!(eval.calls.load(Ordering::Relaxed), 1);
    }
}
