//! Enumeration cache: memoized guard solutions per summand.
//!
//! The solutions of a summand's guard only depend on the values of the
//! process parameters occurring in it, so they are keyed by the summand index
//! and those values. States are immutable, so entries never go stale.

use ahash::RandomState;
use lpsgen_eval::{Valuation, Value};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

/// Cache key: summand index and the values of its condition parameters.
pub type CacheKey = (usize, SmallVec<[Value; 4]>);

#[derive(Debug, Default)]
pub struct EnumerationCache {
    entries: HashMap<CacheKey, Arc<[Valuation]>, RandomState>,
    hits: u64,
    misses: u64,
}

impl EnumerationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key, counting the probe as a hit or a miss.
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<[Valuation]>> {
        match self.entries.get(key) {
            Some(found) => {
                self.hits += 1;
                Some(Arc::clone(found))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Commit the complete solution list for a key.
    pub fn insert(&mut self, key: CacheKey, solutions: Vec<Valuation>) -> Arc<[Valuation]> {
        let solutions: Arc<[Valuation]> = solutions.into();
        self.entries.insert(key, Arc::clone(&solutions));
        solutions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_hit_and_miss() {
        let mut cache = EnumerationCache::new();
        let key: CacheKey = (0, smallvec![Value::int(1)]);
        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), vec![smallvec![Value::bool(true)]]);
        let hit = cache.get(&key).unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));

        // Same values, different summand.
        assert!(cache.get(&(1, smallvec![Value::int(1)])).is_none());
        assert_eq!(cache.len(), 1);
    }
}
