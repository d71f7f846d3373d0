//! L1 hot tier: bounded in-memory LRU, read-through and write-through.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::fragment::Fragment;

/// Default L1 capacity.
pub const DEFAULT_CAPACITY: usize = 500;

/// LRU-evicted hot tier, guarded by a single mutex the way
/// `neuron-state-memory::MemoryStore` wraps its map — a short critical
/// section per operation, no cross-await holds.
pub struct HotTier {
    cache: Mutex<LruCache<String, Fragment>>,
}

impl HotTier {
    /// Build a hot tier with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Read-through lookup; does not touch L2/L3 itself (the caller
    /// falls through on a miss).
    pub fn get(&self, id: &str) -> Option<Fragment> {
        self.cache.lock().unwrap().get(id).cloned()
    }

    /// Write-through insert, evicting the least-recently-used entry if
    /// at capacity.
    pub fn put(&self, fragment: Fragment) {
        self.cache.lock().unwrap().put(fragment.id.clone(), fragment);
    }

    /// Remove an entry, if present.
    pub fn remove(&self, id: &str) {
        self.cache.lock().unwrap().pop(id);
    }

    /// Current number of cached entries.
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    /// Whether the cache currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.cache.lock().unwrap().is_empty()
    }
}

impl Default for HotTier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::FragmentKind;

    fn frag(id: &str) -> Fragment {
        Fragment::new(id, vec![0.0], id, id, FragmentKind::CodeSummary, "proj")
    }

    #[test]
    fn put_then_get_hits() {
        let tier = HotTier::new(2);
        tier.put(frag("a"));
        assert!(tier.get("a").is_some());
        assert!(tier.get("b").is_none());
    }

    #[test]
    fn evicts_least_recently_used() {
        let tier = HotTier::new(2);
        tier.put(frag("a"));
        tier.put(frag("b"));
        tier.get("a"); // touch a, making b the LRU entry
        tier.put(frag("c")); // evicts b
        assert!(tier.get("a").is_some());
        assert!(tier.get("b").is_none());
        assert!(tier.get("c").is_some());
    }

    #[test]
    fn remove_drops_entry() {
        let tier = HotTier::new(4);
        tier.put(frag("a"));
        tier.remove("a");
        assert!(tier.get("a").is_none());
    }
}
