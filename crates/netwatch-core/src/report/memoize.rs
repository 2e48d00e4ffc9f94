//! Digest-keyed memoization for `FindingsGenerator`/`RemediationPlanner`
//! output, with TTL and priority/size-aware eviction (§4.8).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

/// Hint the caller attaches to an inserted entry, used to break eviction
/// ties when the cache is over budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CachePriority {
    Low,
    Normal,
    High,
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    last_accessed: Instant,
    priority: CachePriority,
    size_estimate: usize,
}

/// Bespoke LRU-ish map: absolute + sliding TTL, eviction driven by
/// priority first and size second when over the byte budget.
///
/// Hand-rolled rather than pulling in a generic cache crate — the
/// eviction policy here (priority-hinted, size-aware) is specific enough
/// that a generic LRU wouldn't save much and would hide the policy.
pub struct MemoizedCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    absolute_ttl: Duration,
    sliding_ttl: Duration,
    byte_budget: usize,
}

impl<K: std::hash::Hash + Eq + Clone, V: Clone> MemoizedCache<K, V> {
    pub fn new(absolute_ttl: Duration, sliding_ttl: Duration, byte_budget: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            absolute_ttl,
            sliding_ttl,
            byte_budget,
        }
    }

    /// Returns the cached value for `key` if present and unexpired,
    /// refreshing its sliding window. Falls back to `None` (a cache
    /// miss) if the lock is poisoned rather than propagating a panic
    /// (§4.8 "falls back to direct computation on backend failure").
    pub fn get(&self, key: &K) -> Option<V> {
        let mut guard = match self.entries.lock() {
            Ok(guard) => guard,
            Err(err) => {
                warn!("memoized report cache lock poisoned, falling back to direct computation");
                return err.into_inner().get(key).map(|e| e.value.clone());
            }
        };
        let now = Instant::now();
        let entry = guard.get_mut(key)?;
        if now.duration_since(entry.inserted_at) > self.absolute_ttl
            || now.duration_since(entry.last_accessed) > self.sliding_ttl
        {
            guard.remove(key);
            return None;
        }
        entry.last_accessed = now;
        Some(entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V, priority: CachePriority, size_estimate: usize) {
        let Ok(mut guard) = self.entries.lock() else {
            warn!("memoized report cache lock poisoned, skipping insert");
            return;
        };
        let now = Instant::now();
        guard.insert(
            key,
            Entry {
                value,
                inserted_at: now,
                last_accessed: now,
                priority,
                size_estimate,
            },
        );
        Self::evict_over_budget(&mut guard, self.byte_budget);
    }

    fn evict_over_budget(guard: &mut HashMap<K, Entry<V>>, byte_budget: usize) {
        let mut total: usize = guard.values().map(|e| e.size_estimate).sum();
        if total <= byte_budget {
            return;
        }
        let mut keys: Vec<K> = guard.keys().cloned().collect();
        keys.sort_by(|a, b| {
            let ea = &guard[a];
            let eb = &guard[b];
            ea.priority
                .cmp(&eb.priority)
                .then_with(|| eb.size_estimate.cmp(&ea.size_estimate))
        });
        for key in keys {
            if total <= byte_budget {
                break;
            }
            if let Some(entry) = guard.remove(&key) {
                total = total.saturating_sub(entry.size_estimate);
            }
        }
    }
}

/// Wraps a fallible-free derivation function `f` with a `MemoizedCache`,
/// computing directly on any miss (including a poisoned/failed cache).
pub fn memoized_or_compute<K, V>(
    cache: &MemoizedCache<K, V>,
    key: K,
    priority: CachePriority,
    size_estimate: usize,
    compute: impl FnOnce() -> V,
) -> V
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    if let Some(cached) = cache.get(&key) {
        return cached;
    }
    let value = compute();
    cache.insert(key, value.clone(), priority, size_estimate);
    value
}
