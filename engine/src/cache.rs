//! Flow identity cache
//!
//! Bounded concurrent map from canonical flow key to the originating
//! process id, modeled on a kernel LRU hash: capacity is fixed up
//! front, inserts at capacity evict an approximately-least-recently-
//! used entry, and individual key operations are atomic while the map
//! as a whole is only best-effort consistent.
//!
//! The map is sharded by key hash. Each shard owns a slice of the
//! total capacity and keeps exact recency ordering via a logical tick
//! shared across shards, so eviction is exact within a shard and
//! approximate globally. That is the same contract the kernel
//! structure offers with its per-CPU LRU lists.

use std::collections::HashMap;
use std::hash::{BuildHasher, RandomState};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use flow_common::types::FlowKey;

/// Shard count; keys spread by hash, recency is per shard
const SHARD_COUNT: usize = 16;

struct Attribution {
    pid: u32,
    touched: u64,
}

struct Shard {
    entries: Mutex<HashMap<FlowKey, Attribution>>,
    capacity: usize,
}

/// Bounded concurrent flow-to-pid map with recency-biased eviction.
///
/// `insert` and `lookup` are safe from arbitrary uncoordinated callers.
/// Two concurrent inserts to the same key race benignly: one of them
/// wins, which is all a best-effort attribution store promises.
pub struct FlowMap {
    shards: Vec<Shard>,
    capacity: usize,
    clock: AtomicU64,
    hasher: RandomState,
}

impl FlowMap {
    /// Build a map holding at most `capacity` attributions.
    ///
    /// A zero capacity is clamped to one entry.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let shard_count = SHARD_COUNT.min(capacity);
        let base = capacity / shard_count;
        let extra = capacity % shard_count;

        let shards = (0..shard_count)
            .map(|i| Shard {
                entries: Mutex::new(HashMap::new()),
                capacity: base + usize::from(i < extra),
            })
            .collect();

        Self {
            shards,
            capacity,
            clock: AtomicU64::new(0),
            hasher: RandomState::new(),
        }
    }

    fn shard(&self, key: &FlowKey) -> &Shard {
        let hash = self.hasher.hash_one(key) as usize;
        &self.shards[hash % self.shards.len()]
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Insert or overwrite the attribution for `key`.
    ///
    /// Returns `true` when an older entry was evicted to make room.
    pub fn insert(&self, key: FlowKey, pid: u32) -> bool {
        let touched = self.tick();
        let shard = self.shard(&key);
        let mut entries = lock(&shard.entries);

        let mut evicted = false;
        if !entries.contains_key(&key) && entries.len() >= shard.capacity {
            // Evict the least recently touched entry in this shard
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, attribution)| attribution.touched)
                .map(|(victim, _)| *victim)
            {
                entries.remove(&victim);
                evicted = true;
            }
        }

        entries.insert(key, Attribution { pid, touched });
        evicted
    }

    /// Most recently written attribution for `key`, refreshing its
    /// recency on a hit. Never blocks beyond the shard lock.
    pub fn lookup(&self, key: &FlowKey) -> Option<u32> {
        let touched = self.tick();
        let shard = self.shard(key);
        let mut entries = lock(&shard.entries);

        entries.get_mut(key).map(|attribution| {
            attribution.touched = touched;
            attribution.pid
        })
    }

    /// Number of live attributions across all shards
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| lock(&shard.entries).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity bound
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Lock a shard, recovering the data if a holder panicked. Attribution
/// state is always valid to read; a torn multi-step update does not
/// exist because each operation is a single guarded section.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
