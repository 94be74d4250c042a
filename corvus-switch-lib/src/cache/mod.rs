//! Flow cache: fingerprint to matched-flow vector, in front of the
//! classifiers.
//!
//! Three backends, selected at startup: a concurrent hash map shared by
//! every worker, a single-writer hash map owned by one worker (no lock),
//! and a patricia tree.  Invalidation is generation-based: mutators bump
//! the bridge-wide generation, and each handle drops its contents the
//! next time it is touched, so per-thread portions clear in their
//! owner's context and never in the mutator's.

use ahash::AHashMap;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::classifier::ptree::Ptree;
use crate::flow::Flow;

/// Backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    #[default]
    Concurrent,
    SingleWriter,
    Ptree,
}

/// One cached classification: the flow vector a packet with this
/// fingerprint traverses, ordered by table.
#[derive(Debug)]
pub struct CacheEntry {
    pub hash64: u64,
    pub flows: Vec<Arc<Flow>>,
}

/// Bridge-wide cache state: the invalidation generation and statistics.
#[derive(Debug, Default)]
pub struct CacheControl {
    generation: AtomicU64,
    entries: AtomicU64,
    hit: AtomicU64,
    miss: AtomicU64,
}

/// Statistics snapshot for the show surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub nentries: u64,
    pub hit: u64,
    pub miss: u64,
}

impl CacheControl {
    /// Invalidate every handle; called after any table mutation.
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::Release);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            nentries: self.entries.load(Ordering::Relaxed),
            hit: self.hit.load(Ordering::Relaxed),
            miss: self.miss.load(Ordering::Relaxed),
        }
    }
}

type SharedMap = Arc<RwLock<AHashMap<u64, Arc<CacheEntry>>>>;

#[derive(Debug)]
enum CacheInner {
    Concurrent(SharedMap),
    SingleWriter(AHashMap<u64, Arc<CacheEntry>>),
    Ptree(Ptree<Arc<CacheEntry>>),
}

/// A cache handle.  `Concurrent` handles share one map; the other two are
/// per-worker partitions touched by exactly one thread, so they carry no
/// lock at all.
#[derive(Debug)]
pub struct FlowCache {
    inner: CacheInner,
    control: Arc<CacheControl>,
    generation: u64,
}

impl FlowCache {
    pub fn new(kind: CacheKind, control: Arc<CacheControl>) -> FlowCache {
        let inner = match kind {
            CacheKind::Concurrent => CacheInner::Concurrent(Arc::new(RwLock::new(AHashMap::new()))),
            CacheKind::SingleWriter => CacheInner::SingleWriter(AHashMap::new()),
            CacheKind::Ptree => CacheInner::Ptree(Ptree::new()),
        };
        let generation = control.generation.load(Ordering::Acquire);
        FlowCache { inner, control, generation }
    }

    /// A handle for another worker: the concurrent backend shares its map,
    /// the others get a fresh partition.
    pub fn worker_handle(&self) -> FlowCache {
        let inner = match &self.inner {
            CacheInner::Concurrent(map) => CacheInner::Concurrent(map.clone()),
            CacheInner::SingleWriter(_) => CacheInner::SingleWriter(AHashMap::new()),
            CacheInner::Ptree(_) => CacheInner::Ptree(Ptree::new()),
        };
        FlowCache {
            inner,
            control: self.control.clone(),
            generation: self.control.generation.load(Ordering::Acquire),
        }
    }

    pub fn control(&self) -> &Arc<CacheControl> {
        &self.control
    }

    /// Drop stale contents when the bridge generation moved.
    fn check_generation(&mut self) {
        let current = self.control.generation.load(Ordering::Acquire);
        if current != self.generation {
            self.clear();
            self.generation = current;
        }
    }

    pub fn clear(&mut self) {
        let dropped = match &mut self.inner {
            CacheInner::Concurrent(map) => {
                let mut map = map.write().unwrap_or_else(PoisonError::into_inner);
                let n = map.len();
                map.clear();
                n
            }
            CacheInner::SingleWriter(map) => {
                let n = map.len();
                map.clear();
                n
            }
            CacheInner::Ptree(tree) => {
                let n = tree.len();
                tree.clear();
                n
            }
        };
        self.control.entries.fetch_sub(dropped as u64, Ordering::Relaxed);
    }

    pub fn lookup(&mut self, hash64: u64) -> Option<Arc<CacheEntry>> {
        self.check_generation();
        let entry = match &self.inner {
            CacheInner::Concurrent(map) => map
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&hash64)
                .cloned(),
            CacheInner::SingleWriter(map) => map.get(&hash64).cloned(),
            CacheInner::Ptree(tree) => tree.get(hash64, 64).cloned(),
        };
        match entry {
            Some(entry) => {
                self.control.hit.fetch_add(1, Ordering::Relaxed);
                Some(entry)
            }
            None => {
                self.control.miss.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&mut self, hash64: u64, flows: Vec<Arc<Flow>>) {
        self.check_generation();
        let entry = Arc::new(CacheEntry { hash64, flows });
        let added = match &mut self.inner {
            CacheInner::Concurrent(map) => map
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(hash64, entry)
                .is_none(),
            CacheInner::SingleWriter(map) => map.insert(hash64, entry).is_none(),
            CacheInner::Ptree(tree) => {
                let before = tree.len();
                *tree.entry_or_insert_with(hash64, 64, || entry.clone()) = entry.clone();
                tree.len() > before
            }
        };
        if added {
            self.control.entries.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::InstructionSet;

    fn flow() -> Arc<Flow> {
        Flow::new(1, 0, 0, 0, 0, 0, vec![], InstructionSet::default())
    }

    fn check_backend(kind: CacheKind) {
        let control = Arc::new(CacheControl::default());
        let mut cache = FlowCache::new(kind, control.clone());
        assert!(cache.lookup(42).is_none());
        cache.insert(42, vec![flow()]);
        let entry = cache.lookup(42).expect("hit");
        assert_eq!(entry.hash64, 42);
        assert_eq!(entry.flows.len(), 1);
        let stats = control.stats();
        assert_eq!(stats.nentries, 1);
        assert_eq!(stats.hit, 1);
        assert_eq!(stats.miss, 1);
    }

    #[test]
    fn all_backends_round_trip() {
        check_backend(CacheKind::Concurrent);
        check_backend(CacheKind::SingleWriter);
        check_backend(CacheKind::Ptree);
    }

    #[test]
    fn generation_bump_invalidates_lazily() {
        let control = Arc::new(CacheControl::default());
        let mut cache = FlowCache::new(CacheKind::SingleWriter, control.clone());
        cache.insert(7, vec![flow()]);
        assert!(cache.lookup(7).is_some());

        control.invalidate_all();
        assert!(cache.lookup(7).is_none(), "stale entry dropped on next touch");
        assert_eq!(control.stats().nentries, 0);
    }

    #[test]
    fn concurrent_handles_share_entries() {
        let control = Arc::new(CacheControl::default());
        let mut a = FlowCache::new(CacheKind::Concurrent, control);
        let mut b = a.worker_handle();
        a.insert(9, vec![flow()]);
        assert!(b.lookup(9).is_some());
    }

    #[test]
    fn single_writer_handles_are_partitions() {
        let control = Arc::new(CacheControl::default());
        let mut a = FlowCache::new(CacheKind::SingleWriter, control);
        let mut b = a.worker_handle();
        a.insert(9, vec![flow()]);
        assert!(b.lookup(9).is_none());
    }
}
