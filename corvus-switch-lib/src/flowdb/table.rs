//! One OpenFlow table: the flow list and its acceleration indices.

use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::classifier::{Flowinfo, Mbtree, Thtable, MBTREE_MIN_FLOWS};
use crate::flow::{CompiledMatch, Flow};
use crate::packet::ParsedPacket;

/// Which structure answers lookups for a table.  The flowinfo tree is the
/// default and the fallback while an index snapshot is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassifierKind {
    #[default]
    Flowinfo,
    Mbtree,
    Thtable,
}

/// The ordered flow collection plus its indices.  The mbtree and thtable
/// are published as snapshots: rebuilt off to the side by the updater and
/// swapped in one store; readers load the pointer exactly once per packet.
#[derive(Debug)]
pub struct FlowList {
    /// Descending priority, stable within a priority.
    flows: Vec<Arc<Flow>>,
    flowinfo: Flowinfo,
    mbtree: ArcSwapOption<Mbtree>,
    thtable: ArcSwapOption<Thtable>,
}

impl Default for FlowList {
    fn default() -> Self {
        FlowList {
            flows: Vec::new(),
            flowinfo: Flowinfo::new_root(),
            mbtree: ArcSwapOption::empty(),
            thtable: ArcSwapOption::empty(),
        }
    }
}

impl FlowList {
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Flow>> {
        self.flows.iter()
    }

    /// Snapshot for off-lock index builds.
    pub fn snapshot(&self) -> Vec<Arc<Flow>> {
        self.flows.clone()
    }

    /// Insert preserving descending priority order.
    pub fn insert(&mut self, flow: Arc<Flow>) {
        let pos = self
            .flows
            .iter()
            .position(|f| f.priority < flow.priority)
            .unwrap_or(self.flows.len());
        self.flows.insert(pos, flow.clone());
        self.flowinfo.add(flow);
    }

    /// Remove one entry by identity.
    pub fn remove(&mut self, flow: &Flow) -> bool {
        match self.flows.iter().position(|f| std::ptr::eq(f.as_ref(), flow)) {
            Some(pos) => {
                let flow = self.flows.remove(pos);
                self.flowinfo.del(&flow);
                true
            }
            None => false,
        }
    }

    /// Swap an entry in place (modify, replace-by-add).
    pub fn replace(&mut self, old: &Flow, new: Arc<Flow>) -> bool {
        match self.flows.iter().position(|f| std::ptr::eq(f.as_ref(), old)) {
            Some(pos) => {
                self.flowinfo.del(old);
                self.flows[pos] = new.clone();
                self.flowinfo.add(new);
                true
            }
            None => false,
        }
    }

    /// The strict twin: same priority, same match set.
    pub fn find_strict(&self, priority: i32, compiled: &CompiledMatch) -> Option<Arc<Flow>> {
        self.flows
            .iter()
            .find(|f| f.strict_twin(priority, compiled))
            .cloned()
    }

    /// Build a tree for a flow snapshot; `None` below the build threshold.
    /// Runs without any lock held; the caller installs the result.
    pub fn build_mbtree(flows: &[Arc<Flow>]) -> Option<Arc<Mbtree>> {
        (flows.len() >= MBTREE_MIN_FLOWS).then(|| Arc::new(Mbtree::build(flows)))
    }

    pub fn build_thtable(flows: &[Arc<Flow>]) -> Option<Arc<Thtable>> {
        (!flows.is_empty()).then(|| Arc::new(Thtable::build(flows)))
    }

    /// Swap in a new snapshot; readers pick it up on their next load and
    /// the old one is reclaimed when its last reader drops.
    pub fn install_mbtree(&self, tree: Option<Arc<Mbtree>>) {
        debug!(nflow = tree.as_ref().map_or(0, |t| t.len()), "mbtree snapshot installed");
        self.mbtree.store(tree);
    }

    pub fn install_thtable(&self, table: Option<Arc<Thtable>>) {
        debug!(nflow = table.as_ref().map_or(0, |t| t.len()), "thtable snapshot installed");
        self.thtable.store(table);
    }

    pub fn mbtree_snapshot(&self) -> Option<Arc<Mbtree>> {
        self.mbtree.load_full()
    }

    pub fn thtable_snapshot(&self) -> Option<Arc<Thtable>> {
        self.thtable.load_full()
    }

    fn match_flowinfo(&self, pkt: &ParsedPacket<'_>) -> Option<Arc<Flow>> {
        let mut best_prio = -1;
        self.flowinfo.match_packet(pkt, &mut best_prio)
    }

    /// Classify under the chosen strategy, falling back to the flowinfo
    /// tree while a snapshot is not built.
    pub fn match_packet(&self, pkt: &ParsedPacket<'_>, kind: ClassifierKind) -> Option<Arc<Flow>> {
        match kind {
            ClassifierKind::Flowinfo => self.match_flowinfo(pkt),
            ClassifierKind::Mbtree => match self.mbtree_snapshot() {
                Some(tree) => tree.match_packet(pkt),
                None => self.match_flowinfo(pkt),
            },
            ClassifierKind::Thtable => match self.thtable_snapshot() {
                Some(table) => table.match_packet(pkt),
                None => self.match_flowinfo(pkt),
            },
        }
    }
}

/// OpenFlow `table_features`, the subset the engine reports.
#[derive(Debug, Clone)]
pub struct TableFeatures {
    pub name: String,
    pub metadata_match: u64,
    pub metadata_write: u64,
    pub max_entries: u32,
}

impl TableFeatures {
    fn new(table_id: u8) -> Self {
        TableFeatures {
            name: format!("table{table_id}"),
            metadata_match: u64::MAX,
            metadata_write: u64::MAX,
            max_entries: 1 << 20,
        }
    }
}

/// A flow table with its counters and features.
#[derive(Debug)]
pub struct Table {
    pub table_id: u8,
    pub flow_list: FlowList,
    pub features: TableFeatures,
    lookup_count: AtomicU64,
    matched_count: AtomicU64,
}

impl Table {
    pub fn new(table_id: u8) -> Table {
        Table {
            table_id,
            flow_list: FlowList::default(),
            features: TableFeatures::new(table_id),
            lookup_count: AtomicU64::new(0),
            matched_count: AtomicU64::new(0),
        }
    }

    pub fn lookup_count(&self) -> u64 {
        self.lookup_count.load(Ordering::Relaxed)
    }

    pub fn matched_count(&self) -> u64 {
        self.matched_count.load(Ordering::Relaxed)
    }

    pub fn is_full(&self) -> bool {
        self.flow_list.len() as u32 >= self.features.max_entries
    }

    /// The per-lookup counter discipline: every classification counts a
    /// lookup; only a positive-priority hit counts as matched (a
    /// priority-zero table-miss entry is not a "match" in the stats
    /// sense); a hit with a timeout refreshes its idle clock.
    pub fn lookup(&self, pkt: &ParsedPacket<'_>, kind: ClassifierKind) -> Option<Arc<Flow>> {
        self.lookup_count.fetch_add(1, Ordering::Relaxed);
        let flow = self.flow_list.match_packet(pkt, kind);
        if let Some(f) = &flow {
            if f.priority > 0 {
                self.matched_count.fetch_add(1, Ordering::Relaxed);
            }
            if f.idle_timeout != 0 || f.hard_timeout != 0 {
                f.touch();
            }
        }
        flow
    }
}
