//! A bridge: one flow database, its caches, and the message surface the
//! OpenFlow agent talks to.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::cache::{CacheControl, CacheStats, FlowCache};
use crate::config::{Config, UpdaterConfig};
use crate::error::OfpResult;
use crate::events::{DpEvent, FlowMod};
use crate::flow::Flow;
use crate::flowdb::{
    removal_event, AggregateStats, ClassifierKind, DpHooks, FlowList, FlowStatsEntry,
    FlowStatsRequest, Flowdb, SwitchMode, TableStatsEntry,
};
use crate::openflow::consts::OFPFF_SEND_FLOW_REM;
use crate::packet::ClassifyOptions;
use crate::updater::UpdaterCmd;

/// Per-bridge engine state.  The flowdb sits behind one RwLock: readers
/// are the workers' hot path, the writer is the agent thread, and the
/// write side is held only across a single flow mod.
pub struct Bridge {
    name: String,
    dpid: u64,
    classifier: ClassifierKind,
    classify_opts: ClassifyOptions,
    updater_cfg: UpdaterConfig,
    flowdb: RwLock<Flowdb>,
    cache_control: Arc<CacheControl>,
    cache_seed: Option<FlowCache>,
    events: Sender<DpEvent>,
    updater: Mutex<Option<Sender<UpdaterCmd>>>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("name", &self.name)
            .field("dpid", &self.dpid)
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Build a bridge from configuration; the returned receiver is the
    /// agent's event queue (FLOW_REMOVED, PACKET_IN, BARRIER_REPLY).
    pub fn new(config: &Config, hooks: DpHooks) -> (Arc<Bridge>, Receiver<DpEvent>) {
        let (tx, rx) = channel();
        let cache_control = Arc::new(CacheControl::default());
        let cache_seed = config
            .cache
            .enabled
            .then(|| FlowCache::new(config.cache.kind, cache_control.clone()));
        let mut flowdb = Flowdb::new(hooks);
        flowdb.set_switch_mode(config.mode.into());
        let bridge = Bridge {
            name: config.bridge.clone(),
            dpid: config.dpid,
            classifier: config.classifier.into(),
            classify_opts: ClassifyOptions { pbb_is_vlan: config.pbb_is_vlan },
            updater_cfg: config.updater,
            flowdb: RwLock::new(flowdb),
            cache_control,
            cache_seed,
            events: tx,
            updater: Mutex::new(None),
        };
        (Arc::new(bridge), rx)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dpid(&self) -> u64 {
        self.dpid
    }

    pub fn classifier(&self) -> ClassifierKind {
        self.classifier
    }

    pub fn classify_opts(&self) -> ClassifyOptions {
        self.classify_opts
    }

    pub fn updater_config(&self) -> UpdaterConfig {
        self.updater_cfg
    }

    pub(crate) fn db_read(&self) -> RwLockReadGuard<'_, Flowdb> {
        self.flowdb.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn db_write(&self) -> RwLockWriteGuard<'_, Flowdb> {
        self.flowdb.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn switch_mode(&self) -> SwitchMode {
        self.db_read().switch_mode()
    }

    pub fn set_switch_mode(&self, mode: SwitchMode) {
        self.db_write().set_switch_mode(mode);
    }

    /// Attach the updater's command channel; called by the updater spawn.
    pub(crate) fn attach_updater(&self, tx: Sender<UpdaterCmd>) {
        *self.updater.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
    }

    fn send_updater(&self, cmd: UpdaterCmd) -> bool {
        let guard = self.updater.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => tx.send(cmd).is_ok(),
            None => false,
        }
    }

    pub(crate) fn emit(&self, event: DpEvent) {
        if self.events.send(event).is_err() {
            warn!(bridge = %self.name, "event receiver dropped; event discarded");
        }
    }

    /// A cache handle for a worker thread, `None` when caching is off.
    pub fn new_worker_cache(&self) -> Option<FlowCache> {
        self.cache_seed.as_ref().map(FlowCache::worker_handle)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache_control.stats()
    }

    /// Invalidate every cache handle; contents drop on next touch.
    pub fn clear_caches(&self) {
        self.cache_control.invalidate_all();
    }

    /// Apply one flow mod: validate, mutate under the write lock, then
    /// invalidate caches, arm the flow timer and schedule index rebuilds.
    pub fn flow_mod(&self, fm: &FlowMod) -> OfpResult<()> {
        let mut events = Vec::new();
        let effect = self.db_write().apply(fm, &mut events)?;
        if effect.changed() {
            self.clear_caches();
            for flow in &effect.timed {
                if flow.timeout_secs().is_some() {
                    self.send_updater(UpdaterCmd::RegisterFlow(Arc::downgrade(flow)));
                }
            }
            if !self.send_updater(UpdaterCmd::TableChanged {
                table_ids: effect.changed_tables.clone(),
            }) {
                debug!(bridge = %self.name, "no updater attached; index snapshots stay stale");
            }
        }
        for event in events {
            self.emit(event);
        }
        Ok(())
    }

    /// BARRIER_REQUEST: drain pending rebuilds and flush caches before the
    /// reply.  Forwarded to the updater when one is attached.
    pub fn barrier_request(&self, xid: u32, channel_id: u64) {
        if !self.send_updater(UpdaterCmd::Barrier { xid, channel_id }) {
            self.rebuild_indexes_now();
            self.clear_caches();
            self.emit(DpEvent::BarrierReply { xid, channel_id });
        }
    }

    /// Remove a flow that timed out.  Called from the updater.
    pub(crate) fn remove_expired(&self, flow: &Flow, reason: u8) -> bool {
        let removed = {
            let mut db = self.db_write();
            match db.table_mut(flow.table_id) {
                Some(table) => table.flow_list.remove(flow),
                None => false,
            }
        };
        if removed {
            self.clear_caches();
            debug!(bridge = %self.name, table_id = flow.table_id, reason, "flow expired");
            if flow.flags & OFPFF_SEND_FLOW_REM != 0 {
                self.emit(removal_event(flow, reason));
            }
        }
        removed
    }

    /// Rebuild one table's mbtree: snapshot under the read lock, build
    /// with no lock held, install with a single pointer store.
    pub fn rebuild_table_mbtree(&self, table_id: u8) {
        let Some(snapshot) = self.snapshot_table(table_id) else {
            return;
        };
        let tree = FlowList::build_mbtree(&snapshot);
        if let Some(table) = self.db_read().table(table_id) {
            table.flow_list.install_mbtree(tree);
        }
    }

    pub fn rebuild_table_thtable(&self, table_id: u8) {
        let Some(snapshot) = self.snapshot_table(table_id) else {
            return;
        };
        let table_snapshot = FlowList::build_thtable(&snapshot);
        if let Some(table) = self.db_read().table(table_id) {
            table.flow_list.install_thtable(table_snapshot);
        }
    }

    fn snapshot_table(&self, table_id: u8) -> Option<Vec<Arc<Flow>>> {
        Some(self.db_read().table(table_id)?.flow_list.snapshot())
    }

    /// Rebuild every non-trivial table immediately (barrier path and
    /// updater-less operation).
    pub fn rebuild_indexes_now(&self) {
        let populated: Vec<u8> = {
            let db = self.db_read();
            db.tables()
                .filter(|t| !t.flow_list.is_empty() || t.flow_list.mbtree_snapshot().is_some()
                    || t.flow_list.thtable_snapshot().is_some())
                .map(|t| t.table_id)
                .collect()
        };
        for table_id in populated {
            self.rebuild_table_mbtree(table_id);
            self.rebuild_table_thtable(table_id);
        }
    }

    /// Classify one packet against a single table under an explicit
    /// strategy.  Diagnostic surface; the dataplane path is
    /// [`Bridge::process_packet`].
    pub fn classify_once(
        &self,
        table_id: u8,
        kind: ClassifierKind,
        data: &[u8],
        meta: crate::packet::PacketMeta,
    ) -> Option<Arc<Flow>> {
        let pkt = crate::packet::classify_packet(data, meta, self.classify_opts);
        let db = self.db_read();
        db.table(table_id)?.lookup(&pkt, kind)
    }

    // Stats surface; read lock per request.

    pub fn flow_stats(&self, req: &FlowStatsRequest) -> Vec<FlowStatsEntry> {
        self.db_read().flow_stats(req)
    }

    pub fn aggregate_stats(&self, req: &FlowStatsRequest) -> AggregateStats {
        self.db_read().aggregate_stats(req)
    }

    pub fn table_stats(&self) -> Vec<TableStatsEntry> {
        self.db_read().table_stats()
    }

    pub fn table_features(&self) -> Vec<(u8, crate::flowdb::TableFeatures)> {
        self.db_read().table_features()
    }
}

/// Explicit bridge registry; the show surface and the agent resolve
/// bridges through this instead of process-global state.
#[derive(Debug, Default)]
pub struct BridgeRegistry {
    bridges: Vec<Arc<Bridge>>,
}

impl BridgeRegistry {
    pub fn new() -> BridgeRegistry {
        BridgeRegistry::default()
    }

    pub fn register(&mut self, bridge: Arc<Bridge>) {
        self.bridges.push(bridge);
    }

    pub fn by_dpid(&self, dpid: u64) -> Option<&Arc<Bridge>> {
        self.bridges.iter().find(|b| b.dpid() == dpid)
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<Bridge>> {
        self.bridges.iter().find(|b| b.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Bridge>> {
        self.bridges.iter()
    }
}
