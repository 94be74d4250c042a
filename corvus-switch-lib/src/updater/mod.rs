//! The updater thread: flow timeouts and debounced index rebuilds.
//!
//! One thread owns the timer wheel and the rebuild deadlines.  Flow mods
//! arm a per-table debounce (mbtree and thtable run on separate, slower
//! schedules); a barrier drains everything pending, flushes the caches
//! and emits the reply.  The loop re-checks its shutdown flag at least
//! once a second.

mod wheel;

pub use wheel::TimerWheel;

use ahash::AHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::bridge::Bridge;
use crate::events::DpEvent;
use crate::flow::Flow;

/// Commands from the bridge / agent into the updater.
#[derive(Debug)]
pub enum UpdaterCmd {
    /// A flow mod touched these tables; arm the rebuild debounce.
    TableChanged { table_ids: Vec<u8> },
    /// A flow with a timeout entered a table.
    RegisterFlow(Weak<Flow>),
    /// Drain pending rebuilds, flush caches, reply.
    Barrier { xid: u32, channel_id: u64 },
    /// Flush caches without a barrier reply.
    ClearCaches,
    Shutdown,
}

/// Handle returned by [`spawn_updater`].
pub struct UpdaterHandle {
    tx: Sender<UpdaterCmd>,
    shutdown: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl UpdaterHandle {
    pub fn sender(&self) -> Sender<UpdaterCmd> {
        self.tx.clone()
    }

    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::Release);
        let _ = self.tx.send(UpdaterCmd::Shutdown);
        let _ = self.join.join();
    }
}

/// Spawn the updater for a bridge and attach its command channel.
pub fn spawn_updater(bridge: Arc<Bridge>) -> std::io::Result<UpdaterHandle> {
    let (tx, rx) = channel();
    bridge.attach_updater(tx.clone());
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    let join = std::thread::Builder::new()
        .name(format!("{}-updater", bridge.name()))
        .spawn(move || Updater::new(bridge, rx, flag).run())?;
    Ok(UpdaterHandle { tx, shutdown, join })
}

#[derive(Debug, Default)]
struct RebuildState {
    mbtree_due: Option<Instant>,
    thtable_due: Option<Instant>,
}

struct Updater {
    bridge: Arc<Bridge>,
    rx: Receiver<UpdaterCmd>,
    shutdown: Arc<AtomicBool>,
    wheel: TimerWheel,
    pending: AHashMap<u8, RebuildState>,
    mbtree_debounce: Duration,
    thtable_debounce: Duration,
}

impl Updater {
    fn new(bridge: Arc<Bridge>, rx: Receiver<UpdaterCmd>, shutdown: Arc<AtomicBool>) -> Updater {
        let updater_cfg = bridge.updater_config();
        Updater {
            bridge,
            rx,
            shutdown,
            wheel: TimerWheel::new(),
            pending: AHashMap::new(),
            mbtree_debounce: Duration::from_millis(updater_cfg.mbtree_debounce_ms),
            thtable_debounce: Duration::from_millis(updater_cfg.thtable_debounce_ms),
        }
    }

    fn run(mut self) {
        info!(bridge = %self.bridge.name(), "updater started");
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }
            match self.rx.recv_timeout(Duration::from_millis(250)) {
                Ok(UpdaterCmd::Shutdown) => break,
                Ok(cmd) => self.handle(cmd),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.tick(Instant::now());
        }
        info!(bridge = %self.bridge.name(), "updater stopped");
    }

    fn handle(&mut self, cmd: UpdaterCmd) {
        match cmd {
            UpdaterCmd::TableChanged { table_ids } => {
                let now = Instant::now();
                for table_id in table_ids {
                    let state = self.pending.entry(table_id).or_default();
                    state.mbtree_due = Some(now + self.mbtree_debounce);
                    state.thtable_due = Some(now + self.thtable_debounce);
                }
            }
            UpdaterCmd::RegisterFlow(weak) => {
                if let Some(flow) = weak.upgrade() {
                    self.wheel.register(&flow);
                }
            }
            UpdaterCmd::Barrier { xid, channel_id } => {
                self.flush_rebuilds();
                self.bridge.clear_caches();
                self.bridge.emit(DpEvent::BarrierReply { xid, channel_id });
                debug!(xid, channel_id, "barrier drained");
            }
            UpdaterCmd::ClearCaches => self.bridge.clear_caches(),
            UpdaterCmd::Shutdown => {}
        }
    }

    /// One pass: expire due flows, run rebuilds whose debounce elapsed.
    fn tick(&mut self, now: Instant) {
        for (flow, reason) in self.wheel.tick(now) {
            if self.bridge.remove_expired(&flow, reason) {
                let state = self.pending.entry(flow.table_id).or_default();
                state.mbtree_due = Some(now + self.mbtree_debounce);
                state.thtable_due = Some(now + self.thtable_debounce);
            }
        }
        let due: Vec<u8> = self.pending.keys().copied().collect();
        for table_id in due {
            let Some(state) = self.pending.get_mut(&table_id) else {
                continue;
            };
            if state.mbtree_due.is_some_and(|t| now >= t) {
                state.mbtree_due = None;
                self.bridge.rebuild_table_mbtree(table_id);
            }
            let Some(state) = self.pending.get_mut(&table_id) else {
                continue;
            };
            if state.thtable_due.is_some_and(|t| now >= t) {
                state.thtable_due = None;
                self.bridge.rebuild_table_thtable(table_id);
            }
            if self
                .pending
                .get(&table_id)
                .is_some_and(|s| s.mbtree_due.is_none() && s.thtable_due.is_none())
            {
                self.pending.remove(&table_id);
            }
        }
    }

    /// Barrier path: everything pending rebuilds immediately.
    fn flush_rebuilds(&mut self) {
        for (table_id, _) in std::mem::take(&mut self.pending) {
            self.bridge.rebuild_table_mbtree(table_id);
            self.bridge.rebuild_table_thtable(table_id);
        }
    }
}
