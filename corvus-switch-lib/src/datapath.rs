//! Per-packet pipeline: parse, cache probe, table walk.
//!
//! Classification starts at table 0 and follows GOTO_TABLE, applying
//! WRITE_METADATA between tables; the matched flows accumulate in
//! traversal order and the whole vector lands in the cache under the
//! packet's fingerprint.  Executing the instruction sets is the action
//! executor's job; the engine stops at handing them over.

use bytes::Bytes;
use std::sync::Arc;
use tracing::trace;

use crate::bridge::Bridge;
use crate::cache::FlowCache;
use crate::error::OfpResult;
use crate::events::{DpEvent, PacketOut};
use crate::flow::Flow;
use crate::flowdb::SwitchMode;
use crate::openflow::consts::OFPP_TABLE;
use crate::packet::{classify_packet, PacketMeta};

/// What the executor should do with a packet.
#[derive(Debug, Clone)]
pub enum PacketDisposition {
    /// Execute these instruction sets, in traversal order.
    Matched(Vec<Arc<Flow>>),
    /// Classifier miss in SECURE mode.
    Drop,
    /// Classifier miss in STANDALONE mode: forward as NORMAL.
    Normal,
    /// Classifier miss in OPENFLOW mode; a PACKET_IN event was queued.
    PacketIn,
}

impl Bridge {
    /// Classify a packet against the pipeline.  `cache` is the calling
    /// worker's partition; pass `None` to force full classification.
    pub fn process_packet(
        &self,
        cache: Option<&mut FlowCache>,
        data: &[u8],
        meta: PacketMeta,
    ) -> PacketDisposition {
        let mut pkt = classify_packet(data, meta, self.classify_opts());
        let fingerprint = pkt.fingerprint();

        let mut cache = cache;
        if let Some(cache) = cache.as_deref_mut() {
            if let Some(entry) = cache.lookup(fingerprint) {
                trace!(fingerprint, "cache hit");
                for flow in &entry.flows {
                    flow.account(data.len());
                }
                return PacketDisposition::Matched(entry.flows.clone());
            }
        }

        let kind = self.classifier();
        let mut matched: Vec<Arc<Flow>> = Vec::new();
        let miss_mode;
        {
            let db = self.db_read();
            let mut table_id = 0u8;
            loop {
                let Some(table) = db.table(table_id) else {
                    break;
                };
                match table.lookup(&pkt, kind) {
                    Some(flow) => {
                        flow.account(data.len());
                        if let Some((metadata, mask)) = flow.instructions.write_metadata() {
                            pkt.write_metadata(metadata, mask);
                        }
                        let next = flow.instructions.goto_table();
                        matched.push(flow);
                        match next {
                            Some(next) => table_id = next,
                            None => break,
                        }
                    }
                    None => break,
                }
            }
            miss_mode = db.switch_mode();
        }

        if matched.is_empty() {
            return self.miss(miss_mode, data, meta);
        }
        if let Some(cache) = cache {
            cache.insert(fingerprint, matched.clone());
        }
        PacketDisposition::Matched(matched)
    }

    fn miss(&self, mode: SwitchMode, data: &[u8], meta: PacketMeta) -> PacketDisposition {
        match mode {
            SwitchMode::Secure => PacketDisposition::Drop,
            SwitchMode::Standalone => PacketDisposition::Normal,
            SwitchMode::Openflow => {
                self.emit(DpEvent::PacketIn {
                    table_id: 0,
                    in_port: meta.in_port,
                    data: Bytes::copy_from_slice(data),
                });
                PacketDisposition::PacketIn
            }
        }
    }

    /// PACKET_OUT from the agent.  Returns `Some(disposition)` when the
    /// action list sends the packet through the tables (OFPP_TABLE);
    /// otherwise `None`, meaning the executor runs the list as-is.
    pub fn packet_out(&self, po: &PacketOut) -> OfpResult<Option<PacketDisposition>> {
        for action in &po.actions {
            action.validate(&|g| self.db_read().hooks().group_exists(g))?;
        }
        let to_table = po.actions.iter().any(|a| a.output_port() == Some(OFPP_TABLE));
        if !to_table {
            return Ok(None);
        }
        let meta = PacketMeta { in_port: po.in_port, in_phy_port: po.in_port, tunnel_id: 0 };
        Ok(Some(self.process_packet(None, &po.data, meta)))
    }
}

/// A dataplane worker: its scratch cache partition plus the bridge
/// handle.  Workers share no other mutable state.
#[derive(Debug)]
pub struct Worker {
    bridge: Arc<Bridge>,
    cache: Option<FlowCache>,
}

impl Worker {
    pub fn new(bridge: Arc<Bridge>) -> Worker {
        let cache = bridge.new_worker_cache();
        Worker { bridge, cache }
    }

    pub fn process(&mut self, data: &[u8], meta: PacketMeta) -> PacketDisposition {
        self.bridge.process_packet(self.cache.as_mut(), data, meta)
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }
}
