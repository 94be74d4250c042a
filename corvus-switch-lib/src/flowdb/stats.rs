//! Flow, aggregate and table statistics, shaped per OpenFlow 1.3.

use std::sync::Arc;

use super::{Flowdb, FLOWDB_TABLE_SIZE_MAX};
use crate::flow::{CompiledMatch, Flow};
use crate::openflow::consts::{OFPG_ANY, OFPP_ANY, OFPTT_ALL};
use crate::openflow::oxm::Oxm;

/// Selector shared by FLOW_STATS and AGGREGATE_STATS requests.
#[derive(Debug, Clone)]
pub struct FlowStatsRequest {
    pub table_id: u8,
    pub out_port: u32,
    pub out_group: u32,
    pub cookie: u64,
    pub cookie_mask: u64,
    pub matches: Vec<Oxm>,
}

impl Default for FlowStatsRequest {
    fn default() -> Self {
        FlowStatsRequest {
            table_id: OFPTT_ALL,
            out_port: OFPP_ANY,
            out_group: OFPG_ANY,
            cookie: 0,
            cookie_mask: 0,
            matches: Vec::new(),
        }
    }
}

/// One `ofp_flow_stats` entry.
#[derive(Debug, Clone)]
pub struct FlowStatsEntry {
    pub table_id: u8,
    pub duration_sec: u64,
    pub duration_nsec: u32,
    pub priority: i32,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub flags: u16,
    pub cookie: u64,
    pub packet_count: u64,
    pub byte_count: u64,
    pub matches: Vec<Oxm>,
}

impl FlowStatsEntry {
    fn from_flow(flow: &Flow) -> FlowStatsEntry {
        let duration = flow.duration();
        FlowStatsEntry {
            table_id: flow.table_id,
            duration_sec: duration.as_secs(),
            duration_nsec: duration.subsec_nanos(),
            priority: flow.priority,
            idle_timeout: flow.idle_timeout,
            hard_timeout: flow.hard_timeout,
            flags: flow.flags,
            cookie: flow.cookie,
            packet_count: flow.packet_count(),
            byte_count: flow.byte_count(),
            matches: flow.matches.clone(),
        }
    }
}

/// `ofp_aggregate_stats_reply`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub packet_count: u64,
    pub byte_count: u64,
    pub flow_count: u32,
}

/// One `ofp_table_stats` entry.
#[derive(Debug, Clone)]
pub struct TableStatsEntry {
    pub table_id: u8,
    pub active_count: u32,
    pub lookup_count: u64,
    pub matched_count: u64,
}

impl Flowdb {
    fn select_flows(&self, req: &FlowStatsRequest) -> Vec<Arc<Flow>> {
        let selector = CompiledMatch::compile(&req.matches);
        let table_ids: Vec<u8> = if req.table_id == OFPTT_ALL {
            (0..FLOWDB_TABLE_SIZE_MAX as u8).collect()
        } else {
            vec![req.table_id]
        };
        let mut out = Vec::new();
        for table_id in table_ids {
            let Some(table) = self.table(table_id) else {
                continue;
            };
            out.extend(
                table
                    .flow_list
                    .iter()
                    .filter(|f| selector.subsumes(&f.compiled))
                    .filter(|f| f.cookie_matches(req.cookie, req.cookie_mask))
                    .filter(|f| f.references(req.out_port, req.out_group))
                    .cloned(),
            );
        }
        out
    }

    /// FLOW_STATS_REQUEST.
    pub fn flow_stats(&self, req: &FlowStatsRequest) -> Vec<FlowStatsEntry> {
        self.select_flows(req)
            .iter()
            .map(|f| FlowStatsEntry::from_flow(f))
            .collect()
    }

    /// AGGREGATE_STATS_REQUEST.
    pub fn aggregate_stats(&self, req: &FlowStatsRequest) -> AggregateStats {
        let mut agg = AggregateStats::default();
        for flow in self.select_flows(req) {
            agg.packet_count += flow.packet_count();
            agg.byte_count += flow.byte_count();
            agg.flow_count += 1;
        }
        agg
    }

    /// TABLE_FEATURES_REQUEST.
    pub fn table_features(&self) -> Vec<(u8, super::TableFeatures)> {
        self.tables().map(|t| (t.table_id, t.features.clone())).collect()
    }

    /// TABLE_STATS_REQUEST.  Empty tables are reported too; the agent
    /// trims them if it cares.
    pub fn table_stats(&self) -> Vec<TableStatsEntry> {
        self.tables()
            .map(|t| TableStatsEntry {
                table_id: t.table_id,
                active_count: t.flow_list.len() as u32,
                lookup_count: t.lookup_count(),
                matched_count: t.matched_count(),
            })
            .collect()
    }
}
