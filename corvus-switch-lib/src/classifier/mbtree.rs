//! Multi-branch tree: a statistics-driven classifier built offline.
//!
//! Flows are partitioned by ether type first.  Each partition counts its
//! (field, mask) pairs, orders them most-selective-first, and hashes flows
//! on the top field's aligned value; flows that do not constrain the
//! field go to a don't-care child subdivided on the next field.  Small
//! partitions revert to the sequential leaf.  Lookup follows the hash hit
//! and the don't-care branch in parallel and keeps the best priority.

use ahash::AHashMap;
use std::sync::Arc;

use super::flowinfo::FlowinfoBasic;
use super::{field_desc, FieldDesc};
use crate::flow::Flow;
use crate::openflow::oxm::OxmField;
use crate::packet::{ethertype, Base, ParsedPacket};

/// A table's tree is only worth building above this flow count.
pub const MBTREE_MIN_FLOWS: usize = 5;
/// Partitions at or below this size stay sequential.
const LEAF_MAX: usize = 4;
/// Recursion bound; one level per distinct field is the natural depth.
const DEPTH_MAX: usize = 15;

#[derive(Debug)]
enum MbNode {
    Hash {
        desc: &'static FieldDesc,
        children: AHashMap<u64, MbNode>,
        dontcare: Option<Box<MbNode>>,
    },
    Leaf(FlowinfoBasic),
}

#[derive(Debug, Default)]
pub struct Mbtree {
    branches: AHashMap<u16, MbNode>,
    dontcare: Option<MbNode>,
    nflow: usize,
}

/// Occurrence statistics for one (field, mask) pair.
struct MatchStats {
    field: OxmField,
    mask: Option<Vec<u8>>,
    count: usize,
    min_value: u64,
    max_value: u64,
}

impl MatchStats {
    /// Narrower value ranges first on equal counts; a tighter field splits
    /// the partition better.
    fn range(&self) -> u64 {
        self.max_value.wrapping_sub(self.min_value)
    }
}

fn collect_stats(flows: &[Arc<Flow>]) -> Vec<MatchStats> {
    let mut stats: Vec<MatchStats> = Vec::new();
    for flow in flows {
        for m in &flow.matches {
            if m.field == OxmField::EthType {
                // The ether-type partition already consumed it.
                continue;
            }
            let value = m.value_u64();
            match stats.iter_mut().find(|s| s.field == m.field && s.mask == m.mask) {
                Some(s) => {
                    s.count += 1;
                    s.min_value = s.min_value.min(value);
                    s.max_value = s.max_value.max(value);
                }
                None => stats.push(MatchStats {
                    field: m.field,
                    mask: m.mask.clone(),
                    count: 1,
                    min_value: value,
                    max_value: value,
                }),
            }
        }
    }
    stats.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then(a.range().cmp(&b.range()))
            .then(a.field.id().cmp(&b.field.id()))
    });
    stats
}

/// The flow's hash key under a descriptor: value shifted into packet
/// alignment.  Only exact terms are hashable; masked terms re-check in
/// the don't-care branch.
fn flow_key(flow: &Flow, field: OxmField, desc: &FieldDesc) -> Option<u64> {
    let term = flow.matches.iter().find(|m| m.field == field)?;
    if !term.is_exact() {
        return None;
    }
    Some((term.value_u64() << desc.shift) & desc.mask)
}

fn build_leaf(flows: Vec<Arc<Flow>>) -> MbNode {
    let mut basic = FlowinfoBasic::new();
    for flow in flows {
        basic.add(flow);
    }
    MbNode::Leaf(basic)
}

fn build_node(flows: Vec<Arc<Flow>>, stats: &[MatchStats], depth: usize) -> MbNode {
    if flows.len() <= LEAF_MAX || depth >= DEPTH_MAX {
        return build_leaf(flows);
    }
    // Most selective usable pair: hashable descriptor, exact mask.
    let Some(pos) = stats
        .iter()
        .position(|s| s.mask.is_none() && field_desc(s.field).hashable())
    else {
        return build_leaf(flows);
    };
    let stat = &stats[pos];
    let desc = field_desc(stat.field);
    let rest = &stats[pos + 1..];

    let mut groups: AHashMap<u64, Vec<Arc<Flow>>> = AHashMap::new();
    let mut dontcare_flows = Vec::new();
    for flow in flows {
        match flow_key(&flow, stat.field, desc) {
            Some(key) => groups.entry(key).or_default().push(flow),
            None => dontcare_flows.push(flow),
        }
    }

    let children = groups
        .into_iter()
        .map(|(key, group)| (key, build_node(group, rest, depth + 1)))
        .collect();
    let dontcare = if dontcare_flows.is_empty() {
        None
    } else {
        Some(Box::new(build_node(dontcare_flows, rest, depth + 1)))
    };
    MbNode::Hash { desc, children, dontcare }
}

impl Mbtree {
    /// Build the tree for one table's flow set.
    pub fn build(flows: &[Arc<Flow>]) -> Mbtree {
        let mut by_type: AHashMap<u16, Vec<Arc<Flow>>> = AHashMap::new();
        let mut dontcare_flows: Vec<Arc<Flow>> = Vec::new();
        for flow in flows {
            let eth_type = flow
                .matches
                .iter()
                .find(|m| m.field == OxmField::EthType)
                .map(|m| m.value_u16());
            match eth_type {
                Some(t) => by_type.entry(t).or_default().push(flow.clone()),
                None => dontcare_flows.push(flow.clone()),
            }
        }
        let branches = by_type
            .into_iter()
            .map(|(eth_type, group)| {
                let stats = collect_stats(&group);
                (eth_type, build_node(group, &stats, 0))
            })
            .collect();
        let dontcare = if dontcare_flows.is_empty() {
            None
        } else {
            let stats = collect_stats(&dontcare_flows);
            Some(build_node(dontcare_flows, &stats, 0))
        };
        Mbtree { branches, dontcare, nflow: flows.len() }
    }

    pub fn len(&self) -> usize {
        self.nflow
    }

    pub fn is_empty(&self) -> bool {
        self.nflow == 0
    }

    /// Best-priority match.  Probes the packet's ether-type branch, the
    /// announced type in front of an MPLS stack, the PBB branch when an
    /// I-TAG is present, and the no-ether-type branch.
    pub fn match_packet(&self, pkt: &ParsedPacket<'_>) -> Option<Arc<Flow>> {
        let mut best_prio = -1;
        let mut best = None;
        if let Some(node) = self.branches.get(&pkt.oob.ether_type) {
            merge(&mut best, node_match(node, pkt, &mut best_prio));
        }
        if let Some(mpls_off) = pkt.base(Base::Mpls) {
            if mpls_off >= 2 {
                let data = pkt.data();
                let announced = u16::from_be_bytes([data[mpls_off - 2], data[mpls_off - 1]]);
                if announced != pkt.oob.ether_type {
                    if let Some(node) = self.branches.get(&announced) {
                        merge(&mut best, node_match(node, pkt, &mut best_prio));
                    }
                }
            }
        }
        if pkt.has_base(Base::Pbb) && pkt.oob.ether_type != ethertype::PBB {
            if let Some(node) = self.branches.get(&ethertype::PBB) {
                merge(&mut best, node_match(node, pkt, &mut best_prio));
            }
        }
        if let Some(node) = &self.dontcare {
            merge(&mut best, node_match(node, pkt, &mut best_prio));
        }
        best
    }
}

fn merge(best: &mut Option<Arc<Flow>>, candidate: Option<Arc<Flow>>) {
    if candidate.is_some() {
        *best = candidate;
    }
}

fn node_match(
    node: &MbNode,
    pkt: &ParsedPacket<'_>,
    best_prio: &mut i32,
) -> Option<Arc<Flow>> {
    match node {
        MbNode::Leaf(basic) => basic.match_packet(pkt, best_prio),
        MbNode::Hash { desc, children, dontcare } => {
            let mut best = None;
            if let Some(raw) = pkt.load_u64(desc.base, desc.off, desc.size) {
                if let Some(child) = children.get(&(raw & desc.mask)) {
                    merge(&mut best, node_match(child, pkt, best_prio));
                }
            }
            if let Some(dc) = dontcare {
                merge(&mut best, node_match(dc, pkt, best_prio));
            }
            best
        }
    }
}
