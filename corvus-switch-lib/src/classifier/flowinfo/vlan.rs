//! Root layer: VLAN VID, `OFPVID_PRESENT`-aware.
//!
//! A bare (exact) VID match selects a keyed child; a masked VID, a PCP
//! without VID, or no VLAN constraint at all falls through to misc.  Key
//! zero is the untagged-only child.

use ahash::AHashMap;
use std::sync::Arc;

use super::{exact_field, merge, eth::FlowinfoEthType, Flowinfo};
use crate::flow::Flow;
use crate::openflow::oxm::OxmField;
use crate::packet::ParsedPacket;

#[derive(Debug)]
pub struct FlowinfoVlanVid {
    children: AHashMap<u16, Flowinfo>,
    misc: Box<Flowinfo>,
    nflow: usize,
}

impl FlowinfoVlanVid {
    pub fn new() -> Self {
        FlowinfoVlanVid {
            children: AHashMap::new(),
            misc: Box::new(Flowinfo::EthType(FlowinfoEthType::new())),
            nflow: 0,
        }
    }

    fn key_of_flow(flow: &Flow) -> Option<u16> {
        exact_field(flow, OxmField::VlanVid).map(|v| v as u16 & 0x1fff)
    }

    fn key_of_packet(pkt: &ParsedPacket<'_>) -> u16 {
        pkt.oob.vlan_tci & 0x1fff
    }

    pub fn add(&mut self, flow: Arc<Flow>) {
        self.nflow += 1;
        match Self::key_of_flow(&flow) {
            Some(key) => self
                .children
                .entry(key)
                .or_insert_with(|| Flowinfo::EthType(FlowinfoEthType::new()))
                .add(flow),
            None => self.misc.add(flow),
        }
    }

    pub fn del(&mut self, flow: &Flow) -> bool {
        let removed = match Self::key_of_flow(flow) {
            Some(key) => self.children.get_mut(&key).is_some_and(|child| child.del(flow)),
            None => self.misc.del(flow),
        };
        if removed {
            self.nflow -= 1;
        }
        removed
    }

    pub fn find(&self, flow: &Flow) -> Option<Arc<Flow>> {
        match Self::key_of_flow(flow) {
            Some(key) => self.children.get(&key)?.find(flow),
            None => self.misc.find(flow),
        }
    }

    pub fn match_packet(
        &self,
        pkt: &ParsedPacket<'_>,
        best_prio: &mut i32,
    ) -> Option<Arc<Flow>> {
        let mut best = None;
        if let Some(child) = self.children.get(&Self::key_of_packet(pkt)) {
            merge(&mut best, child.match_packet(pkt, best_prio));
        }
        merge(&mut best, self.misc.match_packet(pkt, best_prio));
        best
    }

    pub fn len(&self) -> usize {
        self.nflow
    }
}
