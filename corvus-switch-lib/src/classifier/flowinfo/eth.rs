//! Ether-type layer.  The child shape depends on the type: IPv4/IPv6 get
//! an IP-protocol layer, MPLS gets the label tree, everything else (ARP,
//! PBB, unknown types) a sequential leaf.

use ahash::AHashMap;
use std::sync::Arc;

use super::{
    basic::FlowinfoBasic, exact_field, ip::FlowinfoIpProto, merge, mpls::FlowinfoMpls, Flowinfo,
};
use crate::flow::Flow;
use crate::openflow::oxm::OxmField;
use crate::packet::{ethertype, ParsedPacket};

#[derive(Debug)]
pub struct FlowinfoEthType {
    children: AHashMap<u16, Flowinfo>,
    misc: Box<Flowinfo>,
    nflow: usize,
}

impl FlowinfoEthType {
    pub fn new() -> Self {
        FlowinfoEthType {
            children: AHashMap::new(),
            misc: Box::new(Flowinfo::Basic(FlowinfoBasic::new())),
            nflow: 0,
        }
    }

    fn new_child(eth_type: u16) -> Flowinfo {
        match eth_type {
            ethertype::IPV4 | ethertype::IPV6 => Flowinfo::IpProto(FlowinfoIpProto::new()),
            ethertype::MPLS | ethertype::MPLS_MCAST => Flowinfo::Mpls(FlowinfoMpls::new()),
            _ => Flowinfo::Basic(FlowinfoBasic::new()),
        }
    }

    fn key_of_flow(flow: &Flow) -> Option<u16> {
        exact_field(flow, OxmField::EthType).map(|v| v as u16)
    }

    pub fn add(&mut self, flow: Arc<Flow>) {
        self.nflow += 1;
        match Self::key_of_flow(&flow) {
            Some(key) => self
                .children
                .entry(key)
                .or_insert_with(|| Self::new_child(key))
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
        if let Some(child) = self.children.get(&pkt.oob.ether_type) {
            merge(&mut best, child.match_packet(pkt, best_prio));
        }
        merge(&mut best, self.misc.match_packet(pkt, best_prio));
        best
    }

    pub fn len(&self) -> usize {
        self.nflow
    }
}
