//! IP-protocol layer under IPv4 and IPv6: an indexed array of 256
//! children.  TCP/UDP/SCTP and the ICMPs get port/type leaves; other
//! protocols a sequential leaf.

use std::sync::Arc;

use super::{basic::FlowinfoBasic, exact_field, l4::FlowinfoL4, merge, Flowinfo};
use crate::flow::Flow;
use crate::openflow::oxm::OxmField;
use crate::packet::{Base, ParsedPacket};

#[derive(Debug)]
pub struct FlowinfoIpProto {
    children: Vec<Option<Box<Flowinfo>>>,
    misc: Box<Flowinfo>,
    nflow: usize,
}

impl FlowinfoIpProto {
    pub fn new() -> Self {
        let mut children = Vec::with_capacity(256);
        children.resize_with(256, || None);
        FlowinfoIpProto {
            children,
            misc: Box::new(Flowinfo::Basic(FlowinfoBasic::new())),
            nflow: 0,
        }
    }

    fn new_child(proto: u8) -> Flowinfo {
        match proto {
            6 => Flowinfo::L4Port(FlowinfoL4::tcp()),
            17 => Flowinfo::L4Port(FlowinfoL4::udp()),
            132 => Flowinfo::L4Port(FlowinfoL4::sctp()),
            1 => Flowinfo::L4Port(FlowinfoL4::icmpv4()),
            58 => Flowinfo::L4Port(FlowinfoL4::icmpv6()),
            _ => Flowinfo::Basic(FlowinfoBasic::new()),
        }
    }

    fn key_of_flow(flow: &Flow) -> Option<u8> {
        exact_field(flow, OxmField::IpProto).map(|v| v as u8)
    }

    pub fn add(&mut self, flow: Arc<Flow>) {
        self.nflow += 1;
        match Self::key_of_flow(&flow) {
            Some(proto) => self.children[usize::from(proto)]
                .get_or_insert_with(|| Box::new(Self::new_child(proto)))
                .add(flow),
            None => self.misc.add(flow),
        }
    }

    pub fn del(&mut self, flow: &Flow) -> bool {
        let removed = match Self::key_of_flow(flow) {
            Some(proto) => self.children[usize::from(proto)]
                .as_mut()
                .is_some_and(|child| child.del(flow)),
            None => self.misc.del(flow),
        };
        if removed {
            self.nflow -= 1;
        }
        removed
    }

    pub fn find(&self, flow: &Flow) -> Option<Arc<Flow>> {
        match Self::key_of_flow(flow) {
            Some(proto) => self.children[usize::from(proto)].as_ref()?.find(flow),
            None => self.misc.find(flow),
        }
    }

    pub fn match_packet(
        &self,
        pkt: &ParsedPacket<'_>,
        best_prio: &mut i32,
    ) -> Option<Arc<Flow>> {
        let mut best = None;
        if let Some(proto) = pkt.load_u64(Base::IpProto, 0, 1) {
            if let Some(child) = &self.children[proto as usize] {
                merge(&mut best, child.match_packet(pkt, best_prio));
            }
        }
        merge(&mut best, self.misc.match_packet(pkt, best_prio));
        best
    }

    pub fn len(&self) -> usize {
        self.nflow
    }
}
