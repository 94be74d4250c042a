//! L4 leaves: TCP/UDP/SCTP keyed by destination port, the ICMPs keyed by
//! message type.  Flows without an exact key re-check in misc.

use ahash::AHashMap;
use std::sync::Arc;

use super::{basic::FlowinfoBasic, exact_field, merge};
use crate::flow::Flow;
use crate::openflow::oxm::OxmField;
use crate::packet::{Base, ParsedPacket};

#[derive(Debug)]
pub struct FlowinfoL4 {
    /// The dispatch field and where it sits in the L4 header.
    field: OxmField,
    off: usize,
    size: usize,
    children: AHashMap<u64, FlowinfoBasic>,
    misc: FlowinfoBasic,
    nflow: usize,
}

impl FlowinfoL4 {
    fn new(field: OxmField, off: usize, size: usize) -> Self {
        FlowinfoL4 {
            field,
            off,
            size,
            children: AHashMap::new(),
            misc: FlowinfoBasic::new(),
            nflow: 0,
        }
    }

    pub fn tcp() -> Self {
        Self::new(OxmField::TcpDst, 2, 2)
    }

    pub fn udp() -> Self {
        Self::new(OxmField::UdpDst, 2, 2)
    }

    pub fn sctp() -> Self {
        Self::new(OxmField::SctpDst, 2, 2)
    }

    pub fn icmpv4() -> Self {
        Self::new(OxmField::Icmpv4Type, 0, 1)
    }

    pub fn icmpv6() -> Self {
        Self::new(OxmField::Icmpv6Type, 0, 1)
    }

    pub fn add(&mut self, flow: Arc<Flow>) {
        self.nflow += 1;
        match exact_field(&flow, self.field) {
            Some(key) => self.children.entry(key).or_default().add(flow),
            None => self.misc.add(flow),
        }
    }

    pub fn del(&mut self, flow: &Flow) -> bool {
        let removed = match exact_field(flow, self.field) {
            Some(key) => self.children.get_mut(&key).is_some_and(|child| child.del(flow)),
            None => self.misc.del(flow),
        };
        if removed {
            self.nflow -= 1;
        }
        removed
    }

    pub fn find(&self, flow: &Flow) -> Option<Arc<Flow>> {
        match exact_field(flow, self.field) {
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
        if let Some(key) = pkt.load_u64(Base::L4, self.off, self.size) {
            if let Some(child) = self.children.get(&key) {
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
