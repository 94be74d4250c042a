//! MPLS layer: a patricia tree over the 20-bit label space.

use std::sync::Arc;

use super::{basic::FlowinfoBasic, exact_field, merge};
use crate::classifier::ptree::Ptree;
use crate::flow::Flow;
use crate::openflow::oxm::OxmField;
use crate::packet::{Base, ParsedPacket};

const LABEL_PLEN: u8 = 20;

fn label_key(label: u64) -> u64 {
    label << 44
}

#[derive(Debug)]
pub struct FlowinfoMpls {
    tree: Ptree<FlowinfoBasic>,
    misc: FlowinfoBasic,
    nflow: usize,
}

impl FlowinfoMpls {
    pub fn new() -> Self {
        FlowinfoMpls { tree: Ptree::new(), misc: FlowinfoBasic::new(), nflow: 0 }
    }

    fn key_of_flow(flow: &Flow) -> Option<u64> {
        exact_field(flow, OxmField::MplsLabel)
    }

    /// The label is the top 20 bits of the first label stack entry.
    fn key_of_packet(pkt: &ParsedPacket<'_>) -> Option<u64> {
        pkt.load_u64(Base::Mpls, 0, 4).map(|lse| lse >> 12)
    }

    pub fn add(&mut self, flow: Arc<Flow>) {
        self.nflow += 1;
        match Self::key_of_flow(&flow) {
            Some(label) => self
                .tree
                .entry_or_insert_with(label_key(label), LABEL_PLEN, FlowinfoBasic::new)
                .add(flow),
            None => self.misc.add(flow),
        }
    }

    pub fn del(&mut self, flow: &Flow) -> bool {
        let removed = match Self::key_of_flow(flow) {
            Some(label) => {
                let key = label_key(label);
                match self.tree.get_mut(key, LABEL_PLEN) {
                    Some(leaf) => {
                        let removed = leaf.del(flow);
                        if removed && leaf.is_empty() {
                            self.tree.remove(key, LABEL_PLEN);
                        }
                        removed
                    }
                    None => false,
                }
            }
            None => self.misc.del(flow),
        };
        if removed {
            self.nflow -= 1;
        }
        removed
    }

    pub fn find(&self, flow: &Flow) -> Option<Arc<Flow>> {
        match Self::key_of_flow(flow) {
            Some(label) => self.tree.get(label_key(label), LABEL_PLEN)?.find(flow),
            None => self.misc.find(flow),
        }
    }

    pub fn match_packet(
        &self,
        pkt: &ParsedPacket<'_>,
        best_prio: &mut i32,
    ) -> Option<Arc<Flow>> {
        let mut best = None;
        if let Some(label) = Self::key_of_packet(pkt) {
            if let Some(leaf) = self.tree.get(label_key(label), LABEL_PLEN) {
                merge(&mut best, leaf.match_packet(pkt, best_prio));
            }
        }
        merge(&mut best, self.misc.match_packet(pkt, best_prio));
        best
    }

    pub fn len(&self) -> usize {
        self.nflow
    }
}
