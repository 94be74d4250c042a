//! Hierarchical classification index.
//!
//! Each layer dispatches on one field and keeps a `misc` child for flows
//! that do not constrain it; match evaluation walks every path whose key
//! matches the packet (the keyed child and misc), threads the best
//! priority down and propagates the maximum back up.  Dispatched fields
//! stay in the compiled match, so the sequential leaves re-check them;
//! that keeps masked keys correct at the price of a cheap compare.

mod basic;
mod eth;
mod ip;
mod l4;
mod mpls;
mod vlan;

pub use basic::FlowinfoBasic;
pub use eth::FlowinfoEthType;
pub use ip::FlowinfoIpProto;
pub use l4::FlowinfoL4;
pub use mpls::FlowinfoMpls;
pub use vlan::FlowinfoVlanVid;

use std::sync::Arc;

use crate::flow::Flow;
use crate::openflow::oxm::OxmField;
use crate::packet::ParsedPacket;

/// A node in the hierarchy.  The variant set is closed; dispatch happens
/// once per layer, so enum dispatch costs nothing measurable.
#[derive(Debug)]
pub enum Flowinfo {
    Basic(FlowinfoBasic),
    VlanVid(FlowinfoVlanVid),
    EthType(FlowinfoEthType),
    IpProto(FlowinfoIpProto),
    L4Port(FlowinfoL4),
    Mpls(FlowinfoMpls),
}

impl Flowinfo {
    /// The root of a table's index: VLAN VID first.
    pub fn new_root() -> Flowinfo {
        Flowinfo::VlanVid(FlowinfoVlanVid::new())
    }

    pub fn add(&mut self, flow: Arc<Flow>) {
        match self {
            Flowinfo::Basic(fi) => fi.add(flow),
            Flowinfo::VlanVid(fi) => fi.add(flow),
            Flowinfo::EthType(fi) => fi.add(flow),
            Flowinfo::IpProto(fi) => fi.add(flow),
            Flowinfo::L4Port(fi) => fi.add(flow),
            Flowinfo::Mpls(fi) => fi.add(flow),
        }
    }

    /// Remove a specific entry; true when it was present.
    pub fn del(&mut self, flow: &Flow) -> bool {
        match self {
            Flowinfo::Basic(fi) => fi.del(flow),
            Flowinfo::VlanVid(fi) => fi.del(flow),
            Flowinfo::EthType(fi) => fi.del(flow),
            Flowinfo::IpProto(fi) => fi.del(flow),
            Flowinfo::L4Port(fi) => fi.del(flow),
            Flowinfo::Mpls(fi) => fi.del(flow),
        }
    }

    /// Locate the strict twin (same priority, same match set) of `flow`.
    pub fn find(&self, flow: &Flow) -> Option<Arc<Flow>> {
        match self {
            Flowinfo::Basic(fi) => fi.find(flow),
            Flowinfo::VlanVid(fi) => fi.find(flow),
            Flowinfo::EthType(fi) => fi.find(flow),
            Flowinfo::IpProto(fi) => fi.find(flow),
            Flowinfo::L4Port(fi) => fi.find(flow),
            Flowinfo::Mpls(fi) => fi.find(flow),
        }
    }

    /// Best match above `*best_prio`; updates the bound when returning a
    /// flow.
    pub fn match_packet(
        &self,
        pkt: &ParsedPacket<'_>,
        best_prio: &mut i32,
    ) -> Option<Arc<Flow>> {
        match self {
            Flowinfo::Basic(fi) => fi.match_packet(pkt, best_prio),
            Flowinfo::VlanVid(fi) => fi.match_packet(pkt, best_prio),
            Flowinfo::EthType(fi) => fi.match_packet(pkt, best_prio),
            Flowinfo::IpProto(fi) => fi.match_packet(pkt, best_prio),
            Flowinfo::L4Port(fi) => fi.match_packet(pkt, best_prio),
            Flowinfo::Mpls(fi) => fi.match_packet(pkt, best_prio),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Flowinfo::Basic(fi) => fi.len(),
            Flowinfo::VlanVid(fi) => fi.len(),
            Flowinfo::EthType(fi) => fi.len(),
            Flowinfo::IpProto(fi) => fi.len(),
            Flowinfo::L4Port(fi) => fi.len(),
            Flowinfo::Mpls(fi) => fi.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The flow's value for `field` when it is matched exactly (no mask or an
/// all-ones mask); dispatch keys come from here, everything else falls
/// through to misc.
fn exact_field(flow: &Flow, field: OxmField) -> Option<u64> {
    flow.matches
        .iter()
        .find(|m| m.field == field)
        .filter(|m| m.is_exact())
        .map(|m| m.value_u64())
}

/// Fold a candidate into the running best.  Children only return flows
/// that beat the shared priority bound, so the last candidate wins.
fn merge(best: &mut Option<Arc<Flow>>, candidate: Option<Arc<Flow>>) {
    if candidate.is_some() {
        *best = candidate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::InstructionSet;
    use crate::openflow::oxm::Oxm;
    use crate::packet::{classify_packet, ethertype, testpkt, ClassifyOptions, PacketMeta};
    use std::net::Ipv4Addr;

    fn flow(priority: i32, matches: Vec<Oxm>) -> Arc<Flow> {
        Flow::new(priority, 0, 0, 0, 0, 0, matches, InstructionSet::default())
    }

    fn best_match<'a>(fi: &Flowinfo, frame: &'a [u8], in_port: u32) -> Option<Arc<Flow>> {
        let pkt = classify_packet(
            frame,
            PacketMeta { in_port, ..Default::default() },
            ClassifyOptions::default(),
        );
        let mut prio = -1;
        fi.match_packet(&pkt, &mut prio)
    }

    #[test]
    fn dispatches_through_vlan_eth_ip_l4() {
        let mut root = Flowinfo::new_root();
        let f_tcp = flow(
            10,
            vec![Oxm::eth_type(ethertype::IPV4), Oxm::ip_proto(6), Oxm::tcp_dst(80)],
        );
        let f_udp = flow(
            20,
            vec![Oxm::eth_type(ethertype::IPV4), Oxm::ip_proto(17), Oxm::udp_dst(53)],
        );
        let f_any = flow(1, vec![]);
        root.add(f_tcp.clone());
        root.add(f_udp.clone());
        root.add(f_any.clone());
        assert_eq!(root.len(), 3);

        let hit = best_match(&root, &testpkt::tcp4(1000, 80), 1).expect("tcp match");
        assert!(Arc::ptr_eq(&hit, &f_tcp));

        let hit = best_match(&root, &testpkt::udp4(1000, 53), 1).expect("udp match");
        assert!(Arc::ptr_eq(&hit, &f_udp));

        // Port 81: only the catch-all matches.
        let hit = best_match(&root, &testpkt::tcp4(1000, 81), 1).expect("fallback");
        assert!(Arc::ptr_eq(&hit, &f_any));
    }

    #[test]
    fn priority_wins_across_branches() {
        let mut root = Flowinfo::new_root();
        let specific = flow(
            5,
            vec![Oxm::eth_type(ethertype::IPV4), Oxm::ipv4_dst(Ipv4Addr::new(192, 168, 1, 2))],
        );
        let broad = flow(50, vec![Oxm::in_port(1)]);
        root.add(specific);
        root.add(broad.clone());

        let hit = best_match(&root, &testpkt::tcp4(1, 2), 1).expect("match");
        assert!(Arc::ptr_eq(&hit, &broad));
    }

    #[test]
    fn vlan_layer_separates_tagged_and_untagged() {
        let mut root = Flowinfo::new_root();
        let tagged = flow(10, vec![Oxm::vlan_vid(100)]);
        let untagged = flow(10, vec![Oxm::vlan_vid_none()]);
        root.add(tagged.clone());
        root.add(untagged.clone());

        let plain = testpkt::tcp4(1, 2);
        let hit = best_match(&root, &plain, 1).expect("untagged");
        assert!(Arc::ptr_eq(&hit, &untagged));

        let vlan_frame = testpkt::vlan(100, 0, testpkt::tcp4(1, 2));
        let hit = best_match(&root, &vlan_frame, 1).expect("tagged");
        assert!(Arc::ptr_eq(&hit, &tagged));

        let other_vid = testpkt::vlan(101, 0, testpkt::tcp4(1, 2));
        assert!(best_match(&root, &other_vid, 1).is_none());
    }

    #[test]
    fn masked_vid_falls_through_to_misc() {
        let mut root = Flowinfo::new_root();
        let any_tagged = flow(
            10,
            vec![Oxm::vlan_vid_masked(
                crate::openflow::consts::OFPVID_PRESENT,
                crate::openflow::consts::OFPVID_PRESENT,
            )],
        );
        root.add(any_tagged.clone());

        let vlan_frame = testpkt::vlan(42, 0, testpkt::tcp4(1, 2));
        let hit = best_match(&root, &vlan_frame, 1).expect("any tagged");
        assert!(Arc::ptr_eq(&hit, &any_tagged));
        assert!(best_match(&root, &testpkt::tcp4(1, 2), 1).is_none());
    }

    #[test]
    fn mpls_label_layer() {
        let mut root = Flowinfo::new_root();
        let f1000 = flow(10, vec![Oxm::eth_type(ethertype::MPLS), Oxm::mpls_label(1000)]);
        let fbos = flow(
            20,
            vec![Oxm::eth_type(ethertype::MPLS), Oxm::mpls_label(2000), Oxm::mpls_bos(1)],
        );
        root.add(f1000.clone());
        root.add(fbos.clone());

        let frame = testpkt::mpls(&[(1000, true)], testpkt::ipv4_min(17));
        let hit = best_match(&root, &frame, 1).expect("label 1000");
        assert!(Arc::ptr_eq(&hit, &f1000));

        let frame = testpkt::mpls(&[(2000, true)], testpkt::ipv4_min(17));
        let hit = best_match(&root, &frame, 1).expect("label 2000");
        assert!(Arc::ptr_eq(&hit, &fbos));

        let frame = testpkt::mpls(&[(3000, true)], testpkt::ipv4_min(17));
        assert!(best_match(&root, &frame, 1).is_none());
    }

    #[test]
    fn del_and_find_route_like_add() {
        let mut root = Flowinfo::new_root();
        let f = flow(10, vec![Oxm::eth_type(ethertype::IPV4), Oxm::ip_proto(6), Oxm::tcp_dst(80)]);
        root.add(f.clone());

        let twin = flow(10, vec![Oxm::eth_type(ethertype::IPV4), Oxm::ip_proto(6), Oxm::tcp_dst(80)]);
        let found = root.find(&twin).expect("strict twin");
        assert!(Arc::ptr_eq(&found, &f));

        let lower = flow(9, vec![Oxm::eth_type(ethertype::IPV4), Oxm::ip_proto(6), Oxm::tcp_dst(80)]);
        assert!(root.find(&lower).is_none());

        assert!(root.del(&f));
        assert!(!root.del(&f));
        assert_eq!(root.len(), 0);
        assert!(best_match(&root, &testpkt::tcp4(1, 80), 1).is_none());
    }
}
