//! Compiled byte-offset match.
//!
//! A match list is compiled once, at insertion, into per-base
//! `{masks, bytes}` arrays.  Matching a packet is then a masked byte
//! compare per populated base, and the three set predicates the flow
//! database needs (equality, subsumption, intersection) fall out of the
//! same representation.

use crate::openflow::oxm::{Oxm, OxmField};
use crate::packet::{
    ethertype, Base, ParsedPacket, OOB2_IPV6_EXTHDR, OOB2_TUNNEL_ID, OOB_ETH_TYPE, OOB_IN_PHY_PORT,
    OOB_IN_PORT, OOB_METADATA, OOB_VLAN_TCI,
};

/// Widest region a single base can constrain (an IPv6 ND target at offset
/// eight needs 24 bytes).
pub const BYTEOFF_WIDTH: usize = 32;

/// Masked byte pattern over one base region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteoffMatch {
    /// Bit i set when byte i carries a constraint.
    pub bits: u32,
    pub bytes: [u8; BYTEOFF_WIDTH],
    pub masks: [u8; BYTEOFF_WIDTH],
}

impl Default for ByteoffMatch {
    fn default() -> Self {
        ByteoffMatch { bits: 0, bytes: [0; BYTEOFF_WIDTH], masks: [0; BYTEOFF_WIDTH] }
    }
}

const BASES: [Base; crate::packet::BASE_COUNT] = [
    Base::Oob,
    Base::Eth,
    Base::Pbb,
    Base::Mpls,
    Base::L3,
    Base::IpProto,
    Base::L4,
    Base::L4Payload,
    Base::Oob2,
    Base::V6Src,
    Base::V6Dst,
    Base::NdSll,
    Base::NdTll,
];

/// The whole compiled match: one byte pattern per base region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CompiledMatch {
    slots: [ByteoffMatch; crate::packet::BASE_COUNT],
}

impl CompiledMatch {
    /// Compile a validated match list.  IP DSCP/ECN compile differently
    /// under IPv4 and IPv6, so the list's own ETH_TYPE (guaranteed by the
    /// prerequisite closure) steers them.
    pub fn compile(matches: &[Oxm]) -> CompiledMatch {
        let eth_type = matches
            .iter()
            .find(|m| m.field == OxmField::EthType)
            .map(|m| m.value_u16())
            .unwrap_or(0);
        let mut cm = CompiledMatch::default();
        for m in matches {
            cm.compile_one(m, eth_type);
        }
        cm
    }

    fn compile_one(&mut self, m: &Oxm, eth_type: u16) {
        use OxmField::*;
        let v = m.value_u64();
        let um = m.mask_u64();
        match m.field {
            InPort => self.put_u64(Base::Oob, OOB_IN_PORT, 4, v, um),
            InPhyPort => self.put_u64(Base::Oob, OOB_IN_PHY_PORT, 4, v, um),
            Metadata => self.put_u64(Base::Oob, OOB_METADATA, 8, v, um),
            EthDst => self.put_bytes(Base::Eth, 0, m),
            EthSrc => self.put_bytes(Base::Eth, 6, m),
            EthType => self.put_u64(Base::Oob, OOB_ETH_TYPE, 2, v, um),
            VlanVid => self.put_u64(Base::Oob, OOB_VLAN_TCI, 2, v, um & 0x1fff),
            VlanPcp => self.put_u64(Base::Oob, OOB_VLAN_TCI, 1, v << 5, 0xe0),
            IpDscp => {
                if eth_type == ethertype::IPV6 {
                    self.put_u64(Base::L3, 0, 1, v >> 2, 0x0f);
                    self.put_u64(Base::L3, 1, 1, (v & 3) << 6, 0xc0);
                } else {
                    self.put_u64(Base::L3, 1, 1, v << 2, 0xfc);
                }
            }
            IpEcn => {
                if eth_type == ethertype::IPV6 {
                    self.put_u64(Base::L3, 1, 1, v << 4, 0x30);
                } else {
                    self.put_u64(Base::L3, 1, 1, v, 0x03);
                }
            }
            IpProto => self.put_u64(Base::IpProto, 0, 1, v, um),
            Ipv4Src => self.put_bytes(Base::L3, 12, m),
            Ipv4Dst => self.put_bytes(Base::L3, 16, m),
            TcpSrc | UdpSrc | SctpSrc => self.put_u64(Base::L4, 0, 2, v, um),
            TcpDst | UdpDst | SctpDst => self.put_u64(Base::L4, 2, 2, v, um),
            Icmpv4Type | Icmpv6Type => self.put_u64(Base::L4, 0, 1, v, um),
            Icmpv4Code | Icmpv6Code => self.put_u64(Base::L4, 1, 1, v, um),
            ArpOp => self.put_u64(Base::L3, 6, 2, v, um),
            ArpSha => self.put_bytes(Base::L3, 8, m),
            ArpSpa => self.put_bytes(Base::L3, 14, m),
            ArpTha => self.put_bytes(Base::L3, 18, m),
            ArpTpa => self.put_bytes(Base::L3, 24, m),
            Ipv6Src => self.put_bytes(Base::V6Src, 0, m),
            Ipv6Dst => self.put_bytes(Base::V6Dst, 0, m),
            Ipv6Flabel => self.put_u64(Base::L3, 1, 3, v, um & 0x000f_ffff),
            Ipv6NdTarget => self.put_bytes(Base::L4, 8, m),
            Ipv6NdSll => self.put_bytes(Base::NdSll, 0, m),
            Ipv6NdTll => self.put_bytes(Base::NdTll, 0, m),
            // The label is the top 20 bits of the 32-bit LSE; align value
            // and mask before laying them over the first three bytes.
            MplsLabel => self.put_u64(Base::Mpls, 0, 3, v << 4, (um & 0x000f_ffff) << 4),
            MplsTc => self.put_u64(Base::Mpls, 2, 1, v << 1, 0x0e),
            MplsBos => self.put_u64(Base::Mpls, 2, 1, v, 0x01),
            PbbIsid => self.put_bytes(Base::Pbb, 1, m),
            TunnelId => self.put_u64(Base::Oob2, OOB2_TUNNEL_ID, 8, v, um),
            Ipv6Exthdr => self.put_u64(Base::Oob2, OOB2_IPV6_EXTHDR, 2, v, um & 0x01ff),
        }
    }

    /// Lay a big-endian value/mask pair of `len` bytes at `off`.
    fn put_u64(&mut self, base: Base, off: usize, len: usize, value: u64, mask: u64) {
        let slot = &mut self.slots[base as usize];
        for i in 0..len {
            let shift = (len - 1 - i) * 8;
            let mbyte = (mask >> shift) as u8;
            if mbyte == 0 {
                continue;
            }
            slot.masks[off + i] |= mbyte;
            slot.bytes[off + i] |= (value >> shift) as u8 & mbyte;
            slot.bits |= 1 << (off + i);
        }
    }

    /// Lay a byte-string field (addresses) with its optional mask.
    fn put_bytes(&mut self, base: Base, off: usize, m: &Oxm) {
        let slot = &mut self.slots[base as usize];
        for (i, &vbyte) in m.value.iter().enumerate() {
            let mbyte = m.mask.as_ref().map_or(0xff, |mask| mask[i]);
            if mbyte == 0 {
                continue;
            }
            slot.masks[off + i] |= mbyte;
            slot.bytes[off + i] |= vbyte & mbyte;
            slot.bits |= 1 << (off + i);
        }
    }

    /// True when the compiled match constrains nothing.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.bits == 0)
    }

    /// The sequential match predicate: every constrained byte of every
    /// base must be present in the packet and equal under the mask.
    pub fn matches_packet(&self, pkt: &ParsedPacket<'_>) -> bool {
        for (idx, slot) in self.slots.iter().enumerate() {
            if slot.bits == 0 {
                continue;
            }
            let base = BASES[idx];
            let span = (32 - slot.bits.leading_zeros()) as usize;
            let Some(buf) = pkt.bytes(base, 0, span) else {
                return false;
            };
            let mut bits = slot.bits;
            while bits != 0 {
                let i = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                if buf[i] & slot.masks[i] != slot.bytes[i] {
                    return false;
                }
            }
        }
        true
    }

    /// Strict comparison: two compiled matches describe the same match set
    /// exactly when their populated patterns are identical (values outside
    /// masks are canonicalised to zero at compile time).
    pub fn same_match(&self, other: &CompiledMatch) -> bool {
        self == other
    }

    /// Non-strict selector semantics: `self` is the looser pattern; true
    /// when every constraint of `self` appears in `flow` with the same
    /// value, i.e. `flow`'s match set is a subset of `self`'s.
    pub fn subsumes(&self, flow: &CompiledMatch) -> bool {
        for (a, b) in self.slots.iter().zip(flow.slots.iter()) {
            if a.bits & !b.bits != 0 {
                return false;
            }
            let mut bits = a.bits;
            while bits != 0 {
                let i = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                if a.masks[i] & !b.masks[i] != 0 {
                    return false;
                }
                if b.bytes[i] & a.masks[i] != a.bytes[i] {
                    return false;
                }
            }
        }
        true
    }

    /// Overlap: some packet can satisfy both patterns.  Two matches
    /// overlap unless they disagree on a byte both constrain.
    pub fn overlaps(&self, other: &CompiledMatch) -> bool {
        for (a, b) in self.slots.iter().zip(other.slots.iter()) {
            let mut bits = a.bits & b.bits;
            while bits != 0 {
                let i = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                let common = a.masks[i] & b.masks[i];
                if a.bytes[i] & common != b.bytes[i] & common {
                    return false;
                }
            }
        }
        true
    }

    /// Signature of the constrained positions: base index plus mask bytes.
    /// Flows sharing a signature form one tuple in the tuple-hash table.
    pub fn mask_signature(&self) -> Vec<u8> {
        let mut sig = Vec::new();
        for (idx, slot) in self.slots.iter().enumerate() {
            if slot.bits == 0 {
                continue;
            }
            sig.push(idx as u8);
            let mut bits = slot.bits;
            while bits != 0 {
                let i = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                sig.push(i as u8);
                sig.push(slot.masks[i]);
            }
        }
        sig
    }

    /// The flow-side exact key for the tuple-hash table.
    pub fn key_bytes(&self) -> Vec<u8> {
        let mut key = Vec::new();
        for slot in &self.slots {
            let mut bits = slot.bits;
            while bits != 0 {
                let i = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                key.push(slot.bytes[i]);
            }
        }
        key
    }

    /// The packet-side key for the same tuple: the packet's bytes at the
    /// constrained positions, under the tuple's masks.  `None` when the
    /// packet lacks one of the layers.
    pub fn packet_key_bytes(&self, pkt: &ParsedPacket<'_>) -> Option<Vec<u8>> {
        let mut key = Vec::new();
        for (idx, slot) in self.slots.iter().enumerate() {
            if slot.bits == 0 {
                continue;
            }
            let base = BASES[idx];
            let span = (32 - slot.bits.leading_zeros()) as usize;
            let buf = pkt.bytes(base, 0, span)?;
            let mut bits = slot.bits;
            while bits != 0 {
                let i = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                key.push(buf[i] & slot.masks[i]);
            }
        }
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::testpkt;
    use crate::packet::{classify_packet, ClassifyOptions, PacketMeta};
    use std::net::Ipv4Addr;

    fn parse(frame: &[u8], in_port: u32) -> ParsedPacket<'_> {
        classify_packet(
            frame,
            PacketMeta { in_port, ..Default::default() },
            ClassifyOptions::default(),
        )
    }

    #[test]
    fn in_port_and_eth_type() {
        let cm = CompiledMatch::compile(&[Oxm::in_port(1), Oxm::eth_type(ethertype::IPV4)]);
        let frame = testpkt::tcp4(1234, 80);
        assert!(cm.matches_packet(&parse(&frame, 1)));
        assert!(!cm.matches_packet(&parse(&frame, 2)));
    }

    #[test]
    fn masked_ipv4_src() {
        let cm = CompiledMatch::compile(&[
            Oxm::eth_type(ethertype::IPV4),
            Oxm::ipv4_src_masked(Ipv4Addr::new(192, 168, 0, 0), Ipv4Addr::new(255, 255, 0, 0)),
        ]);
        assert!(cm.matches_packet(&parse(&testpkt::tcp4(1, 2), 1)));
        let other = testpkt::tcp4_addr(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            1,
            2,
        );
        assert!(!cm.matches_packet(&parse(&other, 1)));
    }

    #[test]
    fn vlan_vid_present_only_matches_tagged() {
        let tagged_any = CompiledMatch::compile(&[Oxm::vlan_vid_masked(
            crate::openflow::consts::OFPVID_PRESENT,
            crate::openflow::consts::OFPVID_PRESENT,
        )]);
        let untagged_only = CompiledMatch::compile(&[Oxm::vlan_vid_none()]);
        let plain = testpkt::tcp4(1, 2);
        let tagged = testpkt::vlan(100, 0, testpkt::tcp4(1, 2));
        assert!(!tagged_any.matches_packet(&parse(&plain, 1)));
        assert!(tagged_any.matches_packet(&parse(&tagged, 1)));
        assert!(untagged_only.matches_packet(&parse(&plain, 1)));
        assert!(!untagged_only.matches_packet(&parse(&tagged, 1)));
    }

    #[test]
    fn vid_match_ignores_pcp() {
        let cm = CompiledMatch::compile(&[Oxm::vlan_vid(100)]);
        let tagged = testpkt::vlan(100, 5, testpkt::tcp4(1, 2));
        assert!(cm.matches_packet(&parse(&tagged, 1)));
        let pcp = CompiledMatch::compile(&[Oxm::vlan_vid(100), Oxm::vlan_pcp(5)]);
        assert!(pcp.matches_packet(&parse(&tagged, 1)));
        let wrong_pcp = CompiledMatch::compile(&[Oxm::vlan_vid(100), Oxm::vlan_pcp(2)]);
        assert!(!wrong_pcp.matches_packet(&parse(&tagged, 1)));
    }

    #[test]
    fn mpls_label_aligned_mask() {
        let cm = CompiledMatch::compile(&[
            Oxm::eth_type(ethertype::MPLS),
            Oxm::mpls_label(1000),
            Oxm::mpls_bos(1),
        ]);
        let frame = testpkt::mpls(&[(1000, true)], testpkt::ipv4_min(17));
        assert!(cm.matches_packet(&parse(&frame, 1)));
        let other = testpkt::mpls(&[(1001, true)], testpkt::ipv4_min(17));
        assert!(!cm.matches_packet(&parse(&other, 1)));
    }

    #[test]
    fn absent_layer_never_matches() {
        let cm = CompiledMatch::compile(&[
            Oxm::eth_type(ethertype::IPV4),
            Oxm::ip_proto(6),
            Oxm::tcp_dst(80),
        ]);
        let arp = testpkt::arp_request(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));
        assert!(!cm.matches_packet(&parse(&arp, 1)));
    }

    #[test]
    fn strict_equality_and_subsumption() {
        let a = CompiledMatch::compile(&[Oxm::in_port(1), Oxm::eth_type(ethertype::IPV4)]);
        let b = CompiledMatch::compile(&[Oxm::eth_type(ethertype::IPV4), Oxm::in_port(1)]);
        assert!(a.same_match(&b));

        let loose = CompiledMatch::compile(&[Oxm::in_port(1)]);
        assert!(loose.subsumes(&a));
        assert!(!a.subsumes(&loose));
        assert!(CompiledMatch::default().subsumes(&a));
    }

    #[test]
    fn overlap_detection() {
        let a = CompiledMatch::compile(&[Oxm::in_port(1)]);
        let b = CompiledMatch::compile(&[Oxm::eth_type(ethertype::IPV4)]);
        let c = CompiledMatch::compile(&[Oxm::in_port(2)]);
        let any = CompiledMatch::default();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(any.overlaps(&a));
        assert!(any.overlaps(&c));
    }

    #[test]
    fn masked_exthdr_survives_unseq_flips() {
        use crate::openflow::consts::OFPIEH_FRAG;
        let cm = CompiledMatch::compile(&[
            Oxm::eth_type(ethertype::IPV6),
            Oxm::ipv6_exthdr_masked(OFPIEH_FRAG, OFPIEH_FRAG),
        ]);
        // Hop-by-hop then fragment is in preferred order; the reverse
        // raises UNSEQ, which the mask must ignore.
        let ordered = testpkt::ipv6_exthdrs(&[0, 44], 17);
        let unseq = testpkt::ipv6_exthdrs(&[44, 0], 17);
        assert!(cm.matches_packet(&parse(&ordered, 1)));
        assert!(cm.matches_packet(&parse(&unseq, 1)));

        let no_frag = testpkt::ipv6_exthdrs(&[0], 17);
        assert!(!cm.matches_packet(&parse(&no_frag, 1)));
    }

    #[test]
    fn tuple_keys_line_up() {
        let cm = CompiledMatch::compile(&[
            Oxm::eth_type(ethertype::IPV4),
            Oxm::ip_proto(6),
            Oxm::tcp_dst(80),
        ]);
        let pkt_frame = testpkt::tcp4(999, 80);
        let pkt = parse(&pkt_frame, 7);
        let flow_key = cm.key_bytes();
        let pkt_key = cm.packet_key_bytes(&pkt).expect("packet has all layers");
        assert_eq!(flow_key, pkt_key);

        let miss_frame = testpkt::tcp4(999, 81);
        let miss = parse(&miss_frame, 7);
        assert_ne!(cm.packet_key_bytes(&miss).unwrap(), flow_key);
    }
}
