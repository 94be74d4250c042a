//! Frame classification: locate the L2/L3/L4 layers, strip tags, walk the
//! IPv6 extension chain and derive the out-of-band match fields.
//!
//! The parser never fails; a truncated or unknown frame simply leaves the
//! deeper bases unset, and any match that addresses an absent layer does
//! not hold.

use tracing::trace;

use super::{ethertype, Base, Oob2Data, OobData, ParsedPacket};
use crate::openflow::consts::{
    OFPIEH_AUTH, OFPIEH_DEST, OFPIEH_ESP, OFPIEH_FRAG, OFPIEH_HOP, OFPIEH_NONEXT, OFPIEH_ROUTER,
    OFPIEH_UNREP, OFPIEH_UNSEQ, OFPVID_PRESENT,
};

/// Per-packet input that does not live in the frame bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketMeta {
    pub in_port: u32,
    pub in_phy_port: u32,
    pub tunnel_id: u64,
}

/// Parser switches fixed at bridge construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyOptions {
    /// Compatibility switch: re-classify a PBB I-TAG frame as its inner
    /// VLAN-tagged customer frame instead of stopping at the I-TAG.
    pub pbb_is_vlan: bool,
}

const MPLS_STACK_DEPTH_MAX: usize = 8;

/// Classify a raw Ethernet frame.
pub fn classify_packet<'a>(
    data: &'a [u8],
    meta: PacketMeta,
    opts: ClassifyOptions,
) -> ParsedPacket<'a> {
    let oob = OobData {
        metadata: 0,
        in_port: meta.in_port,
        in_phy_port: meta.in_phy_port,
        ether_type: 0,
        vlan_tci: 0,
    };
    let oob2 = Oob2Data { tunnel_id: meta.tunnel_id, ipv6_exthdr: 0 };
    let mut pkt = ParsedPacket::new(data, oob, oob2);
    classify_ether(&mut pkt, opts);
    pkt.serialize_oob();
    pkt.compute_fingerprint();
    pkt
}

fn classify_ether(pkt: &mut ParsedPacket<'_>, opts: ClassifyOptions) {
    let data = pkt.data();
    if data.len() < 14 {
        return;
    }
    pkt.set_base(Base::Eth, 0);

    // Walk the tag stack.  `tpos` is the offset of the current ethertype
    // field; the payload starts two bytes later.
    let mut tpos = 12;
    let mut ether_type = be16(data, tpos);
    while ether_type == ethertype::VLAN || ether_type == ethertype::SVLAN {
        let Some(tci) = be16_at(data, tpos + 2) else {
            return;
        };
        if pkt.oob.vlan_tci == 0 {
            // Outermost tag only; bit 12 marks presence per OFPVID_PRESENT.
            pkt.oob.vlan_tci = tci | OFPVID_PRESENT;
        }
        tpos += 4;
        match be16_at(data, tpos) {
            Some(t) => ether_type = t,
            None => return,
        }
    }
    pkt.oob.ether_type = ether_type;

    if ether_type == ethertype::PBB {
        let itag = tpos + 2;
        if data.len() < itag + 4 {
            return;
        }
        pkt.set_base(Base::Pbb, itag);
        if !opts.pbb_is_vlan {
            return;
        }
        // Re-enter at the inner customer frame: I-TAG (4 bytes), then
        // C-DA/C-SA and the inner ethertype.  The I-TAG PCP/DEI bits stand
        // in for a customer tag.
        pkt.oob.vlan_tci = (u16::from(data[itag] & 0xf0) << 8) | OFPVID_PRESENT;
        tpos = itag + 4 + 12;
        match be16_at(data, tpos) {
            Some(t) => ether_type = t,
            None => return,
        }
        pkt.oob.ether_type = ether_type;
        trace!(inner_type = format_args!("{ether_type:#06x}"), "pbb reclassified as vlan");
    }

    if ether_type == ethertype::MPLS || ether_type == ethertype::MPLS_MCAST {
        let stack = tpos + 2;
        if data.len() < stack + 4 {
            return;
        }
        pkt.set_base(Base::Mpls, stack);
        let mut lse = stack;
        let mut depth = 0;
        loop {
            let Some(entry) = be32_at(data, lse) else {
                return;
            };
            depth += 1;
            lse += 4;
            if entry & 0x100 != 0 || depth >= MPLS_STACK_DEPTH_MAX {
                break;
            }
        }
        // The label stack does not announce its payload; use the version
        // nibble, as a label edge router would.
        match data.get(lse).map(|b| b >> 4) {
            Some(4) => classify_ipv4(pkt, lse),
            Some(6) => classify_ipv6(pkt, lse),
            _ => {}
        }
        return;
    }

    let l3 = tpos + 2;
    match ether_type {
        ethertype::IPV4 => classify_ipv4(pkt, l3),
        ethertype::IPV6 => classify_ipv6(pkt, l3),
        ethertype::ARP => {
            if data.len() >= l3 + 28 {
                pkt.set_base(Base::L3, l3);
            }
        }
        _ => {}
    }
}

fn classify_ipv4(pkt: &mut ParsedPacket<'_>, l3: usize) {
    let data = pkt.data();
    if data.len() < l3 + 20 {
        return;
    }
    let ihl = usize::from(data[l3] & 0x0f) * 4;
    if ihl < 20 || data.len() < l3 + ihl {
        return;
    }
    pkt.set_base(Base::L3, l3);
    // IP_PROTO reads through its own base so IPv4 and IPv6 share one
    // descriptor row.
    pkt.set_base(Base::IpProto, l3 + 9);
    let frag_off = be16(data, l3 + 6) & 0x1fff;
    if frag_off != 0 {
        return;
    }
    classify_l4(pkt, data[l3 + 9], l3 + ihl, false);
}

fn classify_ipv6(pkt: &mut ParsedPacket<'_>, l3: usize) {
    let data = pkt.data();
    if data.len() < l3 + 40 {
        return;
    }
    pkt.set_base(Base::L3, l3);
    pkt.set_base(Base::V6Src, l3 + 8);
    pkt.set_base(Base::V6Dst, l3 + 24);

    let mut next = data[l3 + 6];
    let mut next_pos = l3 + 6;
    let mut pos = l3 + 40;
    let mut bits = 0u16;
    let mut last_order = 0u8;
    let mut dest_seen = 0u8;
    let mut fragmented = false;
    loop {
        let (bit, order) = match next {
            0 => (OFPIEH_HOP, 1),
            60 => (OFPIEH_DEST, if bits & OFPIEH_ROUTER != 0 { 7 } else { 2 }),
            43 => (OFPIEH_ROUTER, 3),
            44 => (OFPIEH_FRAG, 4),
            51 => (OFPIEH_AUTH, 5),
            59 => {
                pkt.oob2.ipv6_exthdr = bits | OFPIEH_NONEXT;
                return;
            }
            50 => {
                // ESP hides everything behind it; stop the walk.
                pkt.oob2.ipv6_exthdr = bits | OFPIEH_ESP;
                return;
            }
            proto => {
                pkt.oob2.ipv6_exthdr = bits;
                pkt.set_base(Base::IpProto, next_pos);
                if !fragmented {
                    classify_l4(pkt, proto, pos, true);
                }
                return;
            }
        };
        // Hop-by-hop is only legal immediately after the base header.
        if bit == OFPIEH_HOP && pos != l3 + 40 {
            bits |= OFPIEH_UNSEQ;
        }
        if order < last_order {
            bits |= OFPIEH_UNSEQ;
        }
        last_order = order;
        if bit == OFPIEH_DEST {
            dest_seen += 1;
            if dest_seen > 2 {
                bits |= OFPIEH_UNREP;
            }
        } else if bits & bit != 0 {
            bits |= OFPIEH_UNREP;
        }
        bits |= bit;

        let Some(&hdr_next) = data.get(pos) else {
            pkt.oob2.ipv6_exthdr = bits;
            return;
        };
        let Some(&len_byte) = data.get(pos + 1) else {
            pkt.oob2.ipv6_exthdr = bits;
            return;
        };
        let hdr_len = match next {
            44 => {
                if let Some(fo) = be16_at(data, pos + 2) {
                    fragmented = fragmented || (fo & 0xfff8) != 0;
                }
                8
            }
            51 => (usize::from(len_byte) + 2) * 4,
            _ => (usize::from(len_byte) + 1) * 8,
        };
        next_pos = pos;
        next = hdr_next;
        pos += hdr_len;
        if pos > data.len() {
            pkt.oob2.ipv6_exthdr = bits;
            return;
        }
    }
}

fn classify_l4(pkt: &mut ParsedPacket<'_>, proto: u8, l4: usize, v6: bool) {
    let data = pkt.data();
    let hdr_len = match proto {
        6 => {
            if data.len() < l4 + 20 {
                return;
            }
            usize::from(data[l4 + 12] >> 4) * 4
        }
        17 => 8,
        132 => 12,
        1 if !v6 => 8,
        58 if v6 => 8,
        _ => return,
    };
    if hdr_len < 4 || data.len() < l4 + hdr_len {
        return;
    }
    pkt.set_base(Base::L4, l4);
    pkt.set_base(Base::L4Payload, l4 + hdr_len);
    if proto == 58 {
        classify_nd(pkt, l4);
    }
}

/// ICMPv6 neighbour discovery: locate the SLL/TLL option payloads.
fn classify_nd(pkt: &mut ParsedPacket<'_>, l4: usize) {
    let data = pkt.data();
    let ty = data[l4];
    if ty != 135 && ty != 136 {
        return;
    }
    if data.len() < l4 + 24 {
        return;
    }
    let mut pos = l4 + 24;
    while pos + 8 <= data.len() {
        let opt_type = data[pos];
        let opt_len = usize::from(data[pos + 1]) * 8;
        if opt_len == 0 {
            break;
        }
        match opt_type {
            1 if ty == 135 => pkt.set_base(Base::NdSll, pos + 2),
            2 if ty == 136 => pkt.set_base(Base::NdTll, pos + 2),
            _ => {}
        }
        pos += opt_len;
    }
}

fn be16(data: &[u8], pos: usize) -> u16 {
    u16::from_be_bytes([data[pos], data[pos + 1]])
}

fn be16_at(data: &[u8], pos: usize) -> Option<u16> {
    Some(u16::from_be_bytes([*data.get(pos)?, *data.get(pos + 1)?]))
}

fn be32_at(data: &[u8], pos: usize) -> Option<u32> {
    Some(u32::from_be_bytes([
        *data.get(pos)?,
        *data.get(pos + 1)?,
        *data.get(pos + 2)?,
        *data.get(pos + 3)?,
    ]))
}
