//! Hand-rolled frames for the parser and classifier unit tests.

use std::net::{Ipv4Addr, Ipv6Addr};

pub const DST_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
pub const SRC_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];

pub fn eth(ethertype: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(64);
    frame.extend_from_slice(&DST_MAC);
    frame.extend_from_slice(&SRC_MAC);
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame
}

pub fn ipv4_hdr(proto: u8, src: Ipv4Addr, dst: Ipv4Addr, payload_len: u16) -> Vec<u8> {
    let mut hdr = vec![0x45, 0x00];
    hdr.extend_from_slice(&(20 + payload_len).to_be_bytes());
    hdr.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x40, proto, 0x00, 0x00]);
    hdr.extend_from_slice(&src.octets());
    hdr.extend_from_slice(&dst.octets());
    hdr
}

/// Bare IPv4 header plus a little payload; no Ethernet framing.
pub fn ipv4_min(proto: u8) -> Vec<u8> {
    let mut pkt = ipv4_hdr(proto, Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2), 8);
    pkt.extend_from_slice(&[0u8; 8]);
    pkt
}

fn tcp_hdr(sport: u16, dport: u16) -> Vec<u8> {
    let mut hdr = Vec::with_capacity(20);
    hdr.extend_from_slice(&sport.to_be_bytes());
    hdr.extend_from_slice(&dport.to_be_bytes());
    hdr.extend_from_slice(&[0u8; 8]); // seq, ack
    hdr.push(5 << 4); // data offset
    hdr.push(0x02); // SYN
    hdr.extend_from_slice(&[0u8; 6]); // window, cksum, urgent
    hdr
}

fn udp_hdr(sport: u16, dport: u16) -> Vec<u8> {
    let mut hdr = Vec::with_capacity(8);
    hdr.extend_from_slice(&sport.to_be_bytes());
    hdr.extend_from_slice(&dport.to_be_bytes());
    hdr.extend_from_slice(&8u16.to_be_bytes());
    hdr.extend_from_slice(&[0u8; 2]);
    hdr
}

pub fn tcp4(sport: u16, dport: u16) -> Vec<u8> {
    tcp4_addr(Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(192, 168, 1, 2), sport, dport)
}

pub fn tcp4_addr(src: Ipv4Addr, dst: Ipv4Addr, sport: u16, dport: u16) -> Vec<u8> {
    let mut frame = eth(super::ethertype::IPV4);
    frame.extend_from_slice(&ipv4_hdr(6, src, dst, 20));
    frame.extend_from_slice(&tcp_hdr(sport, dport));
    frame
}

pub fn udp4(sport: u16, dport: u16) -> Vec<u8> {
    let mut frame = eth(super::ethertype::IPV4);
    frame.extend_from_slice(&ipv4_hdr(
        17,
        Ipv4Addr::new(192, 168, 1, 1),
        Ipv4Addr::new(192, 168, 1, 2),
        8,
    ));
    frame.extend_from_slice(&udp_hdr(sport, dport));
    frame
}

pub fn arp_request(spa: Ipv4Addr, tpa: Ipv4Addr) -> Vec<u8> {
    let mut frame = eth(super::ethertype::ARP);
    frame.extend_from_slice(&[0x00, 0x01, 0x08, 0x00, 6, 4, 0x00, 0x01]);
    frame.extend_from_slice(&SRC_MAC);
    frame.extend_from_slice(&spa.octets());
    frame.extend_from_slice(&[0u8; 6]);
    frame.extend_from_slice(&tpa.octets());
    frame
}

/// Insert an 802.1Q tag in front of an already-built frame.
pub fn vlan(vid: u16, pcp: u8, inner: Vec<u8>) -> Vec<u8> {
    tag(super::ethertype::VLAN, vid, pcp, inner)
}

/// Insert an 802.1ad service tag in front of an already-built frame.
pub fn svlan(vid: u16, inner: Vec<u8>) -> Vec<u8> {
    tag(super::ethertype::SVLAN, vid, 0, inner)
}

fn tag(tpid: u16, vid: u16, pcp: u8, inner: Vec<u8>) -> Vec<u8> {
    let mut frame = inner[..12].to_vec();
    frame.extend_from_slice(&tpid.to_be_bytes());
    frame.extend_from_slice(&((u16::from(pcp) << 13) | (vid & 0x0fff)).to_be_bytes());
    frame.extend_from_slice(&inner[12..]);
    frame
}

/// MPLS frame: `labels` is (label, bottom-of-stack), payload follows the
/// stack without framing.
pub fn mpls(labels: &[(u32, bool)], payload: Vec<u8>) -> Vec<u8> {
    let mut frame = eth(super::ethertype::MPLS);
    for &(label, bos) in labels {
        let lse = (label << 12) | (u32::from(bos) << 8) | 0x40;
        frame.extend_from_slice(&lse.to_be_bytes());
    }
    frame.extend_from_slice(&payload);
    frame
}

/// PBB I-TAG frame carrying a full inner customer frame.
pub fn pbb(isid: u32, inner: Vec<u8>) -> Vec<u8> {
    let mut frame = eth(super::ethertype::PBB);
    frame.push(0x00); // pcp/dei/uca
    frame.extend_from_slice(&isid.to_be_bytes()[1..]);
    frame.extend_from_slice(&inner);
    frame
}

fn ipv6_base(next: u8, src: Ipv6Addr, dst: Ipv6Addr, payload_len: u16) -> Vec<u8> {
    let mut hdr = vec![0x60, 0x00, 0x00, 0x00];
    hdr.extend_from_slice(&payload_len.to_be_bytes());
    hdr.push(next);
    hdr.push(64);
    hdr.extend_from_slice(&src.octets());
    hdr.extend_from_slice(&dst.octets());
    hdr
}

pub fn udp6(sport: u16, dport: u16) -> Vec<u8> {
    let mut frame = eth(super::ethertype::IPV6);
    frame.extend_from_slice(&ipv6_base(
        17,
        "2001:db8::1".parse().unwrap(),
        "2001:db8::2".parse().unwrap(),
        8,
    ));
    frame.extend_from_slice(&udp_hdr(sport, dport));
    frame
}

/// IPv6 frame with the given extension-header chain (header protocol
/// numbers, in order) ending in `final_proto` (UDP supported).
pub fn ipv6_exthdrs(chain: &[u8], final_proto: u8) -> Vec<u8> {
    let mut exts: Vec<u8> = Vec::new();
    for (i, &hdr) in chain.iter().enumerate() {
        let next = chain.get(i + 1).copied().unwrap_or(final_proto);
        match hdr {
            44 => {
                exts.push(next);
                exts.extend_from_slice(&[0, 0, 0, 0, 0, 0, 1]); // offset 0, id
            }
            _ => {
                exts.push(next);
                exts.push(0); // length: 8 bytes total
                exts.extend_from_slice(&[0u8; 6]);
            }
        }
    }
    let udp = udp_hdr(1000, 2000);
    let payload_len = (exts.len() + udp.len()) as u16;
    let first = chain.first().copied().unwrap_or(final_proto);
    let mut frame = eth(super::ethertype::IPV6);
    frame.extend_from_slice(&ipv6_base(
        first,
        "2001:db8::1".parse().unwrap(),
        "2001:db8::2".parse().unwrap(),
        payload_len,
    ));
    frame.extend_from_slice(&exts);
    frame.extend_from_slice(&udp);
    frame
}

/// ICMPv6 neighbour solicitation with a source link-layer option.
pub fn nd_ns(target: Ipv6Addr, sll: [u8; 6]) -> Vec<u8> {
    let mut icmp = vec![135, 0, 0, 0, 0, 0, 0, 0];
    icmp.extend_from_slice(&target.octets());
    icmp.push(1); // option: source link-layer address
    icmp.push(1); // length in 8-byte units
    icmp.extend_from_slice(&sll);
    let mut frame = eth(super::ethertype::IPV6);
    frame.extend_from_slice(&ipv6_base(
        58,
        "fe80::2".parse().unwrap(),
        "ff02::1:ff00:1".parse().unwrap(),
        icmp.len() as u16,
    ));
    frame.extend_from_slice(&icmp);
    frame
}

/// ICMPv6 neighbour advertisement with a target link-layer option.
pub fn nd_na(target: Ipv6Addr, tll: [u8; 6]) -> Vec<u8> {
    let mut icmp = vec![136, 0, 0, 0, 0x60, 0, 0, 0];
    icmp.extend_from_slice(&target.octets());
    icmp.push(2); // option: target link-layer address
    icmp.push(1);
    icmp.extend_from_slice(&tll);
    let mut frame = eth(super::ethertype::IPV6);
    frame.extend_from_slice(&ipv6_base(
        58,
        "fe80::2".parse().unwrap(),
        "fe80::1".parse().unwrap(),
        icmp.len() as u16,
    ));
    frame.extend_from_slice(&icmp);
    frame
}
