#![allow(dead_code)]

//! Shared fixtures for the integration tests: hand-built frames and a
//! synthetic ACL-style rule generator.

use std::net::Ipv4Addr;

use corvus_switch_lib::{Action, FlowMod, Instruction, Oxm};

pub const ETH_IPV4: u16 = 0x0800;
pub const ETH_VLAN: u16 = 0x8100;

pub fn eth(ethertype: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(64);
    frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 1]);
    frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 2]);
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame
}

fn ipv4_hdr(proto: u8, src: Ipv4Addr, dst: Ipv4Addr, payload_len: u16) -> Vec<u8> {
    let mut hdr = vec![0x45, 0x00];
    hdr.extend_from_slice(&(20 + payload_len).to_be_bytes());
    hdr.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x40, proto, 0x00, 0x00]);
    hdr.extend_from_slice(&src.octets());
    hdr.extend_from_slice(&dst.octets());
    hdr
}

pub fn tcp4(src: Ipv4Addr, dst: Ipv4Addr, sport: u16, dport: u16) -> Vec<u8> {
    let mut frame = eth(ETH_IPV4);
    frame.extend_from_slice(&ipv4_hdr(6, src, dst, 20));
    frame.extend_from_slice(&sport.to_be_bytes());
    frame.extend_from_slice(&dport.to_be_bytes());
    frame.extend_from_slice(&[0u8; 8]);
    frame.push(5 << 4);
    frame.push(0x02);
    frame.extend_from_slice(&[0u8; 6]);
    frame
}

pub fn udp4(src: Ipv4Addr, dst: Ipv4Addr, sport: u16, dport: u16) -> Vec<u8> {
    let mut frame = eth(ETH_IPV4);
    frame.extend_from_slice(&ipv4_hdr(17, src, dst, 8));
    frame.extend_from_slice(&sport.to_be_bytes());
    frame.extend_from_slice(&dport.to_be_bytes());
    frame.extend_from_slice(&8u16.to_be_bytes());
    frame.extend_from_slice(&[0u8; 2]);
    frame
}

pub fn vlan(vid: u16, inner: Vec<u8>) -> Vec<u8> {
    let mut frame = inner[..12].to_vec();
    frame.extend_from_slice(&ETH_VLAN.to_be_bytes());
    frame.extend_from_slice(&(vid & 0x0fff).to_be_bytes());
    frame.extend_from_slice(&inner[12..]);
    frame
}

pub fn output(port: u32) -> Vec<Instruction> {
    vec![Instruction::ApplyActions(vec![Action::Output { port, max_len: 0 }])]
}

pub fn ip(a: u8, b: u8, c: u8, d: u8) -> Ipv4Addr {
    Ipv4Addr::new(a, b, c, d)
}

/// A deterministic ACL-style rule set: port rules, prefix rules and
/// 5-tuple rules across a spread of priorities.
pub fn acl_ruleset(size: usize) -> Vec<FlowMod> {
    let mut rules = Vec::with_capacity(size);
    let mut n = 0usize;
    while rules.len() < size {
        let k = n as u16;
        let rule = match n % 5 {
            0 => FlowMod::add(
                0,
                i32::from(k % 97) + 1,
                vec![
                    Oxm::eth_type(ETH_IPV4),
                    Oxm::ip_proto(6),
                    Oxm::tcp_dst(1000 + (k % 199)),
                ],
                output(1),
            ),
            1 => FlowMod::add(
                0,
                i32::from(k % 89) + 1,
                vec![
                    Oxm::eth_type(ETH_IPV4),
                    Oxm::ipv4_dst_masked(
                        Ipv4Addr::new(10, (n % 13) as u8, 0, 0),
                        Ipv4Addr::new(255, 255, 0, 0),
                    ),
                ],
                output(2),
            ),
            2 => FlowMod::add(
                0,
                i32::from(k % 83) + 1,
                vec![
                    Oxm::eth_type(ETH_IPV4),
                    Oxm::ip_proto(17),
                    Oxm::udp_dst(2000 + (k % 211)),
                    Oxm::ipv4_src(Ipv4Addr::new(172, 16, (n % 7) as u8, (n % 29) as u8)),
                ],
                output(3),
            ),
            3 => FlowMod::add(0, i32::from(k % 31) + 1, vec![Oxm::in_port(u32::from(k % 16) + 1)], output(4)),
            _ => FlowMod::add(
                0,
                i32::from(k % 61) + 1,
                vec![
                    Oxm::eth_type(ETH_IPV4),
                    Oxm::ip_proto(6),
                    Oxm::tcp_src(3000 + (k % 157)),
                    Oxm::tcp_dst(1000 + (k % 199)),
                ],
                output(5),
            ),
        };
        rules.push(rule);
        n += 1;
    }
    rules
}

/// A deterministic packet trace exercising the ACL rule set.
pub fn acl_trace(size: usize) -> Vec<(Vec<u8>, u32)> {
    let mut trace = Vec::with_capacity(size);
    for n in 0..size {
        let k = n as u16;
        let in_port = (n % 18) as u32 + 1;
        let frame = match n % 3 {
            0 => tcp4(
                ip(10, (n % 13) as u8, 1, 2),
                ip(10, (n % 17) as u8, 3, 4),
                3000 + (k % 157),
                1000 + (k % 199),
            ),
            1 => udp4(
                ip(172, 16, (n % 7) as u8, (n % 29) as u8),
                ip(10, 0, 0, 1),
                9,
                2000 + (k % 211),
            ),
            _ => tcp4(ip(192, 168, 0, 1), ip(10, (n % 13) as u8, 0, 9), 5, 1000 + (k % 251)),
        };
        trace.push((frame, in_port));
    }
    trace
}
