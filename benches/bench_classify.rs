//! Micro benchmarks for the three classification strategies and the
//! packet parser.  Pure CPU - no network, no IO.
//!
//! ```bash
//! cargo bench --bench bench_classify
//! ```
//!
//! The rule set mimics an ACL workload: exact L4 rules, prefix rules and
//! port rules across a spread of priorities, large enough that the
//! multi-branch tree actually branches.

use criterion::{criterion_group, criterion_main, Criterion};
use std::net::Ipv4Addr;

use corvus_switch_lib::{
    classify_packet, Action, Bridge, ClassifierKind, ClassifyOptions, Config, FlowMod,
    Instruction, Oxm, PacketMeta,
};

fn output(port: u32) -> Vec<Instruction> {
    vec![Instruction::ApplyActions(vec![Action::Output { port, max_len: 0 }])]
}

fn ruleset(size: usize) -> Vec<FlowMod> {
    let mut rules = Vec::with_capacity(size);
    for n in 0..size {
        let k = n as u16;
        let rule = match n % 4 {
            0 => FlowMod::add(
                0,
                i32::from(k % 97) + 1,
                vec![Oxm::eth_type(0x0800), Oxm::ip_proto(6), Oxm::tcp_dst(1000 + (k % 499))],
                output(1),
            ),
            1 => FlowMod::add(
                0,
                i32::from(k % 89) + 1,
                vec![
                    Oxm::eth_type(0x0800),
                    Oxm::ipv4_dst_masked(
                        Ipv4Addr::new(10, (n % 31) as u8, 0, 0),
                        Ipv4Addr::new(255, 255, 0, 0),
                    ),
                ],
                output(2),
            ),
            2 => FlowMod::add(
                0,
                i32::from(k % 83) + 1,
                vec![
                    Oxm::eth_type(0x0800),
                    Oxm::ip_proto(6),
                    Oxm::tcp_src(3000 + (k % 157)),
                    Oxm::tcp_dst(1000 + (k % 499)),
                ],
                output(3),
            ),
            _ => FlowMod::add(0, i32::from(k % 31) + 1, vec![Oxm::in_port(u32::from(k % 64) + 1)], output(4)),
        };
        rules.push(rule);
    }
    rules
}

fn tcp_frame(src: Ipv4Addr, dst: Ipv4Addr, sport: u16, dport: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(64);
    frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 1, 0x02, 0, 0, 0, 0, 2, 0x08, 0x00]);
    frame.extend_from_slice(&[0x45, 0x00, 0x00, 0x28, 0x00, 0x01, 0x00, 0x00, 0x40, 6, 0, 0]);
    frame.extend_from_slice(&src.octets());
    frame.extend_from_slice(&dst.octets());
    frame.extend_from_slice(&sport.to_be_bytes());
    frame.extend_from_slice(&dport.to_be_bytes());
    frame.extend_from_slice(&[0u8; 8]);
    frame.push(5 << 4);
    frame.push(0x02);
    frame.extend_from_slice(&[0u8; 6]);
    frame
}

fn trace(size: usize) -> Vec<(Vec<u8>, PacketMeta)> {
    (0..size)
        .map(|n| {
            let k = n as u16;
            let frame = tcp_frame(
                Ipv4Addr::new(10, (n % 31) as u8, 1, 2),
                Ipv4Addr::new(10, (n % 37) as u8, 3, 4),
                3000 + (k % 157),
                1000 + (k % 499),
            );
            let meta = PacketMeta {
                in_port: (n % 70) as u32 + 1,
                in_phy_port: (n % 70) as u32 + 1,
                tunnel_id: 0,
            };
            (frame, meta)
        })
        .collect()
}

fn bench_parser(c: &mut Criterion) {
    let frame = tcp_frame(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2), 3000, 1080);
    c.bench_function("classify_packet/ipv4_tcp", |b| {
        b.iter(|| classify_packet(std::hint::black_box(&frame), PacketMeta::default(), ClassifyOptions::default()))
    });
}

fn bench_classifiers(c: &mut Criterion) {
    let (bridge, _events) = Bridge::new(&Config::default(), Default::default());
    for rule in ruleset(940) {
        bridge.flow_mod(&rule).expect("rule add");
    }
    bridge.rebuild_indexes_now();
    let packets = trace(1000);

    let mut group = c.benchmark_group("classify_1k_packets_940_rules");
    for (name, kind) in [
        ("flowinfo", ClassifierKind::Flowinfo),
        ("mbtree", ClassifierKind::Mbtree),
        ("thtable", ClassifierKind::Thtable),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut hits = 0usize;
                for (frame, meta) in &packets {
                    if bridge.classify_once(0, kind, frame, *meta).is_some() {
                        hits += 1;
                    }
                }
                std::hint::black_box(hits)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parser, bench_classifiers);
criterion_main!(benches);
