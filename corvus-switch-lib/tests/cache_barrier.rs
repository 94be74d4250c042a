//! Cache coherence and the barrier/updater protocol.

mod helpers;

use corvus_switch_lib::{
    spawn_updater, Bridge, Config, DpEvent, FlowMod, Oxm, PacketDisposition, PacketMeta, Worker,
};
use helpers::*;
use std::time::Duration;

const OFPFF_SEND_FLOW_REM: u16 = 1 << 0;

fn meta(in_port: u32) -> PacketMeta {
    PacketMeta { in_port, in_phy_port: in_port, tunnel_id: 0 }
}

#[test]
fn cache_invalidated_by_mutation_and_barrier() {
    let (bridge, events) = Bridge::new(&Config::default(), Default::default());
    bridge
        .flow_mod(&FlowMod::add(0, 1, vec![Oxm::in_port(1)], output(2)))
        .expect("add");

    let frame = tcp4(ip(10, 0, 0, 1), ip(10, 0, 0, 2), 1, 80);
    let mut worker = Worker::new(bridge.clone());

    // Warm the cache: first probe misses, second hits.
    assert!(matches!(worker.process(&frame, meta(1)), PacketDisposition::Matched(_)));
    assert!(matches!(worker.process(&frame, meta(1)), PacketDisposition::Matched(_)));
    let warm = bridge.cache_stats();
    assert_eq!(warm.hit, 1);
    assert_eq!(warm.miss, 1);
    assert_eq!(warm.nentries, 1);

    // Delete the flow and issue a barrier; the entry must be gone before
    // the next lookup observes the table.
    bridge
        .flow_mod(&FlowMod::delete(0, vec![Oxm::in_port(1)]))
        .expect("delete");
    bridge.barrier_request(7, 99);
    match events.try_recv() {
        Ok(DpEvent::BarrierReply { xid, channel_id }) => {
            assert_eq!((xid, channel_id), (7, 99));
        }
        other => panic!("expected barrier reply, got {other:?}"),
    }

    // The probe misses the cache and the classifier: packet-in.
    assert!(matches!(worker.process(&frame, meta(1)), PacketDisposition::PacketIn));
    let cold = bridge.cache_stats();
    assert_eq!(cold.hit, 1, "no further cache hits after invalidation");
    assert_eq!(cold.nentries, 0);
}

#[test]
fn consecutive_barriers_reply_and_do_not_reclear() {
    let (bridge, events) = Bridge::new(&Config::default(), Default::default());
    bridge.barrier_request(1, 5);
    bridge.barrier_request(2, 5);
    let replies: Vec<_> = events.try_iter().collect();
    assert_eq!(
        replies,
        vec![
            DpEvent::BarrierReply { xid: 1, channel_id: 5 },
            DpEvent::BarrierReply { xid: 2, channel_id: 5 },
        ]
    );
}

#[test]
fn updater_serves_barriers_and_rebuilds() {
    let mut cfg = Config::default();
    cfg.updater.mbtree_debounce_ms = 50;
    cfg.updater.thtable_debounce_ms = 80;
    let (bridge, events) = Bridge::new(&cfg, Default::default());
    let updater = spawn_updater(bridge.clone()).expect("spawn updater");

    for rule in acl_ruleset(40) {
        bridge.flow_mod(&rule).expect("rule add");
    }
    bridge.barrier_request(42, 1);
    let reply = events
        .recv_timeout(Duration::from_secs(5))
        .expect("barrier reply within the drain window");
    assert_eq!(reply, DpEvent::BarrierReply { xid: 42, channel_id: 1 });

    updater.shutdown();
}

#[test]
fn hard_timeout_expires_through_the_updater() {
    let (bridge, events) = Bridge::new(&Config::default(), Default::default());
    let updater = spawn_updater(bridge.clone()).expect("spawn updater");

    let mut add = FlowMod::add(0, 9, vec![Oxm::in_port(4)], output(1));
    add.hard_timeout = 1;
    add.flags = OFPFF_SEND_FLOW_REM;
    bridge.flow_mod(&add).expect("add");

    let event = events
        .recv_timeout(Duration::from_secs(5))
        .expect("flow removed within the timeout window");
    match event {
        DpEvent::FlowRemoved { reason, priority, .. } => {
            assert_eq!(reason, 1, "OFPRR_HARD_TIMEOUT");
            assert_eq!(priority, 9);
        }
        other => panic!("expected FLOW_REMOVED, got {other:?}"),
    }
    assert_eq!(bridge.table_stats()[0].active_count, 0);

    updater.shutdown();
}
