//! Read-only text dump of bridges, tables and flows.
//!
//! The format follows the classic `show flow` surface: one line per flow
//! with its stats, decoded match terms and instruction list, reserved
//! ports printed by name.

use std::fmt::Write;

use crate::bridge::{Bridge, BridgeRegistry};
use crate::flow::{Action, Flow, Instruction};
use crate::openflow::consts::port_name;

fn port_string(port: u32) -> String {
    match port_name(port) {
        Some(name) => name.to_string(),
        None => port.to_string(),
    }
}

fn write_action(out: &mut String, action: &Action) {
    match action {
        Action::Output { port, .. } => {
            let _ = write!(out, "output:{}", port_string(*port));
        }
        Action::CopyTtlOut => out.push_str("copy_ttl_out"),
        Action::CopyTtlIn => out.push_str("copy_ttl_in"),
        Action::SetMplsTtl(ttl) => {
            let _ = write!(out, "set_mpls_ttl:{ttl}");
        }
        Action::DecMplsTtl => out.push_str("dec_mpls_ttl"),
        Action::PushVlan(tpid) => {
            let _ = write!(out, "push_vlan:{tpid:#06x}");
        }
        Action::PopVlan => out.push_str("pop_vlan"),
        Action::PushMpls(tpid) => {
            let _ = write!(out, "push_mpls:{tpid:#06x}");
        }
        Action::PopMpls(tpid) => {
            let _ = write!(out, "pop_mpls:{tpid:#06x}");
        }
        Action::SetQueue(queue) => {
            let _ = write!(out, "set_queue:{queue}");
        }
        Action::Group(group) => {
            let _ = write!(out, "group:{group}");
        }
        Action::SetNwTtl(ttl) => {
            let _ = write!(out, "set_nw_ttl:{ttl}");
        }
        Action::DecNwTtl => out.push_str("dec_nw_ttl"),
        Action::SetField(oxm) => {
            let _ = write!(out, "set_field:{oxm}");
        }
        Action::PushPbb(tpid) => {
            let _ = write!(out, "push_pbb:{tpid:#06x}");
        }
        Action::PopPbb => out.push_str("pop_pbb"),
        Action::Experimenter(id) => {
            let _ = write!(out, "experimenter:{id}");
        }
    }
}

fn write_instruction(out: &mut String, instruction: &Instruction) {
    match instruction {
        Instruction::GotoTable(table) => {
            let _ = write!(out, "goto_table:{table}");
        }
        Instruction::WriteMetadata { metadata, mask } => {
            let _ = write!(out, "write_metadata:{metadata:#x}/{mask:#x}");
        }
        Instruction::WriteActions(actions) => {
            out.push_str("write_actions(");
            for (i, action) in actions.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_action(out, action);
            }
            out.push(')');
        }
        Instruction::ApplyActions(actions) => {
            out.push_str("apply_actions(");
            for (i, action) in actions.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_action(out, action);
            }
            out.push(')');
        }
        Instruction::ClearActions => out.push_str("clear_actions"),
        Instruction::Meter(meter) => {
            let _ = write!(out, "meter:{meter}");
        }
        Instruction::Experimenter(id) => {
            let _ = write!(out, "experimenter:{id}");
        }
    }
}

fn write_flow(out: &mut String, flow: &Flow) {
    let _ = write!(out, "  priority={}", flow.priority);
    let _ = write!(out, ",idle_timeout={}", flow.idle_timeout);
    let _ = write!(out, ",hard_timeout={}", flow.hard_timeout);
    let _ = write!(out, ",flags={}", flow.flags);
    let _ = write!(out, ",cookie={}", flow.cookie);
    let _ = write!(out, ",packet_count={}", flow.packet_count());
    let _ = write!(out, ",byte_count={}", flow.byte_count());
    for m in &flow.matches {
        let _ = write!(out, ",{m}");
    }
    out.push_str(" actions=");
    if flow.instructions.is_empty() {
        out.push_str("drop");
    } else {
        for (i, instruction) in flow.instructions.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_instruction(out, instruction);
        }
    }
    out.push('\n');
}

/// Dump every table of one bridge that holds flows, with its counters.
pub fn dump_bridge(bridge: &Bridge) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Bridge: {}", bridge.name());
    let db = bridge.db_read();
    for table in db.tables() {
        if table.flow_list.is_empty() {
            continue;
        }
        let _ = writeln!(
            out,
            " Table id: {} (flows: {}, lookup: {}, matched: {})",
            table.table_id,
            table.flow_list.len(),
            table.lookup_count(),
            table.matched_count(),
        );
        for flow in table.flow_list.iter() {
            write_flow(&mut out, flow);
        }
    }
    out
}

/// Dump flow-cache statistics for one bridge.
pub fn dump_flowcache(bridge: &Bridge) -> String {
    let stats = bridge.cache_stats();
    let mut out = String::new();
    let _ = writeln!(out, "Bridge: {}", bridge.name());
    let _ = writeln!(out, "  nentries: {}", stats.nentries);
    let _ = writeln!(out, "  hit:      {}", stats.hit);
    let _ = writeln!(out, "  miss:     {}", stats.miss);
    out
}

/// Dump every bridge in the registry.
pub fn dump_all(registry: &BridgeRegistry) -> String {
    registry.iter().map(|b| dump_bridge(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::FlowMod;
    use crate::openflow::oxm::Oxm;

    #[test]
    fn dump_contains_decoded_terms_and_port_names() {
        let (bridge, _events) = Bridge::new(&Config::default(), Default::default());
        bridge
            .flow_mod(&FlowMod::add(
                0,
                10,
                vec![Oxm::in_port(1), Oxm::eth_type(0x0800)],
                vec![Instruction::ApplyActions(vec![Action::Output {
                    port: crate::openflow::consts::OFPP_CONTROLLER,
                    max_len: 128,
                }])],
            ))
            .expect("flow add");

        let dump = dump_bridge(&bridge);
        assert!(dump.contains("Bridge: br0"));
        assert!(dump.contains("Table id: 0"));
        assert!(dump.contains("priority=10"));
        assert!(dump.contains("in_port=1"));
        assert!(dump.contains("eth_type=0x800"));
        assert!(dump.contains("output:controller"));
    }

    #[test]
    fn empty_instruction_set_prints_drop() {
        let (bridge, _events) = Bridge::new(&Config::default(), Default::default());
        bridge
            .flow_mod(&FlowMod::add(0, 1, vec![], vec![]))
            .expect("flow add");
        assert!(dump_bridge(&bridge).contains("actions=drop"));
    }
}
