//! Messages crossing the engine boundary: requests from the OpenFlow
//! agent in, asynchronous events back out.

use bytes::Bytes;

use crate::flow::{Action, Instruction};
use crate::openflow::consts::{OFPG_ANY, OFPP_ANY};
use crate::openflow::oxm::Oxm;

/// `ofp_flow_mod` reduced to what the engine consumes.
#[derive(Debug, Clone)]
pub struct FlowMod {
    pub table_id: u8,
    pub command: FlowModCommand,
    pub priority: i32,
    pub cookie: u64,
    pub cookie_mask: u64,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub flags: u16,
    pub out_port: u32,
    pub out_group: u32,
    pub matches: Vec<Oxm>,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowModCommand {
    Add,
    Modify,
    ModifyStrict,
    Delete,
    DeleteStrict,
}

impl FlowMod {
    pub fn add(table_id: u8, priority: i32, matches: Vec<Oxm>, instructions: Vec<Instruction>) -> Self {
        FlowMod {
            table_id,
            command: FlowModCommand::Add,
            priority,
            cookie: 0,
            cookie_mask: 0,
            idle_timeout: 0,
            hard_timeout: 0,
            flags: 0,
            out_port: OFPP_ANY,
            out_group: OFPG_ANY,
            matches,
            instructions,
        }
    }

    pub fn delete(table_id: u8, matches: Vec<Oxm>) -> Self {
        FlowMod {
            command: FlowModCommand::Delete,
            ..FlowMod::add(table_id, 0, matches, Vec::new())
        }
    }
}

/// `PACKET_OUT` from the agent.
#[derive(Debug, Clone)]
pub struct PacketOut {
    pub in_port: u32,
    pub data: Bytes,
    pub actions: Vec<Action>,
}

/// Events the engine emits toward the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DpEvent {
    FlowRemoved {
        table_id: u8,
        reason: u8,
        priority: i32,
        cookie: u64,
        duration_sec: u64,
        duration_nsec: u32,
        idle_timeout: u16,
        hard_timeout: u16,
        packet_count: u64,
        byte_count: u64,
        matches: Vec<Oxm>,
    },
    PacketIn {
        table_id: u8,
        in_port: u32,
        data: Bytes,
    },
    BarrierReply {
        xid: u32,
        channel_id: u64,
    },
}
