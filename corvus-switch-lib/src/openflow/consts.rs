//! Numeric constants lifted straight from the OpenFlow 1.3 header.
//! Everything here must stay bit-identical to the protocol.

/// OXM class of all fields handled by the datapath.
pub const OFPXMC_OPENFLOW_BASIC: u16 = 0x8000;

/// Bit 12 of the VLAN VID match value: a tag is present.
pub const OFPVID_PRESENT: u16 = 0x1000;
/// VLAN VID value matching only untagged frames.
pub const OFPVID_NONE: u16 = 0x0000;

// Reserved port numbers (ofp_port_no).
pub const OFPP_MAX: u32 = 0xffff_ff00;
pub const OFPP_IN_PORT: u32 = 0xffff_fff8;
pub const OFPP_TABLE: u32 = 0xffff_fff9;
pub const OFPP_NORMAL: u32 = 0xffff_fffa;
pub const OFPP_FLOOD: u32 = 0xffff_fffb;
pub const OFPP_ALL: u32 = 0xffff_fffc;
pub const OFPP_CONTROLLER: u32 = 0xffff_fffd;
pub const OFPP_LOCAL: u32 = 0xffff_fffe;
pub const OFPP_ANY: u32 = 0xffff_ffff;

// Group numbers (ofp_group).
pub const OFPG_MAX: u32 = 0xffff_ff00;
pub const OFPG_ALL: u32 = 0xffff_fffc;
pub const OFPG_ANY: u32 = 0xffff_ffff;

/// Wildcard table id in flow mod and stats requests.
pub const OFPTT_ALL: u8 = 0xff;
/// Highest usable table id.
pub const OFPTT_MAX: u8 = 0xfe;

// Instruction types (ofp_instruction_type).
pub const OFPIT_GOTO_TABLE: u16 = 1;
pub const OFPIT_WRITE_METADATA: u16 = 2;
pub const OFPIT_WRITE_ACTIONS: u16 = 3;
pub const OFPIT_APPLY_ACTIONS: u16 = 4;
pub const OFPIT_CLEAR_ACTIONS: u16 = 5;
pub const OFPIT_METER: u16 = 6;
pub const OFPIT_EXPERIMENTER: u16 = 0xffff;

// Action types (ofp_action_type).
pub const OFPAT_OUTPUT: u16 = 0;
pub const OFPAT_COPY_TTL_OUT: u16 = 11;
pub const OFPAT_COPY_TTL_IN: u16 = 12;
pub const OFPAT_SET_MPLS_TTL: u16 = 15;
pub const OFPAT_DEC_MPLS_TTL: u16 = 16;
pub const OFPAT_PUSH_VLAN: u16 = 17;
pub const OFPAT_POP_VLAN: u16 = 18;
pub const OFPAT_PUSH_MPLS: u16 = 19;
pub const OFPAT_POP_MPLS: u16 = 20;
pub const OFPAT_SET_QUEUE: u16 = 21;
pub const OFPAT_GROUP: u16 = 22;
pub const OFPAT_SET_NW_TTL: u16 = 23;
pub const OFPAT_DEC_NW_TTL: u16 = 24;
pub const OFPAT_SET_FIELD: u16 = 25;
pub const OFPAT_PUSH_PBB: u16 = 26;
pub const OFPAT_POP_PBB: u16 = 27;
pub const OFPAT_EXPERIMENTER: u16 = 0xffff;

// IPv6 extension header pseudo-field bits (ofp_ipv6exthdr_flags).
pub const OFPIEH_NONEXT: u16 = 1 << 0;
pub const OFPIEH_ESP: u16 = 1 << 1;
pub const OFPIEH_AUTH: u16 = 1 << 2;
pub const OFPIEH_DEST: u16 = 1 << 3;
pub const OFPIEH_FRAG: u16 = 1 << 4;
pub const OFPIEH_ROUTER: u16 = 1 << 5;
pub const OFPIEH_HOP: u16 = 1 << 6;
pub const OFPIEH_UNREP: u16 = 1 << 7;
pub const OFPIEH_UNSEQ: u16 = 1 << 8;

// Flow mod commands (ofp_flow_mod_command).
pub const OFPFC_ADD: u8 = 0;
pub const OFPFC_MODIFY: u8 = 1;
pub const OFPFC_MODIFY_STRICT: u8 = 2;
pub const OFPFC_DELETE: u8 = 3;
pub const OFPFC_DELETE_STRICT: u8 = 4;

// Flow mod flags (ofp_flow_mod_flags).
pub const OFPFF_SEND_FLOW_REM: u16 = 1 << 0;
pub const OFPFF_CHECK_OVERLAP: u16 = 1 << 1;
pub const OFPFF_RESET_COUNTS: u16 = 1 << 2;
pub const OFPFF_NO_PKT_COUNTS: u16 = 1 << 3;
pub const OFPFF_NO_BYT_COUNTS: u16 = 1 << 4;

// Flow removed reasons (ofp_flow_removed_reason).
pub const OFPRR_IDLE_TIMEOUT: u8 = 0;
pub const OFPRR_HARD_TIMEOUT: u8 = 1;
pub const OFPRR_DELETE: u8 = 2;
pub const OFPRR_GROUP_DELETE: u8 = 3;

/// Human-readable name for a reserved port number, if any.
pub fn port_name(port: u32) -> Option<&'static str> {
    match port {
        OFPP_IN_PORT => Some("in_port"),
        OFPP_TABLE => Some("table"),
        OFPP_NORMAL => Some("normal"),
        OFPP_FLOOD => Some("flood"),
        OFPP_ALL => Some("all"),
        OFPP_CONTROLLER => Some("controller"),
        OFPP_LOCAL => Some("local"),
        OFPP_ANY => Some("any"),
        _ => None,
    }
}
