//! OpenFlow actions as carried by instructions.
//!
//! The engine stores and validates actions; executing them against a
//! packet is the action executor's business, not the classifier's.

use crate::error::{BadAction, BadMatch, OfpResult};
use crate::openflow::consts::*;
use crate::openflow::oxm::Oxm;
use crate::packet::ethertype;

/// The `OFPAT_*` set, payloads included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Output { port: u32, max_len: u16 },
    CopyTtlOut,
    CopyTtlIn,
    SetMplsTtl(u8),
    DecMplsTtl,
    PushVlan(u16),
    PopVlan,
    PushMpls(u16),
    PopMpls(u16),
    SetQueue(u32),
    Group(u32),
    SetNwTtl(u8),
    DecNwTtl,
    SetField(Oxm),
    PushPbb(u16),
    PopPbb,
    Experimenter(u32),
}

impl Action {
    pub fn type_code(&self) -> u16 {
        match self {
            Action::Output { .. } => OFPAT_OUTPUT,
            Action::CopyTtlOut => OFPAT_COPY_TTL_OUT,
            Action::CopyTtlIn => OFPAT_COPY_TTL_IN,
            Action::SetMplsTtl(_) => OFPAT_SET_MPLS_TTL,
            Action::DecMplsTtl => OFPAT_DEC_MPLS_TTL,
            Action::PushVlan(_) => OFPAT_PUSH_VLAN,
            Action::PopVlan => OFPAT_POP_VLAN,
            Action::PushMpls(_) => OFPAT_PUSH_MPLS,
            Action::PopMpls(_) => OFPAT_POP_MPLS,
            Action::SetQueue(_) => OFPAT_SET_QUEUE,
            Action::Group(_) => OFPAT_GROUP,
            Action::SetNwTtl(_) => OFPAT_SET_NW_TTL,
            Action::DecNwTtl => OFPAT_DEC_NW_TTL,
            Action::SetField(_) => OFPAT_SET_FIELD,
            Action::PushPbb(_) => OFPAT_PUSH_PBB,
            Action::PopPbb => OFPAT_POP_PBB,
            Action::Experimenter(_) => OFPAT_EXPERIMENTER,
        }
    }

    /// Execution-order key for a write-action set (OpenFlow 1.3 §5.10):
    /// TTL copies inward first, output always last.
    pub fn set_order(&self) -> u8 {
        match self {
            Action::CopyTtlIn => 0,
            Action::PopVlan | Action::PopMpls(_) | Action::PopPbb => 1,
            Action::PushMpls(_) => 2,
            Action::PushPbb(_) => 3,
            Action::PushVlan(_) => 4,
            Action::CopyTtlOut => 5,
            Action::DecMplsTtl | Action::DecNwTtl => 6,
            Action::SetMplsTtl(_) | Action::SetNwTtl(_) | Action::SetField(_) => 7,
            Action::Experimenter(_) => 7,
            Action::SetQueue(_) => 8,
            Action::Group(_) => 9,
            Action::Output { .. } => 10,
        }
    }

    /// Port referenced by an OUTPUT action, for the out_port selectors.
    pub fn output_port(&self) -> Option<u32> {
        match self {
            Action::Output { port, .. } => Some(*port),
            _ => None,
        }
    }

    /// Group referenced by a GROUP action, for the out_group selectors.
    pub fn group_id(&self) -> Option<u32> {
        match self {
            Action::Group(group) => Some(*group),
            _ => None,
        }
    }

    /// Validate the action payload.  `group_exists` is the hook registry's
    /// probe into the (external) group table.
    pub fn validate(&self, group_exists: &dyn Fn(u32) -> bool) -> OfpResult<()> {
        match self {
            Action::Output { port, .. } => {
                if *port == 0 || *port == OFPP_ANY || (*port > OFPP_MAX && port_name(*port).is_none())
                {
                    return Err(BadAction::BadOutPort.into());
                }
            }
            Action::Group(group) => {
                if *group > OFPG_MAX || !group_exists(*group) {
                    return Err(BadAction::BadOutGroup.into());
                }
            }
            Action::PushVlan(tpid) => {
                if *tpid != ethertype::VLAN && *tpid != ethertype::SVLAN {
                    return Err(BadAction::BadArgument.into());
                }
            }
            Action::PushMpls(tpid) => {
                if *tpid != ethertype::MPLS && *tpid != ethertype::MPLS_MCAST {
                    return Err(BadAction::BadArgument.into());
                }
            }
            Action::PushPbb(tpid) => {
                if *tpid != ethertype::PBB {
                    return Err(BadAction::BadArgument.into());
                }
            }
            Action::SetField(oxm) => {
                if oxm.has_mask() {
                    return Err(BadAction::BadSetType.into());
                }
                oxm.validate().map_err(|e| match e {
                    crate::error::OfpError::BadMatch(BadMatch::BadLen) => BadAction::BadSetLen,
                    _ => BadAction::BadSetArgument,
                })?;
            }
            Action::SetNwTtl(_)
            | Action::SetMplsTtl(_)
            | Action::SetQueue(_)
            | Action::CopyTtlOut
            | Action::CopyTtlIn
            | Action::DecMplsTtl
            | Action::DecNwTtl
            | Action::PopVlan
            | Action::PopMpls(_)
            | Action::PopPbb
            | Action::Experimenter(_) => {}
        }
        Ok(())
    }
}

/// Validate a whole action list and return it sorted for a write set.
pub fn sort_action_set(mut actions: Vec<Action>) -> Vec<Action> {
    actions.sort_by_key(Action::set_order);
    actions
}
