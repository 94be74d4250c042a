//! The three classification strategies over one table's rule set.
//!
//! All three answer the same question (the highest-priority matching
//! flow) and must agree on the returned priority for any packet; they
//! differ in build cost and lookup shape.

pub mod flowinfo;
pub mod mbtree;
pub mod ptree;
pub mod thtable;

pub use flowinfo::{Flowinfo, FlowinfoBasic};
pub use mbtree::{Mbtree, MBTREE_MIN_FLOWS};
pub use thtable::Thtable;

use crate::openflow::oxm::OxmField;
use crate::packet::{
    Base, OOB2_IPV6_EXTHDR, OOB2_TUNNEL_ID, OOB_ETH_TYPE, OOB_IN_PHY_PORT, OOB_IN_PORT,
    OOB_METADATA, OOB_VLAN_TCI,
};

/// Where a match field lives in a packet, for hashed dispatch: read
/// `size` bytes at `base + off`, mask, and use the result as the key; the
/// flow-side value is shifted left into the same alignment.  A zero size
/// marks fields the multi-branch tree cannot hash (sub-byte fields and
/// the 16-byte addresses).
#[derive(Debug, Clone, Copy)]
pub struct FieldDesc {
    pub base: Base,
    pub off: usize,
    pub size: usize,
    pub mask: u64,
    pub shift: u32,
}

impl FieldDesc {
    pub fn hashable(&self) -> bool {
        self.size > 0
    }
}

const fn desc(base: Base, off: usize, size: usize, mask: u64, shift: u32) -> FieldDesc {
    FieldDesc { base, off, size, mask, shift }
}

const fn none(base: Base) -> FieldDesc {
    FieldDesc { base, off: 0, size: 0, mask: 0, shift: 0 }
}

/// Indexed by `OxmField` id.
static FIELD_DESC: [FieldDesc; crate::openflow::oxm::OXM_FIELD_COUNT] = [
    desc(Base::Oob, OOB_IN_PORT, 4, 0xffff_ffff, 0),      // IN_PORT
    desc(Base::Oob, OOB_IN_PHY_PORT, 4, 0xffff_ffff, 0),  // IN_PHY_PORT
    desc(Base::Oob, OOB_METADATA, 8, u64::MAX, 0),        // METADATA
    desc(Base::Eth, 0, 6, 0xffff_ffff_ffff, 0),           // ETH_DST
    desc(Base::Eth, 6, 6, 0xffff_ffff_ffff, 0),           // ETH_SRC
    desc(Base::Oob, OOB_ETH_TYPE, 2, 0xffff, 0),          // ETH_TYPE
    desc(Base::Oob, OOB_VLAN_TCI, 2, 0x1fff, 0),          // VLAN_VID (VID_PRESENT aware)
    none(Base::Oob),                                      // VLAN_PCP
    none(Base::L3),                                       // IP_DSCP
    none(Base::L3),                                       // IP_ECN
    desc(Base::IpProto, 0, 1, 0xff, 0),                   // IP_PROTO
    desc(Base::L3, 12, 4, 0xffff_ffff, 0),                // IPV4_SRC
    desc(Base::L3, 16, 4, 0xffff_ffff, 0),                // IPV4_DST
    desc(Base::L4, 0, 2, 0xffff, 0),                      // TCP_SRC
    desc(Base::L4, 2, 2, 0xffff, 0),                      // TCP_DST
    desc(Base::L4, 0, 2, 0xffff, 0),                      // UDP_SRC
    desc(Base::L4, 2, 2, 0xffff, 0),                      // UDP_DST
    desc(Base::L4, 0, 2, 0xffff, 0),                      // SCTP_SRC
    desc(Base::L4, 2, 2, 0xffff, 0),                      // SCTP_DST
    desc(Base::L4, 0, 1, 0xff, 0),                        // ICMPV4_TYPE
    desc(Base::L4, 1, 1, 0xff, 0),                        // ICMPV4_CODE
    desc(Base::L3, 6, 2, 0xffff, 0),                      // ARP_OP
    desc(Base::L3, 14, 4, 0xffff_ffff, 0),                // ARP_SPA
    desc(Base::L3, 24, 4, 0xffff_ffff, 0),                // ARP_TPA
    desc(Base::L3, 8, 6, 0xffff_ffff_ffff, 0),            // ARP_SHA
    desc(Base::L3, 18, 6, 0xffff_ffff_ffff, 0),           // ARP_THA
    none(Base::V6Src),                                    // IPV6_SRC
    none(Base::V6Dst),                                    // IPV6_DST
    desc(Base::L3, 0, 4, 0x000f_ffff, 0),                 // IPV6_FLABEL
    desc(Base::L4, 0, 1, 0xff, 0),                        // ICMPV6_TYPE
    desc(Base::L4, 1, 1, 0xff, 0),                        // ICMPV6_CODE
    none(Base::L4),                                       // IPV6_ND_TARGET
    none(Base::NdSll),                                    // IPV6_ND_SLL
    none(Base::NdTll),                                    // IPV6_ND_TLL
    desc(Base::Mpls, 0, 4, 0xffff_f000, 12),              // MPLS_LABEL
    none(Base::Mpls),                                     // MPLS_TC
    none(Base::Mpls),                                     // MPLS_BOS
    desc(Base::Pbb, 1, 3, 0x00ff_ffff, 0),                // PBB_ISID
    desc(Base::Oob2, OOB2_TUNNEL_ID, 8, u64::MAX, 0),     // TUNNEL_ID
    desc(Base::Oob2, OOB2_IPV6_EXTHDR, 2, 0xffff, 0),     // IPV6_EXTHDR
];

pub fn field_desc(field: OxmField) -> &'static FieldDesc {
    &FIELD_DESC[usize::from(field.id())]
}
