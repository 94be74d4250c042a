//! Prerequisite closure over a match list.
//!
//! A field such as `ARP_OP` is only meaningful when the list also pins
//! `ETH_TYPE` to 0x0806; insertion rejects lists that do not carry the
//! prerequisite, so the classifiers can skip redundant tests on stored
//! flows.

use crate::error::{BadMatch, OfpResult};
use crate::openflow::consts::OFPVID_NONE;
use crate::openflow::oxm::{Oxm, OxmField};
use crate::packet::ethertype;

fn field_value(matches: &[Oxm], field: OxmField) -> Option<u64> {
    matches.iter().find(|m| m.field == field && m.mask.is_none()).map(Oxm::value_u64)
}

fn eth_type_is(matches: &[Oxm], allowed: &[u16]) -> bool {
    match field_value(matches, OxmField::EthType) {
        Some(v) => allowed.contains(&(v as u16)),
        None => false,
    }
}

fn ip_proto_is(matches: &[Oxm], proto: u8) -> bool {
    field_value(matches, OxmField::IpProto) == Some(u64::from(proto))
}

fn icmpv6_type_is(matches: &[Oxm], allowed: &[u8]) -> bool {
    match field_value(matches, OxmField::Icmpv6Type) {
        Some(v) => allowed.contains(&(v as u8)),
        None => false,
    }
}

/// Whether the prerequisite of `field` holds on the rest of the list.
/// Fields with no prerequisite always pass.
fn prereq_ok(field: OxmField, matches: &[Oxm]) -> bool {
    use OxmField::*;
    match field {
        InPhyPort => matches.iter().any(|m| m.field == InPort),
        VlanPcp => matches
            .iter()
            .any(|m| m.field == VlanVid && !(m.mask.is_none() && m.value_u16() == OFPVID_NONE)),
        IpDscp | IpEcn | IpProto => {
            eth_type_is(matches, &[ethertype::IPV4, ethertype::IPV6])
        }
        Ipv4Src | Ipv4Dst => eth_type_is(matches, &[ethertype::IPV4]),
        TcpSrc | TcpDst => ip_proto_is(matches, 6),
        UdpSrc | UdpDst => ip_proto_is(matches, 17),
        SctpSrc | SctpDst => ip_proto_is(matches, 132),
        Icmpv4Type | Icmpv4Code => ip_proto_is(matches, 1),
        Icmpv6Type | Icmpv6Code => ip_proto_is(matches, 58),
        ArpOp | ArpSpa | ArpTpa | ArpSha | ArpTha => eth_type_is(matches, &[ethertype::ARP]),
        Ipv6Src | Ipv6Dst | Ipv6Flabel | Ipv6Exthdr => eth_type_is(matches, &[ethertype::IPV6]),
        Ipv6NdTarget => icmpv6_type_is(matches, &[135, 136]),
        Ipv6NdSll => icmpv6_type_is(matches, &[135]),
        Ipv6NdTll => icmpv6_type_is(matches, &[136]),
        MplsLabel | MplsTc | MplsBos => {
            eth_type_is(matches, &[ethertype::MPLS, ethertype::MPLS_MCAST])
        }
        PbbIsid => eth_type_is(matches, &[ethertype::PBB]),
        _ => true,
    }
}

/// Validate a whole match list: per-term checks, duplicate detection and
/// the prerequisite closure.  Prerequisites are resolved against the whole
/// list, not only the preceding terms.
pub fn check_match_list(matches: &[Oxm]) -> OfpResult<()> {
    let mut seen = 0u64;
    for m in matches {
        m.validate()?;
        let bit = m.field.bit();
        if seen & bit != 0 {
            return Err(BadMatch::DupField.into());
        }
        seen |= bit;
    }
    for m in matches {
        if !prereq_ok(m.field, matches) {
            return Err(BadMatch::BadPrereq.into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arp_op_needs_eth_type() {
        let bad = vec![Oxm::arp_op(1)];
        assert_eq!(check_match_list(&bad), Err(BadMatch::BadPrereq.into()));

        let good = vec![Oxm::eth_type(ethertype::ARP), Oxm::arp_op(1)];
        assert!(check_match_list(&good).is_ok());
    }

    #[test]
    fn l4_ports_need_ip_proto() {
        let bad = vec![Oxm::eth_type(ethertype::IPV4), Oxm::tcp_dst(80)];
        assert_eq!(check_match_list(&bad), Err(BadMatch::BadPrereq.into()));

        let good = vec![Oxm::eth_type(ethertype::IPV4), Oxm::ip_proto(6), Oxm::tcp_dst(80)];
        assert!(check_match_list(&good).is_ok());
    }

    #[test]
    fn duplicate_field_rejected() {
        let dup = vec![Oxm::in_port(1), Oxm::in_port(2)];
        assert_eq!(check_match_list(&dup), Err(BadMatch::DupField.into()));
    }

    #[test]
    fn vlan_pcp_needs_present_vid() {
        let bad = vec![Oxm::vlan_vid_none(), Oxm::vlan_pcp(3)];
        assert_eq!(check_match_list(&bad), Err(BadMatch::BadPrereq.into()));

        let good = vec![Oxm::vlan_vid(10), Oxm::vlan_pcp(3)];
        assert!(check_match_list(&good).is_ok());
    }

    #[test]
    fn nd_target_needs_icmpv6_type() {
        let good = vec![
            Oxm::eth_type(ethertype::IPV6),
            Oxm::ip_proto(58),
            Oxm::icmpv6_type(135),
            Oxm::ipv6_nd_target("fe80::1".parse().unwrap()),
            Oxm::ipv6_nd_sll([0, 1, 2, 3, 4, 5]),
        ];
        assert!(check_match_list(&good).is_ok());

        let bad = vec![
            Oxm::eth_type(ethertype::IPV6),
            Oxm::ip_proto(58),
            Oxm::icmpv6_type(136),
            Oxm::ipv6_nd_sll([0, 1, 2, 3, 4, 5]),
        ];
        assert_eq!(check_match_list(&bad), Err(BadMatch::BadPrereq.into()));
    }
}
