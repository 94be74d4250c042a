//! OXM (OpenFlow Extensible Match) TLV model.
//!
//! An OXM field on the wire is `class(2) | field:7 hasmask:1 | length(1)`
//! followed by the value bytes and, when the has-mask bit is set, the same
//! number of mask bytes.  Only the `OFPXMC_OPENFLOW_BASIC` class is
//! handled; re-serialising a parsed stream yields the original bytes.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::{BadMatch, OfpResult};
use crate::openflow::consts::*;

/// The closed set of `OFPXMT_OFB_*` match fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum OxmField {
    InPort = 0,
    InPhyPort = 1,
    Metadata = 2,
    EthDst = 3,
    EthSrc = 4,
    EthType = 5,
    VlanVid = 6,
    VlanPcp = 7,
    IpDscp = 8,
    IpEcn = 9,
    IpProto = 10,
    Ipv4Src = 11,
    Ipv4Dst = 12,
    TcpSrc = 13,
    TcpDst = 14,
    UdpSrc = 15,
    UdpDst = 16,
    SctpSrc = 17,
    SctpDst = 18,
    Icmpv4Type = 19,
    Icmpv4Code = 20,
    ArpOp = 21,
    ArpSpa = 22,
    ArpTpa = 23,
    ArpSha = 24,
    ArpTha = 25,
    Ipv6Src = 26,
    Ipv6Dst = 27,
    Ipv6Flabel = 28,
    Icmpv6Type = 29,
    Icmpv6Code = 30,
    Ipv6NdTarget = 31,
    Ipv6NdSll = 32,
    Ipv6NdTll = 33,
    MplsLabel = 34,
    MplsTc = 35,
    MplsBos = 36,
    PbbIsid = 37,
    TunnelId = 38,
    Ipv6Exthdr = 39,
}

/// Number of distinct OXM fields; also the bound of the per-field tables.
pub const OXM_FIELD_COUNT: usize = 40;

impl OxmField {
    pub fn from_id(id: u8) -> Option<Self> {
        use OxmField::*;
        Some(match id {
            0 => InPort,
            1 => InPhyPort,
            2 => Metadata,
            3 => EthDst,
            4 => EthSrc,
            5 => EthType,
            6 => VlanVid,
            7 => VlanPcp,
            8 => IpDscp,
            9 => IpEcn,
            10 => IpProto,
            11 => Ipv4Src,
            12 => Ipv4Dst,
            13 => TcpSrc,
            14 => TcpDst,
            15 => UdpSrc,
            16 => UdpDst,
            17 => SctpSrc,
            18 => SctpDst,
            19 => Icmpv4Type,
            20 => Icmpv4Code,
            21 => ArpOp,
            22 => ArpSpa,
            23 => ArpTpa,
            24 => ArpSha,
            25 => ArpTha,
            26 => Ipv6Src,
            27 => Ipv6Dst,
            28 => Ipv6Flabel,
            29 => Icmpv6Type,
            30 => Icmpv6Code,
            31 => Ipv6NdTarget,
            32 => Ipv6NdSll,
            33 => Ipv6NdTll,
            34 => MplsLabel,
            35 => MplsTc,
            36 => MplsBos,
            37 => PbbIsid,
            38 => TunnelId,
            39 => Ipv6Exthdr,
            _ => return None,
        })
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Presence bit used in the per-flow field bitset.
    pub fn bit(self) -> u64 {
        1u64 << (self as u8)
    }

    /// Length in bytes of the value (without mask).
    pub fn value_len(self) -> usize {
        use OxmField::*;
        match self {
            IpProto | VlanPcp | IpDscp | IpEcn | Icmpv4Type | Icmpv4Code | Icmpv6Type
            | Icmpv6Code | MplsTc | MplsBos => 1,
            EthType | VlanVid | TcpSrc | TcpDst | UdpSrc | UdpDst | SctpSrc | SctpDst | ArpOp
            | Ipv6Exthdr => 2,
            PbbIsid => 3,
            InPort | InPhyPort | Ipv4Src | Ipv4Dst | ArpSpa | ArpTpa | Ipv6Flabel | MplsLabel => 4,
            EthDst | EthSrc | ArpSha | ArpTha | Ipv6NdSll | Ipv6NdTll => 6,
            Metadata | TunnelId => 8,
            Ipv6Src | Ipv6Dst | Ipv6NdTarget => 16,
        }
    }

    /// Whether OpenFlow 1.3 permits a mask on the field.
    pub fn maskable(self) -> bool {
        use OxmField::*;
        matches!(
            self,
            Metadata
                | EthDst
                | EthSrc
                | VlanVid
                | Ipv4Src
                | Ipv4Dst
                | ArpSpa
                | ArpTpa
                | ArpSha
                | ArpTha
                | Ipv6Src
                | Ipv6Dst
                | Ipv6Flabel
                | PbbIsid
                | TunnelId
                | Ipv6Exthdr
        )
    }

    /// Largest value a short integer field may carry, if the field does not
    /// span its full byte width.
    fn max_value(self) -> Option<u64> {
        use OxmField::*;
        match self {
            VlanVid => Some(u64::from(OFPVID_PRESENT | 0x0fff)),
            VlanPcp | MplsTc => Some(7),
            IpDscp => Some(0x3f),
            IpEcn => Some(3),
            MplsBos => Some(1),
            MplsLabel | Ipv6Flabel => Some(0xf_ffff),
            Ipv6Exthdr => Some(0x1ff),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        use OxmField::*;
        match self {
            InPort => "in_port",
            InPhyPort => "in_phy_port",
            Metadata => "metadata",
            EthDst => "eth_dst",
            EthSrc => "eth_src",
            EthType => "eth_type",
            VlanVid => "vlan_vid",
            VlanPcp => "vlan_pcp",
            IpDscp => "ip_dscp",
            IpEcn => "ip_ecn",
            IpProto => "ip_proto",
            Ipv4Src => "ipv4_src",
            Ipv4Dst => "ipv4_dst",
            TcpSrc => "tcp_src",
            TcpDst => "tcp_dst",
            UdpSrc => "udp_src",
            UdpDst => "udp_dst",
            SctpSrc => "sctp_src",
            SctpDst => "sctp_dst",
            Icmpv4Type => "icmp_type",
            Icmpv4Code => "icmp_code",
            ArpOp => "arp_op",
            ArpSpa => "arp_spa",
            ArpTpa => "arp_tpa",
            ArpSha => "arp_sha",
            ArpTha => "arp_tha",
            Ipv6Src => "ipv6_src",
            Ipv6Dst => "ipv6_dst",
            Ipv6Flabel => "ipv6_flabel",
            Icmpv6Type => "icmpv6_type",
            Icmpv6Code => "icmpv6_code",
            Ipv6NdTarget => "ipv6_nd_target",
            Ipv6NdSll => "ipv6_nd_sll",
            Ipv6NdTll => "ipv6_nd_tll",
            MplsLabel => "mpls_label",
            MplsTc => "mpls_tc",
            MplsBos => "mpls_bos",
            PbbIsid => "pbb_isid",
            TunnelId => "tunnel_id",
            Ipv6Exthdr => "ipv6_exthdr",
        }
    }
}

/// One OXM match term: field, value bytes, optional mask bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oxm {
    pub field: OxmField,
    pub value: Vec<u8>,
    pub mask: Option<Vec<u8>>,
}

impl Oxm {
    pub fn new(field: OxmField, value: Vec<u8>) -> Self {
        Oxm { field, value, mask: None }
    }

    pub fn new_masked(field: OxmField, value: Vec<u8>, mask: Vec<u8>) -> Self {
        Oxm { field, value, mask: Some(mask) }
    }

    pub fn has_mask(&self) -> bool {
        self.mask.is_some()
    }

    /// Value folded into a u64, big-endian.  Only meaningful for fields of
    /// eight bytes or fewer.
    pub fn value_u64(&self) -> u64 {
        self.value.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }

    /// Mask folded into a u64; all-ones over the value width when absent.
    pub fn mask_u64(&self) -> u64 {
        match &self.mask {
            Some(mask) => mask.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)),
            None => {
                if self.value.len() >= 8 {
                    u64::MAX
                } else {
                    (1u64 << (self.value.len() * 8)) - 1
                }
            }
        }
    }

    pub fn value_u16(&self) -> u16 {
        self.value_u64() as u16
    }

    pub fn value_u32(&self) -> u32 {
        self.value_u64() as u32
    }

    /// An exact match: no mask, or a mask of all ones.
    pub fn is_exact(&self) -> bool {
        match &self.mask {
            None => true,
            Some(mask) => mask.iter().all(|&b| b == 0xff),
        }
    }

    /// Check lengths, maskability and value ranges.  Called once per term
    /// before a flow is stored.
    pub fn validate(&self) -> OfpResult<()> {
        let want = self.field.value_len();
        if self.value.len() != want {
            return Err(BadMatch::BadLen.into());
        }
        if let Some(mask) = &self.mask {
            if !self.field.maskable() {
                return Err(BadMatch::BadMask.into());
            }
            if mask.len() != want {
                return Err(BadMatch::BadLen.into());
            }
            // Value bits outside the mask are meaningless; reject them so
            // equality on stored matches stays canonical.
            for (v, m) in self.value.iter().zip(mask.iter()) {
                if v & !m != 0 {
                    return Err(BadMatch::BadValue.into());
                }
            }
        }
        if let Some(max) = self.field.max_value() {
            if self.value_u64() > max {
                return Err(BadMatch::BadValue.into());
            }
        }
        Ok(())
    }

    /// Parse one OXM TLV from the head of `buf`.  Returns the term and the
    /// number of bytes consumed.
    pub fn parse(buf: &[u8]) -> OfpResult<(Oxm, usize)> {
        if buf.len() < 4 {
            return Err(BadMatch::BadLen.into());
        }
        let class = u16::from_be_bytes([buf[0], buf[1]]);
        if class != OFPXMC_OPENFLOW_BASIC {
            return Err(BadMatch::BadType.into());
        }
        let field_byte = buf[2];
        let has_mask = field_byte & 1 != 0;
        let field = OxmField::from_id(field_byte >> 1).ok_or(BadMatch::BadField)?;
        let payload_len = buf[3] as usize;
        let value_len = field.value_len();
        let expected = if has_mask { value_len * 2 } else { value_len };
        if payload_len != expected || buf.len() < 4 + payload_len {
            return Err(BadMatch::BadLen.into());
        }
        let value = buf[4..4 + value_len].to_vec();
        let mask = if has_mask {
            Some(buf[4 + value_len..4 + payload_len].to_vec())
        } else {
            None
        };
        Ok((Oxm { field, value, mask }, 4 + payload_len))
    }

    /// Parse a whole OXM byte stream into a match list.
    pub fn parse_list(mut buf: &[u8]) -> OfpResult<Vec<Oxm>> {
        let mut list = Vec::new();
        while !buf.is_empty() {
            let (oxm, used) = Oxm::parse(buf)?;
            buf = &buf[used..];
            list.push(oxm);
        }
        Ok(list)
    }

    /// Append the TLV bytes to `out`.
    pub fn emit(&self, out: &mut Vec<u8>) {
        let payload_len = self.value.len() + self.mask.as_ref().map_or(0, Vec::len);
        out.extend_from_slice(&OFPXMC_OPENFLOW_BASIC.to_be_bytes());
        out.push(self.field.id() << 1 | u8::from(self.has_mask()));
        out.push(payload_len as u8);
        out.extend_from_slice(&self.value);
        if let Some(mask) = &self.mask {
            out.extend_from_slice(mask);
        }
    }

    pub fn emit_list(list: &[Oxm]) -> Vec<u8> {
        let mut out = Vec::new();
        for oxm in list {
            oxm.emit(&mut out);
        }
        out
    }

    // Typed constructors for the fields the control surface builds directly.

    pub fn in_port(port: u32) -> Self {
        Oxm::new(OxmField::InPort, port.to_be_bytes().to_vec())
    }

    pub fn in_phy_port(port: u32) -> Self {
        Oxm::new(OxmField::InPhyPort, port.to_be_bytes().to_vec())
    }

    pub fn metadata(value: u64) -> Self {
        Oxm::new(OxmField::Metadata, value.to_be_bytes().to_vec())
    }

    pub fn metadata_masked(value: u64, mask: u64) -> Self {
        Oxm::new_masked(
            OxmField::Metadata,
            value.to_be_bytes().to_vec(),
            mask.to_be_bytes().to_vec(),
        )
    }

    pub fn eth_dst(addr: [u8; 6]) -> Self {
        Oxm::new(OxmField::EthDst, addr.to_vec())
    }

    pub fn eth_dst_masked(addr: [u8; 6], mask: [u8; 6]) -> Self {
        Oxm::new_masked(OxmField::EthDst, addr.to_vec(), mask.to_vec())
    }

    pub fn eth_src(addr: [u8; 6]) -> Self {
        Oxm::new(OxmField::EthSrc, addr.to_vec())
    }

    pub fn eth_type(ethertype: u16) -> Self {
        Oxm::new(OxmField::EthType, ethertype.to_be_bytes().to_vec())
    }

    /// VID match for a tagged frame; `OFPVID_PRESENT` is set here.
    pub fn vlan_vid(vid: u16) -> Self {
        Oxm::new(OxmField::VlanVid, (OFPVID_PRESENT | vid).to_be_bytes().to_vec())
    }

    /// VID match that accepts only untagged frames.
    pub fn vlan_vid_none() -> Self {
        Oxm::new(OxmField::VlanVid, OFPVID_NONE.to_be_bytes().to_vec())
    }

    /// Masked VID match; `vlan_vid_masked(OFPVID_PRESENT, OFPVID_PRESENT)`
    /// accepts any tagged frame.
    pub fn vlan_vid_masked(value: u16, mask: u16) -> Self {
        Oxm::new_masked(
            OxmField::VlanVid,
            value.to_be_bytes().to_vec(),
            mask.to_be_bytes().to_vec(),
        )
    }

    pub fn vlan_pcp(pcp: u8) -> Self {
        Oxm::new(OxmField::VlanPcp, vec![pcp])
    }

    pub fn ip_dscp(dscp: u8) -> Self {
        Oxm::new(OxmField::IpDscp, vec![dscp])
    }

    pub fn ip_ecn(ecn: u8) -> Self {
        Oxm::new(OxmField::IpEcn, vec![ecn])
    }

    pub fn ip_proto(proto: u8) -> Self {
        Oxm::new(OxmField::IpProto, vec![proto])
    }

    pub fn ipv4_src(addr: Ipv4Addr) -> Self {
        Oxm::new(OxmField::Ipv4Src, addr.octets().to_vec())
    }

    pub fn ipv4_src_masked(addr: Ipv4Addr, mask: Ipv4Addr) -> Self {
        Oxm::new_masked(OxmField::Ipv4Src, addr.octets().to_vec(), mask.octets().to_vec())
    }

    pub fn ipv4_dst(addr: Ipv4Addr) -> Self {
        Oxm::new(OxmField::Ipv4Dst, addr.octets().to_vec())
    }

    pub fn ipv4_dst_masked(addr: Ipv4Addr, mask: Ipv4Addr) -> Self {
        Oxm::new_masked(OxmField::Ipv4Dst, addr.octets().to_vec(), mask.octets().to_vec())
    }

    pub fn tcp_src(port: u16) -> Self {
        Oxm::new(OxmField::TcpSrc, port.to_be_bytes().to_vec())
    }

    pub fn tcp_dst(port: u16) -> Self {
        Oxm::new(OxmField::TcpDst, port.to_be_bytes().to_vec())
    }

    pub fn udp_src(port: u16) -> Self {
        Oxm::new(OxmField::UdpSrc, port.to_be_bytes().to_vec())
    }

    pub fn udp_dst(port: u16) -> Self {
        Oxm::new(OxmField::UdpDst, port.to_be_bytes().to_vec())
    }

    pub fn sctp_src(port: u16) -> Self {
        Oxm::new(OxmField::SctpSrc, port.to_be_bytes().to_vec())
    }

    pub fn sctp_dst(port: u16) -> Self {
        Oxm::new(OxmField::SctpDst, port.to_be_bytes().to_vec())
    }

    pub fn icmpv4_type(ty: u8) -> Self {
        Oxm::new(OxmField::Icmpv4Type, vec![ty])
    }

    pub fn icmpv4_code(code: u8) -> Self {
        Oxm::new(OxmField::Icmpv4Code, vec![code])
    }

    pub fn arp_op(op: u16) -> Self {
        Oxm::new(OxmField::ArpOp, op.to_be_bytes().to_vec())
    }

    pub fn arp_spa(addr: Ipv4Addr) -> Self {
        Oxm::new(OxmField::ArpSpa, addr.octets().to_vec())
    }

    pub fn arp_tpa(addr: Ipv4Addr) -> Self {
        Oxm::new(OxmField::ArpTpa, addr.octets().to_vec())
    }

    pub fn arp_sha(addr: [u8; 6]) -> Self {
        Oxm::new(OxmField::ArpSha, addr.to_vec())
    }

    pub fn arp_tha(addr: [u8; 6]) -> Self {
        Oxm::new(OxmField::ArpTha, addr.to_vec())
    }

    pub fn ipv6_src(addr: Ipv6Addr) -> Self {
        Oxm::new(OxmField::Ipv6Src, addr.octets().to_vec())
    }

    pub fn ipv6_src_masked(addr: Ipv6Addr, mask: Ipv6Addr) -> Self {
        Oxm::new_masked(OxmField::Ipv6Src, addr.octets().to_vec(), mask.octets().to_vec())
    }

    pub fn ipv6_dst(addr: Ipv6Addr) -> Self {
        Oxm::new(OxmField::Ipv6Dst, addr.octets().to_vec())
    }

    pub fn ipv6_flabel(label: u32) -> Self {
        Oxm::new(OxmField::Ipv6Flabel, label.to_be_bytes().to_vec())
    }

    pub fn icmpv6_type(ty: u8) -> Self {
        Oxm::new(OxmField::Icmpv6Type, vec![ty])
    }

    pub fn icmpv6_code(code: u8) -> Self {
        Oxm::new(OxmField::Icmpv6Code, vec![code])
    }

    pub fn ipv6_nd_target(addr: Ipv6Addr) -> Self {
        Oxm::new(OxmField::Ipv6NdTarget, addr.octets().to_vec())
    }

    pub fn ipv6_nd_sll(addr: [u8; 6]) -> Self {
        Oxm::new(OxmField::Ipv6NdSll, addr.to_vec())
    }

    pub fn ipv6_nd_tll(addr: [u8; 6]) -> Self {
        Oxm::new(OxmField::Ipv6NdTll, addr.to_vec())
    }

    pub fn mpls_label(label: u32) -> Self {
        Oxm::new(OxmField::MplsLabel, label.to_be_bytes().to_vec())
    }

    pub fn mpls_tc(tc: u8) -> Self {
        Oxm::new(OxmField::MplsTc, vec![tc])
    }

    pub fn mpls_bos(bos: u8) -> Self {
        Oxm::new(OxmField::MplsBos, vec![bos])
    }

    pub fn pbb_isid(isid: u32) -> Self {
        Oxm::new(OxmField::PbbIsid, isid.to_be_bytes()[1..].to_vec())
    }

    pub fn tunnel_id(id: u64) -> Self {
        Oxm::new(OxmField::TunnelId, id.to_be_bytes().to_vec())
    }

    pub fn tunnel_id_masked(id: u64, mask: u64) -> Self {
        Oxm::new_masked(OxmField::TunnelId, id.to_be_bytes().to_vec(), mask.to_be_bytes().to_vec())
    }

    pub fn ipv6_exthdr(bits: u16) -> Self {
        Oxm::new(OxmField::Ipv6Exthdr, bits.to_be_bytes().to_vec())
    }

    pub fn ipv6_exthdr_masked(bits: u16, mask: u16) -> Self {
        Oxm::new_masked(
            OxmField::Ipv6Exthdr,
            bits.to_be_bytes().to_vec(),
            mask.to_be_bytes().to_vec(),
        )
    }
}

impl fmt::Display for Oxm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use OxmField::*;
        write!(f, "{}=", self.field.name())?;
        match self.field {
            EthDst | EthSrc | ArpSha | ArpTha | Ipv6NdSll | Ipv6NdTll => {
                let mut sep = "";
                for b in &self.value {
                    write!(f, "{sep}{b:02x}")?;
                    sep = ":";
                }
            }
            Ipv4Src | Ipv4Dst | ArpSpa | ArpTpa => {
                let o = &self.value;
                write!(f, "{}.{}.{}.{}", o[0], o[1], o[2], o[3])?;
            }
            Ipv6Src | Ipv6Dst | Ipv6NdTarget => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&self.value);
                write!(f, "{}", Ipv6Addr::from(octets))?;
            }
            EthType | Metadata | TunnelId | Ipv6Exthdr => {
                write!(f, "{:#x}", self.value_u64())?;
            }
            VlanVid => {
                let vid = self.value_u16();
                if vid == OFPVID_NONE && !self.has_mask() {
                    write!(f, "none")?;
                } else {
                    write!(f, "{}", vid & !OFPVID_PRESENT)?;
                }
            }
            _ => write!(f, "{}", self.value_u64())?,
        }
        if let Some(mask) = &self.mask {
            write!(f, "/")?;
            for b in mask {
                write!(f, "{b:02x}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_emit_round_trip() {
        let list = vec![
            Oxm::in_port(1),
            Oxm::eth_type(0x0800),
            Oxm::ipv4_src_masked(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 0, 0, 0)),
            Oxm::tcp_dst(80),
        ];
        let bytes = Oxm::emit_list(&list);
        let parsed = Oxm::parse_list(&bytes).expect("parse");
        assert_eq!(parsed, list);
        assert_eq!(Oxm::emit_list(&parsed), bytes);
    }

    #[test]
    fn parse_rejects_unknown_class_and_field() {
        let mut bytes = Vec::new();
        Oxm::in_port(1).emit(&mut bytes);
        bytes[0] = 0xff;
        assert!(Oxm::parse(&bytes).is_err());

        let mut bytes = Vec::new();
        Oxm::in_port(1).emit(&mut bytes);
        bytes[2] = 60 << 1;
        assert!(Oxm::parse(&bytes).is_err());
    }

    #[test]
    fn validate_checks_mask_legality() {
        // IN_PORT is not maskable.
        let oxm = Oxm::new_masked(OxmField::InPort, vec![0, 0, 0, 1], vec![0xff; 4]);
        assert_eq!(oxm.validate(), Err(BadMatch::BadMask.into()));

        // Value bits outside the mask are rejected.
        let oxm = Oxm::metadata_masked(0xff, 0x0f);
        assert_eq!(oxm.validate(), Err(BadMatch::BadValue.into()));

        // VID above the 13-bit range.
        let oxm = Oxm::new(OxmField::VlanVid, 0x2001u16.to_be_bytes().to_vec());
        assert_eq!(oxm.validate(), Err(BadMatch::BadValue.into()));

        assert!(Oxm::vlan_vid(100).validate().is_ok());
    }

    #[test]
    fn vlan_vid_present_semantics() {
        assert_eq!(Oxm::vlan_vid(5).value_u16(), OFPVID_PRESENT | 5);
        assert_eq!(Oxm::vlan_vid_none().value_u16(), OFPVID_NONE);
        let any_tagged = Oxm::vlan_vid_masked(OFPVID_PRESENT, OFPVID_PRESENT);
        assert!(any_tagged.validate().is_ok());
        assert!(!any_tagged.is_exact());
    }
}
