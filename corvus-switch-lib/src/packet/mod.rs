//! Parsed-packet representation used by the classifiers.
//!
//! A [`ParsedPacket`] borrows the raw frame and carries a table of base
//! offsets (one per protocol layer) plus two synthetic out-of-band regions
//! serialised in network byte order.  Every match predicate in the engine
//! reads packet bytes through [`ParsedPacket::bytes`], so the compiled
//! flow matches and the classifiers agree on a single layout.

mod parser;
#[cfg(test)]
pub(crate) mod testpkt;

pub use parser::{classify_packet, ClassifyOptions, PacketMeta};

use ahash::RandomState;
use std::hash::{BuildHasher, Hasher};

/// Ethertypes the classifier cares about.
pub mod ethertype {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const VLAN: u16 = 0x8100;
    pub const SVLAN: u16 = 0x88a8;
    pub const IPV6: u16 = 0x86dd;
    pub const MPLS: u16 = 0x8847;
    pub const MPLS_MCAST: u16 = 0x8848;
    pub const PBB: u16 = 0x88e7;
}

/// Base regions a match term can address.  `Oob` and `Oob2` are synthetic
/// per-packet regions; the rest are offsets into the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Base {
    Oob = 0,
    Eth,
    Pbb,
    Mpls,
    L3,
    IpProto,
    L4,
    L4Payload,
    Oob2,
    V6Src,
    V6Dst,
    NdSll,
    NdTll,
}

pub const BASE_COUNT: usize = 13;

/// Serialised layout of the first out-of-band region.
pub const OOB_METADATA: usize = 0; // 8 bytes
pub const OOB_IN_PORT: usize = 8; // 4 bytes
pub const OOB_IN_PHY_PORT: usize = 12; // 4 bytes
pub const OOB_ETH_TYPE: usize = 16; // 2 bytes
pub const OOB_VLAN_TCI: usize = 18; // 2 bytes
pub const OOB_SIZE: usize = 20;

/// Serialised layout of the second out-of-band region.
pub const OOB2_TUNNEL_ID: usize = 0; // 8 bytes
pub const OOB2_IPV6_EXTHDR: usize = 8; // 2 bytes
pub const OOB2_SIZE: usize = 10;

/// Out-of-band data: fields the classifier matches that are not literal
/// frame bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OobData {
    pub metadata: u64,
    pub in_port: u32,
    pub in_phy_port: u32,
    /// Ethertype after tag stripping: the first type that is not a VLAN
    /// tag (so MPLS frames carry 0x8847/0x8848 here, PBB frames 0x88e7).
    pub ether_type: u16,
    /// VLAN TCI with bit 12 forced on for tagged frames, so a match under
    /// mask 0x1fff follows the `OFPVID_PRESENT` convention.
    pub vlan_tci: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Oob2Data {
    pub tunnel_id: u64,
    /// `OFPIEH_*` bitset produced by the IPv6 extension-header walk.
    pub ipv6_exthdr: u16,
}

/// Fixed seeds: the fingerprint must be stable across calls so cache
/// probes for identical bytes hit the same slot.
const FINGERPRINT_SEEDS: (u64, u64, u64, u64) =
    (0x243f_6a88_85a3_08d3, 0x1319_8a2e_0370_7344, 0xa409_3822_299f_31d0, 0x082e_fa98_ec4e_6c89);

/// A classified packet: raw frame plus base offsets and OOB regions.
#[derive(Debug, Clone)]
pub struct ParsedPacket<'a> {
    data: &'a [u8],
    pub oob: OobData,
    pub oob2: Oob2Data,
    oob_bytes: [u8; OOB_SIZE],
    oob2_bytes: [u8; OOB2_SIZE],
    bases: [Option<usize>; BASE_COUNT],
    hash64: u64,
}

impl<'a> ParsedPacket<'a> {
    pub(crate) fn new(data: &'a [u8], oob: OobData, oob2: Oob2Data) -> Self {
        let mut pkt = ParsedPacket {
            data,
            oob,
            oob2,
            oob_bytes: [0; OOB_SIZE],
            oob2_bytes: [0; OOB2_SIZE],
            bases: [None; BASE_COUNT],
            hash64: 0,
        };
        pkt.serialize_oob();
        pkt
    }

    pub(crate) fn serialize_oob(&mut self) {
        self.oob_bytes[OOB_METADATA..OOB_METADATA + 8]
            .copy_from_slice(&self.oob.metadata.to_be_bytes());
        self.oob_bytes[OOB_IN_PORT..OOB_IN_PORT + 4]
            .copy_from_slice(&self.oob.in_port.to_be_bytes());
        self.oob_bytes[OOB_IN_PHY_PORT..OOB_IN_PHY_PORT + 4]
            .copy_from_slice(&self.oob.in_phy_port.to_be_bytes());
        self.oob_bytes[OOB_ETH_TYPE..OOB_ETH_TYPE + 2]
            .copy_from_slice(&self.oob.ether_type.to_be_bytes());
        self.oob_bytes[OOB_VLAN_TCI..OOB_VLAN_TCI + 2]
            .copy_from_slice(&self.oob.vlan_tci.to_be_bytes());
        self.oob2_bytes[OOB2_TUNNEL_ID..OOB2_TUNNEL_ID + 8]
            .copy_from_slice(&self.oob2.tunnel_id.to_be_bytes());
        self.oob2_bytes[OOB2_IPV6_EXTHDR..OOB2_IPV6_EXTHDR + 2]
            .copy_from_slice(&self.oob2.ipv6_exthdr.to_be_bytes());
    }

    pub(crate) fn set_base(&mut self, base: Base, offset: usize) {
        self.bases[base as usize] = Some(offset);
    }

    pub fn base(&self, base: Base) -> Option<usize> {
        match base {
            Base::Oob | Base::Oob2 => Some(0),
            _ => self.bases[base as usize],
        }
    }

    pub fn has_base(&self, base: Base) -> bool {
        self.base(base).is_some()
    }

    /// Packet bytes at `base + off .. base + off + len`, or `None` when the
    /// layer is absent or the frame is too short.
    pub fn bytes(&self, base: Base, off: usize, len: usize) -> Option<&[u8]> {
        match base {
            Base::Oob => self.oob_bytes.get(off..off + len),
            Base::Oob2 => self.oob2_bytes.get(off..off + len),
            _ => {
                let start = self.bases[base as usize]? + off;
                self.data.get(start..start + len)
            }
        }
    }

    /// Big-endian load of up to eight bytes at a base offset.
    pub fn load_u64(&self, base: Base, off: usize, len: usize) -> Option<u64> {
        let bytes = self.bytes(base, off, len)?;
        Some(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// WRITE_METADATA between tables: the serialised OOB region must stay
    /// in sync because later tables match on it.
    pub fn write_metadata(&mut self, metadata: u64, mask: u64) {
        self.oob.metadata = (self.oob.metadata & !mask) | (metadata & mask);
        self.oob_bytes[OOB_METADATA..OOB_METADATA + 8]
            .copy_from_slice(&self.oob.metadata.to_be_bytes());
    }

    /// Stable 64-bit fingerprint over every byte the classifier may
    /// examine.  Computed once at parse time, before any metadata write.
    pub fn fingerprint(&self) -> u64 {
        self.hash64
    }

    pub(crate) fn compute_fingerprint(&mut self) {
        let end = self.bases[Base::L4Payload as usize].unwrap_or(self.data.len());
        let state = RandomState::with_seeds(
            FINGERPRINT_SEEDS.0,
            FINGERPRINT_SEEDS.1,
            FINGERPRINT_SEEDS.2,
            FINGERPRINT_SEEDS.3,
        );
        let mut hasher = state.build_hasher();
        hasher.write(&self.oob_bytes);
        hasher.write(&self.oob2_bytes);
        hasher.write(&self.data[..end.min(self.data.len())]);
        self.hash64 = hasher.finish();
    }
}
