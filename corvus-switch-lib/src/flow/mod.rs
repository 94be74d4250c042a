//! Flow entries: match list, compiled match, instruction set, counters.

pub mod action;
pub mod byteoff;
pub mod instruction;

pub use action::Action;
pub use byteoff::CompiledMatch;
pub use instruction::{Instruction, InstructionSet};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::openflow::consts::{OFPG_ANY, OFPP_ANY};
use crate::openflow::oxm::Oxm;
use crate::packet::ParsedPacket;

/// One flow entry.  Owned by its table's flow list and shared as
/// `Arc<Flow>` with the acceleration indices and in-flight readers; a
/// reader that began before a delete finishes on its own clone.
#[derive(Debug)]
pub struct Flow {
    pub priority: i32,
    pub cookie: u64,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    /// `OFPFF_*` flags from the flow mod.
    pub flags: u16,
    pub table_id: u8,
    pub matches: Vec<Oxm>,
    pub compiled: CompiledMatch,
    /// Presence bitset over the OXM field ids, for quick index decisions.
    pub field_bits: u64,
    pub instructions: InstructionSet,
    pub create_time: Instant,
    packet_count: AtomicU64,
    byte_count: AtomicU64,
    /// Milliseconds since `create_time` of the last matched packet,
    /// written from workers with relaxed ordering.
    last_used_ms: AtomicU64,
}

impl Flow {
    /// Build a flow from already-validated parts.
    pub fn new(
        priority: i32,
        cookie: u64,
        idle_timeout: u16,
        hard_timeout: u16,
        flags: u16,
        table_id: u8,
        matches: Vec<Oxm>,
        instructions: InstructionSet,
    ) -> Arc<Flow> {
        let compiled = CompiledMatch::compile(&matches);
        let field_bits = matches.iter().fold(0u64, |bits, m| bits | m.field.bit());
        Arc::new(Flow {
            priority,
            cookie,
            idle_timeout,
            hard_timeout,
            flags,
            table_id,
            matches,
            compiled,
            field_bits,
            instructions,
            create_time: Instant::now(),
            packet_count: AtomicU64::new(0),
            byte_count: AtomicU64::new(0),
            last_used_ms: AtomicU64::new(0),
        })
    }

    /// A copy of this flow with a new instruction set: the modify path.
    /// Match list, timeouts, counters and creation time carry over.
    pub fn with_instructions(&self, instructions: InstructionSet) -> Arc<Flow> {
        Arc::new(Flow {
            priority: self.priority,
            cookie: self.cookie,
            idle_timeout: self.idle_timeout,
            hard_timeout: self.hard_timeout,
            flags: self.flags,
            table_id: self.table_id,
            matches: self.matches.clone(),
            compiled: self.compiled.clone(),
            field_bits: self.field_bits,
            instructions,
            create_time: self.create_time,
            packet_count: AtomicU64::new(self.packet_count()),
            byte_count: AtomicU64::new(self.byte_count()),
            last_used_ms: AtomicU64::new(self.last_used_ms.load(Ordering::Relaxed)),
        })
    }

    /// Carry counters over from a replaced twin (ADD without
    /// `RESET_COUNTS`).
    pub fn inherit_counts(&self, old: &Flow) {
        self.packet_count.store(old.packet_count(), Ordering::Relaxed);
        self.byte_count.store(old.byte_count(), Ordering::Relaxed);
    }

    pub fn matches_packet(&self, pkt: &ParsedPacket<'_>) -> bool {
        self.compiled.matches_packet(pkt)
    }

    /// Credit one matched packet.  Relaxed: stats readers tolerate
    /// staleness up to one observation.
    pub fn account(&self, bytes: usize) {
        self.packet_count.fetch_add(1, Ordering::Relaxed);
        self.byte_count.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn packet_count(&self) -> u64 {
        self.packet_count.load(Ordering::Relaxed)
    }

    pub fn byte_count(&self) -> u64 {
        self.byte_count.load(Ordering::Relaxed)
    }

    pub fn reset_counts(&self) {
        self.packet_count.store(0, Ordering::Relaxed);
        self.byte_count.store(0, Ordering::Relaxed);
    }

    /// Refresh the idle-timeout clock.
    pub fn touch(&self) {
        let ms = self.create_time.elapsed().as_millis() as u64;
        self.last_used_ms.store(ms, Ordering::Relaxed);
    }

    /// Whether a timeout has fired at `now`; returns the removal reason.
    pub fn expired_at(&self, now: Instant) -> Option<u8> {
        let age = now.saturating_duration_since(self.create_time);
        if self.hard_timeout != 0 && age.as_secs() >= u64::from(self.hard_timeout) {
            return Some(crate::openflow::consts::OFPRR_HARD_TIMEOUT);
        }
        if self.idle_timeout != 0 {
            let idle_ms =
                (age.as_millis() as u64).saturating_sub(self.last_used_ms.load(Ordering::Relaxed));
            if idle_ms / 1000 >= u64::from(self.idle_timeout) {
                return Some(crate::openflow::consts::OFPRR_IDLE_TIMEOUT);
            }
        }
        None
    }

    /// Earliest second (from `create_time`) at which a timeout can fire;
    /// `None` for permanent flows.
    pub fn timeout_secs(&self) -> Option<u64> {
        match (self.idle_timeout, self.hard_timeout) {
            (0, 0) => None,
            (0, hard) => Some(u64::from(hard)),
            (idle, 0) => Some(u64::from(idle)),
            (idle, hard) => Some(u64::from(idle.min(hard))),
        }
    }

    pub fn duration(&self) -> std::time::Duration {
        self.create_time.elapsed()
    }

    /// Strict twin test: same priority and same match set.
    pub fn strict_twin(&self, priority: i32, compiled: &CompiledMatch) -> bool {
        self.priority == priority && self.compiled.same_match(compiled)
    }

    /// The out_port / out_group filter used by delete and stats selectors.
    pub fn references(&self, out_port: u32, out_group: u32) -> bool {
        let port_ok = out_port == OFPP_ANY
            || self.instructions.all_actions().any(|a| a.output_port() == Some(out_port));
        let group_ok = out_group == OFPG_ANY
            || self.instructions.all_actions().any(|a| a.group_id() == Some(out_group));
        port_ok && group_ok
    }

    /// Cookie filter: a non-zero mask restricts to flows whose cookie
    /// matches under the mask.
    pub fn cookie_matches(&self, cookie: u64, cookie_mask: u64) -> bool {
        cookie_mask == 0 || (self.cookie & cookie_mask) == (cookie & cookie_mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openflow::consts::OFPRR_HARD_TIMEOUT;

    fn flow(priority: i32, matches: Vec<Oxm>) -> Arc<Flow> {
        Flow::new(priority, 0, 0, 0, 0, 0, matches, InstructionSet::default())
    }

    #[test]
    fn cookie_mask_semantics() {
        let f = Flow::new(1, 0xabcd, 0, 0, 0, 0, vec![], InstructionSet::default());
        assert!(f.cookie_matches(0, 0));
        assert!(f.cookie_matches(0xab00, 0xff00));
        assert!(!f.cookie_matches(0xcd00, 0xff00));
    }

    #[test]
    fn strict_twin_requires_priority_and_match() {
        let a = flow(5, vec![Oxm::in_port(1)]);
        let twin = CompiledMatch::compile(&[Oxm::in_port(1)]);
        let other = CompiledMatch::compile(&[Oxm::in_port(2)]);
        assert!(a.strict_twin(5, &twin));
        assert!(!a.strict_twin(4, &twin));
        assert!(!a.strict_twin(5, &other));
    }

    #[test]
    fn hard_timeout_expiry() {
        let f = Flow::new(1, 0, 0, 1, 0, 0, vec![], InstructionSet::default());
        assert_eq!(f.expired_at(Instant::now()), None);
        let later = Instant::now() + std::time::Duration::from_secs(2);
        assert_eq!(f.expired_at(later), Some(OFPRR_HARD_TIMEOUT));
    }

    #[test]
    fn out_port_filter() {
        let set = InstructionSet::compile(
            vec![Instruction::ApplyActions(vec![Action::Output { port: 3, max_len: 0 }])],
            0,
        )
        .unwrap();
        let f = Flow::new(1, 0, 0, 0, 0, 0, vec![], set);
        assert!(f.references(3, OFPG_ANY));
        assert!(!f.references(4, OFPG_ANY));
        assert!(f.references(OFPP_ANY, OFPG_ANY));
    }
}
