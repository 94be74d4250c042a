//! Sequential leaf: a priority-ordered array walked with the full match
//! predicate.

use std::sync::Arc;

use crate::flow::Flow;
use crate::packet::ParsedPacket;

#[derive(Debug, Default)]
pub struct FlowinfoBasic {
    /// Descending priority; equal priorities keep insertion order, which
    /// makes tie-breaking stable across calls on the same revision.
    flows: Vec<Arc<Flow>>,
}

impl FlowinfoBasic {
    pub fn new() -> Self {
        FlowinfoBasic::default()
    }

    pub fn add(&mut self, flow: Arc<Flow>) {
        let pos = self
            .flows
            .iter()
            .position(|f| f.priority < flow.priority)
            .unwrap_or(self.flows.len());
        self.flows.insert(pos, flow);
    }

    pub fn del(&mut self, flow: &Flow) -> bool {
        match self.flows.iter().position(|f| std::ptr::eq(f.as_ref(), flow)) {
            Some(pos) => {
                self.flows.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn find(&self, flow: &Flow) -> Option<Arc<Flow>> {
        self.flows
            .iter()
            .find(|f| f.strict_twin(flow.priority, &flow.compiled))
            .cloned()
    }

    pub fn match_packet(
        &self,
        pkt: &ParsedPacket<'_>,
        best_prio: &mut i32,
    ) -> Option<Arc<Flow>> {
        for flow in &self.flows {
            if flow.priority <= *best_prio {
                // Sorted descending; nothing below can improve the bound.
                return None;
            }
            if flow.matches_packet(pkt) {
                *best_prio = flow.priority;
                return Some(flow.clone());
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Flow>> {
        self.flows.iter()
    }
}
