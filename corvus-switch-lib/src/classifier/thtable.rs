//! Tuple-hash table: exact-match classification for flows sharing one
//! mask tuple.
//!
//! Flows are grouped by the signature of their constrained byte positions
//! (field masks included); each group gets a hash keyed by the flow's
//! masked bytes.  Lookup derives the packet's key per tuple, probes every
//! tuple and keeps the maximum-priority hit.

use ahash::AHashMap;
use std::sync::Arc;

use crate::flow::{CompiledMatch, Flow};
use crate::packet::ParsedPacket;

#[derive(Debug)]
struct Tuple {
    /// Mask template shared by every flow in the tuple; supplies the
    /// packet-side key extraction.
    template: CompiledMatch,
    hash: AHashMap<Vec<u8>, Vec<Arc<Flow>>>,
}

#[derive(Debug, Default)]
pub struct Thtable {
    tuples: Vec<Tuple>,
    nflow: usize,
}

impl Thtable {
    pub fn build(flows: &[Arc<Flow>]) -> Thtable {
        let mut index: AHashMap<Vec<u8>, usize> = AHashMap::new();
        let mut tuples: Vec<Tuple> = Vec::new();
        for flow in flows {
            let sig = flow.compiled.mask_signature();
            let slot = *index.entry(sig).or_insert_with(|| {
                tuples.push(Tuple {
                    template: flow.compiled.clone(),
                    hash: AHashMap::new(),
                });
                tuples.len() - 1
            });
            tuples[slot]
                .hash
                .entry(flow.compiled.key_bytes())
                .or_default()
                .push(flow.clone());
        }
        for tuple in &mut tuples {
            for bucket in tuple.hash.values_mut() {
                // Stable: equal priorities keep insertion order.
                bucket.sort_by(|a, b| b.priority.cmp(&a.priority));
            }
        }
        Thtable { tuples, nflow: flows.len() }
    }

    pub fn len(&self) -> usize {
        self.nflow
    }

    pub fn is_empty(&self) -> bool {
        self.nflow == 0
    }

    pub fn tuple_count(&self) -> usize {
        self.tuples.len()
    }

    pub fn match_packet(&self, pkt: &ParsedPacket<'_>) -> Option<Arc<Flow>> {
        let mut best: Option<&Arc<Flow>> = None;
        for tuple in &self.tuples {
            let Some(key) = tuple.template.packet_key_bytes(pkt) else {
                continue;
            };
            let Some(bucket) = tuple.hash.get(&key) else {
                continue;
            };
            // Buckets are sorted; the head is the tuple's best.
            if let Some(hit) = bucket.first() {
                if best.is_none_or(|b| hit.priority > b.priority) {
                    best = Some(hit);
                }
            }
        }
        best.cloned()
    }
}
