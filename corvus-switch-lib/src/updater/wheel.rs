//! Hashed timing wheel for flow timeouts, bucketed by absolute expiration
//! second.
//!
//! Entries are weak references: deleting a flow cancels its timer in O(1)
//! by simply dropping the strong count.  A visited flow that has not
//! expired yet (idle clock refreshed by traffic) re-arms itself at its
//! next candidate second.

use ahash::AHashMap;
use std::sync::{Arc, Weak};
use std::time::Instant;

use crate::flow::Flow;

#[derive(Debug)]
pub struct TimerWheel {
    epoch: Instant,
    buckets: AHashMap<u64, Vec<Weak<Flow>>>,
    /// First second not yet visited.
    next_sec: u64,
}

impl TimerWheel {
    pub fn new() -> TimerWheel {
        TimerWheel { epoch: Instant::now(), buckets: AHashMap::new(), next_sec: 0 }
    }

    fn second_of(&self, at: Instant) -> u64 {
        at.saturating_duration_since(self.epoch).as_secs()
    }

    /// Register a flow with a non-zero timeout.  The deadline derives
    /// from the flow's creation time, so re-registration (a modify
    /// replaced the entry) does not stretch it.
    pub fn register(&mut self, flow: &Arc<Flow>) {
        if let Some(timeout) = flow.timeout_secs() {
            let due = self.second_of(flow.create_time) + timeout.max(1);
            self.schedule(Arc::downgrade(flow), due);
        }
    }

    fn schedule(&mut self, flow: Weak<Flow>, due_sec: u64) {
        self.buckets.entry(due_sec.max(self.next_sec)).or_default().push(flow);
    }

    pub fn pending(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Visit every bucket up to `now`; expired flows come back with their
    /// removal reason, live ones re-arm.
    pub fn tick(&mut self, now: Instant) -> Vec<(Arc<Flow>, u8)> {
        let now_sec = self.second_of(now);
        let mut expired = Vec::new();
        let mut rearm: Vec<(Weak<Flow>, u64)> = Vec::new();
        while self.next_sec <= now_sec {
            if let Some(bucket) = self.buckets.remove(&self.next_sec) {
                for weak in bucket {
                    let Some(flow) = weak.upgrade() else {
                        continue; // deleted; timer cancelled by the drop
                    };
                    match flow.expired_at(now) {
                        Some(reason) => expired.push((flow, reason)),
                        None => {
                            let again = now_sec + flow.timeout_secs().unwrap_or(1).max(1);
                            rearm.push((weak, again));
                        }
                    }
                }
            }
            self.next_sec += 1;
        }
        for (weak, due) in rearm {
            self.schedule(weak, due);
        }
        expired
    }
}
