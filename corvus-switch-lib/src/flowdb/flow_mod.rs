//! Flow add / modify / delete.
//!
//! All validation runs before any side effect: a rejected flow mod leaves
//! the table exactly as it was.

use std::sync::Arc;
use tracing::debug;

use super::{Flowdb, FLOWDB_TABLE_SIZE_MAX};
use crate::error::{FlowModFailed, OfpError, OfpResult};
use crate::events::{DpEvent, FlowMod, FlowModCommand};
use crate::flow::{CompiledMatch, Flow, InstructionSet};
use crate::openflow::consts::{OFPFF_CHECK_OVERLAP, OFPFF_RESET_COUNTS, OFPFF_SEND_FLOW_REM, OFPRR_DELETE, OFPTT_ALL};
use crate::openflow::prereq::check_match_list;

/// What a successful flow mod did, for the caller to act on (schedule
/// index rebuilds, invalidate caches, arm flow timers).
#[derive(Debug, Default)]
pub struct FlowModEffect {
    /// Tables whose rule set changed.
    pub changed_tables: Vec<u8>,
    /// Entries that need (re-)registration in the timer wheel: inserted
    /// flows, and modify replacements whose old handle just went away.
    pub timed: Vec<Arc<Flow>>,
}

impl FlowModEffect {
    pub fn changed(&self) -> bool {
        !self.changed_tables.is_empty()
    }
}

impl Flowdb {
    /// Dispatch one flow mod.  Events (FLOW_REMOVED) are appended to
    /// `events` for the caller to deliver after the write lock drops.
    pub fn apply(&mut self, fm: &FlowMod, events: &mut Vec<DpEvent>) -> OfpResult<FlowModEffect> {
        match fm.command {
            FlowModCommand::Add => self.flow_add(fm),
            FlowModCommand::Modify => self.flow_modify(fm, false),
            FlowModCommand::ModifyStrict => self.flow_modify(fm, true),
            FlowModCommand::Delete => self.flow_delete(fm, false, events),
            FlowModCommand::DeleteStrict => self.flow_delete(fm, true, events),
        }
    }

    fn flow_add(&mut self, fm: &FlowMod) -> OfpResult<FlowModEffect> {
        if usize::from(fm.table_id) >= FLOWDB_TABLE_SIZE_MAX {
            return Err(FlowModFailed::BadTableId.into());
        }
        check_match_list(&fm.matches)?;
        let instructions = InstructionSet::compile(fm.instructions.clone(), fm.table_id)?;
        instructions.validate_actions(&|g| self.hooks.group_exists(g))?;
        let compiled = CompiledMatch::compile(&fm.matches);

        let table = match self.table_mut(fm.table_id) {
            Some(t) => t,
            None => return Err(FlowModFailed::BadTableId.into()),
        };

        if fm.flags & OFPFF_CHECK_OVERLAP != 0 {
            let overlapping = table
                .flow_list
                .iter()
                .any(|f| f.priority == fm.priority && f.compiled.overlaps(&compiled));
            if overlapping {
                return Err(OfpError::FlowModFailed(FlowModFailed::Overlap));
            }
        }

        let flow = Flow::new(
            fm.priority,
            fm.cookie,
            fm.idle_timeout,
            fm.hard_timeout,
            fm.flags,
            fm.table_id,
            fm.matches.clone(),
            instructions,
        );

        if let Some(twin) = table.flow_list.find_strict(fm.priority, &compiled) {
            // Replace in place; counters carry over unless RESET_COUNTS.
            if fm.flags & OFPFF_RESET_COUNTS == 0 {
                flow.inherit_counts(&twin);
            }
            table.flow_list.replace(&twin, flow.clone());
            debug!(table_id = fm.table_id, priority = fm.priority, "flow replaced");
        } else {
            if table.is_full() {
                return Err(FlowModFailed::TableFull.into());
            }
            table.flow_list.insert(flow.clone());
            debug!(
                table_id = fm.table_id,
                priority = fm.priority,
                nflow = table.flow_list.len(),
                "flow added"
            );
        }
        Ok(FlowModEffect { changed_tables: vec![fm.table_id], timed: vec![flow] })
    }

    fn flow_modify(&mut self, fm: &FlowMod, strict: bool) -> OfpResult<FlowModEffect> {
        if usize::from(fm.table_id) >= FLOWDB_TABLE_SIZE_MAX {
            return Err(FlowModFailed::BadTableId.into());
        }
        check_match_list(&fm.matches)?;
        let instructions = InstructionSet::compile(fm.instructions.clone(), fm.table_id)?;
        instructions.validate_actions(&|g| self.hooks.group_exists(g))?;
        let compiled = CompiledMatch::compile(&fm.matches);

        let reset_counts = fm.flags & OFPFF_RESET_COUNTS != 0;
        let table = match self.table_mut(fm.table_id) {
            Some(t) => t,
            None => return Err(FlowModFailed::BadTableId.into()),
        };

        let targets: Vec<Arc<Flow>> = table
            .flow_list
            .iter()
            .filter(|f| {
                if strict {
                    f.strict_twin(fm.priority, &compiled)
                } else {
                    compiled.subsumes(&f.compiled)
                }
            })
            .filter(|f| f.cookie_matches(fm.cookie, fm.cookie_mask))
            .cloned()
            .collect();

        if targets.is_empty() {
            // A modify that selects nothing succeeds without effect.
            return Ok(FlowModEffect::default());
        }
        let mut timed = Vec::new();
        for old in &targets {
            let new = old.with_instructions(instructions.clone());
            if reset_counts {
                new.reset_counts();
            }
            table.flow_list.replace(old, new.clone());
            if new.timeout_secs().is_some() {
                timed.push(new);
            }
        }
        debug!(table_id = fm.table_id, modified = targets.len(), strict, "flows modified");
        Ok(FlowModEffect { changed_tables: vec![fm.table_id], timed })
    }

    fn flow_delete(
        &mut self,
        fm: &FlowMod,
        strict: bool,
        events: &mut Vec<DpEvent>,
    ) -> OfpResult<FlowModEffect> {
        if fm.table_id != OFPTT_ALL && usize::from(fm.table_id) >= FLOWDB_TABLE_SIZE_MAX {
            return Err(FlowModFailed::BadTableId.into());
        }
        check_match_list(&fm.matches)?;
        let compiled = CompiledMatch::compile(&fm.matches);

        let mut effect = FlowModEffect::default();
        let table_ids: Vec<u8> = if fm.table_id == OFPTT_ALL {
            (0..FLOWDB_TABLE_SIZE_MAX as u8).collect()
        } else {
            vec![fm.table_id]
        };
        for table_id in table_ids {
            let table = match self.table_mut(table_id) {
                Some(t) => t,
                None => continue,
            };
            let victims: Vec<Arc<Flow>> = table
                .flow_list
                .iter()
                .filter(|f| {
                    if strict {
                        f.strict_twin(fm.priority, &compiled)
                    } else {
                        compiled.subsumes(&f.compiled)
                    }
                })
                .filter(|f| f.cookie_matches(fm.cookie, fm.cookie_mask))
                .filter(|f| f.references(fm.out_port, fm.out_group))
                .cloned()
                .collect();
            if victims.is_empty() {
                continue;
            }
            for flow in &victims {
                table.flow_list.remove(flow);
                if flow.flags & OFPFF_SEND_FLOW_REM != 0 {
                    events.push(removal_event(flow, OFPRR_DELETE));
                }
            }
            debug!(table_id, deleted = victims.len(), strict, "flows deleted");
            effect.changed_tables.push(table_id);
        }
        Ok(effect)
    }
}

/// Shape a FLOW_REMOVED event for a flow leaving the table.
pub(crate) fn removal_event(flow: &Flow, reason: u8) -> DpEvent {
    let duration = flow.duration();
    DpEvent::FlowRemoved {
        table_id: flow.table_id,
        reason,
        priority: flow.priority,
        cookie: flow.cookie,
        duration_sec: duration.as_secs(),
        duration_nsec: duration.subsec_nanos(),
        idle_timeout: flow.idle_timeout,
        hard_timeout: flow.hard_timeout,
        packet_count: flow.packet_count(),
        byte_count: flow.byte_count(),
        matches: flow.matches.clone(),
    }
}
