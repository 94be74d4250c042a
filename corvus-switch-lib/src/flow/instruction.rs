//! Instructions and the compiled instruction set.
//!
//! The set is a fixed-size indexed vector, one slot per instruction kind,
//! laid out in execution order so the action executor can walk it without
//! sorting.

use crate::error::{BadInstruction, OfpResult};
use crate::flow::action::{sort_action_set, Action};
use crate::openflow::consts::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    GotoTable(u8),
    WriteMetadata { metadata: u64, mask: u64 },
    WriteActions(Vec<Action>),
    ApplyActions(Vec<Action>),
    ClearActions,
    Meter(u32),
    Experimenter(u32),
}

/// Slot order is execution order: meter first, goto last.
const INSTRUCTION_INDEX_METER: usize = 0;
const INSTRUCTION_INDEX_APPLY_ACTIONS: usize = 1;
const INSTRUCTION_INDEX_CLEAR_ACTIONS: usize = 2;
const INSTRUCTION_INDEX_WRITE_ACTIONS: usize = 3;
const INSTRUCTION_INDEX_WRITE_METADATA: usize = 4;
const INSTRUCTION_INDEX_GOTO_TABLE: usize = 5;
pub const INSTRUCTION_INDEX_MAX: usize = 6;

impl Instruction {
    pub fn type_code(&self) -> u16 {
        match self {
            Instruction::GotoTable(_) => OFPIT_GOTO_TABLE,
            Instruction::WriteMetadata { .. } => OFPIT_WRITE_METADATA,
            Instruction::WriteActions(_) => OFPIT_WRITE_ACTIONS,
            Instruction::ApplyActions(_) => OFPIT_APPLY_ACTIONS,
            Instruction::ClearActions => OFPIT_CLEAR_ACTIONS,
            Instruction::Meter(_) => OFPIT_METER,
            Instruction::Experimenter(_) => OFPIT_EXPERIMENTER,
        }
    }

    fn index(&self) -> usize {
        match self {
            Instruction::Meter(_) => INSTRUCTION_INDEX_METER,
            Instruction::ApplyActions(_) => INSTRUCTION_INDEX_APPLY_ACTIONS,
            Instruction::ClearActions => INSTRUCTION_INDEX_CLEAR_ACTIONS,
            Instruction::WriteActions(_) => INSTRUCTION_INDEX_WRITE_ACTIONS,
            Instruction::WriteMetadata { .. } => INSTRUCTION_INDEX_WRITE_METADATA,
            Instruction::GotoTable(_) => INSTRUCTION_INDEX_GOTO_TABLE,
            // Rejected during compile; no slot.
            Instruction::Experimenter(_) => unreachable!("experimenter instruction has no slot"),
        }
    }

    pub fn actions(&self) -> Option<&[Action]> {
        match self {
            Instruction::ApplyActions(actions) | Instruction::WriteActions(actions) => {
                Some(actions)
            }
            _ => None,
        }
    }
}

/// The compiled per-flow instruction vector.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstructionSet {
    slots: [Option<Instruction>; INSTRUCTION_INDEX_MAX],
}

impl InstructionSet {
    /// Compile an instruction list: each kind at most once, goto strictly
    /// forward, write sets sorted by execution order.
    pub fn compile(list: Vec<Instruction>, table_id: u8) -> OfpResult<InstructionSet> {
        let mut set = InstructionSet::default();
        for inst in list {
            let inst = match inst {
                Instruction::GotoTable(next) => {
                    if next <= table_id || next > OFPTT_MAX {
                        return Err(BadInstruction::BadTableId.into());
                    }
                    Instruction::GotoTable(next)
                }
                Instruction::WriteActions(actions) => {
                    Instruction::WriteActions(sort_action_set(actions))
                }
                Instruction::Experimenter(_) => {
                    return Err(BadInstruction::BadExperimenter.into());
                }
                other => other,
            };
            let idx = inst.index();
            if set.slots[idx].is_some() {
                return Err(BadInstruction::DupInst.into());
            }
            set.slots[idx] = Some(inst);
        }
        Ok(set)
    }

    /// Slots in execution order, populated ones only.
    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.slots.iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn goto_table(&self) -> Option<u8> {
        match self.slots[INSTRUCTION_INDEX_GOTO_TABLE] {
            Some(Instruction::GotoTable(next)) => Some(next),
            _ => None,
        }
    }

    pub fn write_metadata(&self) -> Option<(u64, u64)> {
        match self.slots[INSTRUCTION_INDEX_WRITE_METADATA] {
            Some(Instruction::WriteMetadata { metadata, mask }) => Some((metadata, mask)),
            _ => None,
        }
    }

    pub fn apply_actions(&self) -> Option<&[Action]> {
        self.slots[INSTRUCTION_INDEX_APPLY_ACTIONS].as_ref().and_then(Instruction::actions)
    }

    pub fn write_actions(&self) -> Option<&[Action]> {
        self.slots[INSTRUCTION_INDEX_WRITE_ACTIONS].as_ref().and_then(Instruction::actions)
    }

    /// All actions anywhere in the set, for the out_port/out_group
    /// selectors and the group-reference check.
    pub fn all_actions(&self) -> impl Iterator<Item = &Action> {
        self.iter().filter_map(Instruction::actions).flatten()
    }

    /// Validate every embedded action.
    pub fn validate_actions(&self, group_exists: &dyn Fn(u32) -> bool) -> OfpResult<()> {
        for action in self.all_actions() {
            action.validate(group_exists)?;
        }
        Ok(())
    }
}
