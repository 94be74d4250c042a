//! The flow database: a fixed vector of tables behind one writer /
//! many-reader discipline, plus the flow-mod operations and stats.

mod flow_mod;
pub mod stats;
mod table;

pub use flow_mod::FlowModEffect;
pub(crate) use flow_mod::removal_event;
pub use stats::{AggregateStats, FlowStatsEntry, FlowStatsRequest, TableStatsEntry};
pub use table::{ClassifierKind, FlowList, Table, TableFeatures};

use std::fmt;

/// Table ids run 0..=253.
pub const FLOWDB_TABLE_SIZE_MAX: usize = 254;

/// What happens to a packet no flow matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchMode {
    /// Raise a PACKET_IN toward the controller.
    #[default]
    Openflow,
    /// Drop.
    Secure,
    /// Forward as a learning switch would (modelled as a NORMAL output).
    Standalone,
}

/// Hook registry injected at construction; the only mandatory hook is the
/// group-existence probe used to validate GROUP actions against the
/// (external) group table.
pub struct DpHooks {
    group_exists: Box<dyn Fn(u32) -> bool + Send + Sync>,
}

impl Default for DpHooks {
    /// Without a registered group table every reference validates; the
    /// original datapath behaves the same when its hook is unset.
    fn default() -> Self {
        DpHooks { group_exists: Box::new(|_| true) }
    }
}

impl fmt::Debug for DpHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DpHooks").finish_non_exhaustive()
    }
}

impl DpHooks {
    pub fn with_group_check(check: impl Fn(u32) -> bool + Send + Sync + 'static) -> Self {
        DpHooks { group_exists: Box::new(check) }
    }

    pub fn group_exists(&self, group: u32) -> bool {
        (self.group_exists)(group)
    }
}

/// The database proper.  Mutation goes through [`Flowdb::apply`]; the
/// bridge wraps the whole structure in a `RwLock`, holding the write side
/// only across one flow mod.
#[derive(Debug)]
pub struct Flowdb {
    tables: Vec<Table>,
    mode: SwitchMode,
    hooks: DpHooks,
}

impl Flowdb {
    pub fn new(hooks: DpHooks) -> Flowdb {
        let tables = (0..FLOWDB_TABLE_SIZE_MAX as u8).map(Table::new).collect();
        Flowdb { tables, mode: SwitchMode::default(), hooks }
    }

    pub fn switch_mode(&self) -> SwitchMode {
        self.mode
    }

    pub fn set_switch_mode(&mut self, mode: SwitchMode) {
        self.mode = mode;
    }

    pub fn table(&self, table_id: u8) -> Option<&Table> {
        self.tables.get(usize::from(table_id))
    }

    pub(crate) fn table_mut(&mut self, table_id: u8) -> Option<&mut Table> {
        self.tables.get_mut(usize::from(table_id))
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    /// Total flow count across tables.
    pub fn flow_count(&self) -> usize {
        self.tables.iter().map(|t| t.flow_list.len()).sum()
    }

    pub fn hooks(&self) -> &DpHooks {
        &self.hooks
    }
}
