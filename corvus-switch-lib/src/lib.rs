#![forbid(unsafe_code)]

//! Core of a software OpenFlow 1.3 datapath: flow tables, three
//! classification strategies (hierarchical flowinfo, multi-branch tree,
//! tuple-hash table), a fingerprint flow cache and the updater that keeps
//! the acceleration indices fresh under rule churn.

pub mod bridge;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod datapath;
pub mod error;
pub mod events;
pub mod flow;
pub mod flowdb;
pub mod openflow;
pub mod packet;
pub mod show;
pub mod telemetry;
pub mod updater;

pub use bridge::{Bridge, BridgeRegistry};
pub use cache::{CacheKind, CacheStats, FlowCache};
pub use config::{load_from_path, Config};
pub use datapath::{PacketDisposition, Worker};
pub use error::{DpError, OfpError, OfpResult, Result};
pub use events::{DpEvent, FlowMod, FlowModCommand, PacketOut};
pub use flow::{Action, Flow, Instruction};
pub use flowdb::{ClassifierKind, FlowStatsRequest, SwitchMode};
pub use openflow::oxm::{Oxm, OxmField};
pub use packet::{classify_packet, ClassifyOptions, PacketMeta, ParsedPacket};
pub use updater::{spawn_updater, UpdaterCmd, UpdaterHandle};
