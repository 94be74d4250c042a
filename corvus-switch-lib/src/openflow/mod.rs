//! OpenFlow 1.3 wire-level model: the constant space shared with the
//! controller and the OXM match TLV encoding.

pub mod consts;
pub mod oxm;
pub mod prereq;

pub use consts::*;
pub use oxm::{Oxm, OxmField};
