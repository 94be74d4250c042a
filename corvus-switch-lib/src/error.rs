use thiserror::Error;

/// `OFPET_FLOW_MOD_FAILED` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlowModFailed {
    #[error("unknown")]
    Unknown,
    #[error("table full")]
    TableFull,
    #[error("bad table id")]
    BadTableId,
    #[error("overlapping entry")]
    Overlap,
    #[error("permission denied")]
    Eperm,
    #[error("bad timeout")]
    BadTimeout,
    #[error("bad command")]
    BadCommand,
    #[error("bad flags")]
    BadFlags,
}

/// `OFPET_BAD_MATCH` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BadMatch {
    #[error("bad match type")]
    BadType,
    #[error("bad match length")]
    BadLen,
    #[error("bad tag")]
    BadTag,
    #[error("bad datalink address mask")]
    BadDlAddrMask,
    #[error("bad network address mask")]
    BadNwAddrMask,
    #[error("bad wildcards")]
    BadWildcards,
    #[error("bad field")]
    BadField,
    #[error("bad value")]
    BadValue,
    #[error("bad mask")]
    BadMask,
    #[error("prerequisite not satisfied")]
    BadPrereq,
    #[error("duplicate field")]
    DupField,
    #[error("permission denied")]
    Eperm,
}

/// `OFPET_BAD_INSTRUCTION` codes.  `DupInst` is the non-standard code the
/// original datapath reports for a repeated instruction kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BadInstruction {
    #[error("unknown instruction")]
    UnknownInst,
    #[error("unsupported instruction")]
    UnsupInst,
    #[error("bad table id")]
    BadTableId,
    #[error("unsupported metadata")]
    UnsupMetadata,
    #[error("unsupported metadata mask")]
    UnsupMetadataMask,
    #[error("bad experimenter")]
    BadExperimenter,
    #[error("bad experimenter type")]
    BadExpType,
    #[error("bad length")]
    BadLen,
    #[error("permission denied")]
    Eperm,
    #[error("duplicate instruction")]
    DupInst,
}

/// `OFPET_BAD_ACTION` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BadAction {
    #[error("bad action type")]
    BadType,
    #[error("bad action length")]
    BadLen,
    #[error("bad experimenter")]
    BadExperimenter,
    #[error("bad experimenter type")]
    BadExpType,
    #[error("bad output port")]
    BadOutPort,
    #[error("bad argument")]
    BadArgument,
    #[error("permission denied")]
    Eperm,
    #[error("too many actions")]
    TooMany,
    #[error("bad queue")]
    BadQueue,
    #[error("bad output group")]
    BadOutGroup,
    #[error("match inconsistent")]
    MatchInconsistent,
    #[error("unsupported order")]
    UnsupportedOrder,
    #[error("bad tag")]
    BadTag,
    #[error("bad set-field type")]
    BadSetType,
    #[error("bad set-field length")]
    BadSetLen,
    #[error("bad set-field argument")]
    BadSetArgument,
}

/// OpenFlow error reported back to the agent.  Carries exactly the
/// (error type, error code) pairs of the ofp_error_msg and converts to the
/// wire numbers with [`OfpError::type_and_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OfpError {
    #[error("flow mod failed: {0}")]
    FlowModFailed(FlowModFailed),
    #[error("bad match: {0}")]
    BadMatch(BadMatch),
    #[error("bad instruction: {0}")]
    BadInstruction(BadInstruction),
    #[error("bad action: {0}")]
    BadAction(BadAction),
}

impl OfpError {
    /// The `(ofp_error_msg.type, ofp_error_msg.code)` wire pair.
    pub fn type_and_code(&self) -> (u16, u16) {
        match *self {
            OfpError::BadAction(code) => (2, code as u16),
            OfpError::BadInstruction(code) => (3, code as u16),
            OfpError::BadMatch(code) => (4, code as u16),
            OfpError::FlowModFailed(code) => (5, code as u16),
        }
    }
}

impl From<FlowModFailed> for OfpError {
    fn from(code: FlowModFailed) -> Self {
        OfpError::FlowModFailed(code)
    }
}

impl From<BadMatch> for OfpError {
    fn from(code: BadMatch) -> Self {
        OfpError::BadMatch(code)
    }
}

impl From<BadInstruction> for OfpError {
    fn from(code: BadInstruction) -> Self {
        OfpError::BadInstruction(code)
    }
}

impl From<BadAction> for OfpError {
    fn from(code: BadAction) -> Self {
        OfpError::BadAction(code)
    }
}

/// Errors that can occur in the datapath outside the OpenFlow protocol.
#[derive(Error, Debug)]
pub enum DpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OpenFlow error: {0}")]
    Ofp(#[from] OfpError),

    #[error("Bridge not found: dpid {0:#x}")]
    BridgeNotFound(u64),

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, DpError>;

/// Result alias for operations whose failures are reported to the
/// controller as OpenFlow errors.
pub type OfpResult<T> = std::result::Result<T, OfpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_pairs_match_openflow_1_3() {
        assert_eq!(OfpError::from(BadAction::BadSetArgument).type_and_code(), (2, 15));
        assert_eq!(OfpError::from(BadInstruction::UnknownInst).type_and_code(), (3, 0));
        assert_eq!(OfpError::from(BadMatch::BadPrereq).type_and_code(), (4, 9));
        assert_eq!(OfpError::from(BadMatch::DupField).type_and_code(), (4, 10));
        assert_eq!(OfpError::from(FlowModFailed::Overlap).type_and_code(), (5, 3));
    }
}
