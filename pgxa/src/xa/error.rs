//! Errors returned to the transaction manager.

use thiserror::Error;

use super::{flags::*, Status, Xid};

#[derive(Debug, Error)]
pub enum Error {
    #[error("branch \"{0}\" already exists")]
    DuplicateId(Xid),

    #[error("branch \"{0}\" does not exist")]
    NotFound(Xid),

    #[error("{verb} is not allowed for branch \"{xid}\" in \"{status}\" state")]
    Protocol {
        verb: &'static str,
        xid: Xid,
        status: Status,
    },

    #[error("{verb} is not allowed for branch \"{xid}\", it was never started")]
    NotStarted { verb: &'static str, xid: Xid },

    #[error("can't start branch \"{xid}\", connection is attached to branch \"{attached}\"")]
    Attached { xid: Xid, attached: Xid },

    #[error("branch \"{0}\" has no session")]
    NoSession(Xid),

    #[error("resource manager error: {0}")]
    ResourceManager(#[source] crate::backend::Error),

    #[error("resource manager failure: {0}")]
    ResourceManagerFailure(#[source] crate::backend::Error),

    #[error("invalid argument: {0}")]
    Invalid(String),
}

impl Error {
    /// X/Open error code.
    pub fn code(&self) -> i32 {
        match self {
            Self::DuplicateId(_) => XAER_DUPID,
            Self::NotFound(_) => XAER_NOTA,
            Self::Protocol { .. } | Self::NotStarted { .. } | Self::Attached { .. } => XAER_PROTO,
            Self::NoSession(_) | Self::ResourceManager(_) => XAER_RMERR,
            Self::ResourceManagerFailure(_) => XAER_RMFAIL,
            Self::Invalid(_) => XAER_INVAL,
        }
    }

    pub(super) fn protocol(verb: &'static str, xid: &Xid, status: Status) -> Self {
        Self::Protocol {
            verb,
            xid: xid.clone(),
            status,
        }
    }
}
