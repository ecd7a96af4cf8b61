//! Transaction branch.

use std::fmt::Display;

use parking_lot::{Mutex, MutexGuard};

use super::Xid;
use crate::backend::Session;
use crate::frontend::ManagedConnection;

/// Branch status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// Ended, not yet prepared.
    #[default]
    None,
    /// Associated with a connection.
    Started,
    /// Temporarily dissociated from its connection.
    Suspended,
    /// Phase one succeeded.
    Prepared,
    /// Found prepared on the server during recovery.
    Recovered,
    /// Committed or rolled back, about to leave the registry.
    Completed,
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Started => write!(f, "started"),
            Self::Suspended => write!(f, "suspended"),
            Self::Prepared => write!(f, "prepared"),
            Self::Recovered => write!(f, "recovered"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Mutable part of a branch, guarded by the branch lock.
#[derive(Default)]
pub(crate) struct BranchState {
    pub(crate) status: Status,
    /// Session doing the branch's work while no connection holds it.
    pub(crate) session: Option<Box<dyn Session>>,
    /// Connection the branch is attached to while started.
    pub(crate) attached: Option<ManagedConnection>,
}

impl std::fmt::Debug for BranchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchState")
            .field("status", &self.status)
            .field("session", &self.session.is_some())
            .field("attached", &self.attached.is_some())
            .finish()
    }
}

/// One branch of a global transaction.
#[derive(Debug)]
pub struct Branch {
    xid: Xid,
    state: Mutex<BranchState>,
}

impl Branch {
    pub(crate) fn new(xid: Xid, status: Status) -> Self {
        Self {
            xid,
            state: Mutex::new(BranchState {
                status,
                ..Default::default()
            }),
        }
    }

    pub fn xid(&self) -> &Xid {
        &self.xid
    }

    /// Current status.
    ///
    /// Blocks while another thread is working on this branch.
    pub fn status(&self) -> Status {
        self.state.lock().status
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, BranchState> {
        self.state.lock()
    }
}
