//! Session capability consumed by the resource manager.

use super::{Address, Error};
use crate::xa::Xid;

/// How to finish the transaction running on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Commit,
    Abort,
}

impl std::fmt::Display for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Commit => write!(f, "commit"),
            Self::Abort => write!(f, "abort"),
        }
    }
}

/// One row returned by a query, in text format.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    columns: Vec<Option<String>>,
}

impl Row {
    pub fn new(columns: Vec<Option<String>>) -> Self {
        Self { columns }
    }

    /// Get column value, `None` if the column is missing or NULL.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.columns.get(index).and_then(|c| c.as_deref())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// An open session with the database.
///
/// Implementations block for a full request/response round trip.
pub trait Session: Send {
    /// Run a query, opening a transaction first if autocommit is off.
    fn execute(&mut self, query: &str) -> Result<Vec<Row>, Error>;

    /// Prepare the running transaction for two-phase commit under `xid`.
    fn prepare(&mut self, xid: &Xid) -> Result<(), Error>;

    /// Finish a transaction. With `xid`, finishes a prepared transaction instead
    /// of the one running on this session.
    fn end_transaction(&mut self, completion: Completion, xid: Option<&Xid>)
        -> Result<(), Error>;

    /// Transactions prepared on the server and waiting for a decision.
    fn pending_prepared(&mut self) -> Result<Vec<Xid>, Error>;

    fn set_autocommit(&mut self, autocommit: bool) -> Result<(), Error>;

    fn autocommit(&self) -> bool;

    /// Session is inside a transaction block.
    fn in_transaction(&self) -> bool;

    /// Close the session.
    fn close(self: Box<Self>);
}

/// Opens sessions.
pub trait Connector: Send + Sync {
    fn connect(&self, address: &Address) -> Result<Box<dyn Session>, Error>;
}

/// Runs simple queries against the server.
///
/// This is the wire protocol boundary.
pub trait Transport: Send {
    fn query(&mut self, query: &str) -> Result<Vec<Row>, Error>;

    fn close(&mut self) {}
}
