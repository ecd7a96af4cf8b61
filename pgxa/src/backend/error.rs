//! Backend errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("could not connect to \"{addr}\": {reason}")]
    Connect { addr: String, reason: String },

    #[error("server error: {0}")]
    Server(String),

    #[error("connection is closed")]
    Closed,

    #[error("illegal operation in a distributed transaction: {0}")]
    DistributedTransaction(&'static str),

    #[error("connection is attached to branch \"{0}\"")]
    BranchAttached(String),

    #[error("unexpected row: {0}")]
    UnexpectedRow(String),
}

impl Error {
    /// The operation isn't allowed while a branch is attached.
    pub fn distributed_transaction(&self) -> bool {
        matches!(self, Self::DistributedTransaction(_))
    }
}
