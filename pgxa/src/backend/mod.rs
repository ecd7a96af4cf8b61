//! Backend owns the sessions opened against PostgreSQL.
//!
//! The wire protocol is not implemented here: a [`Transport`] runs
//! simple queries, [`Server`] layers transaction and two-phase commit
//! semantics on top of it, and [`Pool`] hands sessions out and takes them back.

pub mod address;
pub mod error;
pub mod pool;
pub mod server;
pub mod session;

pub use address::Address;
pub use error::Error;
pub use pool::Pool;
pub use server::{Server, ServerConnector};
pub use session::{Completion, Connector, Row, Session, Transport};

#[cfg(test)]
pub mod test;
