//! PostgreSQL session.
//!
//! Transaction control and two-phase commit are expressed as SQL
//! (`PREPARE TRANSACTION`, `COMMIT PREPARED`, `ROLLBACK PREPARED`)
//! sent over a [`Transport`].

use tracing::{debug, trace};

use super::{Address, Completion, Connector, Error, Row, Session, Transport};
use crate::xa::Xid;

/// Statements that change the transaction state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransactionStatement {
    Begin,
    Commit,
    Rollback,
}

impl TransactionStatement {
    pub(crate) fn parse(query: &str) -> Option<Self> {
        let query = query.trim().trim_end_matches(';').trim();
        let mut words = query.split_whitespace().map(|w| w.to_uppercase());
        let first = words.next()?;
        let second = words.next();

        match (first.as_str(), second.as_deref()) {
            ("BEGIN", _) | ("START", Some("TRANSACTION")) => Some(Self::Begin),
            ("COMMIT", None) | ("END", None) => Some(Self::Commit),
            ("COMMIT", Some("WORK" | "TRANSACTION")) => Some(Self::Commit),
            ("ROLLBACK", None) | ("ABORT", None) => Some(Self::Rollback),
            ("ROLLBACK", Some("WORK" | "TRANSACTION")) => Some(Self::Rollback),
            _ => None,
        }
    }
}

/// PostgreSQL server connection.
pub struct Server<T> {
    transport: T,
    addr: Address,
    autocommit: bool,
    in_transaction: bool,
}

impl<T> std::fmt::Debug for Server<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("addr", &self.addr)
            .field("autocommit", &self.autocommit)
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

impl<T: Transport> Server<T> {
    /// Wrap a connected transport.
    pub fn new(transport: T, addr: Address) -> Self {
        Self {
            transport,
            addr,
            autocommit: true,
            in_transaction: false,
        }
    }

    /// Server address.
    pub fn addr(&self) -> &Address {
        &self.addr
    }

    fn query(&mut self, query: &str) -> Result<Vec<Row>, Error> {
        trace!("{} [{}]", query, self.addr);
        self.transport.query(query)
    }

    fn begin(&mut self) -> Result<(), Error> {
        if !self.in_transaction {
            self.query("BEGIN")?;
            self.in_transaction = true;
        }
        Ok(())
    }
}

impl<T: Transport> Session for Server<T> {
    fn execute(&mut self, query: &str) -> Result<Vec<Row>, Error> {
        match TransactionStatement::parse(query) {
            Some(TransactionStatement::Begin) => {
                let rows = self.query(query)?;
                self.in_transaction = true;
                Ok(rows)
            }

            Some(TransactionStatement::Commit | TransactionStatement::Rollback) => {
                // Server leaves the transaction block even if the statement fails.
                self.in_transaction = false;
                self.query(query)
            }

            None => {
                if !self.autocommit {
                    self.begin()?;
                }
                self.query(query)
            }
        }
    }

    fn prepare(&mut self, xid: &Xid) -> Result<(), Error> {
        // A branch that did no work still has to exist on the server,
        // otherwise COMMIT PREPARED has nothing to find.
        self.begin()?;
        self.query(&format!("PREPARE TRANSACTION '{}'", xid.to_gid()))?;
        self.in_transaction = false;
        debug!("prepared transaction \"{}\" [{}]", xid, self.addr);

        Ok(())
    }

    fn end_transaction(&mut self, completion: Completion, xid: Option<&Xid>) -> Result<(), Error> {
        match (completion, xid) {
            (Completion::Commit, Some(xid)) => {
                self.query(&format!("COMMIT PREPARED '{}'", xid.to_gid()))?;
            }

            (Completion::Abort, Some(xid)) => {
                self.query(&format!("ROLLBACK PREPARED '{}'", xid.to_gid()))?;
            }

            (completion, None) => {
                if self.in_transaction {
                    self.in_transaction = false;
                    match completion {
                        Completion::Commit => self.query("COMMIT")?,
                        Completion::Abort => self.query("ROLLBACK")?,
                    };
                }
            }
        }

        Ok(())
    }

    fn pending_prepared(&mut self) -> Result<Vec<Xid>, Error> {
        let rows =
            self.query("SELECT gid FROM pg_prepared_xacts WHERE database = current_database()")?;

        let mut xids = vec![];
        for row in rows {
            let gid = row
                .get(0)
                .ok_or_else(|| Error::UnexpectedRow(format!("{:?}", row)))?;

            // Prepared by someone else.
            if let Some(xid) = Xid::from_gid(gid) {
                xids.push(xid);
            }
        }

        Ok(xids)
    }

    fn set_autocommit(&mut self, autocommit: bool) -> Result<(), Error> {
        if autocommit && !self.autocommit && self.in_transaction {
            self.end_transaction(Completion::Commit, None)?;
        }
        self.autocommit = autocommit;

        Ok(())
    }

    fn autocommit(&self) -> bool {
        self.autocommit
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn close(mut self: Box<Self>) {
        debug!("closing server connection [{}]", self.addr);
        self.transport.close();
    }
}

/// Opens [`Server`] sessions using a transport factory.
pub struct ServerConnector<F> {
    connect: F,
}

impl<F> ServerConnector<F> {
    pub fn new(connect: F) -> Self {
        Self { connect }
    }
}

impl<F, T> Connector for ServerConnector<F>
where
    F: Fn(&Address) -> Result<T, Error> + Send + Sync,
    T: Transport + 'static,
{
    fn connect(&self, address: &Address) -> Result<Box<dyn Session>, Error> {
        let transport = (self.connect)(address)?;
        debug!("new server connection [{}]", address);

        Ok(Box::new(Server::new(transport, address.clone())))
    }
}
