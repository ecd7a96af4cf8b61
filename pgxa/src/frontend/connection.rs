//! Connection used by application code.
//!
//! While a branch is attached, transaction control belongs to the
//! transaction manager: commit, rollback, savepoints and enabling
//! autocommit are refused.

use parking_lot::MutexGuard;
use tracing::trace;

use super::managed::{Holder, Inner};
use super::ManagedConnection;
use crate::backend::server::TransactionStatement;
use crate::backend::{Completion, Error, Row};

/// Application connection.
///
/// Stops working once closed, or once the managed connection hands out
/// a newer one.
#[derive(Debug)]
pub struct Connection {
    managed: ManagedConnection,
    id: u64,
    closed: bool,
}

impl Connection {
    pub(super) fn new(managed: ManagedConnection, id: u64) -> Self {
        Self {
            managed,
            id,
            closed: false,
        }
    }

    /// Lock the managed connection, if this connection is still live.
    fn lock(&self) -> Result<MutexGuard<'_, Inner>, Error> {
        let inner = self.managed.lock();
        if self.closed || inner.closed || inner.facade != Some(self.id) {
            return Err(Error::Closed);
        }

        Ok(inner)
    }

    fn forbid_in_branch(inner: &Inner, operation: &'static str) -> Result<(), Error> {
        if inner.in_branch() {
            Err(Error::DistributedTransaction(operation))
        } else {
            Ok(())
        }
    }

    /// Run a query. `BEGIN`, `COMMIT` and `ROLLBACK` are refused
    /// while a branch is attached.
    pub fn execute(&mut self, query: &str) -> Result<Vec<Row>, Error> {
        let mut inner = self.lock()?;
        if TransactionStatement::parse(query).is_some() {
            Self::forbid_in_branch(&inner, "transaction control statement")?;
        }

        let pool = self.managed.pool();
        inner.session(pool)?.execute(query)
    }

    /// Commit the local transaction.
    pub fn commit(&mut self) -> Result<(), Error> {
        self.finish(Completion::Commit, "commit")
    }

    /// Roll back the local transaction.
    pub fn rollback(&mut self) -> Result<(), Error> {
        self.finish(Completion::Abort, "rollback")
    }

    fn finish(&mut self, completion: Completion, operation: &'static str) -> Result<(), Error> {
        let mut inner = self.lock()?;
        Self::forbid_in_branch(&inner, operation)?;

        if let Holder::Local(session) = &mut inner.holder {
            session.end_transaction(completion, None)?;
        }

        Ok(())
    }

    /// Autocommit, always off while a branch is attached.
    pub fn autocommit(&self) -> Result<bool, Error> {
        let inner = self.lock()?;
        Ok(!inner.in_branch() && inner.autocommit)
    }

    pub fn set_autocommit(&mut self, autocommit: bool) -> Result<(), Error> {
        let mut inner = self.lock()?;

        if inner.in_branch() {
            return if autocommit {
                Err(Error::DistributedTransaction("enable autocommit"))
            } else {
                Ok(())
            };
        }

        if let Holder::Local(session) = &mut inner.holder {
            session.set_autocommit(autocommit)?;
        }
        inner.autocommit = autocommit;

        Ok(())
    }

    pub fn set_savepoint(&mut self, name: &str) -> Result<(), Error> {
        let mut inner = self.lock()?;
        Self::forbid_in_branch(&inner, "set savepoint")?;

        let pool = self.managed.pool();
        inner
            .session(pool)?
            .execute(&format!("SAVEPOINT {}", name))?;

        Ok(())
    }

    pub fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), Error> {
        let mut inner = self.lock()?;
        Self::forbid_in_branch(&inner, "rollback to savepoint")?;

        let pool = self.managed.pool();
        inner
            .session(pool)?
            .execute(&format!("ROLLBACK TO SAVEPOINT {}", name))?;

        Ok(())
    }

    /// Release a savepoint. Tolerated as a no-op while a branch is attached.
    pub fn release_savepoint(&mut self, name: &str) -> Result<(), Error> {
        let mut inner = self.lock()?;

        if inner.in_branch() {
            trace!("ignoring release of savepoint \"{}\" in a branch", name);
            return Ok(());
        }

        let pool = self.managed.pool();
        inner
            .session(pool)?
            .execute(&format!("RELEASE SAVEPOINT {}", name))?;

        Ok(())
    }

    /// A branch is attached to the underlying connection.
    pub fn in_branch(&self) -> Result<bool, Error> {
        Ok(self.lock()?.in_branch())
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_err()
    }

    /// Close the connection.
    pub fn close(mut self) {
        self.cleanup();
    }

    /// With a branch attached, the branch keeps the session untouched.
    /// Otherwise, any open local transaction is rolled back and the
    /// managed connection keeps the session.
    fn cleanup(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut inner = self.managed.lock();
        if inner.facade != Some(self.id) {
            return;
        }
        inner.facade = None;

        let pool = self.managed.pool();
        let broken = match &mut inner.holder {
            Holder::Local(session) => {
                session.in_transaction()
                    && session.end_transaction(Completion::Abort, None).is_err()
            }

            Holder::Branch { .. } | Holder::Detached => false,
        };

        if broken {
            if let Holder::Local(session) = std::mem::replace(&mut inner.holder, Holder::Detached)
            {
                pool.close(session);
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cleanup();
    }
}
