//! Managed connection.
//!
//! Owns at most one session at a time and moves it between the
//! application and transaction branches.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use super::Connection;
use crate::backend::{Completion, Error, Pool, Session};
use crate::xa::{Registry, RmKey, StartFlags, XaResource, Xid};

/// Who is using the session right now.
pub(crate) enum Holder {
    /// No session.
    Detached,
    /// Application, running local transactions.
    Local(Box<dyn Session>),
    /// A branch. Keeps the session until the branch is detached,
    /// even if the application lets go of the connection.
    Branch { xid: Xid, session: Box<dyn Session> },
}

impl std::fmt::Debug for Holder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detached => write!(f, "Detached"),
            Self::Local(_) => write!(f, "Local"),
            Self::Branch { xid, .. } => f.debug_struct("Branch").field("xid", xid).finish(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Inner {
    pub(crate) holder: Holder,
    /// Live facade, if any.
    pub(crate) facade: Option<u64>,
    next_facade: u64,
    /// Autocommit as set by the application. Ignored while a branch is attached.
    pub(crate) autocommit: bool,
    pub(crate) closed: bool,
}

impl Inner {
    pub(crate) fn in_branch(&self) -> bool {
        matches!(self.holder, Holder::Branch { .. })
    }

    /// Session for the facade, opened on first use.
    pub(crate) fn session(&mut self, pool: &Pool) -> Result<&mut Box<dyn Session>, Error> {
        if matches!(self.holder, Holder::Detached) {
            let session = open(pool, self.autocommit)?;
            self.holder = Holder::Local(session);
        }

        match &mut self.holder {
            Holder::Local(session) | Holder::Branch { session, .. } => Ok(session),
            Holder::Detached => Err(Error::Closed),
        }
    }

    fn take_local(&mut self) -> Option<Box<dyn Session>> {
        match std::mem::replace(&mut self.holder, Holder::Detached) {
            Holder::Local(session) => Some(session),
            holder => {
                self.holder = holder;
                None
            }
        }
    }
}

/// Get a session from the pool in the requested autocommit mode.
fn open(pool: &Pool, autocommit: bool) -> Result<Box<dyn Session>, Error> {
    let mut session = pool.get()?;
    if let Err(err) = session.set_autocommit(autocommit) {
        pool.close(session);
        return Err(err);
    }

    Ok(session)
}

/// Physical connection handed out by the data source.
#[derive(Clone)]
pub struct ManagedConnection {
    inner: Arc<Mutex<Inner>>,
    pool: Pool,
    registry: Arc<Registry>,
    key: RmKey,
}

impl std::fmt::Debug for ManagedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedConnection")
            .field("key", &self.key)
            .finish()
    }
}

impl ManagedConnection {
    pub(crate) fn new(pool: Pool, registry: Arc<Registry>, key: RmKey) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                holder: Holder::Detached,
                facade: None,
                next_facade: 0,
                autocommit: true,
                closed: false,
            })),
            pool,
            registry,
            key,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock()
    }

    pub(crate) fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Get a connection for the application. The previous
    /// connection, if any, stops working.
    pub fn connection(&self) -> Result<Connection, Error> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Error::Closed);
        }

        if inner.facade.take().is_some() {
            if let Holder::Local(session) = &mut inner.holder {
                // Previous connection left a transaction open.
                if session.in_transaction() {
                    session.end_transaction(Completion::Abort, None)?;
                }
            }
        }

        inner.next_facade += 1;
        let id = inner.next_facade;
        inner.facade = Some(id);

        Ok(Connection::new(self.clone(), id))
    }

    /// Two-phase commit verbs for this connection.
    pub fn xa_resource(&self) -> XaResource {
        XaResource::new(
            self.key.clone(),
            self.registry.clone(),
            self.clone(),
            self.pool.clone(),
        )
    }

    /// Branch currently attached.
    pub fn branch(&self) -> Option<Xid> {
        match &self.inner.lock().holder {
            Holder::Branch { xid, .. } => Some(xid.clone()),
            _ => None,
        }
    }

    pub fn in_branch(&self) -> bool {
        self.inner.lock().in_branch()
    }

    /// Attach a branch.
    ///
    /// A session supplied for join/resume is adopted and taken out of `supplied`;
    /// otherwise the connection's own session is used, opening one if needed.
    /// Does nothing if `xid` is already attached. Fails if another branch is.
    pub(crate) fn attach(
        &self,
        xid: &Xid,
        flags: StartFlags,
        supplied: &mut Option<Box<dyn Session>>,
    ) -> Result<(), Error> {
        let mut inner = self.inner.lock();

        if inner.closed {
            return Err(Error::Closed);
        }

        if let Holder::Branch { xid: attached, .. } = &inner.holder {
            return if attached == xid {
                Ok(())
            } else {
                Err(Error::BranchAttached(attached.to_string()))
            };
        }

        let session = match (flags, supplied.take()) {
            (StartFlags::Join | StartFlags::Resume, Some(session)) => {
                if let Some(stale) = inner.take_local() {
                    self.pool.checkin(stale);
                }
                session
            }

            (_, unused) => {
                *supplied = unused;
                match inner.take_local() {
                    Some(mut session) => {
                        if inner.facade.is_some() {
                            // Don't let local work leak into the branch.
                            if let Err(err) = session.end_transaction(Completion::Abort, None) {
                                inner.holder = Holder::Local(session);
                                return Err(err);
                            }
                        }
                        session
                    }
                    None => self.pool.get()?,
                }
            }
        };

        let mut session = session;
        if let Err(err) = session.set_autocommit(false) {
            self.pool.close(session);
            return Err(err);
        }

        inner.holder = Holder::Branch {
            xid: xid.clone(),
            session,
        };

        debug!("[xa] attached branch \"{}\" [{}]", xid, self.pool.addr());

        Ok(())
    }

    /// Detach the branch, returning its session.
    ///
    /// Does nothing if `xid` isn't attached. Works on a closed
    /// connection too, the branch still owns its session.
    pub(crate) fn detach(&self, xid: &Xid) -> Option<Box<dyn Session>> {
        let mut inner = self.inner.lock();

        match std::mem::replace(&mut inner.holder, Holder::Detached) {
            Holder::Branch {
                xid: attached,
                session,
            } if &attached == xid => {
                debug!("[xa] detached branch \"{}\" [{}]", xid, self.pool.addr());
                Some(session)
            }

            holder => {
                inner.holder = holder;
                None
            }
        }
    }

    /// Offer a session whose branch just finished.
    ///
    /// Adopted if the connection holds none; otherwise handed back
    /// for the caller to dispose of.
    pub(crate) fn reconcile_session(
        &self,
        mut session: Box<dyn Session>,
    ) -> Option<Box<dyn Session>> {
        let mut inner = self.inner.lock();

        if inner.closed || session.in_transaction() {
            return Some(session);
        }

        if !matches!(inner.holder, Holder::Detached) {
            return Some(session);
        }

        if session.set_autocommit(inner.autocommit).is_err() {
            return Some(session);
        }
        inner.holder = Holder::Local(session);

        None
    }

    /// Close the connection, returning its session to the pool.
    ///
    /// An attached branch keeps its session until it's detached.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        inner.facade = None;

        if let Some(mut session) = inner.take_local() {
            if session.in_transaction()
                && session.end_transaction(Completion::Abort, None).is_err()
            {
                self.pool.close(session);
            } else {
                self.pool.checkin(session);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::test::FakeBackend;
    use crate::backend::Address;

    fn managed(backend: &FakeBackend) -> ManagedConnection {
        let addr = Address::new_test();
        let key = RmKey::new(&addr);
        let pool = Pool::new(addr, backend.connector(), 2);
        ManagedConnection::new(pool, Arc::new(Registry::new()), key)
    }

    fn xid(gtrid: &[u8]) -> Xid {
        Xid::new(1, gtrid, b"1").unwrap()
    }

    #[test]
    fn test_attach_is_idempotent() {
        let backend = FakeBackend::new();
        let conn = managed(&backend);
        let mut supplied = None;

        conn.attach(&xid(b"a"), StartFlags::NoFlags, &mut supplied)
            .unwrap();
        conn.attach(&xid(b"a"), StartFlags::NoFlags, &mut supplied)
            .unwrap();
        assert_eq!(conn.branch(), Some(xid(b"a")));
        assert_eq!(backend.connections(), 1);

        // Another branch has to wait for this one to be detached.
        let err = conn
            .attach(&xid(b"b"), StartFlags::NoFlags, &mut supplied)
            .unwrap_err();
        assert!(matches!(err, Error::BranchAttached(_)));
        assert_eq!(conn.branch(), Some(xid(b"a")));
    }

    #[test]
    fn test_attach_rolls_back_local_work() {
        let backend = FakeBackend::new();
        let conn = managed(&backend);
        let mut app = conn.connection().unwrap();

        app.set_autocommit(false).unwrap();
        app.execute("INSERT INTO t VALUES ('local')").unwrap();

        conn.attach(&xid(b"a"), StartFlags::NoFlags, &mut None)
            .unwrap();
        app.execute("INSERT INTO t VALUES ('branch')").unwrap();

        let mut session = conn.detach(&xid(b"a")).unwrap();
        session.end_transaction(Completion::Commit, None).unwrap();

        assert_eq!(backend.committed(), vec!["INSERT INTO t VALUES ('branch')"]);
    }

    #[test]
    fn test_join_adopts_supplied_session() {
        let backend = FakeBackend::new();
        let conn = managed(&backend);
        let pool = conn.pool().clone();

        // Connection already has a local session.
        let mut app = conn.connection().unwrap();
        app.execute("SELECT 1").unwrap();

        let mut supplied = Some(pool.open().unwrap());
        conn.attach(&xid(b"a"), StartFlags::Join, &mut supplied)
            .unwrap();
        assert!(supplied.is_none());

        // Stale local session went back to the pool.
        assert_eq!(pool.idle(), 1);
        assert!(conn.in_branch());
    }

    #[test]
    fn test_detach_is_idempotent() {
        let backend = FakeBackend::new();
        let conn = managed(&backend);

        assert!(conn.detach(&xid(b"a")).is_none());

        conn.attach(&xid(b"a"), StartFlags::NoFlags, &mut None)
            .unwrap();
        // Different branch.
        assert!(conn.detach(&xid(b"b")).is_none());
        assert!(conn.in_branch());

        assert!(conn.detach(&xid(b"a")).is_some());
        assert!(conn.detach(&xid(b"a")).is_none());
        assert!(!conn.in_branch());
    }

    #[test]
    fn test_released_connection_keeps_branch_session() {
        let backend = FakeBackend::new();
        let conn = managed(&backend);
        let mut app = conn.connection().unwrap();

        conn.attach(&xid(b"a"), StartFlags::NoFlags, &mut None)
            .unwrap();
        app.execute("INSERT INTO t VALUES (1)").unwrap();
        app.close();

        assert_eq!(conn.pool().idle(), 0);
        assert_eq!(backend.closed(), 0);

        let mut session = conn.detach(&xid(b"a")).unwrap();
        assert!(session.in_transaction());
        session.end_transaction(Completion::Commit, None).unwrap();
        assert_eq!(backend.committed(), vec!["INSERT INTO t VALUES (1)"]);
        assert_eq!(backend.connections(), 1);
    }

    #[test]
    fn test_close_keeps_branch_session() {
        let backend = FakeBackend::new();
        let conn = managed(&backend);
        let mut app = conn.connection().unwrap();

        conn.attach(&xid(b"a"), StartFlags::NoFlags, &mut None)
            .unwrap();
        app.execute("INSERT INTO t VALUES (1)").unwrap();
        conn.close();

        assert!(app.is_closed());
        assert_eq!(backend.closed(), 0);

        // The branch can still be ended and finished.
        let mut session = conn.detach(&xid(b"a")).unwrap();
        session.end_transaction(Completion::Commit, None).unwrap();
        assert_eq!(backend.committed(), vec!["INSERT INTO t VALUES (1)"]);

        // Closed connections don't take sessions back.
        assert!(conn.reconcile_session(session).is_some());
    }

    #[test]
    fn test_reconcile_session() {
        let backend = FakeBackend::new();
        let conn = managed(&backend);
        let pool = conn.pool().clone();

        // Nothing held, adopted.
        assert!(conn.reconcile_session(pool.open().unwrap()).is_none());

        // Already holding one, handed back.
        assert!(conn.reconcile_session(pool.open().unwrap()).is_some());
    }

    #[test]
    fn test_closed() {
        let backend = FakeBackend::new();
        let conn = managed(&backend);
        conn.close();

        assert!(matches!(conn.connection(), Err(Error::Closed)));
        assert!(conn
            .attach(&xid(b"a"), StartFlags::NoFlags, &mut None)
            .is_err());
    }
}
