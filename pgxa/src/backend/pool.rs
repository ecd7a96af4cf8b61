//! Session pool.
//!
//! Hands out sessions to managed connections and takes them back
//! when a connection lets go of one.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{Address, Connector, Error, Session};

/// Pool statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Sessions opened with the connector.
    pub opened: usize,
    /// Sessions closed by the pool.
    pub closed: usize,
    /// Sessions handed out.
    pub checkouts: usize,
    /// Sessions returned.
    pub checkins: usize,
}

struct Inner {
    idle: Vec<Box<dyn Session>>,
    stats: Stats,
}

struct InnerSync {
    addr: Address,
    connector: Arc<dyn Connector>,
    max_idle: usize,
    inner: Mutex<Inner>,
}

/// Session pool.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<InnerSync>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("addr", &self.inner.addr)
            .field("max_idle", &self.inner.max_idle)
            .finish()
    }
}

impl Pool {
    /// Create new pool.
    pub fn new(addr: Address, connector: Arc<dyn Connector>, max_idle: usize) -> Self {
        Self {
            inner: Arc::new(InnerSync {
                addr,
                connector,
                max_idle,
                inner: Mutex::new(Inner {
                    idle: vec![],
                    stats: Stats::default(),
                }),
            }),
        }
    }

    /// Address sessions are opened against.
    pub fn addr(&self) -> &Address {
        &self.inner.addr
    }

    /// Get a session, reusing an idle one if possible.
    pub fn get(&self) -> Result<Box<dyn Session>, Error> {
        let idle = {
            let mut guard = self.inner.inner.lock();
            guard.stats.checkouts += 1;
            guard.idle.pop()
        };

        if let Some(session) = idle {
            trace!("[pool] reusing idle session [{}]", self.inner.addr);
            return Ok(session);
        }

        self.open()
    }

    /// Open a new session, bypassing idle ones.
    pub fn open(&self) -> Result<Box<dyn Session>, Error> {
        let session = self.inner.connector.connect(&self.inner.addr)?;
        self.inner.inner.lock().stats.opened += 1;

        Ok(session)
    }

    /// Return a session to the pool.
    ///
    /// Sessions still inside a transaction are closed instead of reused.
    pub fn checkin(&self, session: Box<dyn Session>) {
        let session = {
            let mut guard = self.inner.inner.lock();
            guard.stats.checkins += 1;

            if session.in_transaction() {
                debug!(
                    "[pool] closing session left in a transaction [{}]",
                    self.inner.addr
                );
                Some(session)
            } else if guard.idle.len() < self.inner.max_idle {
                guard.idle.push(session);
                trace!("[pool] session checked in [{}]", self.inner.addr);
                None
            } else {
                Some(session)
            }
        };

        if let Some(session) = session {
            self.close(session);
        }
    }

    /// Close a session.
    pub fn close(&self, session: Box<dyn Session>) {
        self.inner.inner.lock().stats.closed += 1;
        session.close();
    }

    /// Number of idle sessions.
    pub fn idle(&self) -> usize {
        self.inner.inner.lock().idle.len()
    }

    pub fn stats(&self) -> Stats {
        self.inner.inner.lock().stats
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::test::FakeBackend;

    fn pool(backend: &FakeBackend, max_idle: usize) -> Pool {
        Pool::new(Address::new_test(), backend.connector(), max_idle)
    }

    #[test]
    fn test_checkout_reuses_idle() {
        let backend = FakeBackend::new();
        let pool = pool(&backend, 1);

        let session = pool.get().unwrap();
        assert_eq!(pool.idle(), 0);
        pool.checkin(session);
        assert_eq!(pool.idle(), 1);

        let _session = pool.get().unwrap();
        assert_eq!(pool.idle(), 0);
        assert_eq!(backend.connections(), 1);

        let stats = pool.stats();
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.checkouts, 2);
        assert_eq!(stats.checkins, 1);
    }

    #[test]
    fn test_checkin_over_capacity_closes() {
        let backend = FakeBackend::new();
        let pool = pool(&backend, 1);

        let one = pool.get().unwrap();
        let two = pool.get().unwrap();
        pool.checkin(one);
        pool.checkin(two);

        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.stats().closed, 1);
        assert_eq!(backend.closed(), 1);
    }

    #[test]
    fn test_checkin_dirty_closes() {
        let backend = FakeBackend::new();
        let pool = pool(&backend, 4);

        let mut session = pool.get().unwrap();
        session.set_autocommit(false).unwrap();
        session.execute("INSERT INTO t VALUES (1)").unwrap();
        pool.checkin(session);

        assert_eq!(pool.idle(), 0);
        assert_eq!(backend.closed(), 1);
        assert!(backend.committed().is_empty());
    }

    #[test]
    fn test_connect_error() {
        let backend = FakeBackend::new();
        backend.refuse_connections(true);
        let pool = pool(&backend, 1);

        assert!(matches!(pool.get(), Err(Error::Connect { .. })));
        assert_eq!(pool.stats().opened, 0);
    }
}
