//! Resource manager verbs.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::{
    branch::BranchState, Branch, EndFlags, Error, RecoverFlags, Registry, RmKey, StartFlags,
    Status, Vote, Xid,
};
use crate::backend::{Completion, Pool, Session};
use crate::frontend::ManagedConnection;

/// Two-phase commit verbs for one managed connection.
///
/// Preconditions are checked before the session is touched. A failing
/// precondition has no side effects.
#[derive(Debug, Clone)]
pub struct XaResource {
    key: RmKey,
    registry: Arc<Registry>,
    connection: ManagedConnection,
    pool: Pool,
}

impl XaResource {
    pub(crate) fn new(
        key: RmKey,
        registry: Arc<Registry>,
        connection: ManagedConnection,
        pool: Pool,
    ) -> Self {
        Self {
            key,
            registry,
            connection,
            pool,
        }
    }

    /// Resource manager this adapter belongs to.
    pub fn rm_key(&self) -> &RmKey {
        &self.key
    }

    /// Associate the connection with a branch.
    pub fn start(&self, xid: &Xid, flags: StartFlags) -> Result<(), Error> {
        match flags {
            StartFlags::NoFlags => self.start_new(xid),
            StartFlags::Join | StartFlags::Resume => self.start_existing(xid, flags),
        }
    }

    fn start_new(&self, xid: &Xid) -> Result<(), Error> {
        if self.registry.find(&self.key, xid).is_some() {
            return Err(Error::DuplicateId(xid.clone()));
        }
        self.check_attached(xid)?;

        // Hold the branch while attaching, so nobody
        // sees it half-started.
        let branch = Arc::new(Branch::new(xid.clone(), Status::Started));
        let mut state = branch.lock();
        self.registry.insert(&self.key, branch.clone())?;

        let mut session = None;
        if let Err(err) = self
            .connection
            .attach(xid, StartFlags::NoFlags, &mut session)
        {
            state.status = Status::Completed;
            self.registry.remove_branch(&self.key, &branch);
            return Err(Error::ResourceManager(err));
        }
        state.attached = Some(self.connection.clone());

        debug!("[xa] started branch \"{}\" [{}]", xid, self.key);

        Ok(())
    }

    fn start_existing(&self, xid: &Xid, flags: StartFlags) -> Result<(), Error> {
        let branch = self.find(xid, "start")?;
        let mut state = branch.lock();

        match state.status {
            Status::Suspended | Status::None => (),
            Status::Completed => return Err(Error::NotFound(xid.clone())),
            status => return Err(Error::protocol("start", xid, status)),
        }
        self.check_attached(xid)?;

        let mut session = state.session.take();
        let attached = self.connection.attach(xid, flags, &mut session);
        // Whatever the connection didn't adopt stays with the branch.
        state.session = session;
        attached.map_err(Error::ResourceManager)?;

        state.status = Status::Started;
        state.attached = Some(self.connection.clone());

        debug!(
            "[xa] {} branch \"{}\" [{}]",
            if flags == StartFlags::Join {
                "joined"
            } else {
                "resumed"
            },
            xid,
            self.key
        );

        Ok(())
    }

    /// Dissociate the connection from a branch.
    pub fn end(&self, xid: &Xid, flags: EndFlags) -> Result<(), Error> {
        let branch = self.find(xid, "end")?;
        let mut state = branch.lock();

        match state.status {
            Status::Started | Status::Suspended | Status::None => (),
            Status::Completed => return Err(Error::NotFound(xid.clone())),
            status => return Err(Error::protocol("end", xid, status)),
        }

        self.detach(xid, &mut state);

        state.status = match flags {
            EndFlags::Suspend => Status::Suspended,
            EndFlags::Success | EndFlags::Fail => Status::None,
        };

        debug!(
            "[xa] ended branch \"{}\" ({:?}) [{}]",
            xid, flags, self.key
        );

        Ok(())
    }

    /// Phase one.
    pub fn prepare(&self, xid: &Xid) -> Result<Vote, Error> {
        let branch = self.find(xid, "prepare")?;
        let mut state = branch.lock();

        match state.status {
            Status::None => (),
            Status::Completed => return Err(Error::NotFound(xid.clone())),
            status => return Err(Error::protocol("prepare", xid, status)),
        }

        let session = state
            .session
            .as_mut()
            .ok_or_else(|| Error::NoSession(xid.clone()))?;
        session.prepare(xid).map_err(Error::ResourceManager)?;

        state.status = Status::Prepared;
        debug!("[xa] prepared branch \"{}\" [{}]", xid, self.key);

        Ok(Vote::Ok)
    }

    /// Phase two, or the whole transaction if `one_phase` is set.
    pub fn commit(&self, xid: &Xid, one_phase: bool) -> Result<(), Error> {
        let branch = self
            .registry
            .find(&self.key, xid)
            .ok_or_else(|| Error::NotFound(xid.clone()))?;
        let mut state = branch.lock();

        match (state.status, one_phase) {
            (Status::Completed, _) => return Err(Error::NotFound(xid.clone())),
            (Status::None, true) => (),
            (Status::Prepared | Status::Recovered, false) => (),
            (status, _) => return Err(Error::protocol("commit", xid, status)),
        }

        let mut session = match state.session.take() {
            Some(session) => session,
            None => self
                .pool
                .get()
                .map_err(Error::ResourceManagerFailure)?,
        };

        let result = if one_phase {
            session.end_transaction(Completion::Commit, None)
        } else {
            session.end_transaction(Completion::Commit, Some(xid))
        };

        self.complete(&branch, &mut state, session);
        result.map_err(Error::ResourceManagerFailure)?;

        debug!(
            "[xa] committed branch \"{}\"{} [{}]",
            xid,
            if one_phase { " (one phase)" } else { "" },
            self.key
        );

        Ok(())
    }

    /// Roll back a branch, whatever state it's in.
    pub fn rollback(&self, xid: &Xid) -> Result<(), Error> {
        let branch = self
            .registry
            .find(&self.key, xid)
            .ok_or_else(|| Error::NotFound(xid.clone()))?;
        let mut state = branch.lock();

        let prepared = match state.status {
            Status::Completed => return Err(Error::NotFound(xid.clone())),
            Status::Prepared | Status::Recovered => true,
            Status::Started => {
                self.detach(xid, &mut state);
                false
            }
            Status::None | Status::Suspended => false,
        };

        let mut session = match state.session.take() {
            Some(session) => session,
            None => self.pool.get().map_err(Error::ResourceManager)?,
        };

        let result = if prepared {
            session.end_transaction(Completion::Abort, Some(xid))
        } else {
            session.end_transaction(Completion::Abort, None)
        };

        self.complete(&branch, &mut state, session);
        result.map_err(Error::ResourceManager)?;

        debug!("[xa] rolled back branch \"{}\" [{}]", xid, self.key);

        Ok(())
    }

    /// Heuristically completed branches aren't tracked, so there is nothing to forget.
    pub fn forget(&self, xid: &Xid) -> Result<(), Error> {
        debug!("[xa] forget \"{}\" [{}]", xid, self.key);
        Ok(())
    }

    /// Branches prepared on the server, including those prepared
    /// before this process started.
    pub fn recover(&self, flags: RecoverFlags) -> Result<Vec<Xid>, Error> {
        let mut session = self.pool.open().map_err(Error::ResourceManager)?;
        let pending = session.pending_prepared();
        self.pool.close(session);
        let xids = pending.map_err(Error::ResourceManager)?;

        for xid in &xids {
            if self.registry.find(&self.key, xid).is_none() {
                let branch = Arc::new(Branch::new(xid.clone(), Status::Recovered));
                // Lost the race to another recover, which is fine.
                if self.registry.insert(&self.key, branch).is_ok() {
                    debug!("[xa] recovered branch \"{}\" [{}]", xid, self.key);
                }
            }
        }

        debug!(
            "[xa] recover found {} prepared branches ({:?}) [{}]",
            xids.len(),
            flags,
            self.key
        );

        Ok(xids)
    }

    /// Both adapters talk to the same resource manager.
    pub fn is_same_rm(&self, other: &XaResource) -> bool {
        self.key == other.key
    }

    /// Transaction timeouts aren't supported.
    pub fn transaction_timeout(&self) -> Duration {
        Duration::ZERO
    }

    /// Transaction timeouts aren't supported, always returns `false`.
    pub fn set_transaction_timeout(&self, _timeout: Duration) -> bool {
        false
    }

    fn find(&self, xid: &Xid, verb: &'static str) -> Result<Arc<Branch>, Error> {
        self.registry
            .find(&self.key, xid)
            .ok_or_else(|| Error::NotStarted {
                verb,
                xid: xid.clone(),
            })
    }

    /// This connection can only carry one branch at a time.
    fn check_attached(&self, xid: &Xid) -> Result<(), Error> {
        match self.connection.branch() {
            Some(attached) if &attached != xid => Err(Error::Attached {
                xid: xid.clone(),
                attached,
            }),
            _ => Ok(()),
        }
    }

    /// Take the session back from the connection the branch is attached to.
    fn detach(&self, xid: &Xid, state: &mut BranchState) {
        let connection = state
            .attached
            .take()
            .unwrap_or_else(|| self.connection.clone());

        if let Some(session) = connection.detach(xid) {
            if let Some(stale) = state.session.replace(session) {
                self.pool.checkin(stale);
            }
        }
    }

    /// Remove the branch and find the session a home.
    fn complete(&self, branch: &Arc<Branch>, state: &mut BranchState, session: Box<dyn Session>) {
        state.status = Status::Completed;
        state.attached = None;
        self.registry.remove_branch(&self.key, branch);

        if let Some(session) = self.connection.reconcile_session(session) {
            self.pool.checkin(session);
        }
    }
}
