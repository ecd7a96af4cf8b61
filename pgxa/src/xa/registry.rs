//! Active branches, per resource manager.

use std::sync::Arc;

use dashmap::DashMap;
use fnv::FnvHasher;
use parking_lot::Mutex;
use std::hash::Hasher;

use super::{Branch, Error, Status, Xid};
use crate::backend::Address;

/// Resource manager identity.
///
/// Derived from the target and the credentials, so every connection
/// to the same database as the same user belongs to the same resource manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RmKey(String);

impl RmKey {
    pub fn new(addr: &Address) -> Self {
        let mut hasher = FnvHasher::default();
        hasher.write(addr.password.as_bytes());

        Self(format!("{}#{:016x}", addr, hasher.finish()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RmKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default, Debug)]
struct Branches {
    list: Mutex<Vec<Arc<Branch>>>,
}

/// Branch registry.
///
/// Structural changes are serialized per resource manager. Branch
/// status is guarded by each branch, so work on different branches
/// doesn't contend.
#[derive(Default, Debug)]
pub struct Registry {
    resource_managers: DashMap<RmKey, Arc<Branches>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &RmKey) -> Option<Arc<Branches>> {
        self.resource_managers.get(key).map(|b| b.clone())
    }

    /// Add a branch. Fails if a branch with an equal xid exists.
    pub fn insert(&self, key: &RmKey, branch: Arc<Branch>) -> Result<(), Error> {
        let branches = self
            .resource_managers
            .entry(key.clone())
            .or_default()
            .clone();
        let mut list = branches.list.lock();

        if list.iter().any(|b| b.xid() == branch.xid()) {
            return Err(Error::DuplicateId(branch.xid().clone()));
        }

        list.push(branch);

        Ok(())
    }

    /// Find a branch.
    pub fn find(&self, key: &RmKey, xid: &Xid) -> Option<Arc<Branch>> {
        self.get(key)?
            .list
            .lock()
            .iter()
            .find(|b| b.xid() == xid)
            .cloned()
    }

    /// Remove a branch, if it exists.
    pub fn remove(&self, key: &RmKey, xid: &Xid) {
        if let Some(branches) = self.get(key) {
            branches.list.lock().retain(|b| b.xid() != xid);
        }
    }

    /// Remove this exact branch, leaving any newer branch with the same xid alone.
    pub(crate) fn remove_branch(&self, key: &RmKey, branch: &Arc<Branch>) {
        if let Some(branches) = self.get(key) {
            branches.list.lock().retain(|b| !Arc::ptr_eq(b, branch));
        }
    }

    /// Branches of a resource manager and their status, in insertion order.
    pub fn branches(&self, key: &RmKey) -> Vec<(Xid, Status)> {
        let list = match self.get(key) {
            Some(branches) => branches.list.lock().clone(),
            None => return vec![],
        };

        list.iter()
            .map(|branch| (branch.xid().clone(), branch.status()))
            .collect()
    }

    /// Number of branches across all resource managers.
    pub fn len(&self) -> usize {
        self.resource_managers
            .iter()
            .map(|entry| entry.value().list.lock().len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
