//! Data source.
//!
//! Factory for managed connections. Owns the session pool and the
//! branch registry; data sources built against the same target and
//! credentials are the same resource manager.

use std::sync::Arc;

use tracing::info;

use super::ManagedConnection;
use crate::backend::{Address, Connector, Pool};
use crate::config::Config;
use crate::xa::{Registry, RmKey};

#[derive(Debug, Clone)]
pub struct DataSource {
    key: RmKey,
    pool: Pool,
    registry: Arc<Registry>,
}

impl DataSource {
    /// Create a data source with its own registry.
    pub fn new(config: &Config, connector: Arc<dyn Connector>) -> Self {
        Self::with_registry(config, connector, Arc::new(Registry::new()))
    }

    /// Create a data source sharing a registry with others.
    pub fn with_registry(
        config: &Config,
        connector: Arc<dyn Connector>,
        registry: Arc<Registry>,
    ) -> Self {
        let addr = Address::new(&config.target, &config.credentials);
        let key = RmKey::new(&addr);

        info!("data source ready [{}]", addr);

        Self {
            key,
            pool: Pool::new(addr, connector, config.general.max_idle),
            registry,
        }
    }

    /// Get a new managed connection.
    pub fn connection(&self) -> ManagedConnection {
        ManagedConnection::new(self.pool.clone(), self.registry.clone(), self.key.clone())
    }

    pub fn rm_key(&self) -> &RmKey {
        &self.key
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}
