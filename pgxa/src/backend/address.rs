//! Server address.

use pgxa_config::{Credentials, Target};

/// Server address, including the credentials used to open sessions.
#[derive(Debug, Clone, PartialEq, Default, Eq, Hash)]
pub struct Address {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// PostgreSQL database name.
    pub database_name: String,
    /// Username.
    pub user: String,
    /// Password.
    pub password: String,
}

impl Address {
    /// Create new address from config values.
    pub fn new(target: &Target, credentials: &Credentials) -> Self {
        Self {
            host: target.host.clone(),
            port: target.port,
            database_name: target.database_name.clone(),
            user: credentials.user.clone(),
            password: credentials.password.clone(),
        }
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5432,
            database_name: "pgxa".into(),
            user: "pgxa".into(),
            password: "pgxa".into(),
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}:{}/{}",
            self.user, self.host, self.port, self.database_name
        )
    }
}
