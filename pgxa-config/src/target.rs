use serde::{Deserialize, Serialize};

/// Database the resource manager opens sessions against.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Target {
    /// Server host.
    ///
    /// _Default:_ `127.0.0.1`
    #[serde(default = "Target::host")]
    pub host: String,

    /// Server port.
    ///
    /// _Default:_ `5432`
    #[serde(default = "Target::port")]
    pub port: u16,

    /// PostgreSQL database name.
    ///
    /// _Default:_ `pgxa`
    #[serde(default = "Target::database_name")]
    pub database_name: String,
}

impl Target {
    fn host() -> String {
        "127.0.0.1".into()
    }

    fn port() -> u16 {
        5432
    }

    fn database_name() -> String {
        "pgxa".into()
    }
}

impl Default for Target {
    fn default() -> Self {
        Self {
            host: Self::host(),
            port: Self::port(),
            database_name: Self::database_name(),
        }
    }
}

/// Credentials used to authenticate sessions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    /// _Default:_ `pgxa`
    #[serde(default = "Credentials::user")]
    pub user: String,

    /// _Default:_ `pgxa`
    #[serde(default = "Credentials::password")]
    pub password: String,
}

impl Credentials {
    fn user() -> String {
        "pgxa".into()
    }

    fn password() -> String {
        "pgxa".into()
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            user: Self::user(),
            password: Self::password(),
        }
    }
}
