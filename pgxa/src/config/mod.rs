//! Configuration.

use std::path::Path;

pub use pgxa_config::{Config, Credentials, Error, General, LogFormat, Target};

use crate::backend::Address;

/// Load the configuration file from disk.
pub fn load(path: impl AsRef<Path>) -> Result<Config, Error> {
    Config::load(path)
}

/// Backend address described by the configuration.
pub fn address(config: &Config) -> Address {
    Address::new(&config.target, &config.credentials)
}
