use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

use super::error::Error;
use super::general::General;
use super::target::{Credentials, Target};

/// pgxa.toml
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: General,

    #[serde(default)]
    pub target: Target,

    #[serde(default)]
    pub credentials: Credentials,
}

impl Config {
    /// Load configuration from disk or use defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();

        let config = match read_to_string(path) {
            Ok(source) => {
                let config = Self::parse(&source)?;
                info!("loaded \"{}\"", path.display());
                config
            }

            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(
                    "\"{}\" doesn't exist, loading defaults instead",
                    path.display()
                );
                Self::default()
            }

            Err(err) => return Err(err.into()),
        };

        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(source: &str) -> Result<Self, Error> {
        toml::from_str(source).map_err(|err| Error::config(source, err))
    }
}
