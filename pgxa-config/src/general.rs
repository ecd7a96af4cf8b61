use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Settings that apply to the resource manager as a whole.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct General {
    /// Maximum number of idle sessions kept by the pool.
    ///
    /// _Default:_ `4`
    #[serde(default = "General::max_idle")]
    pub max_idle: usize,

    /// Log output format.
    ///
    /// _Default:_ `text`
    #[serde(default)]
    pub log_format: LogFormat,
}

impl General {
    fn max_idle() -> usize {
        4
    }
}

impl Default for General {
    fn default() -> Self {
        Self {
            max_idle: Self::max_idle(),
            log_format: LogFormat::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}
