//! XA resource manager for PostgreSQL sessions.
//!
//! Lets independent database sessions act as branches of one global
//! transaction driven by an external transaction manager over two-phase commit.

pub mod backend;
pub mod config;
pub mod frontend;
pub mod xa;

pub use backend::{Address, Connector, Pool, Session};
pub use frontend::{Connection, DataSource, ManagedConnection};
pub use xa::{EndFlags, RecoverFlags, Registry, StartFlags, Vote, XaResource, Xid};

use std::io::IsTerminal;

use pgxa_config::{General, LogFormat};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Setup the logger, so `info!`, `debug!`
/// and other macros actually output something.
///
/// Using try_init and ignoring errors to allow
/// for use in tests (setting up multiple times).
pub fn logger() {
    logger_with(&General::default());
}

/// Setup the logger using the configured output format.
pub fn logger_with(general: &General) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    match general.log_format {
        LogFormat::Text => {
            let format = fmt::layer()
                .with_ansi(std::io::stderr().is_terminal())
                .with_file(false);
            let _ = tracing_subscriber::registry()
                .with(format)
                .with(filter)
                .try_init();
        }

        LogFormat::Json => {
            let format = fmt::layer().json().with_file(false);
            let _ = tracing_subscriber::registry()
                .with(format)
                .with(filter)
                .try_init();
        }
    }
}
