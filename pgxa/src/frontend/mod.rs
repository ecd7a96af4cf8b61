//! What the application and the transaction manager talk to.

pub mod connection;
pub mod data_source;
pub mod managed;

pub use connection::Connection;
pub use data_source::DataSource;
pub use managed::ManagedConnection;
