// Submodules
pub mod core;
pub mod error;
pub mod general;
pub mod target;

pub use core::Config;
pub use error::Error;
pub use general::{General, LogFormat};
pub use target::{Credentials, Target};
