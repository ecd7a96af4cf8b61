//! Two-phase commit resource manager.
//!
//! The transaction manager drives branches through [`XaResource`];
//! branches live in a [`Registry`] shared by every connection to the
//! same resource manager.

pub mod branch;
pub mod error;
pub mod flags;
pub mod registry;
pub mod resource;
pub mod xid;

pub use branch::{Branch, Status};
pub use error::Error;
pub use flags::{EndFlags, RecoverFlags, StartFlags, Vote};
pub use registry::{Registry, RmKey};
pub use resource::XaResource;
pub use xid::Xid;
