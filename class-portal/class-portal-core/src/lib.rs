pub mod auth;
pub mod blob;
pub mod error;
pub mod model;
pub mod storage;

pub use error::{PortalError, Result};
