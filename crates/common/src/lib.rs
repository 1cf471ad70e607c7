//! Common utilities and types shared across the uptime coordinator crates.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
