//! Core building blocks
//!
//! Identifier types, error handling, configuration and logging setup used by
//! every other module.

pub mod types;
pub mod error;
pub mod config;
pub mod logging;

// Re-export commonly used items
pub use types::{Direction, EdgeId, InstanceType, Match, NodeId, NodeMeta, StrMatch, ViewId};
pub use error::{ApiError, Error, Result};
pub use config::Config;
