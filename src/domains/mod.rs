//! Schema declarations of the supported data models
//!
//! Each domain is a set of entity declarations over [`crate::model`]; the
//! generic machinery lives elsewhere.

pub mod movies;
pub mod windmill;
