//! viewbind - typed view bindings for graph data-modeling services
//!
//! A data-modeling service stores nodes and edges whose properties are
//! grouped by versioned views. viewbind turns each view into a Rust entity
//! (a read struct, a write struct and a filter) and gives every entity the
//! same typed API: list, retrieve, apply, delete, search, aggregate and
//! graph traversal queries.
//!
//! ```no_run
//! use viewbind::{DataModelClient, ViewApi};
//! use viewbind::domains::movies::{Person, PersonFilter};
//!
//! let client = DataModelClient::from_file("viewbind.toml")?;
//! let people: ViewApi<Person> = client.movies().person;
//! let quentin = people.retrieve("person:quentin_tarantino")?;
//! let born_60s = people.list(
//!     &PersonFilter { min_birth_year: Some(1960), max_birth_year: Some(1969), ..Default::default() },
//!     None,
//! )?;
//! # Ok::<(), viewbind::Error>(())
//! ```
#![warn(missing_docs)]

// Core foundational modules
pub mod core;
pub mod filter;

// Storage boundary and the generic entity machinery
pub mod instances;
pub mod model;
pub mod views;

// Schema declarations and the client entry point
pub mod client;
pub mod domains;

// Emulator and monitoring
pub mod api;
pub mod system;

// Re-export commonly used items for convenience
pub use crate::client::{DataModelClient, MoviesClient, WindmillClient};
pub use crate::core::{Config, Direction, Error, Match, NodeId, NodeMeta, Result, ViewId};
pub use crate::filter::{Filter, ViewFilter};
pub use crate::instances::{Instances, InstancesBackend, MemoryInstances};
pub use crate::model::{ApplyOptions, Entity, EntityList, Relation, WriteCache, WriteEntity, WriteOptions};
pub use crate::views::{ListOptions, QueryApi, ViewApi};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Install logging from `config` and register the metric families
pub fn init(config: &Config) -> Result<()> {
    core::logging::init_tracing(&config.logging)?;
    if system::metrics::Metrics::global().is_none() {
        tracing::warn!("metrics unavailable");
    }
    tracing::info!("Initializing {} v{}", NAME, VERSION);
    Ok(())
}
