//! Client entry point
//!
//! [`DataModelClient`] owns the shared [`Instances`] handle and hands out
//! typed [`ViewApi`]s, either one view at a time or grouped per domain.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::core::config::Config;
use crate::core::error::Result;
use crate::domains::{movies, windmill};
use crate::instances::{HttpInstances, Instances, InstancesBackend, MemoryInstances};
use crate::model::Entity;
use crate::views::ViewApi;

/// Typed access to a data-modeling project
#[derive(Clone)]
pub struct DataModelClient {
    instances: Instances,
}

impl fmt::Debug for DataModelClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataModelClient").finish_non_exhaustive()
    }
}

impl DataModelClient {
    /// Client talking HTTP to the service described by `config`
    pub fn new(config: &Config) -> Result<Self> {
        let backend = HttpInstances::new(config)?;
        info!(
            project = %config.client.project,
            base_url = %config.client.base_url,
            "data-modeling client ready"
        );
        Ok(Self::with_backend(Arc::new(backend)))
    }

    /// Client configured from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        Self::new(&Config::from_toml(contents)?)
    }

    /// Client configured from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(&Config::from_file(path)?)
    }

    /// Client over any backend
    pub fn with_backend(backend: Arc<dyn InstancesBackend>) -> Self {
        Self {
            instances: Instances::new(backend),
        }
    }

    /// Client over a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(MemoryInstances::new()))
    }

    /// The untyped instances API
    pub fn instances(&self) -> &Instances {
        &self.instances
    }

    /// Typed API for `E`, defaulting external ids to `space`
    pub fn view<E: Entity>(&self, space: impl Into<String>) -> ViewApi<E> {
        ViewApi::new(self.instances.clone(), space)
    }

    /// The movies model in its default instance space
    pub fn movies(&self) -> MoviesClient {
        MoviesClient::new(self.instances.clone(), movies::DEFAULT_INSTANCE_SPACE)
    }

    /// The windmill model in its default instance space
    pub fn windmill(&self) -> WindmillClient {
        WindmillClient::new(self.instances.clone(), windmill::DEFAULT_INSTANCE_SPACE)
    }
}

/// One [`ViewApi`] per movies entity
#[derive(Debug, Clone)]
pub struct MoviesClient {
    /// People
    pub person: ViewApi<movies::Person>,
    /// Acting roles
    pub actor: ViewApi<movies::Actor>,
    /// Directing roles
    pub director: ViewApi<movies::Director>,
    /// Movies
    pub movie: ViewApi<movies::Movie>,
    /// Award nominations
    pub nomination: ViewApi<movies::Nomination>,
    /// Audience ratings
    pub rating: ViewApi<movies::Rating>,
}

impl MoviesClient {
    /// Every movies view in `space`
    pub fn new(instances: Instances, space: &str) -> Self {
        Self {
            person: ViewApi::new(instances.clone(), space),
            actor: ViewApi::new(instances.clone(), space),
            director: ViewApi::new(instances.clone(), space),
            movie: ViewApi::new(instances.clone(), space),
            nomination: ViewApi::new(instances.clone(), space),
            rating: ViewApi::new(instances, space),
        }
    }
}

/// One [`ViewApi`] per windmill entity
#[derive(Debug, Clone)]
pub struct WindmillClient {
    /// Turbines
    pub wind_turbine: ViewApi<windmill::WindTurbine>,
    /// Rotor blades
    pub blade: ViewApi<windmill::Blade>,
    /// Turbine housings
    pub nacelle: ViewApi<windmill::Nacelle>,
    /// Met masts
    pub metmast: ViewApi<windmill::Metmast>,
}

impl WindmillClient {
    /// Every windmill view in `space`
    pub fn new(instances: Instances, space: &str) -> Self {
        Self {
            wind_turbine: ViewApi::new(instances.clone(), space),
            blade: ViewApi::new(instances.clone(), space),
            nacelle: ViewApi::new(instances.clone(), space),
            metmast: ViewApi::new(instances, space),
        }
    }
}
