//! # Emulator API
//!
//! HTTP front end of `viewbind-emulator`: a [`MemoryInstances`] store served
//! over the same JSON protocol the data-modeling service speaks, so the HTTP
//! client can be exercised locally.
//!
//! ## Endpoints Overview
//!
//! ### Instances (bearer token required)
//! - `POST /api/v1/projects/{project}/models/instances` - Upsert nodes and edges
//! - `POST /api/v1/projects/{project}/models/instances/list` - Filtered, paginated listing
//! - `POST /api/v1/projects/{project}/models/instances/byids` - Retrieve by id
//! - `POST /api/v1/projects/{project}/models/instances/delete` - Delete by id
//! - `POST /api/v1/projects/{project}/models/instances/query` - Multi-step graph query
//! - `POST /api/v1/projects/{project}/models/instances/aggregate` - Aggregates and histograms
//! - `POST /api/v1/projects/{project}/models/instances/search` - Free-text search
//!
//! ### Auth
//! - `POST /oauth2/token` - Client-credentials grant; any client is accepted
//!
//! ### System Essentials
//! - `GET /` - Emulator info
//! - `GET /api/v1/health` - Health check with store sizes
//! - `GET /metrics` - Prometheus metrics
//!
//! Errors use the service envelope `{"error": {"code", "message", ...}}` with
//! the HTTP status set to `code`.

pub mod handlers;
pub mod routes;
pub mod server;

use std::sync::Arc;

use crate::instances::MemoryInstances;
use crate::system::health::HealthChecker;

// Re-export commonly used items
pub use server::{create_app, serve, start_server};

/// Shared state of every handler
#[derive(Debug, Clone)]
pub struct AppState {
    /// The emulated store
    pub store: Arc<MemoryInstances>,
    /// Uptime clock
    pub health: HealthChecker,
}

impl AppState {
    /// State over `store`
    pub fn new(store: Arc<MemoryInstances>) -> Self {
        Self {
            store,
            health: HealthChecker::new(),
        }
    }
}
