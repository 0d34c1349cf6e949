//! Route table of the emulator

use axum::{
    routing::{get, post},
    Router,
};

use super::{handlers, AppState};

/// Prefix of every instances route
pub const INSTANCES_PATH: &str = "/api/v1/projects/:project/models/instances";

fn instances(suffix: &str) -> String {
    format!("{}{}", INSTANCES_PATH, suffix)
}

/// Instance, auth and system routes
pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        // Instance routes
        .route(&instances(""), post(handlers::apply_instances))
        .route(&instances("/list"), post(handlers::list_instances))
        .route(&instances("/byids"), post(handlers::retrieve_instances))
        .route(&instances("/delete"), post(handlers::delete_instances))
        .route(&instances("/query"), post(handlers::query_instances))
        .route(&instances("/aggregate"), post(handlers::aggregate_instances))
        .route(&instances("/search"), post(handlers::search_instances))
        // Auth
        .route("/oauth2/token", post(handlers::issue_token))
        // System routes
        .route("/", get(handlers::root_handler))
        .route("/api/v1/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
}
