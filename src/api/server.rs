//! HTTP server for the emulator

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, Method,
    },
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{routes, AppState};
use crate::core::error::Result;

/// Creates the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("x-client-name"),
        ])
        .allow_origin(Any);

    routes::create_api_routes()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!("Emulator listening on http://{}", addr);
    tracing::info!("Health check available at http://{}/api/v1/health", addr);

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Emulator stopped");
    Ok(())
}

/// Bind `addr` and serve until `shutdown` resolves
pub async fn start_server<F>(addr: SocketAddr, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!("Starting {} emulator on {}", crate::NAME, addr);
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, shutdown).await
}
