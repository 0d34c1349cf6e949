//! HTTP request handlers for the emulator
//!
//! Instance handlers are thin: check the bearer token, decode the body,
//! call the store, encode the result. Every failure leaves as the service's
//! error envelope.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::AppState;
use crate::core::error::{ApiError, ApiErrorEnvelope, Error, Result};
use crate::instances::{
    AggregateRequest, AggregateResponse, ApplyRequest, ApplyResponse, DeleteRequest,
    DeleteResponse, InstancesBackend, ListRequest, ListResponse, MemoryInstances, QueryRequest,
    QueryResponse, RetrieveRequest, SearchRequest,
};
use crate::system::health::{HealthStatus, ServiceStatus};
use crate::system::metrics::{self, Metrics};

/// Lifetime of issued tokens in seconds
pub const TOKEN_TTL_SECS: u64 = 3600;

/// An error on its way out as an envelope
#[derive(Debug)]
pub struct ApiFailure(pub ApiError);

/// Handler result
pub type ApiResult<T> = std::result::Result<Json<T>, ApiFailure>;

impl From<Error> for ApiFailure {
    fn from(error: Error) -> Self {
        let code = match &error {
            Error::Api(api) => return ApiFailure(api.clone()),
            Error::Validation(_)
            | Error::TypeMismatch { .. }
            | Error::Serialization(_)
            | Error::Config(_) => 400,
            Error::Auth(_) => 401,
            Error::Transport(_) | Error::Io(_) | Error::Metrics(_) => 500,
        };
        ApiFailure(ApiError::new(code, error.to_string()))
    }
}

impl From<JsonRejection> for ApiFailure {
    fn from(rejection: JsonRejection) -> Self {
        ApiFailure(ApiError::new(400, rejection.body_text()))
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ApiErrorEnvelope { error: self.0 })).into_response()
    }
}

fn authorize(headers: &HeaderMap) -> std::result::Result<(), ApiFailure> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or_default();
    if token.is_empty() {
        return Err(ApiFailure(ApiError::new(401, "Missing bearer token")));
    }
    Ok(())
}

/// Authorize, decode, run `op` against the store and time it
fn call<Req, Resp>(
    operation: &'static str,
    state: &AppState,
    project: &str,
    headers: &HeaderMap,
    payload: std::result::Result<Json<Req>, JsonRejection>,
    op: impl FnOnce(&MemoryInstances, &Req) -> Result<Resp>,
) -> ApiResult<Resp> {
    authorize(headers)?;
    let Json(request) = payload?;

    let started = Instant::now();
    let result = op(&state.store, &request);
    if let Some(metrics) = Metrics::global() {
        metrics.observe(operation, started.elapsed(), result.is_ok());
    }
    match &result {
        Ok(_) => debug!(operation, project, "handled"),
        Err(e) => debug!(operation, project, error = %e, "rejected"),
    }
    Ok(Json(result?))
}

/// Upsert nodes and edges
pub async fn apply_instances(
    State(state): State<AppState>,
    Path(project): Path<String>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ApplyRequest>, JsonRejection>,
) -> ApiResult<ApplyResponse> {
    call("emulator_apply", &state, &project, &headers, payload, |store, r| store.apply(r))
}

/// One page of a filtered listing
pub async fn list_instances(
    State(state): State<AppState>,
    Path(project): Path<String>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ListRequest>, JsonRejection>,
) -> ApiResult<ListResponse> {
    call("emulator_list", &state, &project, &headers, payload, |store, r| store.list(r))
}

/// Instances by id
pub async fn retrieve_instances(
    State(state): State<AppState>,
    Path(project): Path<String>,
    headers: HeaderMap,
    payload: std::result::Result<Json<RetrieveRequest>, JsonRejection>,
) -> ApiResult<ListResponse> {
    call("emulator_retrieve", &state, &project, &headers, payload, |store, r| {
        store.retrieve(r)
    })
}

/// Delete by id
pub async fn delete_instances(
    State(state): State<AppState>,
    Path(project): Path<String>,
    headers: HeaderMap,
    payload: std::result::Result<Json<DeleteRequest>, JsonRejection>,
) -> ApiResult<DeleteResponse> {
    call("emulator_delete", &state, &project, &headers, payload, |store, r| store.delete(r))
}

/// Multi-step graph query
pub async fn query_instances(
    State(state): State<AppState>,
    Path(project): Path<String>,
    headers: HeaderMap,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<QueryResponse> {
    call("emulator_query", &state, &project, &headers, payload, |store, r| store.query(r))
}

/// Aggregates over one view
pub async fn aggregate_instances(
    State(state): State<AppState>,
    Path(project): Path<String>,
    headers: HeaderMap,
    payload: std::result::Result<Json<AggregateRequest>, JsonRejection>,
) -> ApiResult<AggregateResponse> {
    call("emulator_aggregate", &state, &project, &headers, payload, |store, r| {
        store.aggregate(r)
    })
}

/// Free-text search
pub async fn search_instances(
    State(state): State<AppState>,
    Path(project): Path<String>,
    headers: HeaderMap,
    payload: std::result::Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<ListResponse> {
    call("emulator_search", &state, &project, &headers, payload, |store, r| store.search(r))
}

/// Client-credentials form
#[derive(Debug, Deserialize)]
pub struct TokenForm {
    /// Must be `client_credentials`
    pub grant_type: String,
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    #[serde(default)]
    pub client_secret: String,
    /// Space separated scopes
    #[serde(default)]
    pub scope: Option<String>,
}

/// Issued token
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenGrant {
    /// Opaque bearer token
    pub access_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Seconds until expiry
    pub expires_in: u64,
}

/// Issue a random bearer token to any client
pub async fn issue_token(Form(form): Form<TokenForm>) -> ApiResult<TokenGrant> {
    if form.grant_type != "client_credentials" {
        warn!(grant_type = %form.grant_type, "unsupported grant");
        return Err(ApiFailure(ApiError::new(
            400,
            format!("Unsupported grant type '{}'", form.grant_type),
        )));
    }
    if form.client_id.is_empty() {
        return Err(ApiFailure(ApiError::new(401, "Missing client id")));
    }
    debug!(client_id = %form.client_id, scope = ?form.scope, "token issued");
    Ok(Json(TokenGrant {
        access_token: Uuid::new_v4().simple().to_string(),
        token_type: "Bearer".to_string(),
        expires_in: TOKEN_TTL_SECS,
    }))
}

/// Emulator description
#[derive(Debug, Serialize, Deserialize)]
pub struct InfoResponse {
    /// Binary name
    pub name: String,
    /// Crate version
    pub version: String,
    /// Served routes
    pub endpoints: Vec<String>,
}

/// Root route
pub async fn root_handler() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: format!("{}-emulator", crate::NAME),
        version: crate::VERSION.to_string(),
        endpoints: [
            "POST /api/v1/projects/{project}/models/instances[/list|/byids|/delete|/query|/aggregate|/search]",
            "POST /oauth2/token",
            "GET /api/v1/health",
            "GET /metrics",
        ]
        .iter()
        .map(ToString::to_string)
        .collect(),
    })
}

/// Health with store sizes; degraded when metrics could not be registered
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    let mut status = state
        .health
        .check(state.store.node_count(), state.store.edge_count());
    if Metrics::global().is_none() {
        status.status = ServiceStatus::Degraded;
    }
    Json(status)
}

/// Prometheus text exposition
pub async fn metrics_handler() -> std::result::Result<Response, ApiFailure> {
    let body = metrics::gather()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}
