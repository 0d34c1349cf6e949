//! HTTP backend for the data-modeling service

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::auth::TokenProvider;
use super::types::*;
use super::InstancesBackend;
use crate::core::config::Config;
use crate::core::error::{ApiError, Error, Result};

/// Blocking client for `/api/v1/projects/{project}/models/instances`
#[derive(Clone)]
pub struct HttpInstances {
    agent: ureq::Agent,
    base: String,
    client_name: String,
    tokens: Arc<TokenProvider>,
}

impl fmt::Debug for HttpInstances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpInstances")
            .field("base", &self.base)
            .field("client_name", &self.client_name)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl HttpInstances {
    /// Build a backend from a validated configuration
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let timeout = config.client.timeout;
        let tokens = Arc::new(TokenProvider::new(config.credentials()?, timeout));
        Ok(Self::with_tokens(
            &config.client.base_url,
            &config.client.project,
            &config.client.client_name,
            timeout,
            tokens,
        ))
    }

    /// Build a backend with an existing token provider
    pub fn with_tokens(
        base_url: &str,
        project: &str,
        client_name: &str,
        timeout: Duration,
        tokens: Arc<TokenProvider>,
    ) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .user_agent(client_name)
            .build();
        Self {
            agent,
            base: format!(
                "{}/api/v1/projects/{}/models/instances",
                base_url.trim_end_matches('/'),
                project
            ),
            client_name: client_name.to_string(),
            tokens,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// POST a JSON body; a 401 drops the cached token and retries once
    fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = self.url(path);
        let payload = serde_json::to_value(body)?;
        let mut retried = false;
        loop {
            let request_id = Uuid::new_v4().to_string();
            let token = self.tokens.token()?;
            debug!(url = %url, request_id = %request_id, "POST");

            let outcome = self
                .agent
                .post(&url)
                .set("Authorization", &format!("Bearer {}", token))
                .set("X-Request-Id", &request_id)
                .set("X-Client-Name", &self.client_name)
                .send_json(payload.clone());

            match outcome {
                Ok(response) => {
                    return response
                        .into_json::<R>()
                        .map_err(|e| Error::transport(format!("invalid response body: {}", e)));
                }
                Err(ureq::Error::Status(401, _)) if !retried => {
                    warn!(request_id = %request_id, "token rejected, refreshing");
                    self.tokens.invalidate();
                    retried = true;
                }
                Err(ureq::Error::Status(code, response)) => {
                    let body = response.into_string().unwrap_or_default();
                    return Err(Error::Api(ApiError::from_body(code, &body)));
                }
                Err(ureq::Error::Transport(t)) => {
                    return Err(Error::transport(t.to_string()));
                }
            }
        }
    }
}

impl InstancesBackend for HttpInstances {
    fn apply(&self, request: &ApplyRequest) -> Result<ApplyResponse> {
        self.post("", request)
    }

    fn list(&self, request: &ListRequest) -> Result<ListResponse> {
        self.post("/list", request)
    }

    fn retrieve(&self, request: &RetrieveRequest) -> Result<ListResponse> {
        self.post("/byids", request)
    }

    fn delete(&self, request: &DeleteRequest) -> Result<DeleteResponse> {
        self.post("/delete", request)
    }

    fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        self.post("/query", request)
    }

    fn aggregate(&self, request: &AggregateRequest) -> Result<AggregateResponse> {
        self.post("/aggregate", request)
    }

    fn search(&self, request: &SearchRequest) -> Result<ListResponse> {
        self.post("/search", request)
    }
}
