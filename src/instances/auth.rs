//! Bearer tokens for the HTTP backend
//!
//! Client-credentials tokens are cached until shortly before they expire and
//! dropped when the service answers 401.

use parking_lot::Mutex;
use serde::Deserialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::core::config::Credentials;
use crate::core::error::{Error, Result};

/// Tokens are renewed this long before their reported expiry
const REFRESH_MARGIN: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at
            .map_or(true, |expires_at| now + REFRESH_MARGIN < expires_at)
    }
}

/// Hands out bearer tokens
pub struct TokenProvider {
    credentials: Credentials,
    agent: ureq::Agent,
    cached: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `None` while another thread holds the cache
        let cached = self
            .cached
            .try_lock()
            .map(|cached| cached.as_ref().map(|token| token.expires_at));
        f.debug_struct("TokenProvider")
            .field("credentials", &self.credentials)
            .field("cached_expiry", &cached)
            .finish_non_exhaustive()
    }
}

impl TokenProvider {
    /// Create a provider for the given credentials
    pub fn new(credentials: Credentials, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .build();
        Self {
            credentials,
            agent,
            cached: Mutex::new(None),
        }
    }

    /// A valid token, fetching a new one if needed
    pub fn token(&self) -> Result<String> {
        let client = match &self.credentials {
            Credentials::Token(token) => return Ok(token.clone()),
            Credentials::ClientCredentials {
                token_url,
                client_id,
                client_secret,
                scopes,
            } => (token_url, client_id, client_secret, scopes),
        };

        let mut cached = self.cached.lock();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        let (token_url, client_id, client_secret, scopes) = client;
        debug!(token_url = %token_url, "requesting access token");
        let scope = scopes.join(" ");
        let response = self
            .agent
            .post(token_url)
            .send_form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("scope", scope.as_str()),
            ])
            .map_err(|e| match e {
                ureq::Error::Status(code, response) => Error::auth(format!(
                    "token endpoint returned {}: {}",
                    code,
                    response.into_string().unwrap_or_default()
                )),
                ureq::Error::Transport(t) => Error::auth(format!("token endpoint unreachable: {}", t)),
            })?;

        let body: TokenResponse = response
            .into_json()
            .map_err(|e| Error::auth(format!("invalid token response: {}", e)))?;
        info!(expires_in = ?body.expires_in, "obtained access token");

        let token = CachedToken {
            value: body.access_token,
            expires_at: body
                .expires_in
                .map(|secs| Instant::now() + Duration::from_secs(secs)),
        };
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Forget the cached token so the next call fetches a new one
    pub fn invalidate(&self) {
        self.cached.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_token_is_returned_as_is() {
        let provider = TokenProvider::new(Credentials::Token("abc".into()), Duration::from_secs(1));
        assert_eq!(provider.token().unwrap(), "abc");
        provider.invalidate();
        assert_eq!(provider.token().unwrap(), "abc");
    }

    #[test]
    fn test_debug_hides_tokens() {
        let provider = TokenProvider::new(Credentials::Token("tok-123".into()), Duration::from_secs(1));
        *provider.cached.lock() = Some(CachedToken {
            value: "cached-456".into(),
            expires_at: None,
        });
        let printed = format!("{:?}", provider);
        assert!(!printed.contains("tok-123"));
        assert!(!printed.contains("cached-456"));
    }

    #[test]
    fn test_freshness_honours_margin() {
        let now = Instant::now();
        let soon = CachedToken {
            value: "t".into(),
            expires_at: Some(now + Duration::from_secs(10)),
        };
        let later = CachedToken {
            value: "t".into(),
            expires_at: Some(now + Duration::from_secs(3600)),
        };
        assert!(!soon.is_fresh(now));
        assert!(later.is_fresh(now));
    }

    #[test]
    fn test_unreachable_token_endpoint_is_auth_error() {
        let provider = TokenProvider::new(
            Credentials::ClientCredentials {
                token_url: "http://127.0.0.1:9/token".into(),
                client_id: "id".into(),
                client_secret: "secret".into(),
                scopes: vec!["scope".into()],
            },
            Duration::from_millis(200),
        );
        assert!(matches!(provider.token(), Err(Error::Auth(_))));
    }
}
