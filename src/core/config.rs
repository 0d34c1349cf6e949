//! Configuration management for viewbind
//!
//! A client needs a project, the service base URL and credentials. The same
//! file can also configure logging and the local emulator.

use crate::core::error::{Error, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up by [`Config::load`]
pub const DEFAULT_CONFIG_FILE: &str = "viewbind.toml";

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "VIEWBIND_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings
    #[serde(default)]
    pub client: ClientConfig,

    /// OAuth credentials
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Local emulator settings
    #[serde(default)]
    pub emulator: EmulatorConfig,
}

/// Connection settings for the data-modeling service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Project (tenant) name
    pub project: String,

    /// Service base URL, e.g. `https://api.example.com`
    pub base_url: String,

    /// Client name sent with each request
    pub client_name: String,

    /// Per-request timeout
    #[serde(deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub timeout: Duration,
}

/// OAuth client-credentials settings
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Identity provider tenant
    pub tenant_id: Option<String>,

    /// OAuth client id
    pub client_id: Option<String>,

    /// OAuth client secret
    pub client_secret: Option<String>,

    /// Token endpoint; derived from `tenant_id` when absent
    pub token_url: Option<String>,

    /// Requested scopes; `{base_url}/.default` when empty
    pub scopes: Vec<String>,

    /// Pre-issued bearer token, used instead of the client-credentials flow
    pub token: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, compact)
    pub format: String,
}

/// Emulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// HTTP bind address
    pub addr: SocketAddr,

    /// JSON file with an apply request used to seed the store
    pub seed: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            base_url: String::new(),
            client_name: format!("{}/{}", crate::NAME, crate::VERSION),
            timeout: Duration::from_secs(30),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8085)),
            seed: None,
        }
    }
}

/// How the client authenticates, resolved from [`CredentialsConfig`]
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A fixed bearer token
    Token(String),
    /// OAuth client-credentials grant
    ClientCredentials {
        /// Token endpoint
        token_url: String,
        /// OAuth client id
        client_id: String,
        /// OAuth client secret
        client_secret: String,
        /// Requested scopes
        scopes: Vec<String>,
    },
}

/// Stands in for a secret in `Debug` output
pub(crate) struct Redacted;

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| Redacted))
            .field("token_url", &self.token_url)
            .field("scopes", &self.scopes)
            .field("token", &self.token.as_ref().map(|_| Redacted))
            .finish()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Token(_) => f.debug_tuple("Token").field(&Redacted).finish(),
            Credentials::ClientCredentials {
                token_url,
                client_id,
                scopes,
                ..
            } => f
                .debug_struct("ClientCredentials")
                .field("token_url", token_url)
                .field("client_id", client_id)
                .field("client_secret", &Redacted)
                .field("scopes", scopes)
                .finish(),
        }
    }
}

impl Config {
    /// Build a configuration for client credentials in code
    pub fn new(
        project: impl Into<String>,
        base_url: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        let mut config = Config::default();
        config.client.project = project.into();
        config.client.base_url = base_url.into();
        config.credentials.tenant_id = Some(tenant_id.into());
        config.credentials.client_id = Some(client_id.into());
        config.credentials.client_secret = Some(client_secret.into());
        config
    }

    /// Load configuration from the default file (if present) and environment variables
    ///
    /// Only logging is checked here; the client section is validated when an
    /// HTTP backend is built from it, so the emulator can start without one.
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE, |key| std::env::var(key).ok())
    }

    /// [`Config::load`] with an explicit file and variable lookup
    pub fn load_from<F>(path: impl AsRef<Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Config::default()
        };

        config.apply_env_overrides(lookup)?;
        config.logging.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply `VIEWBIND_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(project) = var("PROJECT") {
            self.client.project = project;
        }
        if let Some(base_url) = var("BASE_URL") {
            self.client.base_url = base_url;
        }
        if let Some(tenant_id) = var("TENANT_ID") {
            self.credentials.tenant_id = Some(tenant_id);
        }
        if let Some(client_id) = var("CLIENT_ID") {
            self.credentials.client_id = Some(client_id);
        }
        if let Some(secret) = var("CLIENT_SECRET") {
            self.credentials.client_secret = Some(secret);
        }
        if let Some(token) = var("TOKEN") {
            self.credentials.token = Some(token);
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(addr) = var("EMULATOR_ADDR") {
            self.emulator.addr = addr
                .parse()
                .map_err(|e| Error::config(format!("Invalid emulator address: {}", e)))?;
        }

        Ok(())
    }

    /// Validate the client part of the configuration
    pub fn validate(&self) -> Result<()> {
        if self.client.project.trim().is_empty() {
            return Err(Error::config("Missing project"));
        }

        let base_url = self.client.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::config(format!("Invalid base URL: '{}'", base_url)));
        }

        if self.client.timeout.is_zero() {
            return Err(Error::config("Timeout must be greater than zero"));
        }

        self.credentials()?;
        self.logging.validate()
    }

    /// Resolve the authentication method
    pub fn credentials(&self) -> Result<Credentials> {
        let creds = &self.credentials;
        if let Some(token) = creds.token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(Credentials::Token(token.clone()));
        }

        let client_id = creds
            .client_id
            .clone()
            .ok_or_else(|| Error::config("Missing credentials.client_id"))?;
        let client_secret = creds
            .client_secret
            .clone()
            .ok_or_else(|| Error::config("Missing credentials.client_secret"))?;

        let token_url = match (&creds.token_url, &creds.tenant_id) {
            (Some(url), _) => url.clone(),
            (None, Some(tenant)) => format!(
                "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
                tenant
            ),
            (None, None) => {
                return Err(Error::config(
                    "Either credentials.token_url or credentials.tenant_id is required",
                ))
            }
        };

        let scopes = if creds.scopes.is_empty() {
            vec![format!("{}/.default", self.client.base_url.trim_end_matches('/'))]
        } else {
            creds.scopes.clone()
        };

        Ok(Credentials::ClientCredentials {
            token_url,
            client_id,
            client_secret,
            scopes,
        })
    }
}

impl LoggingConfig {
    /// Validate log level and format
    pub fn validate(&self) -> Result<()> {
        match self.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(Error::config(format!("Invalid log level: {}", other))),
        }
        match self.format.as_str() {
            "pretty" | "compact" => Ok(()),
            other => Err(Error::config(format!("Invalid log format: {}", other))),
        }
    }
}

// Durations are written as strings like "30s" or "500ms"
fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a duration string like '30s' or '5m', or seconds")
        }

        fn visit_str<E>(self, value: &str) -> std::result::Result<Duration, E>
        where
            E: de::Error,
        {
            parse_duration(value).map_err(E::custom)
        }

        fn visit_i64<E>(self, value: i64) -> std::result::Result<Duration, E>
        where
            E: de::Error,
        {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("negative duration"))
        }

        fn visit_u64<E>(self, value: u64) -> std::result::Result<Duration, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(value))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format!("{}ms", duration.as_millis()))
}

/// Parse "500ms", "30s", "5m", "1h" or bare seconds
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    let parse = |digits: &str| -> std::result::Result<u64, String> {
        digits
            .trim()
            .parse()
            .map_err(|_| format!("Invalid duration: '{}'", s))
    };

    if let Some(ms) = s.strip_suffix("ms") {
        Ok(Duration::from_millis(parse(ms)?))
    } else if let Some(secs) = s.strip_suffix('s') {
        Ok(Duration::from_secs(parse(secs)?))
    } else if let Some(mins) = s.strip_suffix('m') {
        Ok(Duration::from_secs(parse(mins)? * 60))
    } else if let Some(hours) = s.strip_suffix('h') {
        Ok(Duration::from_secs(parse(hours)? * 3600))
    } else {
        Ok(Duration::from_secs(parse(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [client]
        project = "movies-dev"
        base_url = "https://api.example.com"
        timeout = "45s"

        [credentials]
        tenant_id = "tenant-1"
        client_id = "client-1"
        client_secret = "shh"

        [logging]
        level = "debug"
    "#;

    #[test]
    fn test_parse_toml() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.client.project, "movies-dev");
        assert_eq!(config.client.timeout, Duration::from_secs(45));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
        config.validate().unwrap();
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.credentials.client_id.as_deref(), Some("client-1"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_client_credentials_defaults() {
        let config = Config::from_toml(SAMPLE).unwrap();
        match config.credentials().unwrap() {
            Credentials::ClientCredentials { token_url, scopes, .. } => {
                assert_eq!(
                    token_url,
                    "https://login.microsoftonline.com/tenant-1/oauth2/v2.0/token"
                );
                assert_eq!(scopes, vec!["https://api.example.com/.default"]);
            }
            other => panic!("unexpected credentials: {:?}", other),
        }
    }

    #[test]
    fn test_static_token_wins() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.credentials.token = Some("abc".into());
        assert_eq!(config.credentials().unwrap(), Credentials::Token("abc".into()));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("VIEWBIND_PROJECT", "override"),
            ("VIEWBIND_LOG_LEVEL", "warn"),
            ("VIEWBIND_EMULATOR_ADDR", "127.0.0.1:9999"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::from_toml(SAMPLE).unwrap();
        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.client.project, "override");
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.emulator.addr.port(), 9999);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.client.base_url = "ftp://nope".into();
        assert!(config.validate().is_err());

        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.credentials.client_secret = None;
        assert!(config.validate().is_err());

        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_without_client_settings() {
        let config = Config::load_from("/definitely/not/here.toml", |_| None).unwrap();
        assert_eq!(config.emulator.addr.port(), 8085);
        assert!(config.validate().is_err());

        let err = Config::load_from("/definitely/not/here.toml", |key| {
            (key == "VIEWBIND_LOG_LEVEL").then(|| "loud".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.credentials.token = Some("tok-123".into());
        let printed = format!("{:?}", config);
        assert!(printed.contains("client-1"));
        assert!(!printed.contains("shh"));
        assert!(!printed.contains("tok-123"));

        let resolved = format!("{:?}", Config::from_toml(SAMPLE).unwrap().credentials().unwrap());
        assert!(resolved.contains("<redacted>"));
        assert!(!resolved.contains("shh"));
        assert!(!format!("{:?}", Credentials::Token("tok-123".into())).contains("tok-123"));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("12").unwrap(), Duration::from_secs(12));
        assert!(parse_duration("soon").is_err());
    }
}
