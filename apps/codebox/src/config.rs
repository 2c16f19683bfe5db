use std::env;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8765";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(2000);

const ENDPOINT_VAR: &str = "CODEBOX_ENDPOINT";
const CONNECT_TIMEOUT_VAR: &str = "CODEBOX_CONNECT_TIMEOUT_MS";
const REQUEST_TIMEOUT_VAR: &str = "CODEBOX_REQUEST_TIMEOUT_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("endpoint cannot be empty")]
    EmptyEndpoint,
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("{var} must be a positive number of milliseconds, got '{value}'")]
    InvalidDuration { var: &'static str, value: String },
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend WebSocket endpoint
    pub endpoint: Url,
    /// How long the connection may stay in `Connecting` before it is failed
    pub connect_timeout: Duration,
    /// Rollback limit for run and save requests. `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(endpoint: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: normalize_endpoint(endpoint)?,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
        })
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = env::var(ENDPOINT_VAR).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let mut config = Self::new(&endpoint)?;
        if let Some(timeout) = duration_var(CONNECT_TIMEOUT_VAR)? {
            config.connect_timeout = timeout;
        }
        config.request_timeout = duration_var(REQUEST_TIMEOUT_VAR)?;
        Ok(config)
    }

    /// Replaces the endpoint, applying the same scheme inference as `new`.
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self, ConfigError> {
        self.endpoint = normalize_endpoint(endpoint)?;
        Ok(self)
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Parses an endpoint, inferring `ws://` for loopback hosts and `wss://`
/// for everything else when no scheme is given.
pub fn normalize_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyEndpoint);
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("{}{trimmed}", infer_scheme(trimmed))
    };
    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        endpoint: trimmed.to_string(),
        reason,
    };
    let url = Url::parse(&candidate).map_err(|err| invalid(err.to_string()))?;
    if matches!(url.scheme(), "ws" | "wss") {
        Ok(url)
    } else {
        Err(invalid(format!("unsupported scheme '{}'", url.scheme())))
    }
}

fn infer_scheme(host: &str) -> &'static str {
    if host.starts_with("localhost") || host.starts_with("127.") || host.starts_with("[::1]") {
        "ws://"
    } else {
        "wss://"
    }
}

fn duration_var(var: &'static str) -> Result<Option<Duration>, ConfigError> {
    let Ok(value) = env::var(var) else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Some(Duration::from_millis(ms))),
        _ => Err(ConfigError::InvalidDuration { var, value }),
    }
}
