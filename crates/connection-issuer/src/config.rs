//! Connection issuer configuration.
//!
//! Configuration is loaded from environment variables. The media server API
//! secret is held in a `SecretString` and redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Default base URL of the delegated token backend.
pub const DEFAULT_BACKEND_API_URL: &str = "http://localhost:8081";

/// Default router timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Upper bound for `REQUEST_TIMEOUT_SECONDS`.
pub const MAX_REQUEST_TIMEOUT_SECONDS: u64 = 300;

/// Default graceful shutdown drain period in seconds.
pub const DEFAULT_DRAIN_SECONDS: u64 = 0;

/// Key and secret used to sign access tokens locally.
#[derive(Clone, Debug)]
pub struct SigningCredentials {
    pub api_key: String,
    pub api_secret: SecretString,
}

/// Connection issuer configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:3000").
    pub bind_address: String,

    /// Default media server WebSocket URL.
    pub livekit_url: String,

    /// Signing credentials. `None` when direct signing is disabled and no
    /// key pair was supplied.
    pub signing: Option<SigningCredentials>,

    /// Base URL of the delegated token backend.
    pub backend_api_url: String,

    /// Region hint to media server URL.
    pub region_urls: HashMap<String, String>,

    /// Per-request timeout applied by the router.
    pub request_timeout_seconds: u64,

    /// Seconds to wait after a shutdown signal before the listener stops.
    pub drain_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("livekit_url", &self.livekit_url)
            .field(
                "api_key",
                &self.signing.as_ref().map(|s| s.api_key.as_str()),
            )
            .field("api_secret", &"[REDACTED]")
            .field("backend_api_url", &self.backend_api_url)
            .field("region_urls", &self.region_urls)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid media server URL: {0}")]
    InvalidServerUrl(String),

    #[error("Invalid signing credentials: {0}")]
    InvalidCredentials(String),

    #[error("Invalid region map: {0}")]
    InvalidRegionMap(String),

    #[error("Invalid request timeout configuration: {0}")]
    InvalidRequestTimeout(String),

    #[error("Invalid boolean for {name}: '{value}'")]
    InvalidBool { name: String, value: String },

    #[error("Invalid drain period: {0}")]
    InvalidDrainPeriod(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let livekit_url = vars
            .get("LIVEKIT_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("LIVEKIT_URL".to_string()))?
            .clone();
        validate_ws_url("LIVEKIT_URL", &livekit_url)?;

        let direct_signing_enabled = parse_bool(vars, "DIRECT_SIGNING_ENABLED", true)?;

        let api_key = vars.get("LIVEKIT_API_KEY").filter(|v| !v.is_empty());
        let api_secret = vars.get("LIVEKIT_API_SECRET").filter(|v| !v.is_empty());

        let signing = match (api_key, api_secret) {
            (Some(key), Some(secret)) => Some(SigningCredentials {
                api_key: key.clone(),
                api_secret: SecretString::from(secret.clone()),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::InvalidCredentials(
                    "LIVEKIT_API_KEY is set but LIVEKIT_API_SECRET is not".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(ConfigError::InvalidCredentials(
                    "LIVEKIT_API_SECRET is set but LIVEKIT_API_KEY is not".to_string(),
                ))
            }
        };

        if direct_signing_enabled && signing.is_none() {
            return Err(ConfigError::MissingEnvVar(
                "LIVEKIT_API_KEY and LIVEKIT_API_SECRET (required when DIRECT_SIGNING_ENABLED)"
                    .to_string(),
            ));
        }

        let backend_api_url = vars
            .get("BACKEND_API_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BACKEND_API_URL.to_string());

        let region_urls = match vars.get("LIVEKIT_REGION_URLS") {
            Some(raw) => parse_region_urls(raw)?,
            None => HashMap::new(),
        };

        // Parse request timeout with validation
        let request_timeout_seconds = if let Some(value_str) = vars.get("REQUEST_TIMEOUT_SECONDS")
        {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidRequestTimeout(format!(
                    "REQUEST_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 || value > MAX_REQUEST_TIMEOUT_SECONDS {
                return Err(ConfigError::InvalidRequestTimeout(format!(
                    "REQUEST_TIMEOUT_SECONDS must be between 1 and {}, got {}",
                    MAX_REQUEST_TIMEOUT_SECONDS, value
                )));
            }

            value
        } else {
            DEFAULT_REQUEST_TIMEOUT_SECONDS
        };

        let drain_seconds = match vars.get("ISSUER_DRAIN_SECONDS") {
            Some(value_str) => value_str.parse().map_err(|e| {
                ConfigError::InvalidDrainPeriod(format!(
                    "ISSUER_DRAIN_SECONDS must be a non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => DEFAULT_DRAIN_SECONDS,
        };

        Ok(Config {
            bind_address,
            livekit_url,
            signing,
            backend_api_url,
            region_urls,
            request_timeout_seconds,
            drain_seconds,
        })
    }
}

fn validate_ws_url(name: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidServerUrl(format!(
            "{} must start with ws:// or wss://, got '{}'",
            name, url
        )))
    }
}

fn parse_bool(
    vars: &HashMap<String, String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match vars.get(name).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidBool {
                name: name.to_string(),
                value: v,
            }),
        },
    }
}

/// Parse `region=url,region=url`. Blank entries are skipped.
fn parse_region_urls(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut map = HashMap::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((region, url)) = entry.split_once('=') else {
            return Err(ConfigError::InvalidRegionMap(format!(
                "expected region=url, got '{}'",
                entry
            )));
        };

        let region = region.trim();
        let url = url.trim();

        if region.is_empty() {
            return Err(ConfigError::InvalidRegionMap(format!(
                "empty region name in '{}'",
                entry
            )));
        }
        validate_ws_url("LIVEKIT_REGION_URLS", url)?;

        map.insert(region.to_string(), url.to_string());
    }

    Ok(map)
}
