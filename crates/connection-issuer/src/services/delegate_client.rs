//! HTTP client for the delegated token backend.
//!
//! In delegated mode the issuer does not sign tokens itself. It forwards the
//! room name, participant identity and metadata to
//! `POST {BACKEND_API_URL}/createToken` and relays the token it gets back.
//!
//! Backend failures surface to the caller with the backend's status and body
//! so the web client can display them. No retries are attempted.

use crate::errors::IssuerError;
use crate::observability::metrics;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, instrument, warn};

/// Timeout for backend requests in seconds.
const DELEGATE_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Timeout for establishing a backend connection in seconds.
const DELEGATE_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Body sent to the token backend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenRequest {
    pub room_name: String,

    /// The full identity (`name__suffix`), not the bare display name.
    pub participant_name: String,

    pub metadata: String,
}

/// Body returned by the token backend.
#[derive(Clone, Deserialize)]
pub struct CreateTokenResponse {
    pub participant_token: String,

    #[serde(default)]
    pub server_url: Option<String>,
}

impl std::fmt::Debug for CreateTokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateTokenResponse")
            .field("participant_token", &"[REDACTED]")
            .field("server_url", &self.server_url)
            .finish()
    }
}

/// Client for the delegated token backend.
#[derive(Clone)]
pub struct DelegateClient {
    client: Client,
    base_url: String,
}

impl DelegateClient {
    /// Create a new delegate client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Backend base URL (e.g., "http://localhost:8081")
    ///
    /// # Errors
    ///
    /// Returns `IssuerError::Internal` if the HTTP client cannot be built.
    pub fn new(base_url: String) -> Result<Self, IssuerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DELEGATE_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(DELEGATE_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                error!(target: "issuer.services.delegate_client", error = %e, "Failed to build HTTP client");
                IssuerError::Internal("Failed to build backend HTTP client".to_string())
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Request a participant token from the backend.
    ///
    /// # Errors
    ///
    /// - `IssuerError::UpstreamUnavailable` if the backend cannot be reached
    ///   or its success body cannot be parsed
    /// - `IssuerError::Upstream` if the backend answers with a non-2xx status
    #[instrument(skip_all, fields(room_name = %request.room_name))]
    pub async fn create_token(
        &self,
        request: &CreateTokenRequest,
    ) -> Result<CreateTokenResponse, IssuerError> {
        let url = format!("{}/createToken", self.base_url);
        let start = Instant::now();

        let response = match self.client.post(&url).json(request).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(target: "issuer.services.delegate_client", error = %e, "Backend request failed");
                metrics::record_delegate_request("unavailable", start.elapsed());
                return Err(IssuerError::UpstreamUnavailable(e.to_string()));
            }
        };

        let status = response.status();

        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(target: "issuer.services.delegate_client", error = %e, "Failed to read backend error body");
                    String::new()
                }
            };
            warn!(target: "issuer.services.delegate_client", status = %status, "Backend returned error status");
            metrics::record_delegate_request("error", start.elapsed());
            return Err(IssuerError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = response.json::<CreateTokenResponse>().await.map_err(|e| {
            error!(target: "issuer.services.delegate_client", error = %e, "Failed to parse backend response");
            metrics::record_delegate_request("error", start.elapsed());
            IssuerError::UpstreamUnavailable(e.to_string())
        })?;

        metrics::record_delegate_request("success", start.elapsed());
        Ok(parsed)
    }
}

/// Server URL to hand to the client for a delegated token.
///
/// Falls back to `default_url` when the backend omitted the URL or sent an
/// empty one, and rewrites HTTP schemes to their WebSocket equivalents.
pub fn normalize_server_url(server_url: Option<&str>, default_url: &str) -> String {
    let url = server_url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(default_url);

    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}
