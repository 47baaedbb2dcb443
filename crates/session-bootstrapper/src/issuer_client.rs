//! Client for the connection issuer.
//!
//! Requests a connection descriptor from `GET {base}/api/connection-details`.
//! The issuer answers with an identity-suffix cookie; the client keeps the
//! last value it saw and sends it back on later requests so the participant
//! keeps the same identity across reconnects.

use crate::errors::BootstrapError;
use crate::observability::metrics;
use common::types::{ConnectionDetails, ServerType, IDENTITY_COOKIE_NAME};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, instrument, warn};

/// Timeout for issuer requests in seconds.
const ISSUER_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Timeout for establishing an issuer connection in seconds.
const ISSUER_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Path of the connection details endpoint, relative to the issuer base URL.
pub const CONNECTION_DETAILS_PATH: &str = "/api/connection-details";

/// Parameters of one credential request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRequest {
    pub room_name: String,
    pub participant_name: String,
    pub server_type: ServerType,
    pub region: Option<String>,
    pub metadata: Option<String>,
}

impl CredentialRequest {
    /// Delegated-mode request with no region or metadata.
    pub fn new(room_name: impl Into<String>, participant_name: impl Into<String>) -> Self {
        Self {
            room_name: room_name.into(),
            participant_name: participant_name.into(),
            server_type: ServerType::Custom,
            region: None,
            metadata: None,
        }
    }

    pub fn with_server_type(mut self, server_type: ServerType) -> Self {
        self.server_type = server_type;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![
            ("roomName", self.room_name.as_str()),
            ("participantName", self.participant_name.as_str()),
            ("serverType", self.server_type.as_str()),
        ];
        if let Some(region) = self.region.as_deref() {
            pairs.push(("region", region));
        }
        if let Some(metadata) = self.metadata.as_deref() {
            pairs.push(("metadata", metadata));
        }
        pairs
    }
}

/// Source of connection descriptors.
///
/// Abstracted so the join flow can be tested without an issuer.
#[async_trait::async_trait]
pub trait CredentialSource: Send + Sync {
    /// Fetch a fresh descriptor for one join.
    async fn fetch(&self, request: &CredentialRequest)
        -> Result<ConnectionDetails, BootstrapError>;
}

/// HTTP client for the connection issuer.
pub struct IssuerClient {
    client: Client,
    base_url: String,
    /// Identity suffix last handed out by the issuer. Never logged.
    identity_cookie: RwLock<Option<String>>,
}

impl IssuerClient {
    /// Create a new issuer client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Issuer base URL (e.g., "http://localhost:3000")
    ///
    /// # Errors
    ///
    /// Returns `BootstrapError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, BootstrapError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(ISSUER_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(ISSUER_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                error!(target: "bootstrapper.issuer_client", error = %e, "Failed to build HTTP client");
                BootstrapError::Transport(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            identity_cookie: RwLock::new(None),
        })
    }

    /// Seed the identity suffix, e.g. from a value persisted by the host.
    pub async fn with_identity_suffix(self, suffix: impl Into<String>) -> Self {
        *self.identity_cookie.write().await = Some(suffix.into());
        self
    }

    /// Identity suffix that will be replayed on the next request.
    pub async fn identity_suffix(&self) -> Option<String> {
        self.identity_cookie.read().await.clone()
    }

    async fn remember_cookie(&self, headers: &reqwest::header::HeaderMap) {
        let value = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .find_map(identity_cookie_from_set_cookie);

        if let Some(value) = value {
            *self.identity_cookie.write().await = Some(value);
        }
    }
}

#[async_trait::async_trait]
impl CredentialSource for IssuerClient {
    #[instrument(skip_all, fields(room_name = %request.room_name, mode = %request.server_type))]
    async fn fetch(
        &self,
        request: &CredentialRequest,
    ) -> Result<ConnectionDetails, BootstrapError> {
        let url = format!("{}{}", self.base_url, CONNECTION_DETAILS_PATH);
        let start = Instant::now();

        let mut builder = self.client.get(&url).query(&request.query_pairs());
        if let Some(suffix) = self.identity_cookie.read().await.as_deref() {
            builder = builder.header(COOKIE, format!("{IDENTITY_COOKIE_NAME}={suffix}"));
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(target: "bootstrapper.issuer_client", error = %e, "Issuer request failed");
                metrics::record_credential_request("unavailable", start.elapsed());
                return Err(BootstrapError::Transport(e.to_string()));
            }
        };

        let status = response.status();

        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(target: "bootstrapper.issuer_client", error = %e, "Failed to read issuer error body");
                    String::new()
                }
            };
            warn!(target: "bootstrapper.issuer_client", status = %status, "Issuer returned error status");
            metrics::record_credential_request("error", start.elapsed());
            return Err(BootstrapError::Issuer {
                status: status.as_u16(),
                body,
            });
        }

        self.remember_cookie(response.headers()).await;

        let details = response.json::<ConnectionDetails>().await.map_err(|e| {
            error!(target: "bootstrapper.issuer_client", error = %e, "Failed to parse issuer response");
            metrics::record_credential_request("error", start.elapsed());
            BootstrapError::Transport(format!("Invalid connection details: {e}"))
        })?;

        debug!(target: "bootstrapper.issuer_client", server_url = %details.server_url, "Received connection details");
        metrics::record_credential_request("success", start.elapsed());
        Ok(details)
    }
}

/// Extract the identity suffix from one `Set-Cookie` header value.
fn identity_cookie_from_set_cookie(header: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    if name.trim() != IDENTITY_COOKIE_NAME {
        return None;
    }
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Mock credential source for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Behavior {
        Succeed(ConnectionDetails),
        Fail(BootstrapError),
        /// Never completes.
        Hang,
    }

    /// Mock credential source with a fixed answer.
    pub struct MockCredentialSource {
        behavior: Behavior,
        call_count: AtomicUsize,
        last_request: Mutex<Option<CredentialRequest>>,
    }

    impl MockCredentialSource {
        fn with(behavior: Behavior) -> Self {
            Self {
                behavior,
                call_count: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        /// Always returns `details`.
        pub fn returning(details: ConnectionDetails) -> Self {
            Self::with(Behavior::Succeed(details))
        }

        /// Always fails with `error`.
        pub fn failing(error: BootstrapError) -> Self {
            Self::with(Behavior::Fail(error))
        }

        /// Never answers.
        pub fn hanging() -> Self {
            Self::with(Behavior::Hang)
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        pub fn last_request(&self) -> Option<CredentialRequest> {
            self.last_request.lock().ok().and_then(|r| r.clone())
        }
    }

    #[async_trait::async_trait]
    impl CredentialSource for MockCredentialSource {
        async fn fetch(
            &self,
            request: &CredentialRequest,
        ) -> Result<ConnectionDetails, BootstrapError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut last) = self.last_request.lock() {
                *last = Some(request.clone());
            }

            match &self.behavior {
                Behavior::Succeed(details) => Ok(details.clone()),
                Behavior::Fail(error) => Err(error.clone()),
                Behavior::Hang => std::future::pending().await,
            }
        }
    }
}
