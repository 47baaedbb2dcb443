//! Connection issuer error types.
//!
//! Every variant renders as a plain-text body carrying the error message,
//! which is what the web client displays. Status codes are 400 for request
//! validation and 500 for everything else.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Connection issuer error type.
///
/// Maps to HTTP status codes:
/// - MissingParameter: 400 Bad Request
/// - Configuration, Upstream, UpstreamUnavailable, InvalidRegion, Crypto,
///   Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum IssuerError {
    #[error("Missing required query parameter: {0}")]
    MissingParameter(&'static str),

    #[error("{0}")]
    Configuration(String),

    #[error("Backend API error: {status} - {body}")]
    Upstream { status: u16, body: String },

    #[error("Backend API request failed: {0}")]
    UpstreamUnavailable(String),

    #[error("Invalid region")]
    InvalidRegion,

    #[error("Failed to sign access token: {0}")]
    Crypto(String),

    #[error("{0}")]
    Internal(String),
}

impl IssuerError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            IssuerError::MissingParameter(_) => 400,
            IssuerError::Configuration(_)
            | IssuerError::Upstream { .. }
            | IssuerError::UpstreamUnavailable(_)
            | IssuerError::InvalidRegion
            | IssuerError::Crypto(_)
            | IssuerError::Internal(_) => 500,
        }
    }

    /// Short label used as the `error_type` metric dimension.
    pub fn error_type(&self) -> &'static str {
        match self {
            IssuerError::MissingParameter(_) => "missing_parameter",
            IssuerError::Configuration(_) => "configuration",
            IssuerError::Upstream { .. } => "upstream",
            IssuerError::UpstreamUnavailable(_) => "upstream_unavailable",
            IssuerError::InvalidRegion => "invalid_region",
            IssuerError::Crypto(_) => "crypto",
            IssuerError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for IssuerError {
    fn into_response(self) -> Response {
        let status = match self.status_code() {
            400 => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match &self {
            IssuerError::MissingParameter(name) => {
                tracing::debug!(target: "issuer.errors", parameter = %name, "Rejected request");
            }
            IssuerError::Upstream { status, .. } => {
                tracing::warn!(target: "issuer.errors", upstream_status = status, "Token backend returned an error");
            }
            other => {
                tracing::error!(target: "issuer.errors", error_type = other.error_type(), error = %other, "Request failed");
            }
        }

        crate::observability::metrics::record_error(self.error_type(), self.status_code());

        (status, self.to_string()).into_response()
    }
}
