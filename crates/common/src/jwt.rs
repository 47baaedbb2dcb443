//! Access token claims shared by the connection issuer and its clients.
//!
//! Tokens follow the media server's access token format: an HS256 JWT whose
//! issuer is the API key, whose subject is the participant identity, and
//! which carries a `video` grant scoped to a single room.
//!
//! This module provides:
//! - The claim and grant types (`AccessTokenClaims`, `VideoGrant`)
//! - Size limits checked before any parsing
//! - `peek_claims` for reading a token payload without verifying it
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - `peek_claims` does NOT verify the signature; use it for display and
//!   logging decisions only, never for authorization
//! - `sub` and `name` are redacted in Debug output

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum accepted JWT size in bytes (8KB).
///
/// Typical access tokens are 300-600 bytes. Larger inputs are rejected
/// before base64 decoding.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Lifetime of access tokens signed directly by the issuer (5 minutes).
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(300);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while reading a token payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtError {
    /// Token size exceeds maximum allowed.
    #[error("Access token exceeds maximum size")]
    TokenTooLarge,

    /// Token is not a three-part JWT or its payload is not valid JSON claims.
    #[error("Access token is malformed")]
    MalformedToken,
}

// =============================================================================
// Claims Types
// =============================================================================

/// Room permissions embedded in an access token.
///
/// Field names are camelCase on the wire to match the media server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    /// Room this grant is valid for.
    #[serde(default)]
    pub room: String,

    #[serde(default)]
    pub room_join: bool,

    #[serde(default)]
    pub can_publish: bool,

    #[serde(default)]
    pub can_publish_data: bool,

    #[serde(default)]
    pub can_subscribe: bool,
}

impl VideoGrant {
    /// Full participant grant for a single room: join, publish audio/video,
    /// publish data, and subscribe.
    #[must_use]
    pub fn participant(room: &str) -> Self {
        Self {
            room: room.to_string(),
            room_join: true,
            can_publish: true,
            can_publish_data: true,
            can_subscribe: true,
        }
    }

    /// Whether every participant permission is set.
    #[must_use]
    pub fn is_full_participant(&self) -> bool {
        self.room_join && self.can_publish && self.can_publish_data && self.can_subscribe
    }
}

/// Claims of a participant access token.
///
/// # Fields
///
/// - `iss`: API key the token was signed with
/// - `sub`: participant identity (`name__suffix`)
/// - `name`: display name
/// - `metadata`: opaque participant metadata
/// - `nbf`: not-before (Unix epoch seconds); issued tokens carry 0
/// - `exp`: expiry (Unix epoch seconds)
/// - `jti`: token id (the identity, as the media server expects)
/// - `video`: room grant
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub iss: String,

    pub sub: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub metadata: String,

    pub nbf: i64,

    pub exp: i64,

    #[serde(default)]
    pub jti: String,

    #[serde(default)]
    pub video: VideoGrant,
}

impl fmt::Debug for AccessTokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenClaims")
            .field("iss", &self.iss)
            .field("sub", &"[REDACTED]")
            .field("name", &"[REDACTED]")
            .field("nbf", &self.nbf)
            .field("exp", &self.exp)
            .field("video", &self.video)
            .finish_non_exhaustive()
    }
}

impl AccessTokenClaims {
    /// Seconds left until expiry as seen at `now` (Unix seconds).
    #[must_use]
    pub fn expires_in(&self, now: i64) -> i64 {
        self.exp - now
    }

    /// Whether the token is valid for `room` with the full participant grant.
    #[must_use]
    pub fn grants_room(&self, room: &str) -> bool {
        self.video.room == room && self.video.is_full_participant()
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Read the claims of a token WITHOUT verifying its signature.
///
/// Used by clients to inspect the identity and expiry of a token they were
/// handed, and by tests. The token MUST NOT be trusted on the basis of this
/// call.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong structure, bad base64, or invalid claims JSON
pub fn peek_claims(token: &str) -> Result<AccessTokenClaims, JwtError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtError::MalformedToken);
    };

    let payload_bytes = URL_SAFE_NO_PAD.decode(payload).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT payload base64");
        JwtError::MalformedToken
    })?;

    serde_json::from_slice(&payload_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT claims JSON");
        JwtError::MalformedToken
    })
}
