//! Request models for the connection issuer.
//!
//! The response model, `ConnectionDetails`, lives in `common::types` because
//! the session bootstrapper deserializes it.

use serde::Deserialize;

/// Query string of `GET /connection-details`.
///
/// Every field is optional at the extractor level so that a missing
/// `roomName` or `participantName` produces the issuer's own 400 message
/// instead of a generic deserialization rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetailsQuery {
    pub room_name: Option<String>,
    pub participant_name: Option<String>,
    pub metadata: Option<String>,
    pub region: Option<String>,
    pub server_type: Option<String>,
}
