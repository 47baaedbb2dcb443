//! Common data types shared by the issuer and the session bootstrapper.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the display name and the identity suffix.
pub const IDENTITY_SEPARATOR: &str = "__";

/// Cookie holding the identity suffix between joins.
pub const IDENTITY_COOKIE_NAME: &str = "random-participant-postfix";

/// Everything a client needs to open a media session.
///
/// Produced fresh for every join request and consumed once by the media
/// session. Serialized camelCase to match the web client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    /// WebSocket URL of the media server (`ws://` or `wss://`).
    pub server_url: String,

    /// Room the token is scoped to.
    pub room_name: String,

    /// Signed access token. Redacted in Debug output.
    pub participant_token: String,

    /// Display name the participant chose.
    pub participant_name: String,
}

impl fmt::Debug for ConnectionDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDetails")
            .field("server_url", &self.server_url)
            .field("room_name", &self.room_name)
            .field("participant_token", &"[REDACTED]")
            .field("participant_name", &self.participant_name)
            .finish()
    }
}

/// Which token path the issuer should take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    /// Sign the token locally with the media server's API key.
    #[serde(rename = "livekit")]
    LiveKit,
    /// Delegate to the external token backend.
    #[default]
    Custom,
}

impl ServerType {
    /// Query-string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerType::LiveKit => "livekit",
            ServerType::Custom => "custom",
        }
    }

    /// Interpret a `serverType` query value. Only `livekit` selects direct
    /// signing; anything else, including absence, delegates.
    #[must_use]
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("livekit") => ServerType::LiveKit,
            _ => ServerType::Custom,
        }
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compose the identity used as the token subject.
#[must_use]
pub fn participant_identity(participant_name: &str, suffix: &str) -> String {
    format!("{participant_name}{IDENTITY_SEPARATOR}{suffix}")
}
