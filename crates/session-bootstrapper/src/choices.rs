//! Pre-join user choices.

use crate::errors::BootstrapError;
use serde::{Deserialize, Serialize};

/// What the user picked on the pre-join screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChoices {
    pub username: String,
    pub video_enabled: bool,
    pub audio_enabled: bool,
    #[serde(default)]
    pub video_device_id: Option<String>,
    #[serde(default)]
    pub audio_device_id: Option<String>,
}

impl UserChoices {
    /// Camera and microphone on, default devices.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            video_enabled: true,
            audio_enabled: true,
            video_device_id: None,
            audio_device_id: None,
        }
    }
}

/// Normalize choices before a join.
///
/// The username is trimmed and must not be empty afterwards. Empty device
/// ids are treated as "default device".
///
/// # Errors
///
/// Returns `BootstrapError::InvalidChoices` for a blank username.
pub fn validate_choices(choices: UserChoices) -> Result<UserChoices, BootstrapError> {
    let username = choices.username.trim().to_string();
    if username.is_empty() {
        return Err(BootstrapError::InvalidChoices(
            "username must not be empty".to_string(),
        ));
    }

    Ok(UserChoices {
        username,
        video_device_id: choices.video_device_id.filter(|id| !id.is_empty()),
        audio_device_id: choices.audio_device_id.filter(|id| !id.is_empty()),
        ..choices
    })
}
