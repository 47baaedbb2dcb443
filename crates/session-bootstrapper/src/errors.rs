//! Session bootstrapper error types.

use thiserror::Error;

/// Errors returned by the join flow.
///
/// Every error returned by `join` or `connect_with_details` also moves the
/// bootstrapper to `BootstrapState::Failed`, except `InvalidState` (the
/// call was refused without touching state) and `Cancelled` (the
/// bootstrapper was disposed while the join was in flight).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootstrapError {
    #[error("Invalid choices: {0}")]
    InvalidChoices(String),

    /// The issuer answered with a non-success status. `body` is the
    /// issuer's plain-text message.
    #[error("Connection details request failed: {status} - {body}")]
    Issuer { status: u16, body: String },

    /// The issuer could not be reached or its answer could not be read.
    #[error("Connection details request failed: {0}")]
    Transport(String),

    #[error("Failed to connect to media server: {0}")]
    Connect(String),

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    #[error("Join cancelled")]
    Cancelled,
}

impl BootstrapError {
    /// Short label used as a metric dimension.
    pub fn error_type(&self) -> &'static str {
        match self {
            BootstrapError::InvalidChoices(_) => "invalid_choices",
            BootstrapError::Issuer { .. } => "issuer",
            BootstrapError::Transport(_) => "transport",
            BootstrapError::Connect(_) => "connect",
            BootstrapError::InvalidState { .. } => "invalid_state",
            BootstrapError::Cancelled => "cancelled",
        }
    }
}
