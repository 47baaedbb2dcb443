//! Bootstrapper lifecycle state.

use std::fmt;

/// Where the bootstrapper is in its lifecycle.
///
/// ```text
/// Idle -> RequestingCredential -> Connecting -> Connected
///                 |                    |            |
///                 +---> Failed <-------+            |
///                                                   v
///           (any state) ------- leave() -------> Disposed
/// ```
///
/// A join may start from `Idle` or `Failed`. `Disposed` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BootstrapState {
    #[default]
    Idle,
    RequestingCredential,
    Connecting,
    Connected,
    /// Last join failed; carries the error message for display.
    Failed(String),
    Disposed,
}

impl BootstrapState {
    /// A new join may start from this state.
    pub fn can_join(&self) -> bool {
        matches!(self, BootstrapState::Idle | BootstrapState::Failed(_))
    }

    /// A join is between its start and its outcome.
    pub fn is_joining(&self) -> bool {
        matches!(
            self,
            BootstrapState::RequestingCredential | BootstrapState::Connecting
        )
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, BootstrapState::Disposed)
    }

    /// Metric and log label.
    pub fn label(&self) -> &'static str {
        match self {
            BootstrapState::Idle => "idle",
            BootstrapState::RequestingCredential => "requesting_credential",
            BootstrapState::Connecting => "connecting",
            BootstrapState::Connected => "connected",
            BootstrapState::Failed(_) => "failed",
            BootstrapState::Disposed => "disposed",
        }
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapState::Failed(reason) => write!(f, "failed ({reason})"),
            other => f.write_str(other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        assert_eq!(BootstrapState::default(), BootstrapState::Idle);
    }

    #[test]
    fn test_can_join() {
        assert!(BootstrapState::Idle.can_join());
        assert!(BootstrapState::Failed("boom".to_string()).can_join());
        assert!(!BootstrapState::RequestingCredential.can_join());
        assert!(!BootstrapState::Connecting.can_join());
        assert!(!BootstrapState::Connected.can_join());
        assert!(!BootstrapState::Disposed.can_join());
    }

    #[test]
    fn test_is_joining() {
        assert!(BootstrapState::RequestingCredential.is_joining());
        assert!(BootstrapState::Connecting.is_joining());
        assert!(!BootstrapState::Connected.is_joining());
        assert!(!BootstrapState::Idle.is_joining());
    }

    #[test]
    fn test_display() {
        assert_eq!(BootstrapState::Connected.to_string(), "connected");
        assert_eq!(
            BootstrapState::RequestingCredential.to_string(),
            "requesting_credential"
        );
        assert_eq!(
            BootstrapState::Failed("Invalid region".to_string()).to_string(),
            "failed (Invalid region)"
        );
    }
}
