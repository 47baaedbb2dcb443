//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports [`secrecy`] types. Use them for the media server API secret and
//! any other credential that passes through configuration or request state.
//!
//! `SecretString` implements `Debug` with redaction, so a struct deriving
//! `Debug` over a secret field is safe to log. Reading the value requires an
//! explicit `expose_secret()` call, which keeps every use site greppable.
//! Secrets are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct SigningCredentials {
//!     api_key: String,
//!     api_secret: SecretString,
//! }
//!
//! let creds = SigningCredentials {
//!     api_key: "APIxyz".to_string(),
//!     api_secret: SecretString::from("s3cr3t"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("s3cr3t"));
//! assert_eq!(creds.api_secret.expose_secret(), "s3cr3t");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("hunter2");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("hunter2"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("api-secret-value");
        assert_eq!(secret.expose_secret(), "api-secret-value");
    }

    #[test]
    fn test_deserialize_keeps_value_out_of_debug() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct Credentials {
            api_key: String,
            api_secret: SecretString,
        }

        let json = r#"{"api_key": "APIabc", "api_secret": "my-secret-value"}"#;
        let creds: Credentials = serde_json::from_str(json).expect("deserialize");

        assert_eq!(creds.api_secret.expose_secret(), "my-secret-value");

        let debug = format!("{creds:?}");
        assert!(debug.contains("APIabc"));
        assert!(!debug.contains("my-secret-value"));
    }

    #[test]
    fn test_clone_works() {
        let secret = SecretString::from("cloneable");
        let cloned = secret.clone();
        assert_eq!(cloned.expose_secret(), "cloneable");
    }
}
