//! # Issuer Test Utilities
//!
//! Shared test utilities for the connection issuer.
//!
//! This crate provides:
//! - Fixture configuration (`fixtures`)
//! - Server test harness (`TestIssuerServer` for E2E tests)
//! - Token and cookie assertions (`assertions`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use issuer_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestIssuerServer::spawn().await?;
//!
//!     let response = reqwest::get(format!(
//!         "{}/connection-details?roomName=r1&participantName=alice&serverType=livekit",
//!         server.url()
//!     ))
//!     .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod server_harness;

// Re-export commonly used items
pub use assertions::*;
pub use fixtures::*;
pub use server_harness::*;
