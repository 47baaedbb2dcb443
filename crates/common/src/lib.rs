//! Types shared by the connection issuer and the session bootstrapper.

#![warn(clippy::pedantic)]

/// Module for the connection descriptor and server mode types
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for access token claims and payload inspection
pub mod jwt;
