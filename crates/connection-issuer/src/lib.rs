//! Connection issuer library.
//!
//! Issues connection descriptors for the video conferencing client: a media
//! server WebSocket URL plus a short-lived access token scoped to one room.
//!
//! # Architecture
//!
//! The issuer follows the Handler -> Service pattern:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `models` - Request models
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `services` - Identity, signing, region selection, delegated backend

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
