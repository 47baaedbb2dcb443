//! Service layer for the connection issuer.
//!
//! - `identity` - identity suffix resolution and the identity cookie
//! - `token_issuer` - local access token signing
//! - `region_resolver` - media server URL selection by region hint
//! - `delegate_client` - client for the delegated token backend

pub mod delegate_client;
pub mod identity;
pub mod region_resolver;
pub mod token_issuer;
