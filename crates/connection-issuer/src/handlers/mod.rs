//! HTTP request handlers.

pub mod connection_details;
pub mod health;
pub mod metrics;

pub use connection_details::{get_connection_details, preflight};
pub use health::health_check;
pub use metrics::metrics_handler;
