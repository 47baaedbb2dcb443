//! HTTP middleware.

pub mod http_metrics;
