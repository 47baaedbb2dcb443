//! Observability for the connection issuer.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;
