//! Observability for the session bootstrapper.
//!
//! The bootstrapper is a library: it records through the `metrics` facade
//! and leaves installing a recorder to the host.

pub mod metrics;
