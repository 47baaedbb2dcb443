//! Metrics definitions for the session bootstrapper.
//!
//! All metrics use the `bootstrapper_` prefix. Labels are bounded:
//! - `status`: success, error, unavailable
//! - `outcome`: connected, failed, cancelled, rejected
//! - `trigger`: user, session_disconnected, programmatic
//!
//! Room names and participant names are never used as labels.

use metrics::{counter, histogram};
use std::time::Duration;

/// Record a connection-details request to the issuer.
///
/// Metric: `bootstrapper_credential_requests_total`,
/// `bootstrapper_credential_request_duration_seconds`
/// Labels: `status`
pub fn record_credential_request(status: &str, duration: Duration) {
    histogram!("bootstrapper_credential_request_duration_seconds")
        .record(duration.as_secs_f64());

    counter!("bootstrapper_credential_requests_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record the outcome of a join.
///
/// Metric: `bootstrapper_joins_total`, `bootstrapper_join_duration_seconds`
/// Labels: `outcome`
pub fn record_join(outcome: &str, duration: Duration) {
    histogram!("bootstrapper_join_duration_seconds",
        "outcome" => outcome.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("bootstrapper_joins_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record how display-name confirmation ended.
///
/// Metric: `bootstrapper_name_confirmations_total`,
/// `bootstrapper_name_confirmation_attempts`
/// Labels: `confirmed`
pub fn record_name_confirmation(confirmed: bool, attempts: u32) {
    let confirmed = if confirmed { "true" } else { "false" };

    histogram!("bootstrapper_name_confirmation_attempts",
        "confirmed" => confirmed
    )
    .record(f64::from(attempts));

    counter!("bootstrapper_name_confirmations_total",
        "confirmed" => confirmed
    )
    .increment(1);
}

/// Record a leave that actually tore the session down.
///
/// Metric: `bootstrapper_leaves_total`
/// Labels: `trigger`
pub fn record_leave(trigger: &'static str) {
    counter!("bootstrapper_leaves_total", "trigger" => trigger).increment(1);
}
