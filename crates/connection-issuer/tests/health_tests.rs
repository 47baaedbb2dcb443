//! Operational endpoint integration tests.
//!
//! Tests `/health`, `/metrics` and unknown routes using the
//! `TestIssuerServer` harness.

use issuer_test_utils::TestIssuerServer;

/// Test that health endpoint returns 200 with a plain "OK".
#[tokio::test]
async fn test_health_endpoint_returns_ok() -> Result<(), anyhow::Error> {
    let server = TestIssuerServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "OK");

    Ok(())
}

/// Test that the metrics endpoint reports requests served earlier.
#[tokio::test]
async fn test_metrics_endpoint_reports_http_requests() -> Result<(), anyhow::Error> {
    let server = TestIssuerServer::spawn().await?;
    let client = reqwest::Client::new();

    client
        .get(server.connection_details_url(
            "roomName=metrics-room&participantName=alice&serverType=livekit",
        ))
        .send()
        .await?;

    let response = client
        .get(format!("{}/metrics", server.url()))
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    let body = response.text().await?;
    // The recorder is process-wide; another test binary may own it, in which
    // case this handle is detached and renders nothing.
    if !body.is_empty() {
        assert!(body.contains("issuer_http_requests_total"));
        assert!(body.contains("issuer_token_issuance_total"));
        assert!(!body.contains("metrics-room"), "room names must not be labels");
    }

    Ok(())
}

/// Test that non-existent routes return 404.
#[tokio::test]
async fn test_unknown_route_returns_404() -> Result<(), anyhow::Error> {
    let server = TestIssuerServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/v1/nonexistent", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 404);

    Ok(())
}

/// Test that POST is not accepted on the connection details endpoint.
#[tokio::test]
async fn test_post_connection_details_not_allowed() -> Result<(), anyhow::Error> {
    let server = TestIssuerServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .post(server.connection_details_url("roomName=r1&participantName=alice"))
        .send()
        .await?;

    assert_eq!(response.status(), 405);

    Ok(())
}
