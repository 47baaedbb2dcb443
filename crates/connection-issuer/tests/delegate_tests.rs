//! Connection details integration tests (delegated mode).
//!
//! A wiremock server stands in for the token backend.

use common::types::ConnectionDetails;
use issuer_test_utils::{
    IdentityCookie, TestConfig, TestIssuerServer, TruncatedBodyServer, TEST_LIVEKIT_URL,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

async fn spawn_with_backend(backend: &MockServer) -> Result<TestIssuerServer, anyhow::Error> {
    TestIssuerServer::spawn_with(TestConfig::new().with_backend_url(&backend.uri())).await
}

/// Test that the backend receives the full identity and its token is relayed.
#[tokio::test]
async fn test_delegated_token_is_relayed() -> Result<(), anyhow::Error> {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/createToken"))
        .and(body_partial_json(json!({ "roomName": "r1", "metadata": "" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "participant_token": "backend-token",
            "server_url": "wss://backend-media.test"
        })))
        .expect(1)
        .mount(&backend)
        .await;

    let server = spawn_with_backend(&backend).await?;
    let client = reqwest::Client::new();

    let response = client
        .get(server.connection_details_url("roomName=r1&participantName=alice"))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let cookie_header = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .ok_or_else(|| anyhow::anyhow!("missing Set-Cookie"))?
        .to_str()?
        .to_string();
    let cookie = IdentityCookie::parse(&cookie_header);

    let details: ConnectionDetails = response.json().await?;
    assert_eq!(details.participant_token, "backend-token");
    assert_eq!(details.server_url, "wss://backend-media.test");
    assert_eq!(details.room_name, "r1");
    assert_eq!(details.participant_name, "alice");

    let received: Vec<Request> = backend
        .received_requests()
        .await
        .ok_or_else(|| anyhow::anyhow!("request recording disabled"))?;
    let body: serde_json::Value = serde_json::from_slice(
        &received
            .first()
            .ok_or_else(|| anyhow::anyhow!("backend not called"))?
            .body,
    )?;
    assert_eq!(
        body["participantName"],
        format!("alice__{}", cookie.suffix)
    );

    Ok(())
}

/// Test that an https server URL from the backend is rewritten to wss.
#[tokio::test]
async fn test_https_server_url_rewritten_to_wss() -> Result<(), anyhow::Error> {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/createToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "participant_token": "backend-token",
            "server_url": "https://media.backend.test:7880"
        })))
        .mount(&backend)
        .await;

    let server = spawn_with_backend(&backend).await?;

    let response = reqwest::get(server.connection_details_url("roomName=r1&participantName=alice"))
        .await?;

    assert_eq!(response.status(), 200);
    let details: ConnectionDetails = response.json().await?;
    assert_eq!(details.server_url, "wss://media.backend.test:7880");

    Ok(())
}

/// Test that a missing server URL falls back to the configured default.
#[tokio::test]
async fn test_missing_server_url_falls_back_to_default() -> Result<(), anyhow::Error> {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/createToken"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "participant_token": "t" })),
        )
        .mount(&backend)
        .await;

    let server = spawn_with_backend(&backend).await?;

    let response = reqwest::get(server.connection_details_url(
        "roomName=r1&participantName=alice&serverType=custom",
    ))
    .await?;

    assert_eq!(response.status(), 200);
    let details: ConnectionDetails = response.json().await?;
    assert_eq!(details.server_url, TEST_LIVEKIT_URL);

    Ok(())
}

/// Test that a backend error status is surfaced even when its body is cut off.
#[tokio::test]
async fn test_backend_error_with_unreadable_body() -> Result<(), anyhow::Error> {
    let backend = TruncatedBodyServer::spawn(502).await?;
    let server =
        TestIssuerServer::spawn_with(TestConfig::new().with_backend_url(&backend.url())).await?;

    let response = reqwest::get(server.connection_details_url("roomName=r1&participantName=alice"))
        .await?;

    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await?, "Backend API error: 502 - ");

    Ok(())
}

/// Test that a backend error status is surfaced with its body.
#[tokio::test]
async fn test_backend_error_returns_500_with_body() -> Result<(), anyhow::Error> {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/createToken"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&backend)
        .await;

    let server = spawn_with_backend(&backend).await?;

    let response = reqwest::get(server.connection_details_url("roomName=r1&participantName=alice"))
        .await?;

    assert_eq!(response.status(), 500);
    assert!(response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .is_none());
    assert_eq!(
        response.text().await?,
        "Backend API error: 401 - invalid api key"
    );

    Ok(())
}

/// Test that an unreachable backend returns 500.
#[tokio::test]
async fn test_unreachable_backend_returns_500() -> Result<(), anyhow::Error> {
    let server =
        TestIssuerServer::spawn_with(TestConfig::new().with_backend_url("http://127.0.0.1:1"))
            .await?;

    let response = reqwest::get(server.connection_details_url("roomName=r1&participantName=alice"))
        .await?;

    assert_eq!(response.status(), 500);
    let body = response.text().await?;
    assert!(
        body.starts_with("Backend API request failed: "),
        "unexpected body: {body}"
    );

    Ok(())
}

/// Test that delegated mode works without local signing credentials.
#[tokio::test]
async fn test_delegated_mode_without_signing_credentials() -> Result<(), anyhow::Error> {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/createToken"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "participant_token": "t" })),
        )
        .mount(&backend)
        .await;

    let server = TestIssuerServer::spawn_with(
        TestConfig::new()
            .without_signing()
            .with_backend_url(&backend.uri()),
    )
    .await?;

    let response = reqwest::get(server.connection_details_url("roomName=r1&participantName=alice"))
        .await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

/// Test that a cookie suffix is forwarded to the backend.
#[tokio::test]
async fn test_cookie_suffix_forwarded_to_backend() -> Result<(), anyhow::Error> {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/createToken"))
        .and(body_partial_json(json!({ "participantName": "alice__abcd" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "participant_token": "t" })),
        )
        .expect(1)
        .mount(&backend)
        .await;

    let server = spawn_with_backend(&backend).await?;
    let client = reqwest::Client::new();

    let response = client
        .get(server.connection_details_url("roomName=r1&participantName=alice"))
        .header(reqwest::header::COOKIE, "random-participant-postfix=abcd")
        .send()
        .await?;

    assert_eq!(response.status(), 200);

    Ok(())
}
