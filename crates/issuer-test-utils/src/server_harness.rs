//! Test server harness for E2E testing
//!
//! Provides `TestIssuerServer` for spawning real issuer instances in tests.

use crate::fixtures::TestConfig;
use connection_issuer::config::Config;
use connection_issuer::observability::metrics::init_metrics_recorder;
use connection_issuer::routes::{self, AppState};
use connection_issuer::services::delegate_client::DelegateClient;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;

/// Process-wide metrics handle. The global recorder can only be installed
/// once, so later servers share it; if another test already installed a
/// recorder, a detached handle is used instead.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Test harness for spawning the connection issuer in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> Result<(), anyhow::Error> {
///     let server = TestIssuerServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestIssuerServer {
    addr: SocketAddr,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestIssuerServer {
    /// Spawn a server with the default fixture configuration
    /// (direct signing enabled, no regions).
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(TestConfig::new()).await
    }

    /// Spawn a server with a custom fixture configuration.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Use the real route builder, including CORS and metrics layers
    /// - Start the HTTP server in the background
    pub async fn spawn_with(test_config: TestConfig) -> Result<Self, anyhow::Error> {
        let config = test_config
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let delegate = DelegateClient::new(config.backend_api_url.clone())
            .map_err(|e| anyhow::anyhow!("Failed to create delegate client: {}", e))?;

        let state = Arc::new(AppState {
            config: config.clone(),
            delegate,
        });

        let app = routes::build_routes(state, metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of the connection details endpoint with the given query string.
    pub fn connection_details_url(&self, query: &str) -> String {
        format!("{}/connection-details?{}", self.url(), query)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestIssuerServer {
    fn drop(&mut self) {
        // Abort the server task so the port is released when the test ends.
        self._handle.abort();
    }
}

/// Upstream that answers every request with `status` and a body cut off
/// before its declared `Content-Length`, so reading the body fails.
pub struct TruncatedBodyServer {
    addr: SocketAddr,
    _handle: JoinHandle<()>,
}

impl TruncatedBodyServer {
    pub async fn spawn(status: u16) -> Result<Self, anyhow::Error> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind truncating server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let _ = socket.read(&mut buf).await;

                    let response = format!(
                        "HTTP/1.1 {status} Upstream Error\r\n\
                         Content-Type: text/plain\r\n\
                         Content-Length: 64\r\n\
                         Connection: close\r\n\r\n\
                         partial"
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;

                    // Drain until the client hangs up so the close is clean.
                    while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
                });
            }
        });

        Ok(Self {
            addr,
            _handle: handle,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TruncatedBodyServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
