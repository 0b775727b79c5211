//! Test server harness for E2E testing
//!
//! Provides `TestMeetingServer` for spawning real meeting-service instances
//! on a random local port.

use meeting_service::config::Config;
use meeting_service::observability::metrics::init_metrics_recorder;
use meeting_service::repositories::{MeetingStore, MemoryMeetingStore};
use meeting_service::routes::{self, AppState};
use meeting_service::services::TokenClient;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Process-wide metrics handle shared by every test server.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Test harness for spawning the meeting service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_create_flow() -> Result<(), anyhow::Error> {
///     let server = TestMeetingServer::spawn().await?;
///
///     let response = reqwest::Client::new()
///         .post(format!("{}/meetings", server.url()))
///         .json(&serde_json::json!({"name": "Standup", "hostName": "Alice"}))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestMeetingServer {
    addr: SocketAddr,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestMeetingServer {
    /// Spawn a server backed by a fresh in-memory store and no token service.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(Arc::new(MemoryMeetingStore::new()), None).await
    }

    /// Spawn a server backed by `store` (e.g. a `PgMeetingStore` over a
    /// `#[sqlx::test]` pool).
    pub async fn spawn_with_store(store: Arc<dyn MeetingStore>) -> Result<Self, anyhow::Error> {
        Self::spawn_with(store, None).await
    }

    /// Spawn a server with an in-memory store whose token endpoint points at
    /// `token_service_url` (typically a wiremock server).
    pub async fn spawn_with_token_service(
        token_service_url: impl Into<String>,
    ) -> Result<Self, anyhow::Error> {
        Self::spawn_with(
            Arc::new(MemoryMeetingStore::new()),
            Some(token_service_url.into()),
        )
        .await
    }

    /// Spawn a new test server instance.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    ///
    /// # Errors
    ///
    /// Returns an error if configuration, the token client, or binding fails.
    pub async fn spawn_with(
        store: Arc<dyn MeetingStore>,
        token_service_url: Option<String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("STORE_BACKEND".to_string(), "memory".to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("TOKEN_SERVICE_TIMEOUT_SECONDS".to_string(), "2".to_string()),
            ("REQUEST_TIMEOUT_SECONDS".to_string(), "10".to_string()),
        ]);
        if let Some(url) = &token_service_url {
            vars.insert("TOKEN_SERVICE_URL".to_string(), url.clone());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let token_client = match &config.token_service_url {
            Some(url) => Some(
                TokenClient::new(
                    url.clone(),
                    Duration::from_secs(config.token_service_timeout_seconds),
                )
                .map_err(|e| anyhow::anyhow!("Failed to build token client: {}", e))?,
            ),
            None => None,
        };

        let state = Arc::new(AppState::new(store, token_client, config.clone()));

        // Build routes using meeting-service's real route builder
        let app = routes::build_routes(state, test_metrics_handle());

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

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestMeetingServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
