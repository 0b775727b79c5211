//! Meeting Service
//!
//! Entry point for the meeting roster backend.

use meeting_service::config::{Config, LogFormat, StoreBackend};
use meeting_service::observability::metrics::init_metrics_recorder;
use meeting_service::repositories::{MeetingStore, MemoryMeetingStore, PgMeetingStore};
use meeting_service::routes::{self, AppState};
use meeting_service::services::TokenClient;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    // Tracing is initialized before reporting config errors so they are logged
    init_tracing(
        config
            .as_ref()
            .map(|c| c.log_format)
            .unwrap_or(LogFormat::Text),
    );

    info!("Starting Meeting Service");

    let config = config.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        store_backend = ?config.store_backend,
        bind_address = %config.bind_address,
        token_service_configured = config.token_service_url.is_some(),
        request_timeout_seconds = config.request_timeout_seconds,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let store = build_store(&config).await?;

    let token_client = match &config.token_service_url {
        Some(url) => Some(TokenClient::new(
            url.clone(),
            Duration::from_secs(config.token_service_timeout_seconds),
        )?),
        None => {
            warn!("TOKEN_SERVICE_URL not set; room token requests will return 503");
            None
        }
    };

    let bind_address = config.bind_address.clone();
    let drain_seconds = config.drain_seconds;

    let state = Arc::new(AppState::new(store, token_client, config));
    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Meeting Service listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(drain_seconds))
        .await?;

    info!("Meeting Service shutdown complete");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "meeting_service=debug,meeting=debug,tower_http=debug".into());

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Construct the configured meeting store.
///
/// The Postgres backend connects and applies pending migrations before the
/// server accepts traffic.
async fn build_store(config: &Config) -> Result<Arc<dyn MeetingStore>, Box<dyn std::error::Error>> {
    match config.store_backend {
        StoreBackend::Memory => {
            warn!("Using in-memory meeting store; meetings are lost on restart");
            Ok(Arc::new(MemoryMeetingStore::new()))
        }
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or("DATABASE_URL is required for the postgres store")?;

            info!("Connecting to database...");
            let store = PgMeetingStore::connect(database_url, config.db_max_connections)
                .await
                .map_err(|e| {
                    error!("Failed to connect to database: {}", e);
                    e
                })?;
            info!("Database connection established");

            store.migrate().await.map_err(|e| {
                error!("Failed to apply database migrations: {}", e);
                e
            })?;
            info!("Database migrations applied");

            Ok(Arc::new(store))
        }
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and the drain period is complete.
async fn shutdown_signal(drain_seconds: u64) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_seconds > 0 {
        warn!("Draining connections for {} seconds...", drain_seconds);
        tokio::time::sleep(Duration::from_secs(drain_seconds)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (DRAIN_SECONDS=0)");
    }
}
