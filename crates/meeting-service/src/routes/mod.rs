//! HTTP routes for the meeting service.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::repositories::MeetingStore;
use crate::services::{MeetingService, TokenClient};
use axum::http::{header::CONTENT_TYPE, Method};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Meeting document store; also pinged by `/ready`.
    pub store: Arc<dyn MeetingStore>,

    /// Meeting operations over `store`.
    pub meetings: MeetingService,

    /// Room-token service client, if `TOKEN_SERVICE_URL` is set.
    pub token_client: Option<TokenClient>,

    /// Service configuration.
    pub config: Config,
}

impl AppState {
    /// Build state around a store, wiring a `MeetingService` to it.
    pub fn new(
        store: Arc<dyn MeetingStore>,
        token_client: Option<TokenClient>,
        config: Config,
    ) -> Self {
        Self {
            meetings: MeetingService::new(Arc::clone(&store)),
            store,
            token_client,
            config,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health`, `/ready` - liveness and readiness checks
/// - `/metrics` - Prometheus scrape endpoint
/// - `/meetings`, `/meetings/join`, `/meetings/token`, `/meetings/:meeting_id`
/// - CORS for browser clients
/// - TraceLayer for request logging
/// - request timeout from `REQUEST_TIMEOUT_SECONDS`
/// - HTTP metrics middleware (outermost)
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_seconds);

    let app_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/meetings", post(handlers::create_meeting))
        .route(
            "/meetings/join",
            post(handlers::join_meeting).get(handlers::get_meeting_by_route_segment),
        )
        .route(
            "/meetings/token",
            post(handlers::issue_room_token).get(handlers::get_meeting_by_route_segment),
        )
        .route("/meetings/:meeting_id", get(handlers::get_meeting))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    // Layer order (innermost first):
    // 1. CorsLayer - answer preflights before handlers run
    // 2. TraceLayer - log request details
    // 3. TimeoutLayer - bound total request time
    // 4. http_metrics_middleware - record ALL responses (outermost)
    app_routes
        .merge(metrics_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(http_metrics_middleware))
}
